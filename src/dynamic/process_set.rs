use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::process::Process;
use crate::signal::Signal;

struct Element {
    index: usize,
    process: Process,
}

struct Inner {
    count: usize,
    processes: HashMap<String, Element>,
    shutdown: Option<Signal>,
}

/// Tracks the currently running members of a dynamic group together with
/// their insertion order.
///
/// The engine owns the set; the client only ever sees the read-side
/// [`ProcessSetView`]. The map lives behind a lock so `get` stays safe while
/// the engine makes progress.
pub(crate) struct ProcessSet {
    ordered: bool,
    inner: Arc<Mutex<Inner>>,
}

impl ProcessSet {
    pub(crate) fn new(ordered: bool) -> Self {
        Self {
            ordered,
            inner: Arc::new(Mutex::new(Inner {
                count: 0,
                processes: HashMap::new(),
                shutdown: None,
            })),
        }
    }

    pub(crate) fn view(&self) -> ProcessSetView {
        ProcessSetView {
            inner: self.inner.clone(),
        }
    }

    /// Registers a process under the member's name. Inserting a name twice is
    /// a programmer error and aborts the process.
    pub(crate) fn add(&self, name: &str, process: Process) {
        let mut inner = self.inner.lock().unwrap();
        if inner.processes.contains_key(name) {
            panic!("member inserted twice: {:?}", name);
        }
        let index = inner.count;
        inner.processes.insert(
            name.to_owned(),
            Element { index, process },
        );
        inner.count += 1;
    }

    /// Forgets the named process. Removing a missing name is a no-op.
    pub(crate) fn remove(&self, name: &str) {
        self.inner.lock().unwrap().processes.remove(name);
    }

    pub(crate) fn len(&self) -> usize {
        self.inner.lock().unwrap().processes.len()
    }

    /// Whether a shutdown signal has been stored.
    pub(crate) fn signaled(&self) -> bool {
        self.inner.lock().unwrap().shutdown.is_some()
    }

    /// Whether the set has been signaled and every member is gone.
    pub(crate) fn complete(&self) -> bool {
        let inner = self.inner.lock().unwrap();
        inner.shutdown.is_some() && inner.processes.is_empty()
    }

    /// Stores the shutdown signal and propagates it to the current processes.
    ///
    /// An ordered set stops members in reverse insertion order, awaiting each
    /// member's termination before signaling its predecessor. An unordered
    /// set fires the signal at every member without waiting.
    pub(crate) async fn signal(&self, signal: Signal) {
        let mut snapshot: Vec<(usize, Process)> = {
            let mut inner = self.inner.lock().unwrap();
            inner.shutdown = Some(signal.clone());
            inner
                .processes
                .values()
                .map(|element| (element.index, element.process.clone()))
                .collect()
        };

        debug!(signal = %signal, members = snapshot.len(), ordered = self.ordered, "stopping members");

        if self.ordered {
            snapshot.sort_by(|a, b| b.0.cmp(&a.0));
            for (_, process) in snapshot {
                process.signal(signal.clone());
                let _ = process.wait().await;
            }
        } else {
            for (_, process) in snapshot {
                process.signal(signal.clone());
            }
        }
    }
}

/// Cloneable read-side view of a [`ProcessSet`], handed to the client for
/// lookups by member name.
#[derive(Clone)]
pub(crate) struct ProcessSetView {
    inner: Arc<Mutex<Inner>>,
}

impl ProcessSetView {
    pub(crate) fn get(&self, name: &str) -> Option<Process> {
        self.inner
            .lock()
            .unwrap()
            .processes
            .get(name)
            .map(|element| element.process.clone())
    }
}
