use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, Future, FutureExt, Shared};
use tokio::sync::{mpsc, oneshot};
use tokio::task;
use tracing::trace;

use crate::member::Runnable;
use crate::notifier::ReadyNotifier;
use crate::signal::Signal;

type ReadyFuture = Shared<BoxFuture<'static, ()>>;
type WaitFuture = Shared<BoxFuture<'static, Result<(), Arc<anyhow::Error>>>>;

/// A started member: the handle through which observers follow a runnable's
/// lifecycle and request its cooperative shutdown.
///
/// The handle is cheap to clone; every clone observes the same underlying
/// task. `ready` and `wait` are shared futures, so any number of observers
/// may await them independently.
#[derive(Clone)]
pub struct Process {
    name: Arc<str>,
    created_at: DateTime<Utc>,
    signal_tx: mpsc::UnboundedSender<Signal>,
    ready: ReadyFuture,
    wait: WaitFuture,
}

impl Process {
    /// Starts the runnable on a fresh background task and returns the handle
    /// to it.
    pub(crate) fn spawn(name: &str, runnable: Box<dyn Runnable>) -> Self {
        let (signal_tx, signal_rx) = mpsc::unbounded_channel();
        let (ready_tx, ready_rx) = oneshot::channel();

        trace!(member = name, "starting runnable");
        let join_handle = task::spawn(runnable.run(signal_rx, ReadyNotifier::from_oneshot(ready_tx)));

        // A dropped notifier means the routine returned without ever becoming
        // ready; the ready future must stay pending so that observers pick
        // the wait branch instead.
        let ready = async move {
            if ready_rx.await.is_err() {
                futures::future::pending::<()>().await;
            }
        }
        .boxed()
        .shared();

        let wait = async move {
            match join_handle.await {
                Ok(Ok(())) => Ok(()),
                Ok(Err(err)) => Err(Arc::new(err)),
                // The routine panicked or its task was cancelled.
                Err(join_err) => Err(Arc::new(anyhow::Error::new(join_err))),
            }
        }
        .boxed()
        .shared();

        Self {
            name: Arc::from(name),
            created_at: Utc::now(),
            signal_tx,
            ready,
            wait,
        }
    }

    /// The member name this process was started under.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// When the process was started.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Requests cooperative shutdown. Signaling a process that has already
    /// terminated is a no-op.
    pub fn signal(&self, signal: Signal) {
        let _ = self.signal_tx.send(signal);
    }

    /// Resolves once the runnable has notified readiness. Never resolves for
    /// a process that terminated without becoming ready.
    pub fn ready(&self) -> impl Future<Output = ()> {
        self.ready.clone()
    }

    /// Resolves when the runnable terminates, with the failure it reported,
    /// if any. A panicking routine resolves `wait` with an error.
    pub fn wait(&self) -> impl Future<Output = Result<(), Arc<anyhow::Error>>> {
        self.wait.clone()
    }
}

impl fmt::Debug for Process {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Process")
            .field("name", &self.name)
            .field("created_at", &self.created_at)
            .finish()
    }
}
