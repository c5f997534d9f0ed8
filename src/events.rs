use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use crate::buffer::SlidingBuffer;
use crate::process::Process;

/// Event broadcast once per member as soon as its process is observed
/// running, either because it notified readiness or because it terminated
/// before ever doing so.
#[derive(Debug, Clone)]
pub struct EntranceEvent {
    /// Name of the member that entered the group.
    pub member: String,
    /// Handle to the member's running process.
    pub process: Process,
}

impl PartialEq for EntranceEvent {
    fn eq(&self, other: &Self) -> bool {
        self.member == other.member
    }
}

/// Event broadcast exactly once per admitted member, when its process
/// terminates.
#[derive(Debug, Clone)]
pub struct ExitEvent {
    /// Name of the member that exited.
    pub member: String,
    /// The failure the member terminated with, if any. Errors are shared so
    /// that every listener observes the same value.
    pub err: Option<Arc<anyhow::Error>>,
}

impl PartialEq for ExitEvent {
    fn eq(&self, other: &Self) -> bool {
        self.member == other.member
            && match (&self.err, &other.err) {
                (None, None) => true,
                (Some(a), Some(b)) => Arc::ptr_eq(a, b),
                _ => false,
            }
    }
}

/// Receiving half of a listener channel handed out by a broadcaster. The
/// channel closes once the broadcaster does.
pub type EventListener<E> = mpsc::UnboundedReceiver<E>;

////////////////////////////////////////////////////////////////////////////////

/// Fans one producer's events out to any number of listeners, replaying up to
/// `buffer_size` recent events to listeners that attach late.
///
/// Both the replay append and the listener delivery happen under one lock, so
/// every listener observes events in the same order. Listener channels are
/// unbounded; delivery never blocks the producer and never drops an event,
/// while the replay window stays bounded by the sliding buffer.
pub(crate) struct Broadcaster<E> {
    inner: Mutex<Inner<E>>,
}

struct Inner<E> {
    // None is the closed sentinel.
    listeners: Option<Vec<mpsc::UnboundedSender<E>>>,
    buffer: SlidingBuffer<E>,
}

impl<E: Clone> Broadcaster<E> {
    pub(crate) fn new(buffer_size: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                listeners: Some(Vec::new()),
                buffer: SlidingBuffer::new(buffer_size),
            }),
        }
    }

    /// Returns a fresh listener channel, preloaded with the buffered replay.
    /// Attaching after close still drains the replay; the channel then
    /// terminates immediately.
    pub(crate) fn attach(&self) -> EventListener<E> {
        let mut inner = self.inner.lock().unwrap();
        let (tx, rx) = mpsc::unbounded_channel();
        for event in inner.buffer.iter() {
            let _ = tx.send(event.clone());
        }
        if let Some(listeners) = inner.listeners.as_mut() {
            listeners.push(tx);
        }
        rx
    }

    /// Records the event in the replay buffer and delivers it to every
    /// current listener.
    pub(crate) fn broadcast(&self, event: E) {
        let mut inner = self.inner.lock().unwrap();
        inner.buffer.append(event.clone());
        if let Some(listeners) = &inner.listeners {
            for listener in listeners {
                // A listener that dropped its receiver just stops observing.
                let _ = listener.send(event.clone());
            }
        }
    }

    /// Terminates every listener channel and refuses future attachments
    /// beyond replay. Closing an already closed broadcaster is a no-op.
    pub(crate) fn close(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.listeners = None;
    }
}
