use std::sync::{Arc, Mutex};

use futures::future::{BoxFuture, FutureExt, Shared};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

use crate::events::{Broadcaster, EntranceEvent, EventListener, ExitEvent};
use crate::member::Member;
use crate::process::Process;

use super::process_set::ProcessSetView;

/// Error reported when a member cannot be admitted because the group no
/// longer accepts inserts.
#[derive(Debug, Error)]
#[error("dynamic group is closed to new members")]
pub struct InsertError;

/// Resolves once [`DynamicClient::close`] has been called. Producers use it
/// to abort inserts that would otherwise block forever.
#[derive(Clone)]
pub struct CloseNotifier(Shared<BoxFuture<'static, ()>>);

impl CloseNotifier {
    fn from_oneshot(receiver: oneshot::Receiver<()>) -> Self {
        Self(
            async move {
                let _ = receiver.await;
            }
            .boxed()
            .shared(),
        )
    }

    /// Waits until the group has been closed.
    pub async fn done(&self) {
        self.0.clone().await
    }
}

/// An admission request travelling from an [`Inserter`] to the engine. The
/// ack resolves once the engine has actually admitted the member; a dropped
/// ack means the member never made it in.
pub(crate) struct InsertRequest {
    pub(crate) member: Member,
    pub(crate) ack: oneshot::Sender<Result<(), InsertError>>,
}

/// Send side of the admission channel.
///
/// While the group is at capacity the engine leaves requests queued, so
/// [`Inserter::insert`] blocks until capacity frees up or the group closes.
#[derive(Clone)]
pub struct Inserter {
    tx: mpsc::Sender<InsertRequest>,
    closed: CloseNotifier,
}

impl Inserter {
    /// Offers a member to the engine, blocking while the group is at
    /// capacity. Resolves with `Ok` only once the engine has admitted the
    /// member; a group that closes first reports an [`InsertError`] and the
    /// member never runs.
    ///
    /// Admission is a round-trip: handing the request over is not enough,
    /// the engine acknowledges each member it admits and refuses the rest,
    /// so the reported outcome always matches what actually happened.
    pub async fn insert(&self, member: Member) -> Result<(), InsertError> {
        let (ack_tx, ack_rx) = oneshot::channel();
        let request = InsertRequest {
            member,
            ack: ack_tx,
        };
        tokio::select! {
            result = self.tx.send(request) => match result {
                // The request reached the engine's queue; only the ack says
                // whether the member was admitted.
                Ok(()) => ack_rx.await.unwrap_or(Err(InsertError)),
                Err(_) => Err(InsertError),
            },
            _ = self.closed.done() => Err(InsertError),
        }
    }
}

////////////////////////////////////////////////////////////////////////////////

struct ClientInner {
    insert_tx: mpsc::Sender<InsertRequest>,
    close_tx: Mutex<Option<oneshot::Sender<()>>>,
    closed: CloseNotifier,
    entrance: Broadcaster<EntranceEvent>,
    exit: Broadcaster<ExitEvent>,
    processes: ProcessSetView,
}

/// The sole surface through which callers communicate with a running dynamic
/// group. The handle is cheap to clone and may be held by many callers
/// simultaneously; the engine never exposes its internals directly.
#[derive(Clone)]
pub struct DynamicClient {
    inner: Arc<ClientInner>,
}

impl DynamicClient {
    pub(crate) fn new(
        insert_tx: mpsc::Sender<InsertRequest>,
        event_buffer_size: usize,
        processes: ProcessSetView,
    ) -> Self {
        let (close_tx, close_rx) = oneshot::channel();
        Self {
            inner: Arc::new(ClientInner {
                insert_tx,
                close_tx: Mutex::new(Some(close_tx)),
                closed: CloseNotifier::from_oneshot(close_rx),
                entrance: Broadcaster::new(event_buffer_size),
                exit: Broadcaster::new(event_buffer_size),
                processes,
            }),
        }
    }

    /// Returns a handle for admitting members into the group.
    pub fn inserter(&self) -> Inserter {
        Inserter {
            tx: self.inner.insert_tx.clone(),
            closed: self.close_notifier(),
        }
    }

    /// Signals the engine that no more members will be inserted. Idempotent
    /// and non-blocking; already running members are unaffected.
    pub fn close(&self) {
        if let Some(tx) = self.inner.close_tx.lock().unwrap().take() {
            let _ = tx.send(());
        }
    }

    /// Returns a notifier that resolves once [`DynamicClient::close`] has
    /// been called.
    pub fn close_notifier(&self) -> CloseNotifier {
        self.inner.closed.clone()
    }

    /// Attaches a listener to the entrance broadcaster, replaying up to the
    /// group's event buffer size of past entrances.
    pub fn entrance_listener(&self) -> EventListener<EntranceEvent> {
        self.inner.entrance.attach()
    }

    /// Attaches a listener to the exit broadcaster, replaying up to the
    /// group's event buffer size of past exits.
    pub fn exit_listener(&self) -> EventListener<ExitEvent> {
        self.inner.exit.attach()
    }

    /// Looks up a currently running member by name. Safe to call while the
    /// engine makes progress.
    pub fn get(&self, name: &str) -> Option<Process> {
        self.inner.processes.get(name)
    }

    pub(crate) fn broadcast_entrance(&self, event: EntranceEvent) {
        self.inner.entrance.broadcast(event);
    }

    pub(crate) fn broadcast_exit(&self, event: ExitEvent) {
        self.inner.exit.broadcast(event);
    }

    pub(crate) fn close_entrance_broadcaster(&self) {
        self.inner.entrance.close();
    }

    pub(crate) fn close_broadcasters(&self) {
        self.inner.entrance.close();
        self.inner.exit.close();
    }
}
