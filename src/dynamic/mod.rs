//! The dynamic group engine and its client interface.
//!
//! A dynamic group begins empty and runs members as they are inserted
//! through its [`DynamicClient`]. The group keeps running, even with no
//! members inside it, until it is closed or signaled; once closing, it
//! refuses new members and waits for the running ones to finish before its
//! event broadcasters shut down.

mod client;
mod process_set;

pub use client::{CloseNotifier, DynamicClient, InsertError, Inserter};

use client::InsertRequest;

use tokio::sync::mpsc;
use tracing::debug;

use crate::events::{EntranceEvent, ExitEvent};
use crate::member::Runnable;
use crate::notifier::ReadyNotifier;
use crate::process::Process;
use crate::signal::{Signal, SignalReceiver};
use crate::trace::GroupError;

use futures::future::{BoxFuture, FutureExt};
use process_set::ProcessSet;

/// A supervised group that admits members at runtime, subject to a capacity
/// bound, and fans their entrance and exit events out to any number of
/// listeners.
pub struct DynamicGroup {
    signal: Option<Signal>,
    pool_size: usize,
    processes: ProcessSet,
    insert_rx: mpsc::Receiver<InsertRequest>,
    client: DynamicClient,
}

impl DynamicGroup {
    /// Creates a dynamic group.
    ///
    /// `max_capacity` bounds the number of concurrently running members;
    /// inserts beyond it block until capacity frees up. `event_buffer_size`
    /// sets how many entrance and exit events are retained for replay to
    /// late-attaching listeners. When `signal` is set, the first member exit
    /// propagates that signal to all remaining members. An `ordered` group
    /// stops members in reverse insertion order when signaled.
    pub fn new(
        signal: Option<Signal>,
        max_capacity: usize,
        event_buffer_size: usize,
        ordered: bool,
    ) -> Self {
        let processes = ProcessSet::new(ordered);
        let (insert_tx, insert_rx) = mpsc::channel(1);
        let client = DynamicClient::new(insert_tx, event_buffer_size, processes.view());
        Self {
            signal,
            pool_size: max_capacity,
            processes,
            insert_rx,
            client,
        }
    }

    /// Returns a handle to the group. Clients stay valid for the lifetime of
    /// the group's run.
    pub fn client(&self) -> DynamicClient {
        self.client.clone()
    }

    /// Runs the supervisor event loop until the group has been closed or
    /// signaled and every admitted member has exited.
    ///
    /// The group is ready to accept inserts from construction onward, so
    /// `ready` is notified immediately. Consuming `self` makes a second run
    /// impossible.
    pub async fn run(
        self,
        mut signals: SignalReceiver,
        ready: ReadyNotifier,
    ) -> Result<(), GroupError> {
        let Self {
            signal,
            pool_size,
            processes,
            mut insert_rx,
            client,
        } = self;

        let (entrance_tx, mut entrance_rx) = mpsc::channel::<EntranceEvent>(1);
        let (exit_tx, mut exit_rx) = mpsc::channel::<ExitEvent>(1);
        let close_notifier = client.close_notifier();

        // Members started whose entrance has not been observed yet.
        let mut invoking: usize = 0;
        // Capacity available; pauses at the pool bound, resumes on exits.
        let mut accepting = true;
        // Close observed; admissions are refused from here on.
        let mut closing = false;
        // The insert channel still has live senders.
        let mut insert_open = true;
        let mut signals_open = true;

        ready.notify();

        loop {
            // Branch order matters twice over: the close notifier is checked
            // before admissions so a close wins any race with a pending
            // insert, and entrances are drained before exits so a member's
            // entrance is always broadcast before its exit.
            tokio::select! {
                biased;

                maybe_signal = signals.recv(), if signals_open => match maybe_signal {
                    Some(shutdown) => {
                        debug!(signal = %shutdown, "external signal received");
                        processes.signal(shutdown).await;
                        client.close();
                    }
                    None => signals_open = false,
                },

                _ = close_notifier.done(), if !closing => {
                    closing = true;
                    accepting = false;
                    if processes.len() == 0 {
                        client.close_broadcasters();
                        return Ok(());
                    }
                    if invoking == 0 {
                        client.close_entrance_broadcaster();
                    }
                },

                Some(entrance) = entrance_rx.recv() => {
                    invoking -= 1;
                    debug!(member = %entrance.member, "member entered");
                    client.broadcast_entrance(entrance);
                    if closing && invoking == 0 {
                        client.close_entrance_broadcaster();
                    }
                },

                Some(exit) = exit_rx.recv() => {
                    debug!(member = %exit.member, failed = exit.err.is_some(), "member exited");
                    processes.remove(&exit.member);
                    client.broadcast_exit(exit);

                    if !processes.signaled() {
                        if let Some(signal) = &signal {
                            processes.signal(signal.clone()).await;
                            client.close();
                            accepting = false;
                        }
                    }

                    if processes.complete() || (processes.len() == 0 && closing) {
                        client.close_broadcasters();
                        return Ok(());
                    }

                    if !closing && !processes.signaled() {
                        accepting = true;
                    }
                },

                // While closing, the branch stays armed so queued requests
                // are drained and refused instead of lingering unanswered.
                maybe_request = insert_rx.recv(), if insert_open && (accepting || closing) => match maybe_request {
                    Some(request) if closing => {
                        debug!(member = %request.member.name(), "insert refused; group is closing");
                        let _ = request.ack.send(Err(InsertError));
                    }
                    Some(request) => {
                        let InsertRequest { member, ack } = request;
                        let (name, runnable) = member.into_parts();
                        let process = Process::spawn(&name, runnable);
                        processes.add(&name, process.clone());
                        debug!(member = %name, running = processes.len(), "member admitted");

                        if processes.len() == pool_size {
                            accepting = false;
                        }
                        invoking += 1;

                        tokio::spawn(observe_member(
                            name,
                            process,
                            entrance_tx.clone(),
                            exit_tx.clone(),
                        ));
                        let _ = ack.send(Ok(()));
                    }
                    // Every insert handle was dropped; nothing further can
                    // arrive, so treat it as a close.
                    None => {
                        insert_open = false;
                        client.close();
                        accepting = false;
                    }
                },
            }
        }
    }
}

impl Runnable for DynamicGroup {
    fn run(
        self: Box<Self>,
        signals: SignalReceiver,
        ready: ReadyNotifier,
    ) -> BoxFuture<'static, Result<(), anyhow::Error>> {
        async move {
            DynamicGroup::run(*self, signals, ready)
                .await
                .map_err(anyhow::Error::new)
        }
        .boxed()
    }
}

/// Follows one member's lifecycle and reports it to the engine. Emits the
/// entrance as soon as the process is observed running, then the exit when
/// its wait completes. A member that terminates before becoming ready still
/// gets an entrance, immediately followed by its exit.
async fn observe_member(
    member: String,
    process: Process,
    entrance: mpsc::Sender<EntranceEvent>,
    exit: mpsc::Sender<ExitEvent>,
) {
    let err = tokio::select! {
        _ = process.ready() => {
            let event = EntranceEvent {
                member: member.clone(),
                process: process.clone(),
            };
            let _ = entrance.send(event).await;
            process.wait().await.err()
        }
        result = process.wait() => {
            let event = EntranceEvent {
                member: member.clone(),
                process: process.clone(),
            };
            let _ = entrance.send(event).await;
            result.err()
        }
    };
    let _ = exit.send(ExitEvent { member, err }).await;
}
