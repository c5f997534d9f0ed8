//! Static groups: a fixed member list run under one of three startup
//! disciplines. Each strategy is a thin controller that spawns a dynamic
//! engine and drives it through its client, then drains the exit listener
//! into the group's terminal [`ErrorTrace`].

use futures::future::{BoxFuture, FutureExt};
use tokio::sync::mpsc;
use tracing::debug;

use crate::dynamic::{DynamicClient, DynamicGroup};
use crate::member::{Member, Members, Runnable};
use crate::notifier::ReadyNotifier;
use crate::signal::{Signal, SignalReceiver};
use crate::trace::{collect_exit_events, ErrorTrace, GroupError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Strategy {
    Parallel,
    Ordered,
    Serial,
}

/// A group over a fixed member list.
///
/// The startup discipline depends on the constructor: parallel groups start
/// every member at once, ordered groups start each member after the previous
/// one became ready, serial groups start each member after the previous one
/// exited cleanly. Like every group, a static group satisfies [`Runnable`]
/// and may itself be a member of another group.
pub struct StaticGroup {
    strategy: Strategy,
    termination_signal: Option<Signal>,
    members: Members,
    pool: DynamicGroup,
}

impl StaticGroup {
    /// Creates a group which starts its members simultaneously. Use a
    /// parallel group for a set of concurrent but independent activities.
    ///
    /// When `termination_signal` is set, the first member exit propagates
    /// that signal to the remaining members.
    pub fn new_parallel(termination_signal: Option<Signal>, members: Vec<Member>) -> Self {
        let size = members.len();
        Self {
            strategy: Strategy::Parallel,
            termination_signal: termination_signal.clone(),
            members: Members::from(members),
            pool: DynamicGroup::new(termination_signal, size, size, false),
        }
    }

    /// Creates a group which starts its members one at a time, each member
    /// starting once the previous one became ready. Use an ordered group for
    /// dependent activities; shutdown happens in reverse insertion order.
    ///
    /// When `termination_signal` is set, the first member exit triggers the
    /// reverse-order stop of the remaining members.
    pub fn new_ordered(termination_signal: Option<Signal>, members: Vec<Member>) -> Self {
        let size = members.len();
        Self {
            strategy: Strategy::Ordered,
            termination_signal,
            members: Members::from(members),
            pool: DynamicGroup::new(None, size, size, true),
        }
    }

    /// Creates a group which starts its members one at a time, each member
    /// starting once the previous one exited cleanly. Use a serial group for
    /// a pipeline; a failing member or an external signal aborts it.
    pub fn new_serial(members: Vec<Member>) -> Self {
        let size = members.len();
        Self {
            strategy: Strategy::Serial,
            termination_signal: None,
            members: Members::from(members),
            pool: DynamicGroup::new(None, size, size, false),
        }
    }

    /// Returns a handle to the underlying engine, valid before and during the
    /// run. Useful to attach event listeners ahead of time.
    pub fn client(&self) -> DynamicClient {
        self.pool.client()
    }

    /// Runs the group until every started member has exited.
    ///
    /// Validation failures are reported synchronously, before any member
    /// starts. `ready` is notified once the strategy's startup phase is over.
    /// The collected exits form the run's result: a trace with at least one
    /// member failure is the group's error, anything else is success.
    pub async fn run(
        self,
        signals: SignalReceiver,
        ready: ReadyNotifier,
    ) -> Result<(), GroupError> {
        self.members.validate()?;
        debug!(strategy = ?self.strategy, members = self.members.len(), "starting static group");
        let result = match self.strategy {
            Strategy::Parallel => Self::run_parallel(self.pool, self.members, signals, ready).await,
            Strategy::Ordered => {
                Self::run_ordered(
                    self.pool,
                    self.members,
                    self.termination_signal,
                    signals,
                    ready,
                )
                .await
            }
            Strategy::Serial => Self::run_serial(self.pool, self.members, signals, ready).await,
        };
        result.map_err(GroupError::from)
    }

    /// Feeds every member to the engine as fast as the inserter accepts,
    /// closes the group, then waits for all entrances to flow through before
    /// reporting readiness. The engine consumes the caller's signal channel
    /// directly.
    async fn run_parallel(
        pool: DynamicGroup,
        members: Members,
        signals: SignalReceiver,
        ready: ReadyNotifier,
    ) -> Result<(), ErrorTrace> {
        let client = pool.client();
        let trace_exits = client.exit_listener();
        let mut entrances = client.entrance_listener();

        tokio::spawn(pool.run(signals, ReadyNotifier::discard()));

        let inserter = client.inserter();
        for member in members.into_vec() {
            if inserter.insert(member).await.is_err() {
                break;
            }
        }
        client.close();

        // The engine closes the entrance broadcaster once every started
        // member has entered; draining it here means all members are running.
        while entrances.recv().await.is_some() {}
        ready.notify();

        collect_exit_events(ErrorTrace::new(), trace_exits).await
    }

    /// Feeds one member at a time, awaiting its entrance before the next
    /// insert. A concurrently running watcher owns the caller's signal
    /// channel and performs the reverse-order stop.
    async fn run_ordered(
        pool: DynamicGroup,
        members: Members,
        termination_signal: Option<Signal>,
        signals: SignalReceiver,
        ready: ReadyNotifier,
    ) -> Result<(), ErrorTrace> {
        let client = pool.client();
        let trace_exits = client.exit_listener();
        let member_names = members.names();

        // The engine gets a signal channel nobody sends on; external signals
        // belong to the watcher, which stops members through the client.
        let (engine_signal_tx, engine_signals) = mpsc::unbounded_channel();
        drop(engine_signal_tx);
        tokio::spawn(pool.run(engine_signals, ReadyNotifier::discard()));

        tokio::spawn(watch_for_signal(
            signals,
            client.clone(),
            member_names,
            termination_signal,
        ));

        // Startup runs on its own task so that exits arriving mid-sequence
        // are already being collected below.
        let startup_client = client.clone();
        tokio::spawn(async move {
            ordered_start(members, &startup_client).await;
            ready.notify();
        });

        collect_exit_events(ErrorTrace::new(), trace_exits).await
    }

    /// Feeds one member at a time, awaiting its exit before the next insert.
    /// A member failure, a closed group or an external signal aborts the
    /// pipeline. The engine consumes the caller's signal channel directly.
    async fn run_serial(
        pool: DynamicGroup,
        members: Members,
        signals: SignalReceiver,
        ready: ReadyNotifier,
    ) -> Result<(), ErrorTrace> {
        let client = pool.client();
        let trace_exits = client.exit_listener();
        let mut exits = client.exit_listener();

        tokio::spawn(pool.run(signals, ReadyNotifier::discard()));

        let inserter = client.inserter();
        for member in members.into_vec() {
            if inserter.insert(member).await.is_err() {
                break;
            }
            match exits.recv().await {
                Some(exit) if exit.err.is_none() => continue,
                // A member failure or a closed broadcaster aborts the rest of
                // the pipeline.
                _ => break,
            }
        }
        client.close();
        ready.notify();

        collect_exit_events(ErrorTrace::new(), trace_exits).await
    }
}

impl Runnable for StaticGroup {
    fn run(
        self: Box<Self>,
        signals: SignalReceiver,
        ready: ReadyNotifier,
    ) -> BoxFuture<'static, Result<(), anyhow::Error>> {
        async move {
            StaticGroup::run(*self, signals, ready)
                .await
                .map_err(anyhow::Error::new)
        }
        .boxed()
    }
}

/// The ordered startup sequence: insert, await the entrance, repeat. Aborts
/// as soon as the close notifier fires, leaving the remaining members
/// unstarted.
async fn ordered_start(members: Members, client: &DynamicClient) {
    let inserter = client.inserter();
    let mut entrances = client.entrance_listener();
    for member in members.into_vec() {
        if inserter.insert(member).await.is_err() {
            return;
        }
        if entrances.recv().await.is_none() {
            return;
        }
    }
    client.close();
}

/// Watches for an external signal, or for the first member exit when a
/// termination signal is configured, and stops the group's members in
/// reverse insertion order. Each member is fully awaited before its
/// predecessor is signaled.
async fn watch_for_signal(
    mut signals: SignalReceiver,
    client: DynamicClient,
    member_names: Vec<String>,
    termination_signal: Option<Signal>,
) {
    let mut exits = client.exit_listener();
    let mut signals_open = true;
    loop {
        tokio::select! {
            maybe_signal = signals.recv(), if signals_open => match maybe_signal {
                Some(signal) => {
                    debug!(signal = %signal, "external signal; stopping ordered group");
                    ordered_stop(&client, &member_names, signal).await;
                    return;
                }
                None => signals_open = false,
            },
            maybe_exit = exits.recv() => match maybe_exit {
                // The exit broadcaster closed; the group is finished.
                None => return,
                Some(exit) => {
                    if let Some(signal) = &termination_signal {
                        debug!(member = %exit.member, "member exited; stopping ordered group");
                        ordered_stop(&client, &member_names, signal.clone()).await;
                        return;
                    }
                }
            },
        }
    }
}

/// Closes the group and stops its members in reverse insertion order,
/// awaiting each member's termination before moving on.
async fn ordered_stop(client: &DynamicClient, member_names: &[String], signal: Signal) {
    client.close();
    for name in member_names.iter().rev() {
        if let Some(process) = client.get(name) {
            process.signal(signal.clone());
            let _ = process.wait().await;
        }
    }
}
