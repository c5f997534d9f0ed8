mod common;

use common::*;

use cuadrilla::{
    signal_channel, DynamicGroup, GroupError, Member, ReadyNotifier, Signal, StaticGroup,
};
use pretty_assertions::assert_eq;
use tokio::sync::oneshot;

fn ready_pair() -> (ReadyNotifier, oneshot::Receiver<()>) {
    let (tx, rx) = oneshot::channel();
    (ReadyNotifier::from_oneshot(tx), rx)
}

#[tokio::test]
async fn test_parallel_group_collects_failure_trace() {
    let (trigger_tx, trigger_rx) = oneshot::channel();
    let group = StaticGroup::new_parallel(
        Some(Signal::new("stop")),
        vec![
            wait_for_signal_member("api"),
            fail_on_trigger_member("worker", "queue unavailable", trigger_rx),
            wait_for_signal_member("gc"),
        ],
    );

    let (signals_tx, signals) = signal_channel();
    let (ready, ready_rx) = ready_pair();
    let handle = tokio::spawn(group.run(signals, ready));

    ready_rx.await.expect("group should report readiness");
    trigger_tx.send(()).unwrap();
    drop(signals_tx);

    let trace = match handle.await.unwrap() {
        Err(GroupError::Failed(trace)) => trace,
        other => panic!("expected a failure trace, got {:?}", other),
    };

    // The configured signal cascades; every member's exit is recorded and
    // the failing one comes first.
    assert_eq!(3, trace.len());
    assert_eq!("worker", trace.events()[0].member);
    assert!(trace.events()[0].err.is_some());
    assert!(trace.events()[1].err.is_none());
    assert!(trace.events()[2].err.is_none());
}

#[tokio::test]
async fn test_groups_nest_as_members() {
    // A serial pipeline nested inside a parallel group, next to a plain
    // member. Groups satisfy the same contract as any runnable, so nothing
    // here is special-cased.
    let pipeline = StaticGroup::new_serial(vec![
        quick_member("migrate"),
        quick_member("seed"),
        quick_member("warm-cache"),
    ]);

    let group = StaticGroup::new_parallel(
        None,
        vec![
            Member::from_runnable("pipeline", pipeline),
            quick_member("healthcheck"),
        ],
    );

    let (_signals_tx, signals) = signal_channel();
    let (ready, ready_rx) = ready_pair();
    let handle = tokio::spawn(group.run(signals, ready));

    ready_rx.await.expect("group should report readiness");
    assert!(handle.await.unwrap().is_ok());
}

#[tokio::test]
async fn test_nested_group_failure_surfaces_in_outer_trace() {
    let pipeline = StaticGroup::new_serial(vec![
        quick_member("first"),
        Member::new("second", |_signals, ready: ReadyNotifier| async move {
            ready.notify();
            Err(anyhow::anyhow!("pipeline step failed"))
        }),
    ]);

    let group = StaticGroup::new_parallel(None, vec![Member::from_runnable("pipeline", pipeline)]);

    let (_signals_tx, signals) = signal_channel();
    let (ready, _ready_rx) = ready_pair();
    let handle = tokio::spawn(group.run(signals, ready));

    let trace = match handle.await.unwrap() {
        Err(GroupError::Failed(trace)) => trace,
        other => panic!("expected a failure trace, got {:?}", other),
    };
    assert_eq!(1, trace.len());
    assert_eq!("pipeline", trace.events()[0].member);
    let err = trace.events()[0].err.as_ref().expect("nested failure");
    assert!(format!("{}", err).contains("second: pipeline step failed"));
}

#[tokio::test]
async fn test_dynamic_group_nested_in_parallel_group() {
    // A dynamic group can be a member too; it terminates once its client is
    // closed and its members are done.
    let dynamic = DynamicGroup::new(None, 2, 2, false);
    let client = dynamic.client();

    let group = StaticGroup::new_parallel(None, vec![Member::from_runnable("pool", dynamic)]);

    let (_signals_tx, signals) = signal_channel();
    let (ready, ready_rx) = ready_pair();
    let handle = tokio::spawn(group.run(signals, ready));

    ready_rx.await.expect("group should report readiness");

    client
        .inserter()
        .insert(quick_member("job"))
        .await
        .expect("dynamic member accepts inserts");
    client.close();

    assert!(handle.await.unwrap().is_ok());
}

#[tokio::test]
async fn test_static_group_client_observes_lifecycle() {
    let group = StaticGroup::new_ordered(
        None,
        vec![
            wait_for_signal_member("db"),
            wait_for_signal_member("api"),
        ],
    );
    let client = group.client();
    let mut entrances = client.entrance_listener();
    let mut exits = client.exit_listener();

    let (signals_tx, signals) = signal_channel();
    let (ready, ready_rx) = ready_pair();
    let handle = tokio::spawn(group.run(signals, ready));

    ready_rx.await.expect("group should report readiness");

    // Ordered startup: entrances arrive in member order.
    let mut entered = Vec::new();
    entered.push(entrances.recv().await.unwrap().member);
    entered.push(entrances.recv().await.unwrap().member);
    assert_eq!(vec!["db".to_owned(), "api".to_owned()], entered);

    signals_tx.send(Signal::new("stop")).unwrap();
    assert!(handle.await.unwrap().is_ok());

    // Reverse shutdown order: the member started last exits first.
    let mut exited = Vec::new();
    while let Some(exit) = exits.recv().await {
        exited.push(exit.member);
    }
    assert_eq!(vec!["api".to_owned(), "db".to_owned()], exited);
}
