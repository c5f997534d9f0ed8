use cuadrilla::{Member, ReadyNotifier};
use tokio::sync::oneshot;

/// A member that reports readiness and then waits for a termination signal,
/// exiting cleanly.
pub fn wait_for_signal_member(name: &str) -> Member {
    Member::new(name, |mut signals, ready: ReadyNotifier| async move {
        ready.notify();
        let _ = signals.recv().await;
        Ok(())
    })
}

/// A member that reports readiness and exits cleanly right away.
pub fn quick_member(name: &str) -> Member {
    Member::new(name, |_signals, ready: ReadyNotifier| async move {
        ready.notify();
        Ok(())
    })
}

/// A member that fails with the given message once the trigger fires, or
/// exits cleanly when signaled first.
pub fn fail_on_trigger_member(
    name: &str,
    msg: &'static str,
    trigger: oneshot::Receiver<()>,
) -> Member {
    Member::new(name, move |mut signals, ready: ReadyNotifier| async move {
        ready.notify();
        tokio::select! {
            _ = trigger => Err(anyhow::anyhow!(msg)),
            _ = signals.recv() => Ok(()),
        }
    })
}
