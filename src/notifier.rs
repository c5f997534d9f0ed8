use tokio::sync::oneshot;

/// Allows a supervised routine running on a different task to report that it
/// has finished initializing.
///
/// A `ReadyNotifier` is single-use; it is consumed by [`ReadyNotifier::notify`].
/// Dropping it unfired means the routine terminated without ever becoming
/// ready, which observers treat as an exit before readiness.
pub struct ReadyNotifier(Box<dyn FnOnce() + Send>);

impl ReadyNotifier {
    /// Creates a notifier from a oneshot channel. Whoever holds the receiving
    /// half learns about readiness exactly once.
    pub fn from_oneshot(sender: oneshot::Sender<()>) -> Self {
        Self(Box::new(move || {
            sender.send(()).ok();
        }))
    }

    /// Creates a notifier whose readiness nobody observes. Used when the
    /// caller drives a nested engine and tracks readiness through events
    /// instead.
    pub(crate) fn discard() -> Self {
        Self(Box::new(|| ()))
    }

    /// Reports that initialization completed.
    pub fn notify(self) {
        (self.0)()
    }
}
