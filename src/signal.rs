use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;

/// An opaque termination token handed to members on cooperative shutdown.
///
/// The library never interprets the token; callers decide which tokens exist
/// and what their members do upon receiving one. Cloning is cheap, the token
/// contents are shared.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Signal(Arc<str>);

impl Signal {
    /// Creates a termination token from the given label.
    pub fn new(token: impl Into<String>) -> Self {
        Signal(Arc::from(token.into()))
    }

    /// Returns the token's label.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signal({})", self.0)
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Sending half of a termination-signal channel.
pub type SignalSender = mpsc::UnboundedSender<Signal>;

/// Receiving half of a termination-signal channel. Every runnable consumes
/// one of these while it runs; groups forward the channel they were given to
/// their engine.
pub type SignalReceiver = mpsc::UnboundedReceiver<Signal>;

/// Creates a termination-signal channel pair for a top-level `run` call.
pub fn signal_channel() -> (SignalSender, SignalReceiver) {
    mpsc::unbounded_channel()
}
