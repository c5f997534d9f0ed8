use std::collections::HashSet;
use std::fmt;

use futures::future::{BoxFuture, Future, FutureExt};
use thiserror::Error;

use crate::notifier::ReadyNotifier;
use crate::signal::SignalReceiver;

/// The supervised-activity contract.
///
/// A runnable is started on a fresh background task. It must watch the given
/// signal channel for cooperative shutdown requests, fire the
/// [`ReadyNotifier`] at most once when initialization completes, and resolve
/// with its terminal outcome. Every group type implements `Runnable` as well,
/// so groups nest inside other groups without special cases.
pub trait Runnable: Send + 'static {
    /// Runs the activity until termination.
    fn run(
        self: Box<Self>,
        signals: SignalReceiver,
        ready: ReadyNotifier,
    ) -> BoxFuture<'static, Result<(), anyhow::Error>>;
}

struct Routine<F>(F);

impl<F, O> Runnable for Routine<F>
where
    F: FnOnce(SignalReceiver, ReadyNotifier) -> O + Send + 'static,
    O: Future<Output = Result<(), anyhow::Error>> + Send + 'static,
{
    fn run(
        self: Box<Self>,
        signals: SignalReceiver,
        ready: ReadyNotifier,
    ) -> BoxFuture<'static, Result<(), anyhow::Error>> {
        (self.0)(signals, ready).boxed()
    }
}

////////////////////////////////////////////////////////////////////////////////

/// A named runnable registered with a group. Names are unique per group; a
/// name, once used, stays used for the group's lifetime.
pub struct Member {
    name: String,
    runnable: Box<dyn Runnable>,
}

impl Member {
    /// Creates a member from an anonymous routine.
    ///
    /// The routine receives the signal channel it must watch for cooperative
    /// shutdown and a [`ReadyNotifier`] it should fire once initialization is
    /// done. A routine that never notifies readiness is considered to have
    /// exited before becoming ready.
    pub fn new<S, F, O>(name: S, routine: F) -> Self
    where
        S: Into<String>,
        F: FnOnce(SignalReceiver, ReadyNotifier) -> O + Send + 'static,
        O: Future<Output = Result<(), anyhow::Error>> + Send + 'static,
    {
        Self {
            name: name.into(),
            runnable: Box::new(Routine(routine)),
        }
    }

    /// Creates a member from an existing [`Runnable`], typically a nested
    /// group.
    pub fn from_runnable(name: impl Into<String>, runnable: impl Runnable) -> Self {
        Self {
            name: name.into(),
            runnable: Box::new(runnable),
        }
    }

    /// The member's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn into_parts(self) -> (String, Box<dyn Runnable>) {
        (self.name, self.runnable)
    }
}

impl fmt::Debug for Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Member").field("name", &self.name).finish()
    }
}

/// Error reported when a member list fails validation. Returned synchronously
/// from a group's run before any member starts.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// A member was registered with an empty name.
    #[error("member name must not be empty")]
    EmptyName,
    /// Two members share the same name.
    #[error("duplicate member name: {name}")]
    DuplicateName {
        /// The offending name.
        name: String,
    },
}

/// An ordered list of members, validated as a whole before a static group
/// starts any of them.
#[derive(Debug, Default)]
pub struct Members(Vec<Member>);

impl Members {
    /// Checks that every member name is non-empty and unique.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut seen = HashSet::new();
        for member in &self.0 {
            if member.name.is_empty() {
                return Err(ValidationError::EmptyName);
            }
            if !seen.insert(member.name.as_str()) {
                return Err(ValidationError::DuplicateName {
                    name: member.name.clone(),
                });
            }
        }
        Ok(())
    }

    /// Number of members in the list.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the list is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The member names in insertion order.
    pub fn names(&self) -> Vec<String> {
        self.0.iter().map(|m| m.name.clone()).collect()
    }

    pub(crate) fn into_vec(self) -> Vec<Member> {
        self.0
    }
}

impl From<Vec<Member>> for Members {
    fn from(members: Vec<Member>) -> Self {
        Members(members)
    }
}
