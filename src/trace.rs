use std::fmt;

use thiserror::Error;

use crate::events::{EventListener, ExitEvent};
use crate::member::ValidationError;

/// Ordered record of member exits, surfaced as a group's terminal result.
///
/// A trace containing at least one erring exit is returned as the group's
/// failure; a trace whose exits are all clean, or an empty trace, means the
/// group terminated successfully.
#[derive(Debug, Default)]
pub struct ErrorTrace {
    events: Vec<ExitEvent>,
}

impl ErrorTrace {
    /// Creates an empty trace.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, event: ExitEvent) {
        self.events.push(event);
    }

    /// The recorded exits, in the order they were observed.
    pub fn events(&self) -> &[ExitEvent] {
        &self.events
    }

    /// Number of recorded exits.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether no exits were recorded.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Whether any recorded exit carries an error.
    pub fn has_errors(&self) -> bool {
        self.events.iter().any(|event| event.err.is_some())
    }

    /// Consumes the trace, yielding the recorded exits.
    pub fn into_events(self) -> Vec<ExitEvent> {
        self.events
    }
}

impl fmt::Display for ErrorTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "group terminated with member failures:")?;
        for event in &self.events {
            if let Some(err) = &event.err {
                write!(f, " {}: {};", event.member, err)?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for ErrorTrace {}

/// Error returned by a group's run.
#[derive(Debug, Error)]
pub enum GroupError {
    /// The member list failed validation; nothing was started.
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    /// One or more members terminated with a failure.
    #[error(transparent)]
    Failed(#[from] ErrorTrace),
}

/// Drains the exit listener until its broadcaster closes, appending every
/// event to the trace. Shared by the static controllers as the final stage
/// of their run.
pub(crate) async fn collect_exit_events(
    mut trace: ErrorTrace,
    mut exits: EventListener<ExitEvent>,
) -> Result<(), ErrorTrace> {
    while let Some(exit) = exits.recv().await {
        trace.push(exit);
    }
    if trace.has_errors() {
        Err(trace)
    } else {
        Ok(())
    }
}
