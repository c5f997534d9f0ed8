#![deny(missing_docs)]

//! The cuadrilla crate composes long-running activities ("members") into
//! supervised process groups built on top of the tokio runtime. A group is
//! itself a runnable activity: it can be started, signaled and awaited as a
//! single unit, and may therefore be a member of another group.
//!
//! The crate provides:
//!
//! * A [`Runnable`] contract for supervised activities, implemented by
//!   anonymous routines via [`Member::new`] and by every group type.
//! * A [`DynamicGroup`]: a long-lived engine that admits members at runtime
//!   subject to a capacity bound, supervises their ready/exit lifecycle and
//!   fans entrance and exit events out to any number of late-joining
//!   listeners with bounded replay.
//! * Three static disciplines over a fixed member list, built on the dynamic
//!   engine: [`StaticGroup::new_parallel`], [`StaticGroup::new_ordered`] and
//!   [`StaticGroup::new_serial`].
//! * An [`ErrorTrace`] aggregating every member exit as the group's terminal
//!   result.

mod buffer;
mod dynamic;
mod events;
mod member;
mod notifier;
mod process;
mod signal;
mod strategies;
mod trace;

pub use dynamic::{CloseNotifier, DynamicClient, DynamicGroup, InsertError, Inserter};
pub use events::{EntranceEvent, EventListener, ExitEvent};
pub use member::{Member, Members, Runnable, ValidationError};
pub use notifier::ReadyNotifier;
pub use process::Process;
pub use signal::{signal_channel, Signal, SignalReceiver, SignalSender};
pub use strategies::StaticGroup;
pub use trace::{ErrorTrace, GroupError};
