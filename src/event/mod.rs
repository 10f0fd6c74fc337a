//! Event Module
//!
//! Records describing one relayed round trip. Observers only ever see
//! `&Event`, and the types expose getters only, so nothing an observer
//! does can change what another observer (or the relay) sees.
//!
//! ## Lifecycle
//! ```text
//!   begin(command) ──► on_begin ──► complete(response) / fail(error) ──► on_complete
//! ```
//! `complete` and `fail` consume the begun event and return a new one.

mod command;
mod query;

pub use command::{CommandEvent, CommandRecord};
pub use query::{OperationType, QueryEvent, QueryRecord};

/// Nanoseconds in a duration, saturating at `u64::MAX`
pub(crate) fn duration_nanos(duration: Option<std::time::Duration>) -> u64 {
    duration
        .map(|d| u64::try_from(d.as_nanos()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}
