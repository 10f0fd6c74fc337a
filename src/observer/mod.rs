//! Observer Module
//!
//! Pluggable side-effect handlers notified before and after every relayed
//! operation.
//!
//! ## Dispatch
//! ```text
//!   Session ──► Registry::notify_begin ──► obs[0].on_begin, obs[1].on_begin, ...
//!           ──► (forward, read response)
//!           ──► Registry::notify_complete ──► obs[0].on_complete, ...
//! ```
//! Dispatch runs on the session's own thread, in registration order. A
//! failing observer is logged and skipped; it never stops the others and
//! never touches the bytes being relayed.
//!
//! Observers are shared by every live session, so implementations holding
//! external resources must serialize access themselves.

mod registry;
mod log;
mod filter;
mod publisher;
mod channel;

pub use registry::{Registry, RegistryBuilder, ShutdownReport};
pub use log::LogObserver;
pub use filter::{operations, FilterObserver};
pub use publisher::Publisher;
pub use channel::{ChannelObserver, Notification};

use crate::config::Config;
use crate::error::Result;
use crate::event::CommandEvent;

/// Capability set every observer provides
///
/// Generic over the event type so the same contract serves the RESP relay
/// (`CommandEvent`) and the SQL relay (`QueryEvent`).
pub trait Observer<E>: Send + Sync {
    /// Name used in logs and shutdown reports
    fn name(&self) -> &str;

    /// Called before the operation is forwarded
    fn on_begin(&self, event: &E) -> Result<()>;

    /// Called once the response is decoded, or the round trip broke off
    fn on_complete(&self, event: &E) -> Result<()>;

    /// Release resources; called exactly once at shutdown
    fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// Compose the startup registry described by `config`
///
/// A publisher that cannot reach its store is logged and left out; the
/// relay itself still starts.
pub fn build_registry(config: &Config) -> Registry<CommandEvent> {
    let mut builder = Registry::<CommandEvent>::builder();

    if config.log_commands {
        builder = builder.register(LogObserver::new());
    }

    if let Some(publisher_config) = &config.publisher {
        match Publisher::connect(publisher_config.clone()) {
            Ok(publisher) => builder = builder.register(publisher),
            Err(e) => {
                tracing::warn!(
                    "Publisher unavailable at {}, not registered: {}",
                    publisher_config.addr,
                    e
                );
            }
        }
    }

    builder.build()
}
