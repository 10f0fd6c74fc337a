//! # resptap
//!
//! A transparent relay for the RESP protocol family that:
//! - Forwards every command and reply byte-for-byte
//! - Decodes both sides just far enough to describe them (RESP2 and RESP3)
//! - Notifies an ordered chain of observers before and after each round trip
//! - Runs one blocking session thread per client connection
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      TCP Server                              │
//! │                  (Multiple Clients)                          │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │ one thread per client
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                      Session                                 │
//! │   read command → begin → forward → read reply → complete     │
//! └──────────┬──────────────────────────────────┬───────────────┘
//!            │                                  │
//!            ▼                                  ▼
//!   ┌─────────────────┐                ┌─────────────────┐
//!   │    Protocol     │                │    Registry     │
//!   │ (RESP decoder)  │                │  (Observers)    │
//!   └─────────────────┘                └────────┬────────┘
//!                                               │
//!                          ┌────────────┬───────┴──────┬────────────┐
//!                          ▼            ▼              ▼            ▼
//!                        Log         Filter        Publisher     Channel
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod protocol;
pub mod event;
pub mod observer;
pub mod network;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{ProxyError, Result};
pub use config::{Config, PublishMode, PublisherConfig};
pub use event::{CommandEvent, QueryEvent};
pub use observer::{Observer, Registry};
pub use network::{Server, Session};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of resptap
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
