//! Network Module
//!
//! TCP listener and per-connection relay sessions.
//!
//! ## Architecture
//! - Single acceptor thread
//! - One thread per session, each owning its client and backend sockets
//! - Observers shared through a read-only `Arc<Registry>`

mod server;
mod session;

pub use server::{Server, ShutdownHandle};
pub use session::{Session, SessionState};
