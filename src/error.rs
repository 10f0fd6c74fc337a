//! Error types for resptap
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

/// Result type alias using ProxyError
pub type Result<T> = std::result::Result<T, ProxyError>;

/// Unified error type for resptap operations
#[derive(Debug, Error)]
pub enum ProxyError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Relay Errors (each one terminates the session it occurs in)
    // -------------------------------------------------------------------------
    #[error("Failed to connect to backend {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Protocol error: {0}")]
    Decode(String),

    #[error("Connection closed by peer")]
    EndOfStream,

    #[error("Forward to {peer} failed: {source}")]
    Forward {
        peer: &'static str,
        #[source]
        source: std::io::Error,
    },

    // -------------------------------------------------------------------------
    // Observer Errors (never fatal to a session)
    // -------------------------------------------------------------------------
    #[error("Observer {observer} failed: {message}")]
    Observer { observer: String, message: String },

    #[error("Observer {observer} failed to close: {message}")]
    Shutdown { observer: String, message: String },

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ProxyError {
    /// Shorthand for a framing error
    pub fn decode(message: impl Into<String>) -> Self {
        ProxyError::Decode(message.into())
    }

    /// Shorthand for an observer hook failure
    pub fn observer(observer: impl Into<String>, message: impl ToString) -> Self {
        ProxyError::Observer {
            observer: observer.into(),
            message: message.to_string(),
        }
    }

    /// True if the peer went away (EOF, reset, aborted, broken pipe)
    ///
    /// Used by the session loop to tell an ordinary disconnect apart from a
    /// failure worth a warning.
    pub fn is_disconnect(&self) -> bool {
        use std::io::ErrorKind;

        let io_err = match self {
            ProxyError::EndOfStream => return true,
            ProxyError::Io(e) => e,
            ProxyError::Forward { source, .. } => source,
            _ => return false,
        };

        matches!(
            io_err.kind(),
            ErrorKind::UnexpectedEof
                | ErrorKind::ConnectionReset
                | ErrorKind::ConnectionAborted
                | ErrorKind::BrokenPipe
        )
    }
}
