//! Command events
//!
//! One RESP command/response round trip.

use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};

use crate::protocol::{Command, Response};
use super::duration_nanos;

/// One relayed command and its outcome
#[derive(Debug, Clone, PartialEq)]
pub struct CommandEvent {
    operation: String,
    arguments: Vec<Bytes>,
    raw_request: Bytes,
    db: u32,
    timestamp_start: DateTime<Utc>,
    duration: Option<Duration>,
    response_summary: Option<String>,
    error_message: Option<String>,
}

impl CommandEvent {
    /// Start an event for a command just read from a client
    ///
    /// Shares the command's buffers; nothing is copied.
    pub fn begin(command: &Command, db: u32) -> Self {
        Self {
            operation: command.name.clone(),
            arguments: command.args.clone(),
            raw_request: command.raw.clone(),
            db,
            timestamp_start: Utc::now(),
            duration: None,
            response_summary: None,
            error_message: None,
        }
    }

    /// Finish with a decoded response
    ///
    /// Error replies set `error_message` to their summary.
    pub fn complete(self, response: &Response, duration: Duration) -> Self {
        Self {
            duration: Some(duration),
            response_summary: Some(response.summary.clone()),
            error_message: response.error_message().map(str::to_string),
            ..self
        }
    }

    /// Finish after the round trip broke off
    pub fn fail(self, error: impl ToString, duration: Duration) -> Self {
        Self {
            duration: Some(duration),
            error_message: Some(error.to_string()),
            ..self
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Command name, uppercased
    pub fn operation(&self) -> &str {
        &self.operation
    }

    pub fn arguments(&self) -> &[Bytes] {
        &self.arguments
    }

    /// Exact bytes forwarded to the backend
    pub fn raw_request(&self) -> &Bytes {
        &self.raw_request
    }

    /// Database selected on the session when the command was read
    pub fn db(&self) -> u32 {
        self.db
    }

    pub fn timestamp_start(&self) -> DateTime<Utc> {
        self.timestamp_start
    }

    /// `None` until the event is completed or failed
    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }

    pub fn response_summary(&self) -> Option<&str> {
        self.response_summary.as_deref()
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn is_complete(&self) -> bool {
        self.duration.is_some()
    }

    pub fn is_error(&self) -> bool {
        self.error_message.is_some()
    }

    /// Arguments joined by spaces (lossy UTF-8), for log lines
    pub fn arguments_display(&self) -> String {
        self.arguments
            .iter()
            .map(|arg| String::from_utf8_lossy(arg))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Flatten into the record shape published to external sinks
    pub fn record(&self) -> CommandRecord {
        CommandRecord {
            command: self.operation.clone(),
            args: self
                .arguments
                .iter()
                .map(|arg| String::from_utf8_lossy(arg).into_owned())
                .collect(),
            raw: String::from_utf8_lossy(&self.raw_request).into_owned(),
            timestamp: self.timestamp_start,
            duration: duration_nanos(self.duration),
            error: self.error_message.clone().unwrap_or_default(),
            response: self.response_summary.clone().unwrap_or_default(),
            db: self.db,
        }
    }
}

impl Serialize for CommandEvent {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.record().serialize(serializer)
    }
}

/// Flat, stable-named form of a [`CommandEvent`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandRecord {
    pub command: String,
    pub args: Vec<String>,
    pub raw: String,
    pub timestamp: DateTime<Utc>,
    /// Nanoseconds
    pub duration: u64,
    /// Empty when the command succeeded
    pub error: String,
    pub response: String,
    pub db: u32,
}
