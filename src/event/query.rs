//! Query events
//!
//! The event shape for the MySQL-flavored relay. That relay's wire codec
//! lives outside this crate; it only needs to build these events and hand
//! them to a `Registry<QueryEvent>`.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};

use super::duration_nanos;

/// Kind of SQL-side operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationType {
    Query,
    Prepare,
    Execute,
    /// Switching the current database
    UseDb,
    FieldList,
    Other,
}

impl OperationType {
    pub fn as_str(self) -> &'static str {
        match self {
            OperationType::Query => "query",
            OperationType::Prepare => "prepare",
            OperationType::Execute => "execute",
            OperationType::UseDb => "use_db",
            OperationType::FieldList => "field_list",
            OperationType::Other => "other",
        }
    }
}

impl std::fmt::Display for OperationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One relayed SQL operation and its outcome
#[derive(Debug, Clone, PartialEq)]
pub struct QueryEvent {
    operation_type: OperationType,
    query: String,
    args: Vec<serde_json::Value>,
    database: String,
    timestamp: DateTime<Utc>,
    duration: Option<Duration>,
    error: Option<String>,
    row_count: u64,
}

impl QueryEvent {
    /// Start an event before the operation is sent
    pub fn begin(
        operation_type: OperationType,
        query: impl Into<String>,
        database: impl Into<String>,
    ) -> Self {
        Self {
            operation_type,
            query: query.into(),
            args: Vec::new(),
            database: database.into(),
            timestamp: Utc::now(),
            duration: None,
            error: None,
            row_count: 0,
        }
    }

    /// Attach prepared-statement arguments
    pub fn with_args(self, args: Vec<serde_json::Value>) -> Self {
        Self { args, ..self }
    }

    /// Finish after the backend answered
    pub fn complete(self, row_count: u64, duration: Duration) -> Self {
        Self {
            row_count,
            duration: Some(duration),
            ..self
        }
    }

    /// Finish after the backend reported an error
    pub fn fail(self, error: impl ToString, duration: Duration) -> Self {
        Self {
            error: Some(error.to_string()),
            duration: Some(duration),
            ..self
        }
    }

    pub fn operation_type(&self) -> OperationType {
        self.operation_type
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn args(&self) -> &[serde_json::Value] {
        &self.args
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn row_count(&self) -> u64 {
        self.row_count
    }

    pub fn record(&self) -> QueryRecord {
        QueryRecord {
            operation_type: self.operation_type,
            query: self.query.clone(),
            args: self.args.clone(),
            database: self.database.clone(),
            timestamp: self.timestamp,
            duration: duration_nanos(self.duration),
            error: self.error.clone().unwrap_or_default(),
            row_count: self.row_count,
        }
    }
}

impl Serialize for QueryEvent {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.record().serialize(serializer)
    }
}

/// Flat, stable-named form of a [`QueryEvent`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRecord {
    #[serde(rename = "type")]
    pub operation_type: OperationType,
    pub query: String,
    pub args: Vec<serde_json::Value>,
    pub database: String,
    pub timestamp: DateTime<Utc>,
    /// Nanoseconds
    pub duration: u64,
    pub error: String,
    pub row_count: u64,
}
