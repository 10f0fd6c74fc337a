//! Log observer
//!
//! Writes one tracing line per begin and per completion.

use crate::error::Result;
use crate::event::{CommandEvent, QueryEvent};
use super::Observer;

/// Tracing sink for relayed operations
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl LogObserver {
    pub fn new() -> Self {
        Self
    }
}

impl Observer<CommandEvent> for LogObserver {
    fn name(&self) -> &str {
        "log"
    }

    fn on_begin(&self, event: &CommandEvent) -> Result<()> {
        if event.arguments().is_empty() {
            tracing::info!(db = event.db(), "{}", event.operation());
        } else {
            tracing::info!(
                db = event.db(),
                "{} {}",
                event.operation(),
                event.arguments_display()
            );
        }
        Ok(())
    }

    fn on_complete(&self, event: &CommandEvent) -> Result<()> {
        let duration = event.duration().unwrap_or_default();
        match event.error_message() {
            Some(error) => tracing::info!("Error: {} (duration: {:?})", error, duration),
            None => tracing::info!(
                "OK (duration: {:?}, response: {})",
                duration,
                event.response_summary().unwrap_or_default()
            ),
        }
        Ok(())
    }
}

impl Observer<QueryEvent> for LogObserver {
    fn name(&self) -> &str {
        "log"
    }

    fn on_begin(&self, event: &QueryEvent) -> Result<()> {
        tracing::info!("[{}] {}", event.operation_type(), event.query());
        if !event.args().is_empty() {
            tracing::info!("Args: {:?}", event.args());
        }
        Ok(())
    }

    fn on_complete(&self, event: &QueryEvent) -> Result<()> {
        let duration = event.duration().unwrap_or_default();
        match event.error() {
            Some(error) => tracing::info!("Error: {} (duration: {:?})", error, duration),
            None => tracing::info!(
                "Success (duration: {:?}, rows: {})",
                duration,
                event.row_count()
            ),
        }
        Ok(())
    }
}
