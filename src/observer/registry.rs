//! Observer Registry
//!
//! Ordered, build-once list of observers.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{ProxyError, Result};
use crate::event::CommandEvent;
use super::Observer;

/// Ordered observers, frozen at construction
///
/// Registration order is dispatch order, for begin, complete and close.
/// There is no way to add an observer after `build()`, so sessions can
/// share one registry behind an `Arc` without locking.
pub struct Registry<E = CommandEvent> {
    observers: Vec<Box<dyn Observer<E>>>,

    /// Set by the first `close()`
    closed: AtomicBool,
}

impl<E> Registry<E> {
    /// Create a new registry builder
    pub fn builder() -> RegistryBuilder<E> {
        RegistryBuilder {
            observers: Vec::new(),
        }
    }

    /// A registry with no observers
    pub fn empty() -> Self {
        Self::builder().build()
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    /// Observer names in dispatch order
    pub fn names(&self) -> Vec<&str> {
        self.observers.iter().map(|o| o.name()).collect()
    }

    /// Call `on_begin` on every observer
    pub fn notify_begin(&self, event: &E) {
        self.dispatch("begin", |observer| observer.on_begin(event));
    }

    /// Call `on_complete` on every observer
    pub fn notify_complete(&self, event: &E) {
        self.dispatch("complete", |observer| observer.on_complete(event));
    }

    fn dispatch<F>(&self, phase: &'static str, call: F)
    where
        F: Fn(&dyn Observer<E>) -> Result<()>,
    {
        for observer in &self.observers {
            let observer = observer.as_ref();
            match panic::catch_unwind(AssertUnwindSafe(|| call(observer))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::warn!(observer = observer.name(), phase, "Observer failed: {}", e);
                }
                Err(_) => {
                    tracing::error!(observer = observer.name(), phase, "Observer panicked");
                }
            }
        }
    }

    /// Close every observer, in registration order
    ///
    /// Failures are logged and collected in the report; they never stop
    /// the remaining observers from closing. Only the first call does
    /// anything.
    pub fn close(&self) -> ShutdownReport {
        let mut report = ShutdownReport::default();
        if self.closed.swap(true, Ordering::AcqRel) {
            return report;
        }

        for observer in &self.observers {
            let name = observer.name().to_string();
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| observer.close()));
            report.closed += 1;

            let message = match outcome {
                Ok(Ok(())) => {
                    tracing::debug!("Closed observer {}", name);
                    continue;
                }
                Ok(Err(e)) => e.to_string(),
                Err(_) => "panicked during close".to_string(),
            };

            tracing::warn!("Error closing observer {}: {}", name, message);
            report.failures.push(ProxyError::Shutdown {
                observer: name,
                message,
            });
        }

        report
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

/// Builder for Registry
pub struct RegistryBuilder<E> {
    observers: Vec<Box<dyn Observer<E>>>,
}

impl<E> RegistryBuilder<E> {
    /// Append an observer; it is dispatched after every earlier one
    pub fn register(self, observer: impl Observer<E> + 'static) -> Self {
        self.register_boxed(Box::new(observer))
    }

    pub fn register_boxed(mut self, observer: Box<dyn Observer<E>>) -> Self {
        tracing::info!("Registered observer: {}", observer.name());
        self.observers.push(observer);
        self
    }

    pub fn build(self) -> Registry<E> {
        Registry {
            observers: self.observers,
            closed: AtomicBool::new(false),
        }
    }
}

/// Outcome of `Registry::close`
///
/// Shutdown always succeeds; this only says how cleanly.
#[derive(Debug, Default)]
pub struct ShutdownReport {
    /// Observers whose `close()` ran
    pub closed: usize,

    /// One `ProxyError::Shutdown` per observer that failed to close
    pub failures: Vec<ProxyError>,
}

impl ShutdownReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}
