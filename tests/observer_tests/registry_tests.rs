//! Registry Tests
//!
//! Tests for dispatch order, failure isolation and shutdown.

use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use resptap::observer::{Observer, Registry};
use resptap::protocol::read_command;
use resptap::{CommandEvent, ProxyError, Result};

type Log = Arc<Mutex<Vec<String>>>;

/// What a scripted observer does on a given hook
#[derive(Clone, Copy, PartialEq)]
enum Behaviour {
    Succeed,
    Fail,
    Panic,
}

struct Recorder {
    name: String,
    log: Log,
    on_event: Behaviour,
    on_close: Behaviour,
}

impl Recorder {
    fn new(name: &str, log: &Log) -> Self {
        Self {
            name: name.to_string(),
            log: Arc::clone(log),
            on_event: Behaviour::Succeed,
            on_close: Behaviour::Succeed,
        }
    }

    fn events(mut self, behaviour: Behaviour) -> Self {
        self.on_event = behaviour;
        self
    }

    fn closing(mut self, behaviour: Behaviour) -> Self {
        self.on_close = behaviour;
        self
    }

    fn act(&self, entry: String, behaviour: Behaviour) -> Result<()> {
        self.log.lock().push(entry);
        match behaviour {
            Behaviour::Succeed => Ok(()),
            Behaviour::Fail => Err(ProxyError::observer(&self.name, "scripted failure")),
            Behaviour::Panic => panic!("scripted panic in {}", self.name),
        }
    }
}

impl Observer<CommandEvent> for Recorder {
    fn name(&self) -> &str {
        &self.name
    }

    fn on_begin(&self, event: &CommandEvent) -> Result<()> {
        self.act(format!("{}:begin:{}", self.name, event.operation()), self.on_event)
    }

    fn on_complete(&self, event: &CommandEvent) -> Result<()> {
        self.act(format!("{}:complete:{}", self.name, event.operation()), self.on_event)
    }

    fn close(&self) -> Result<()> {
        self.act(format!("{}:close", self.name), self.on_close)
    }
}

fn event(input: &[u8]) -> CommandEvent {
    let command = read_command(&mut Cursor::new(input.to_vec())).unwrap();
    CommandEvent::begin(&command, 0)
}

fn new_log() -> Log {
    Arc::new(Mutex::new(Vec::new()))
}

// =============================================================================
// Dispatch
// =============================================================================

#[test]
fn test_dispatch_follows_registration_order() {
    let log = new_log();
    let registry = Registry::<CommandEvent>::builder()
        .register(Recorder::new("a", &log))
        .register(Recorder::new("b", &log))
        .register(Recorder::new("c", &log))
        .build();

    let begun = event(b"GET k\r\n");
    registry.notify_begin(&begun);
    registry.notify_complete(&begun.fail("gone", Duration::ZERO));

    assert_eq!(
        *log.lock(),
        vec![
            "a:begin:GET",
            "b:begin:GET",
            "c:begin:GET",
            "a:complete:GET",
            "b:complete:GET",
            "c:complete:GET",
        ]
    );
}

#[test]
fn test_failing_observer_does_not_stop_others() {
    let log = new_log();
    let registry = Registry::<CommandEvent>::builder()
        .register(Recorder::new("a", &log).events(Behaviour::Fail))
        .register(Recorder::new("b", &log))
        .build();

    registry.notify_begin(&event(b"PING\r\n"));

    assert_eq!(*log.lock(), vec!["a:begin:PING", "b:begin:PING"]);
}

#[test]
fn test_panicking_observer_does_not_stop_others() {
    let log = new_log();
    let registry = Registry::<CommandEvent>::builder()
        .register(Recorder::new("a", &log))
        .register(Recorder::new("boom", &log).events(Behaviour::Panic))
        .register(Recorder::new("c", &log))
        .build();

    let begun = event(b"PING\r\n");
    registry.notify_begin(&begun);
    registry.notify_complete(&begun);

    let log = log.lock();
    assert_eq!(log.len(), 6);
    assert_eq!(log[2], "c:begin:PING");
    assert_eq!(log[5], "c:complete:PING");
}

#[test]
fn test_empty_registry_dispatch_is_noop() {
    let registry: Registry<CommandEvent> = Registry::empty();

    assert!(registry.is_empty());
    assert_eq!(registry.len(), 0);
    registry.notify_begin(&event(b"PING\r\n"));
    registry.notify_complete(&event(b"PING\r\n"));

    let report = registry.close();
    assert_eq!(report.closed, 0);
    assert!(report.is_clean());
}

#[test]
fn test_names_in_order() {
    let log = new_log();
    let registry = Registry::<CommandEvent>::builder()
        .register(Recorder::new("first", &log))
        .register(Recorder::new("second", &log))
        .build();

    assert_eq!(registry.len(), 2);
    assert_eq!(registry.names(), vec!["first", "second"]);
}

#[test]
fn test_shared_registry_across_threads() {
    let log = new_log();
    let registry = Arc::new(
        Registry::<CommandEvent>::builder()
            .register(Recorder::new("r", &log))
            .build(),
    );

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let registry = Arc::clone(&registry);
            std::thread::spawn(move || {
                for _ in 0..25 {
                    registry.notify_begin(&event(b"INCR n\r\n"));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(log.lock().len(), 100);
}

// =============================================================================
// Shutdown
// =============================================================================

#[test]
fn test_close_runs_in_order() {
    let log = new_log();
    let registry = Registry::<CommandEvent>::builder()
        .register(Recorder::new("a", &log))
        .register(Recorder::new("b", &log))
        .build();

    let report = registry.close();

    assert!(report.is_clean());
    assert_eq!(report.closed, 2);
    assert!(registry.is_closed());
    assert_eq!(*log.lock(), vec!["a:close", "b:close"]);
}

#[test]
fn test_close_failure_is_reported_and_isolated() {
    let log = new_log();
    let registry = Registry::<CommandEvent>::builder()
        .register(Recorder::new("a", &log))
        .register(Recorder::new("broken", &log).closing(Behaviour::Fail))
        .register(Recorder::new("c", &log))
        .build();

    let report = registry.close();

    assert_eq!(*log.lock(), vec!["a:close", "broken:close", "c:close"]);
    assert_eq!(report.closed, 3);
    assert_eq!(report.failures.len(), 1);
    match &report.failures[0] {
        ProxyError::Shutdown { observer, message } => {
            assert_eq!(observer, "broken");
            assert!(message.contains("scripted failure"));
        }
        other => panic!("unexpected failure: {:?}", other),
    }
}

#[test]
fn test_close_panic_is_reported() {
    let log = new_log();
    let registry = Registry::<CommandEvent>::builder()
        .register(Recorder::new("boom", &log).closing(Behaviour::Panic))
        .register(Recorder::new("b", &log))
        .build();

    let report = registry.close();

    assert_eq!(*log.lock(), vec!["boom:close", "b:close"]);
    assert_eq!(report.failures.len(), 1);
    assert!(report.failures[0].to_string().contains("panicked during close"));
}

#[test]
fn test_close_is_idempotent() {
    let log = new_log();
    let registry = Registry::<CommandEvent>::builder()
        .register(Recorder::new("a", &log))
        .build();

    let first = registry.close();
    let second = registry.close();

    assert_eq!(first.closed, 1);
    assert_eq!(second.closed, 0);
    assert!(second.is_clean());
    assert_eq!(*log.lock(), vec!["a:close"]);
}
