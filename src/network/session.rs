//! Session
//!
//! Relays one client connection to its own backend connection, one
//! command at a time.

use std::fmt;
use std::io::{BufReader, Read, Write};
use std::net::TcpStream;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::{Config, DEFAULT_MAX_DEPTH};
use crate::error::{ProxyError, Result};
use crate::event::CommandEvent;
use crate::observer::Registry;
use crate::protocol::{read_command, read_response_with_depth, write_frame, Command};

/// Where a session is in its round trip
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    ReadingCommand,
    DispatchBegin,
    ForwardingToBackend,
    ReadingResponse,
    DispatchComplete,
    ForwardingToClient,
    Closed,
}

/// One client ↔ backend relay
///
/// Owns both streams. Reads go through a buffer; writes go straight to the
/// underlying stream, so every forwarded frame is flushed before the next
/// read starts.
///
/// ## Round trip
/// ```text
/// Idle → ReadingCommand → DispatchBegin → ForwardingToBackend
///      → ReadingResponse → DispatchComplete → ForwardingToClient → Idle
/// ```
/// Any I/O or decode failure ends in `Closed`. Commands are never
/// pipelined: the next command is not read until the previous response
/// has been written back.
pub struct Session<C, B> {
    client: BufReader<C>,
    backend: BufReader<B>,
    registry: Arc<Registry>,

    /// Peer address for logging
    peer_addr: String,

    /// Database picked by the last successful SELECT
    db: u32,

    max_depth: usize,
    state: SessionState,

    /// Completed round trips
    operations: u64,
}

impl Session<TcpStream, TcpStream> {
    /// Dial the backend for a freshly accepted client
    ///
    /// No event exists yet, so a failed dial is reported to the caller only.
    pub fn connect(client: TcpStream, config: &Config, registry: Arc<Registry>) -> Result<Self> {
        let peer_addr = client
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        let backend =
            TcpStream::connect(&config.backend_addr).map_err(|source| ProxyError::Connect {
                addr: config.backend_addr.clone(),
                source,
            })?;

        for stream in [&client, &backend] {
            stream.set_nodelay(config.nodelay)?;
            stream.set_read_timeout(timeout(config.read_timeout_ms))?;
            stream.set_write_timeout(timeout(config.write_timeout_ms))?;
        }

        Ok(Session::new(client, backend, registry)
            .with_peer_addr(peer_addr)
            .with_max_depth(config.max_depth))
    }
}

/// `0` means no timeout
fn timeout(ms: u64) -> Option<Duration> {
    (ms > 0).then(|| Duration::from_millis(ms))
}

impl<C: Read + Write, B: Read + Write> Session<C, B> {
    /// Wrap an already-connected pair of streams
    pub fn new(client: C, backend: B, registry: Arc<Registry>) -> Self {
        Self {
            client: BufReader::new(client),
            backend: BufReader::new(backend),
            registry,
            peer_addr: "unknown".to_string(),
            db: 0,
            max_depth: DEFAULT_MAX_DEPTH,
            state: SessionState::Idle,
            operations: 0,
        }
    }

    pub fn with_peer_addr(mut self, peer_addr: impl Into<String>) -> Self {
        self.peer_addr = peer_addr.into();
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn db(&self) -> u32 {
        self.db
    }

    pub fn operations(&self) -> u64 {
        self.operations
    }

    pub fn peer_addr(&self) -> &str {
        &self.peer_addr
    }

    /// Relay until either side goes away (blocking)
    ///
    /// The client hanging up is a normal end and returns `Ok`. Anything
    /// else (backend failure, bad framing) returns the error that closed
    /// the session.
    pub fn run(&mut self) -> Result<()> {
        tracing::debug!("Session started for {}", self.peer_addr);

        let result = loop {
            match self.relay_once() {
                Ok(true) => continue,
                Ok(false) => break Ok(()),
                Err(e) => break Err(e),
            }
        };

        self.transition(SessionState::Closed);
        match &result {
            Ok(()) => tracing::debug!(
                "Session for {} closed after {} operations",
                self.peer_addr,
                self.operations
            ),
            Err(e) => tracing::warn!("Session for {} failed: {}", self.peer_addr, e),
        }
        result
    }

    /// Relay a single command/response round trip
    ///
    /// Returns `Ok(false)` when the client has disconnected.
    pub fn relay_once(&mut self) -> Result<bool> {
        self.transition(SessionState::ReadingCommand);
        let command = match read_command(&mut self.client) {
            Ok(command) => command,
            Err(e) if e.is_disconnect() => {
                tracing::debug!("Client {} disconnected", self.peer_addr);
                self.transition(SessionState::Closed);
                return Ok(false);
            }
            Err(e) => {
                self.transition(SessionState::Closed);
                return Err(e);
            }
        };

        tracing::trace!(
            "Received {} from {} ({} bytes)",
            command.name,
            self.peer_addr,
            command.raw.len()
        );

        if command.is_empty() {
            return self.pass_empty(&command);
        }

        self.transition(SessionState::DispatchBegin);
        let event = CommandEvent::begin(&command, self.db);
        self.registry.notify_begin(&event);
        let started = Instant::now();

        self.transition(SessionState::ForwardingToBackend);
        if let Err(source) = write_frame(self.backend.get_mut(), &command.raw) {
            let err = ProxyError::Forward {
                peer: "backend",
                source,
            };
            return Err(self.abandon(event, started, err));
        }

        self.transition(SessionState::ReadingResponse);
        let response = match read_response_with_depth(&mut self.backend, self.max_depth) {
            Ok(response) => response,
            Err(err) => return Err(self.abandon(event, started, err)),
        };
        let elapsed = started.elapsed();

        self.transition(SessionState::DispatchComplete);
        let event = event.complete(&response, elapsed);
        self.registry.notify_complete(&event);
        self.track_db(&command, response.is_ok());

        self.transition(SessionState::ForwardingToClient);
        if let Err(source) = write_frame(self.client.get_mut(), &response.raw) {
            let err = ProxyError::Forward {
                peer: "client",
                source,
            };
            self.transition(SessionState::Closed);
            if err.is_disconnect() {
                tracing::debug!(
                    "Client {} disconnected before response could be sent: {}",
                    self.peer_addr,
                    err
                );
                return Ok(false);
            }
            return Err(err);
        }

        self.operations += 1;
        self.transition(SessionState::Idle);
        Ok(true)
    }

    /// Forward a command with no parts; the backend never answers it, so
    /// no reply is awaited and no event is raised
    fn pass_empty(&mut self, command: &Command) -> Result<bool> {
        self.transition(SessionState::ForwardingToBackend);
        if let Err(source) = write_frame(self.backend.get_mut(), &command.raw) {
            self.transition(SessionState::Closed);
            return Err(ProxyError::Forward {
                peer: "backend",
                source,
            });
        }

        self.transition(SessionState::Idle);
        Ok(true)
    }

    /// Complete a begun event with `err` and close the session
    fn abandon(&mut self, event: CommandEvent, started: Instant, err: ProxyError) -> ProxyError {
        self.transition(SessionState::DispatchComplete);
        let event = event.fail(&err, started.elapsed());
        self.registry.notify_complete(&event);

        self.transition(SessionState::Closed);
        err
    }

    fn track_db(&mut self, command: &Command, ok: bool) {
        if let (Some(db), true) = (command.selected_db(), ok) {
            tracing::trace!("Client {} selected db {}", self.peer_addr, db);
            self.db = db;
        }
    }

    fn transition(&mut self, next: SessionState) {
        tracing::trace!(peer = %self.peer_addr, from = ?self.state, to = ?next);
        self.state = next;
    }
}

impl<C, B> fmt::Debug for Session<C, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("peer_addr", &self.peer_addr)
            .field("db", &self.db)
            .field("state", &self.state)
            .field("operations", &self.operations)
            .finish()
    }
}
