//! TCP Server
//!
//! Accepts connections and runs one session thread per client.

use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::config::Config;
use crate::error::Result;
use crate::observer::{Registry, ShutdownReport};
use super::Session;

/// Pause after an accept error that will not clear by itself (e.g. EMFILE)
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// TCP front end of the relay
///
/// ## Shutdown
/// `ShutdownHandle::shutdown` sets a flag and pokes the listener so the
/// blocked `accept` returns. The accept loop then stops and the registry is
/// closed. Sessions already running are not interrupted; they end on their
/// own I/O errors.
pub struct Server {
    config: Config,
    registry: Arc<Registry>,
    listener: TcpListener,
    local_addr: SocketAddr,
    shutdown: Arc<AtomicBool>,

    /// Sessions spawned so far, for thread names
    sessions: AtomicU64,
}

impl Server {
    /// Bind the listen address from `config`
    pub fn bind(config: Config, registry: Arc<Registry>) -> Result<Self> {
        config.validate()?;

        let listener = TcpListener::bind(&config.listen_addr)?;
        let local_addr = listener.local_addr()?;

        Ok(Self {
            config,
            registry,
            listener,
            local_addr,
            shutdown: Arc::new(AtomicBool::new(false)),
            sessions: AtomicU64::new(0),
        })
    }

    /// The bound address (resolves port 0)
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Handle another thread can use to stop the accept loop
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            flag: Arc::clone(&self.shutdown),
            wake_addr: wake_addr(self.local_addr),
        }
    }

    /// Accept connections until shut down (blocking)
    ///
    /// Returns the registry's shutdown report once the loop stops.
    pub fn run(&self) -> Result<ShutdownReport> {
        tracing::info!(
            "Relay listening on {}, forwarding to {}",
            self.local_addr,
            self.config.backend_addr
        );

        for stream in self.listener.incoming() {
            if self.shutdown.load(Ordering::Acquire) {
                break;
            }

            match stream {
                Ok(stream) => self.spawn_session(stream),
                Err(e) => {
                    tracing::warn!("Accept error: {}", e);
                    if let Some(pause) = accept_backoff(&e) {
                        thread::sleep(pause);
                    }
                }
            }
        }

        tracing::info!("Stopped accepting connections on {}", self.local_addr);

        let report = self.registry.close();
        if !report.is_clean() {
            tracing::warn!(
                "{} of {} observers failed to close",
                report.failures.len(),
                report.closed
            );
        }
        Ok(report)
    }

    fn spawn_session(&self, client: TcpStream) {
        let id = self.sessions.fetch_add(1, Ordering::Relaxed);
        let config = self.config.clone();
        let registry = Arc::clone(&self.registry);

        let spawned = thread::Builder::new()
            .name(format!("session-{}", id))
            .spawn(move || {
                let mut session = match Session::connect(client, &config, registry) {
                    Ok(session) => session,
                    Err(e) => {
                        tracing::warn!("Session {} not started: {}", id, e);
                        return;
                    }
                };
                // Errors are already logged by the session itself
                let _ = session.run();
            });

        if let Err(e) = spawned {
            tracing::warn!("Failed to spawn session thread: {}", e);
        }
    }
}

/// Stops a running [`Server`] from another thread
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    flag: Arc<AtomicBool>,
    wake_addr: SocketAddr,
}

impl ShutdownHandle {
    /// Signal the server to stop accepting
    pub fn shutdown(&self) {
        if self.flag.swap(true, Ordering::AcqRel) {
            return;
        }
        // Unblock the pending accept(); the loop sees the flag and exits
        if let Err(e) = TcpStream::connect(self.wake_addr) {
            tracing::debug!("Shutdown wake-up connect failed: {}", e);
        }
    }

    pub fn is_shutdown(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

/// How long to wait before accepting again after `err`
///
/// A peer that gave up mid-handshake is retried at once; anything else
/// (out of descriptors, out of memory) gets a pause.
fn accept_backoff(err: &io::Error) -> Option<Duration> {
    match err.kind() {
        io::ErrorKind::ConnectionAborted
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::Interrupted => None,
        _ => Some(ACCEPT_BACKOFF),
    }
}

/// Loopback equivalent of a wildcard bind address
fn wake_addr(addr: SocketAddr) -> SocketAddr {
    let ip = match addr.ip() {
        IpAddr::V4(ip) if ip.is_unspecified() => IpAddr::V4(Ipv4Addr::LOCALHOST),
        IpAddr::V6(ip) if ip.is_unspecified() => IpAddr::V6(Ipv6Addr::LOCALHOST),
        ip => ip,
    };
    SocketAddr::new(ip, addr.port())
}
