//! Publisher observer
//!
//! Ships each completed event, as a JSON record, to an external store
//! speaking the same protocol the relay decodes: either `PUBLISH` to a
//! channel or `LPUSH` onto a list capped with `LTRIM`.

use std::io::BufReader;
use std::net::{Shutdown, TcpStream};

use parking_lot::Mutex;
use serde::Serialize;

use crate::config::{PublishMode, PublisherConfig};
use crate::error::{ProxyError, Result};
use crate::protocol::{encode_command, read_response, write_frame, Response};
use super::Observer;

/// One connection to the store
struct StoreConnection {
    stream: BufReader<TcpStream>,
}

impl StoreConnection {
    /// Connect and run the AUTH / SELECT / PING handshake
    fn open(config: &PublisherConfig) -> Result<Self> {
        let stream = TcpStream::connect(&config.addr).map_err(|source| ProxyError::Connect {
            addr: config.addr.clone(),
            source,
        })?;
        stream.set_nodelay(true)?;

        let mut conn = Self {
            stream: BufReader::new(stream),
        };

        if let Some(password) = &config.password {
            conn.call_checked(&[b"AUTH".as_slice(), password.as_bytes()])?;
        }
        if config.db != 0 {
            conn.call_checked(&[b"SELECT".as_slice(), config.db.to_string().as_bytes()])?;
        }
        conn.call_checked(&[b"PING".as_slice()])?;

        Ok(conn)
    }

    fn call(&mut self, parts: &[&[u8]]) -> Result<Response> {
        write_frame(self.stream.get_mut(), &encode_command(parts))?;
        read_response(&mut self.stream)
    }

    /// Like `call`, but an error reply becomes `Err`
    fn call_checked(&mut self, parts: &[&[u8]]) -> Result<Response> {
        let reply = self.call(parts)?;
        match reply.error_message() {
            Some(message) => Err(ProxyError::observer(
                "publisher",
                format!("{} rejected: {}", String::from_utf8_lossy(parts[0]), message),
            )),
            None => Ok(reply),
        }
    }
}

struct State {
    conn: Option<StoreConnection>,
    closed: bool,
}

/// External-store sink for completed events
///
/// Safe to share between sessions: deliveries are serialized on an
/// internal mutex. A transport failure drops the connection and the next
/// delivery reconnects; an error reply keeps it.
pub struct Publisher {
    config: PublisherConfig,
    state: Mutex<State>,
}

impl Publisher {
    /// Connect to the store; fails if the handshake does
    pub fn connect(config: PublisherConfig) -> Result<Self> {
        let conn = StoreConnection::open(&config)?;
        tracing::info!("Publisher connected to {}", config.addr);

        Ok(Self {
            config,
            state: Mutex::new(State {
                conn: Some(conn),
                closed: false,
            }),
        })
    }

    pub fn config(&self) -> &PublisherConfig {
        &self.config
    }

    /// Deliver one serialized record
    pub fn publish(&self, record: &[u8]) -> Result<()> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(ProxyError::observer("publisher", "publisher is closed"));
        }

        let mut conn = match state.conn.take() {
            Some(conn) => conn,
            None => StoreConnection::open(&self.config)?,
        };

        let outcome = self.deliver(&mut conn, record);
        match &outcome {
            Err(ProxyError::Observer { .. }) | Ok(()) => state.conn = Some(conn),
            // Transport or framing failure: the stream may be out of sync
            Err(e) => tracing::debug!("Publisher dropping connection: {}", e),
        }
        outcome
    }

    fn deliver(&self, conn: &mut StoreConnection, record: &[u8]) -> Result<()> {
        match self.config.mode {
            PublishMode::Channel => {
                conn.call_checked(&[b"PUBLISH".as_slice(), self.config.channel.as_bytes(), record])?;
            }
            PublishMode::List => {
                let key = self.config.list_key.as_bytes();
                conn.call_checked(&[b"LPUSH".as_slice(), key, record])?;

                if self.config.max_list_len > 0 {
                    let stop = (self.config.max_list_len - 1).to_string();
                    let reply =
                        conn.call(&[b"LTRIM".as_slice(), key, b"0".as_slice(), stop.as_bytes()])?;
                    if reply.is_error() {
                        tracing::warn!("LTRIM on {} rejected: {}", self.config.list_key, reply.summary);
                    }
                }
            }
        }
        Ok(())
    }
}

impl<E: Serialize> Observer<E> for Publisher {
    fn name(&self) -> &str {
        "publisher"
    }

    fn on_begin(&self, _event: &E) -> Result<()> {
        Ok(())
    }

    fn on_complete(&self, event: &E) -> Result<()> {
        let record = serde_json::to_vec(event)?;
        self.publish(&record)
    }

    fn close(&self) -> Result<()> {
        let mut state = self.state.lock();
        state.closed = true;

        if let Some(mut conn) = state.conn.take() {
            if let Err(e) = conn.call(&[b"QUIT".as_slice()]) {
                tracing::debug!("Publisher QUIT failed: {}", e);
            }
            match conn.stream.get_ref().shutdown(Shutdown::Both) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotConnected => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}
