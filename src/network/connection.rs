//! Connection Handler
//!
//! Owns one socket to a Gibson server and performs strictly sequential
//! request/reply exchanges on it.

use std::io::{self, BufReader, BufWriter, Read};

use crate::config::{Address, Config};
use crate::error::{GibsonError, Result};
use crate::protocol::{read_reply, write_command, Command, ProtocolVariant, Reply};
use super::Stream;

/// Lifecycle of a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Socket open, framing intact
    Connected,

    /// Closed on purpose (END sent or `close` called)
    Closed,

    /// Transport failure or desynchronized stream; never reused
    Errored,
}

/// A single client connection
pub struct Connection {
    /// Stream reader (buffered for efficiency)
    reader: BufReader<Stream>,

    /// Stream writer (buffered for efficiency)
    writer: BufWriter<Stream>,

    /// Target this socket was opened to (pool key)
    address: Address,

    /// Reply layout to expect
    variant: ProtocolVariant,

    /// Largest reply payload accepted
    max_reply_size: u32,

    state: ConnectionState,

    /// Local endpoint for logging
    local_addr: String,
}

impl Connection {
    /// Open a dedicated connection
    ///
    /// Connects, then configures timeouts and buffered I/O
    pub fn open(config: &Config) -> Result<Self> {
        let stream = Stream::connect(config)?;
        stream.set_timeouts(config.read_timeout_ms, config.write_timeout_ms)?;

        let local_addr = stream.local_addr();

        // Clone stream for separate read/write handles
        let read_stream = stream.try_clone()?;
        let write_stream = stream;

        tracing::debug!("Connected to {} from {}", config.address, local_addr);

        Ok(Self {
            reader: BufReader::new(read_stream),
            writer: BufWriter::new(write_stream),
            address: config.address.clone(),
            variant: config.protocol,
            max_reply_size: config.max_reply_size,
            state: ConnectionState::Connected,
            local_addr,
        })
    }

    /// Re-apply per-session settings to a reused connection
    pub fn configure(&mut self, config: &Config) -> Result<()> {
        self.variant = config.protocol;
        self.max_reply_size = config.max_reply_size;
        self.writer
            .get_ref()
            .set_timeouts(config.read_timeout_ms, config.write_timeout_ms)?;
        Ok(())
    }

    /// Send a command and read its reply
    ///
    /// A transport failure or a reply that breaks framing leaves the
    /// connection `Errored`.
    pub fn exchange(&mut self, command: &Command) -> Result<Reply> {
        if self.state != ConnectionState::Connected {
            return Err(GibsonError::Disconnected);
        }

        tracing::trace!(
            "Sending {:?} ({} argument bytes) on {}",
            command.opcode(),
            command.args().len(),
            self.local_addr
        );

        let result = write_command(&mut self.writer, command)
            .and_then(|_| read_reply(&mut self.reader, self.variant, self.max_reply_size));

        match &result {
            Ok(reply) => {
                tracing::trace!(
                    "Reply status {} ({} payload bytes) on {}",
                    reply.status,
                    reply.payload.len(),
                    self.local_addr
                );
            }
            Err(e @ (GibsonError::Io(_) | GibsonError::Protocol(_))) => {
                tracing::debug!("Connection {} to {} failed: {}", self.local_addr, self.address, e);
                self.state = ConnectionState::Errored;
            }
            Err(_) => {}
        }

        result
    }

    /// Check that an idle connection is still usable
    ///
    /// Looks for a peer close or unsolicited bytes without blocking.
    pub fn probe(&mut self) -> bool {
        if self.state != ConnectionState::Connected || !self.reader.buffer().is_empty() {
            return false;
        }

        let stream = self.reader.get_mut();
        if stream.set_nonblocking(true).is_err() {
            self.state = ConnectionState::Errored;
            return false;
        }

        let mut byte = [0u8; 1];
        let healthy = match stream.read(&mut byte) {
            // 0 = peer closed, n = stray bytes
            Ok(_) => false,
            Err(e) => e.kind() == io::ErrorKind::WouldBlock,
        };
        let restored = stream.set_nonblocking(false).is_ok();

        if !(healthy && restored) {
            tracing::debug!("Connection {} to {} is stale", self.local_addr, self.address);
            self.state = ConnectionState::Errored;
            return false;
        }
        true
    }

    /// Mark the connection closed and shut the socket down
    pub fn close(&mut self) {
        if self.state == ConnectionState::Connected {
            self.state = ConnectionState::Closed;
        }
        let _ = self.writer.get_ref().shutdown();
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn variant(&self) -> ProtocolVariant {
        self.variant
    }

    /// Get the local endpoint string
    pub fn local_addr(&self) -> &str {
        &self.local_addr
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("address", &self.address)
            .field("local_addr", &self.local_addr)
            .field("variant", &self.variant)
            .field("state", &self.state)
            .finish()
    }
}
