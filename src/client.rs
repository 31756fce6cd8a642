//! Command Client
//!
//! Maps every Gibson operation onto its descriptor, sends it over the
//! connection and turns the reply into a typed result.
//!
//! ## Connection States
//! ```text
//!   Unconnected ──connect/pconnect──▶ Connected ──quit──▶ Unconnected
//!                                        │
//!                                   I/O failure
//!                                        ▼
//!                                     Errored (commands fail fast)
//! ```
//!
//! Every failure is returned as `Err`; the client also remembers the kind
//! of its own most recent failure for `last_error`.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;

use crate::config::Config;
use crate::error::{ErrorKind, GibsonError, Result};
use crate::network::{Connection, ConnectionPool};
use crate::protocol::{
    decode_key_value_set, decode_number, decode_value, Command, KeyValueSet, MetaField, Opcode,
    ProtocolVariant, Reply, ReplyShape, Value,
};

/// A reply decoded according to its operation's descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Ack,
    Value(Value),
    Number(i64),
    KeyValueSet(KeyValueSet),
}

impl Response {
    /// Decode a successful reply into the given shape
    pub fn decode(shape: ReplyShape, reply: Reply, variant: ProtocolVariant) -> Result<Self> {
        match shape {
            ReplyShape::Ack => Ok(Response::Ack),
            ReplyShape::Value => decode_value(reply.encoding, reply.payload).map(Response::Value),
            ReplyShape::Number => {
                decode_number(reply.encoding, &reply.payload).map(Response::Number)
            }
            ReplyShape::Counter => match reply.encoding {
                None => decode_number(None, &reply.payload).map(|n| Response::Value(Value::Number(n))),
                Some(_) => decode_value(reply.encoding, reply.payload).map(Response::Value),
            },
            ReplyShape::KeyValueSet => {
                decode_key_value_set(reply.payload, variant).map(Response::KeyValueSet)
            }
        }
    }

    fn into_ack(self) -> Result<()> {
        match self {
            Response::Ack => Ok(()),
            other => Err(shape_mismatch("ack", &other)),
        }
    }

    fn into_value(self) -> Result<Value> {
        match self {
            Response::Value(v) => Ok(v),
            other => Err(shape_mismatch("value", &other)),
        }
    }

    fn into_number(self) -> Result<i64> {
        match self {
            Response::Number(n) => Ok(n),
            other => Err(shape_mismatch("number", &other)),
        }
    }

    fn into_count(self) -> Result<u64> {
        let n = self.into_number()?;
        u64::try_from(n).map_err(|_| GibsonError::Protocol(format!("negative count {}", n)))
    }

    fn into_key_value_set(self) -> Result<KeyValueSet> {
        match self {
            Response::KeyValueSet(set) => Ok(set),
            other => Err(shape_mismatch("key/value set", &other)),
        }
    }
}

fn shape_mismatch(expected: &str, got: &Response) -> GibsonError {
    GibsonError::Protocol(format!("expected {} reply, decoded {:?}", expected, got))
}

/// Synchronous Gibson client
///
/// One command is in flight at a time. A client opened with `pconnect`
/// hands its connection back to the pool when it is dropped or disconnected.
pub struct Client {
    config: Config,

    /// Socket, if connected
    conn: Option<Connection>,

    /// Pool the connection came from (persistent mode)
    pool: Option<Arc<ConnectionPool>>,

    /// Kind of the most recent failure
    last_error: Option<ErrorKind>,
}

impl Client {
    /// Create an unconnected client
    pub fn new(config: Config) -> Self {
        Self {
            config,
            conn: None,
            pool: None,
            last_error: None,
        }
    }

    /// Create a client with a dedicated connection
    pub fn open(config: Config) -> Result<Self> {
        let mut client = Self::new(config);
        client.connect()?;
        Ok(client)
    }

    /// Create a client on a connection from the process-wide pool
    pub fn open_persistent(config: Config) -> Result<Self> {
        let mut client = Self::new(config);
        client.pconnect()?;
        Ok(client)
    }

    // =========================================================================
    // Connection lifecycle
    // =========================================================================

    /// Open a dedicated socket, replacing any current connection
    pub fn connect(&mut self) -> Result<()> {
        self.disconnect();
        let result = Connection::open(&self.config);
        let conn = self.record("connect", result)?;
        self.conn = Some(conn);
        Ok(())
    }

    /// Reuse (or open) a pooled connection from the process-wide pool
    pub fn pconnect(&mut self) -> Result<()> {
        self.pconnect_with(ConnectionPool::global())
    }

    /// Reuse (or open) a pooled connection from `pool`
    pub fn pconnect_with(&mut self, pool: Arc<ConnectionPool>) -> Result<()> {
        self.disconnect();
        let result = pool.acquire(&self.config);
        let conn = self.record("connect", result)?;
        self.conn = Some(conn);
        self.pool = Some(pool);
        Ok(())
    }

    /// Give up the connection without ending the server session
    ///
    /// Pooled connections go back to their pool; dedicated ones are closed.
    pub fn disconnect(&mut self) {
        if let Some(mut conn) = self.conn.take() {
            match self.pool.take() {
                Some(pool) => pool.release(conn),
                None => conn.close(),
            }
        }
    }

    pub fn is_connected(&self) -> bool {
        self.conn.as_ref().is_some_and(Connection::is_connected)
    }

    pub fn is_persistent(&self) -> bool {
        self.pool.is_some()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Description of the most recent failure, "no error" if there was none
    pub fn last_error(&self) -> &'static str {
        self.last_error.map_or("no error", ErrorKind::description)
    }

    pub fn last_error_kind(&self) -> Option<ErrorKind> {
        self.last_error
    }

    // =========================================================================
    // Single key operations
    // =========================================================================

    /// Store a value; a non-zero `ttl` (seconds) is applied afterwards
    pub fn set(&mut self, key: impl AsRef<[u8]>, value: impl AsRef<[u8]>, ttl: u32) -> Result<Value> {
        let key = key.as_ref();
        let stored = self
            .execute_parts(Opcode::Set, key, Some(value.as_ref()))?
            .into_value()?;

        if ttl > 0 {
            self.ttl(key, ttl)?;
        }
        Ok(stored)
    }

    /// Set the time to live of a key (seconds)
    pub fn ttl(&mut self, key: impl AsRef<[u8]>, ttl: u32) -> Result<()> {
        let ttl = ttl.to_string();
        self.execute_parts(Opcode::Ttl, key.as_ref(), Some(ttl.as_bytes()))?
            .into_ack()
    }

    pub fn get(&mut self, key: impl AsRef<[u8]>) -> Result<Value> {
        self.execute_parts(Opcode::Get, key.as_ref(), None)?
            .into_value()
    }

    pub fn del(&mut self, key: impl AsRef<[u8]>) -> Result<()> {
        self.execute_parts(Opcode::Del, key.as_ref(), None)?
            .into_ack()
    }

    /// Increment a numeric item, returning the new value
    pub fn inc(&mut self, key: impl AsRef<[u8]>) -> Result<Value> {
        self.execute_parts(Opcode::Inc, key.as_ref(), None)?
            .into_value()
    }

    /// Decrement a numeric item, returning the new value
    pub fn dec(&mut self, key: impl AsRef<[u8]>) -> Result<Value> {
        self.execute_parts(Opcode::Dec, key.as_ref(), None)?
            .into_value()
    }

    /// Make a key read-only for `seconds`
    pub fn lock(&mut self, key: impl AsRef<[u8]>, seconds: u32) -> Result<()> {
        let seconds = seconds.to_string();
        self.execute_parts(Opcode::Lock, key.as_ref(), Some(seconds.as_bytes()))?
            .into_ack()
    }

    pub fn unlock(&mut self, key: impl AsRef<[u8]>) -> Result<()> {
        self.execute_parts(Opcode::Unlock, key.as_ref(), None)?
            .into_ack()
    }

    /// Read one metadata field of an item
    pub fn meta(&mut self, key: impl AsRef<[u8]>, field: MetaField) -> Result<i64> {
        self.execute_parts(Opcode::Meta, key.as_ref(), Some(field.as_str().as_bytes()))?
            .into_number()
    }

    // =========================================================================
    // Prefix operations
    // =========================================================================

    /// Set every key matching `prefix`; returns the number of items affected
    pub fn mset(&mut self, prefix: impl AsRef<[u8]>, value: impl AsRef<[u8]>) -> Result<u64> {
        self.execute_parts(Opcode::MSet, prefix.as_ref(), Some(value.as_ref()))?
            .into_count()
    }

    pub fn mttl(&mut self, prefix: impl AsRef<[u8]>, ttl: u32) -> Result<u64> {
        let ttl = ttl.to_string();
        self.execute_parts(Opcode::MTtl, prefix.as_ref(), Some(ttl.as_bytes()))?
            .into_count()
    }

    /// Every key/value pair matching `prefix`, in server order
    pub fn mget(&mut self, prefix: impl AsRef<[u8]>) -> Result<KeyValueSet> {
        self.execute_parts(Opcode::MGet, prefix.as_ref(), None)?
            .into_key_value_set()
    }

    pub fn mdel(&mut self, prefix: impl AsRef<[u8]>) -> Result<u64> {
        self.execute_parts(Opcode::MDel, prefix.as_ref(), None)?
            .into_count()
    }

    pub fn minc(&mut self, prefix: impl AsRef<[u8]>) -> Result<u64> {
        self.execute_parts(Opcode::MInc, prefix.as_ref(), None)?
            .into_count()
    }

    pub fn mdec(&mut self, prefix: impl AsRef<[u8]>) -> Result<u64> {
        self.execute_parts(Opcode::MDec, prefix.as_ref(), None)?
            .into_count()
    }

    pub fn mlock(&mut self, prefix: impl AsRef<[u8]>, seconds: u32) -> Result<u64> {
        let seconds = seconds.to_string();
        self.execute_parts(Opcode::MLock, prefix.as_ref(), Some(seconds.as_bytes()))?
            .into_count()
    }

    pub fn munlock(&mut self, prefix: impl AsRef<[u8]>) -> Result<u64> {
        self.execute_parts(Opcode::MUnlock, prefix.as_ref(), None)?
            .into_count()
    }

    /// Number of keys matching `prefix`
    pub fn count(&mut self, prefix: impl AsRef<[u8]>) -> Result<u64> {
        self.execute_parts(Opcode::Count, prefix.as_ref(), None)?
            .into_count()
    }

    /// Names of the keys matching `prefix`, in server order
    pub fn keys(&mut self, prefix: impl AsRef<[u8]>) -> Result<Vec<Bytes>> {
        let set = self
            .execute_parts(Opcode::Keys, prefix.as_ref(), None)?
            .into_key_value_set()?;

        let result: Result<Vec<Bytes>> = set
            .into_iter()
            .map(|(_, name)| {
                name.into_bytes().ok_or_else(|| {
                    GibsonError::Protocol("KEYS reply contains a numeric key name".to_string())
                })
            })
            .collect();
        self.record(Opcode::Keys, result)
    }

    // =========================================================================
    // Administrative operations
    // =========================================================================

    /// Server statistics (server_version, total_items, memory_used, ...)
    pub fn stats(&mut self) -> Result<KeyValueSet> {
        self.execute_parts(Opcode::Stats, &[], None)?
            .into_key_value_set()
    }

    pub fn ping(&mut self) -> Result<()> {
        self.execute_parts(Opcode::Ping, &[], None)?
            .into_ack()
    }

    /// End the server session and close the socket
    ///
    /// The connection is never returned to a pool, whatever the reply.
    pub fn quit(&mut self) -> Result<()> {
        let result = self
            .execute_parts(Opcode::End, &[], None)
            .and_then(Response::into_ack);

        if let Some(mut conn) = self.conn.take() {
            conn.close();
        }
        self.pool = None;

        result
    }

    // =========================================================================
    // Dispatch
    // =========================================================================

    /// Send any command and decode the reply according to its descriptor
    pub fn execute(&mut self, command: Command) -> Result<Response> {
        let opcode = command.opcode();
        let variant = self.config.protocol;

        let result = self
            .call(&command)
            .and_then(|reply| Response::decode(opcode.spec().reply, reply, variant));
        self.record(opcode, result)
    }

    fn execute_parts(&mut self, opcode: Opcode, target: &[u8], param: Option<&[u8]>) -> Result<Response> {
        match Command::new(opcode, target, param) {
            Ok(command) => self.execute(command),
            Err(e) => self.record(opcode, Err(e)),
        }
    }

    /// One request/reply exchange, checking the status against the descriptor
    fn call(&mut self, command: &Command) -> Result<Reply> {
        let opcode = command.opcode();
        let variant = self.config.protocol;

        if !opcode.supported_by(variant) {
            return Err(GibsonError::Unsupported { opcode, variant });
        }

        let conn = match self.conn.as_mut() {
            Some(conn) if conn.is_connected() => conn,
            _ => return Err(GibsonError::Disconnected),
        };

        let reply = conn.exchange(command)?;

        let expected = opcode.spec().expected_status();
        if !reply.is(expected) {
            return Err(GibsonError::Reply { code: reply.status });
        }
        Ok(reply)
    }

    /// Remember the kind of a failure before handing the result back
    fn record<T>(&mut self, context: impl fmt::Debug, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            tracing::debug!("{:?} failed: {}", context, e);
            self.last_error = Some(e.kind());
        }
        result
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.disconnect();
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("address", &self.config.address)
            .field("connected", &self.is_connected())
            .field("persistent", &self.is_persistent())
            .field("last_error", &self.last_error)
            .finish()
    }
}
