//! Persistent connection registry
//!
//! Idle connections are kept per target address. A connection is handed to
//! exactly one caller at a time: `acquire` removes it from the registry and
//! `release` puts it back.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;

use crate::config::{Address, Config};
use crate::error::Result;
use super::Connection;

/// Default number of idle connections kept per address
pub const DEFAULT_MAX_IDLE_PER_ADDRESS: usize = 1;

static GLOBAL_POOL: OnceLock<Arc<ConnectionPool>> = OnceLock::new();

/// Registry of reusable connections keyed by address
#[derive(Debug)]
pub struct ConnectionPool {
    idle: Mutex<HashMap<Address, Vec<Connection>>>,
    max_idle_per_address: usize,
}

impl ConnectionPool {
    pub fn new() -> Self {
        Self::with_max_idle(DEFAULT_MAX_IDLE_PER_ADDRESS)
    }

    /// Pool keeping at most `max_idle` idle connections per address
    pub fn with_max_idle(max_idle: usize) -> Self {
        Self {
            idle: Mutex::new(HashMap::new()),
            max_idle_per_address: max_idle,
        }
    }

    /// The process-wide pool
    pub fn global() -> Arc<ConnectionPool> {
        Arc::clone(GLOBAL_POOL.get_or_init(|| Arc::new(ConnectionPool::new())))
    }

    /// Take a healthy idle connection for the address, or open a new one
    ///
    /// Stale idle connections found on the way are dropped.
    pub fn acquire(&self, config: &Config) -> Result<Connection> {
        loop {
            // Lock is held only to pop; probing happens outside it
            let candidate = self
                .idle
                .lock()
                .get_mut(&config.address)
                .and_then(Vec::pop);

            match candidate {
                Some(mut conn) => {
                    if !conn.probe() {
                        tracing::debug!("Discarding stale pooled connection to {}", config.address);
                        continue;
                    }
                    if let Err(e) = conn.configure(config) {
                        tracing::debug!(
                            "Discarding pooled connection to {}: {}",
                            config.address,
                            e
                        );
                        continue;
                    }
                    tracing::debug!(
                        "Reusing pooled connection {} to {}",
                        conn.local_addr(),
                        config.address
                    );
                    return Ok(conn);
                }
                None => break,
            }
        }

        Connection::open(config)
    }

    /// Return a connection to the pool
    ///
    /// Closed or errored connections, and connections beyond the idle
    /// limit, are dropped instead.
    pub fn release(&self, conn: Connection) {
        if !conn.is_connected() {
            tracing::debug!("Dropping {:?} connection to {}", conn.state(), conn.address());
            return;
        }

        if self.max_idle_per_address == 0 {
            return;
        }

        let mut idle = self.idle.lock();
        let slot = idle.entry(conn.address().clone()).or_default();
        if slot.len() < self.max_idle_per_address {
            tracing::trace!("Pooling connection {} to {}", conn.local_addr(), conn.address());
            slot.push(conn);
        }
    }

    /// Number of addresses with an entry in the registry
    pub fn address_count(&self) -> usize {
        self.idle.lock().len()
    }

    /// Number of idle connections held for an address
    pub fn idle_count(&self, address: &Address) -> usize {
        self.idle.lock().get(address).map_or(0, Vec::len)
    }

    /// Drop every idle connection
    pub fn clear(&self) {
        self.idle.lock().clear();
    }
}

impl Default for ConnectionPool {
    fn default() -> Self {
        Self::new()
    }
}
