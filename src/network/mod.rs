//! Network Module
//!
//! Client-side sockets and connection reuse.
//!
//! ## Architecture
//! - `Stream`: TCP or unix domain socket
//! - `Connection`: one socket, one request/reply exchange at a time
//! - `ConnectionPool`: idle connections keyed by address for persistent sessions

mod stream;
mod connection;
mod pool;

pub use stream::Stream;
pub use connection::{Connection, ConnectionState};
pub use pool::{ConnectionPool, DEFAULT_MAX_IDLE_PER_ADDRESS};
