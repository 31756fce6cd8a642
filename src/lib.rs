//! # Gibson
//!
//! Client library for the Gibson cache server binary protocol:
//! - Length-prefixed request frames, status/encoding/length reply frames
//! - Plain, compressed and numeric value encodings
//! - Prefix (multi-key) operations decoded into ordered key/value sets
//! - Dedicated or pooled (persistent) connections over TCP or unix sockets
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Client                                │
//! │      (op descriptor → Command, status check, decoding)       │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                      Connection                              │
//! │          (one socket, one exchange at a time)                │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │    Codec    │          │    Pool     │
//!   │  (framing)  │          │ (by address)│
//!   └─────────────┘          └─────────────┘
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use gibson::{Client, Config};
//!
//! let mut client = Client::open(Config::builder().tcp("127.0.0.1:10128").build())?;
//! client.set("app:counter", "1", 0)?;
//! assert_eq!(client.inc("app:counter")?, 2i64);
//! # Ok::<(), gibson::GibsonError>(())
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod protocol;
pub mod network;
pub mod client;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{ErrorKind, GibsonError, Result};
pub use config::{Address, Config};
pub use client::{Client, Response};
pub use network::ConnectionPool;
pub use protocol::{Encoding, KeyValueSet, MetaField, ProtocolVariant, Value};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of the client
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
