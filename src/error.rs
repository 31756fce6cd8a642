//! Error types for the Gibson client
//!
//! Provides a unified error type for all operations, plus a small `Copy`
//! projection (`ErrorKind`) that clients keep as their "last error".

use thiserror::Error;

use crate::protocol::{Opcode, ProtocolVariant, Status};

/// Result type alias using GibsonError
pub type Result<T> = std::result::Result<T, GibsonError>;

/// Unified error type for Gibson client operations
#[derive(Debug, Error)]
pub enum GibsonError {
    // -------------------------------------------------------------------------
    // Transport Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Not connected")]
    Disconnected,

    // -------------------------------------------------------------------------
    // Protocol Errors
    // -------------------------------------------------------------------------
    /// The server answered with a status other than the one the operation expects
    #[error("Server replied {code}: {}", describe_status(*code))]
    Reply { code: u16 },

    /// The reply could not be decoded (bad length, malformed key/value set, ...)
    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Opcode {opcode:?} is not supported by the {variant:?} protocol")]
    Unsupported {
        opcode: Opcode,
        variant: ProtocolVariant,
    },

    // -------------------------------------------------------------------------
    // Usage Errors
    // -------------------------------------------------------------------------
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl GibsonError {
    /// Project the error onto its failure class
    pub fn kind(&self) -> ErrorKind {
        match self {
            GibsonError::Io(_) => ErrorKind::Transport,
            GibsonError::Disconnected => ErrorKind::Disconnected,
            GibsonError::Reply { code } => ErrorKind::Reply(*code),
            GibsonError::Protocol(_) => ErrorKind::Decode,
            GibsonError::Unsupported { .. }
            | GibsonError::InvalidArgument(_)
            | GibsonError::Config(_) => ErrorKind::Usage,
        }
    }

    /// Server status code carried by a protocol-level failure, if any
    pub fn reply_code(&self) -> Option<u16> {
        match self {
            GibsonError::Reply { code } => Some(*code),
            _ => None,
        }
    }
}

/// Failure class of a `GibsonError`, cheap to copy and keep around
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Socket write failed or the peer closed mid-frame
    Transport,

    /// No open connection
    Disconnected,

    /// Server status code that differs from the expected one
    Reply(u16),

    /// Malformed reply
    Decode,

    /// Rejected locally before anything was sent
    Usage,
}

impl ErrorKind {
    /// Human readable description. Total: never fails, unknown codes map to "no error".
    pub fn description(self) -> &'static str {
        match self {
            ErrorKind::Transport => "Connection closed or I/O failure",
            ErrorKind::Disconnected => "Not connected to a Gibson server",
            ErrorKind::Reply(code) => describe_status(code),
            ErrorKind::Decode => "Malformed reply from server",
            ErrorKind::Usage => "Invalid request",
        }
    }
}

/// Describe a raw reply status code
pub fn describe_status(code: u16) -> &'static str {
    match Status::from_u16(code) {
        Some(Status::Error) => "Generic error",
        Some(Status::NotFound) => "Invalid key, item not found",
        Some(Status::NaN) => "Invalid value, not a number",
        Some(Status::OutOfMemory) => "Gibson server is out of memory",
        Some(Status::Locked) => "The item is locked",
        _ => "no error",
    }
}
