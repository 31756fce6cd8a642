//! Response definitions
//!
//! Represents replies from the server and the values they carry.

use std::fmt;

use bytes::Bytes;

/// Reply status codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum Status {
    Error = 0,
    NotFound = 1,
    NaN = 2,
    OutOfMemory = 3,
    Locked = 4,
    Ok = 5,
    Value = 6,
    KeyValueSet = 7,
}

impl Status {
    pub fn from_u16(code: u16) -> Option<Self> {
        match code {
            0 => Some(Status::Error),
            1 => Some(Status::NotFound),
            2 => Some(Status::NaN),
            3 => Some(Status::OutOfMemory),
            4 => Some(Status::Locked),
            5 => Some(Status::Ok),
            6 => Some(Status::Value),
            7 => Some(Status::KeyValueSet),
            _ => None,
        }
    }

    pub fn code(self) -> u16 {
        self as u16
    }
}

/// Per-value encoding tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Encoding {
    Plain = 0x00,
    /// Stored compressed server side; the bytes on the wire are what the server chose to send
    Compressed = 0x01,
    /// Payload is a fixed-width little-endian integer
    Number = 0x02,
}

impl Encoding {
    pub fn from_u8(tag: u8) -> Option<Self> {
        match tag {
            0x00 => Some(Encoding::Plain),
            0x01 => Some(Encoding::Compressed),
            0x02 => Some(Encoding::Number),
            _ => None,
        }
    }
}

/// A decoded reply frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Raw status code, kept raw so unknown codes survive
    pub status: u16,

    /// Encoding tag, only present in the encoded protocol variant
    pub encoding: Option<Encoding>,

    pub payload: Bytes,
}

impl Reply {
    pub fn status(&self) -> Option<Status> {
        Status::from_u16(self.status)
    }

    pub fn is(&self, status: Status) -> bool {
        self.status == status.code()
    }
}

/// A single value returned by the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// Plain (or server-compressed) bytes
    Bytes(Bytes),

    /// A numeric item
    Number(i64),
}

impl Value {
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            Value::Number(_) => None,
        }
    }

    pub fn as_number(&self) -> Option<i64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Bytes(_) => None,
        }
    }

    pub fn into_bytes(self) -> Option<Bytes> {
        match self {
            Value::Bytes(b) => Some(b),
            Value::Number(_) => None,
        }
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n)
    }
}

impl From<&'static [u8]> for Value {
    fn from(b: &'static [u8]) -> Self {
        Value::Bytes(Bytes::from_static(b))
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Bytes(Bytes::from(b))
    }
}

impl PartialEq<[u8]> for Value {
    fn eq(&self, other: &[u8]) -> bool {
        self.as_bytes() == Some(other)
    }
}

impl PartialEq<&[u8]> for Value {
    fn eq(&self, other: &&[u8]) -> bool {
        self.as_bytes() == Some(*other)
    }
}

impl<const N: usize> PartialEq<[u8; N]> for Value {
    fn eq(&self, other: &[u8; N]) -> bool {
        self.as_bytes() == Some(&other[..])
    }
}

impl<const N: usize> PartialEq<&[u8; N]> for Value {
    fn eq(&self, other: &&[u8; N]) -> bool {
        self.as_bytes() == Some(&other[..])
    }
}

impl PartialEq<i64> for Value {
    fn eq(&self, other: &i64) -> bool {
        self.as_number() == Some(*other)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bytes(b) => write!(f, "{}", String::from_utf8_lossy(b)),
            Value::Number(n) => write!(f, "{}", n),
        }
    }
}
