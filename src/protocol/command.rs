//! Command definitions
//!
//! Every operation is described by a static `OpSpec`: which opcode it uses,
//! how its argument is laid out, which status means success and how the
//! payload of a successful reply is turned into a result.

use crate::error::{GibsonError, Result};
use super::{ProtocolVariant, Status};

/// Request opcodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum Opcode {
    // single key
    Set = 1,
    Ttl = 2,
    Get = 3,
    Del = 4,
    Inc = 5,
    Dec = 6,
    Lock = 7,
    Unlock = 8,
    // prefix
    MSet = 9,
    MTtl = 10,
    MGet = 11,
    MDel = 12,
    MInc = 13,
    MDec = 14,
    MLock = 15,
    MUnlock = 16,
    // administrative
    Count = 17,
    Stats = 18,
    Ping = 19,
    Meta = 20,
    Keys = 21,
    End = 0xFF,
}

impl Opcode {
    /// Every opcode, in wire id order
    pub const ALL: [Opcode; 22] = [
        Opcode::Set,
        Opcode::Ttl,
        Opcode::Get,
        Opcode::Del,
        Opcode::Inc,
        Opcode::Dec,
        Opcode::Lock,
        Opcode::Unlock,
        Opcode::MSet,
        Opcode::MTtl,
        Opcode::MGet,
        Opcode::MDel,
        Opcode::MInc,
        Opcode::MDec,
        Opcode::MLock,
        Opcode::MUnlock,
        Opcode::Count,
        Opcode::Stats,
        Opcode::Ping,
        Opcode::Meta,
        Opcode::Keys,
        Opcode::End,
    ];

    /// Wire id
    pub fn id(self) -> u16 {
        self as u16
    }

    pub fn from_u16(value: u16) -> Option<Self> {
        Self::ALL.iter().copied().find(|op| op.id() == value)
    }

    /// Whether a server speaking `variant` understands this opcode
    pub fn supported_by(self, variant: ProtocolVariant) -> bool {
        match variant {
            ProtocolVariant::Encoded => true,
            ProtocolVariant::Legacy => {
                !matches!(self, Opcode::Ping | Opcode::Meta | Opcode::Keys)
            }
        }
    }

    /// The descriptor of this operation
    pub const fn spec(self) -> OpSpec {
        use ArgShape::*;
        use ReplyShape::*;

        let (args, reply) = match self {
            Opcode::Set => (KeyParam, Value),
            Opcode::Ttl => (KeyParam, Ack),
            Opcode::Get => (Key, Value),
            Opcode::Del => (Key, Ack),
            Opcode::Inc | Opcode::Dec => (Key, Counter),
            Opcode::Lock => (KeyParam, Ack),
            Opcode::Unlock => (Key, Ack),
            Opcode::MSet | Opcode::MTtl | Opcode::MLock => (PrefixParam, Number),
            Opcode::MGet => (Prefix, KeyValueSet),
            Opcode::MDel | Opcode::MInc | Opcode::MDec | Opcode::MUnlock => (Prefix, Number),
            Opcode::Count => (Prefix, Number),
            Opcode::Stats => (Empty, KeyValueSet),
            Opcode::Ping => (Empty, Ack),
            Opcode::Meta => (KeyParam, Number),
            Opcode::Keys => (Prefix, KeyValueSet),
            Opcode::End => (Empty, Ack),
        };

        OpSpec {
            opcode: self,
            args,
            reply,
        }
    }
}

/// How the argument bytes of a request are laid out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgShape {
    /// `<key>`
    Key,
    /// `<key> <param>`
    KeyParam,
    /// `<prefix>`
    Prefix,
    /// `<prefix> <param>`
    PrefixParam,
    /// nothing
    Empty,
}

/// How a successful reply is decoded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyShape {
    /// Only the status matters
    Ack,
    /// A single value, plain bytes or a number
    Value,
    /// A single integer (affected items, meta fields)
    Number,
    /// The new value of an INC/DEC; an untagged payload is a binary integer
    Counter,
    /// An ordered set of key/value pairs
    KeyValueSet,
}

impl ReplyShape {
    /// Status a successful reply of this shape carries
    pub const fn expected_status(self) -> Status {
        match self {
            ReplyShape::Ack => Status::Ok,
            ReplyShape::Value | ReplyShape::Number | ReplyShape::Counter => Status::Value,
            ReplyShape::KeyValueSet => Status::KeyValueSet,
        }
    }
}

/// Static descriptor of one operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpSpec {
    pub opcode: Opcode,
    pub args: ArgShape,
    pub reply: ReplyShape,
}

impl OpSpec {
    pub const fn expected_status(&self) -> Status {
        self.reply.expected_status()
    }
}

/// A request ready to be framed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    opcode: Opcode,
    args: Vec<u8>,
}

impl Command {
    /// Build a command, laying out `target` and `param` according to the
    /// opcode's argument shape.
    ///
    /// The server splits arguments at the first space, so keys and prefixes
    /// may not contain one. Parameters are copied verbatim.
    pub fn new(opcode: Opcode, target: &[u8], param: Option<&[u8]>) -> Result<Self> {
        let spec = opcode.spec();

        let args = match spec.args {
            ArgShape::Empty => {
                if !target.is_empty() || param.is_some() {
                    return Err(GibsonError::InvalidArgument(format!(
                        "{:?} takes no arguments",
                        opcode
                    )));
                }
                Vec::new()
            }
            ArgShape::Key | ArgShape::Prefix => {
                if param.is_some() {
                    return Err(GibsonError::InvalidArgument(format!(
                        "{:?} takes no parameter",
                        opcode
                    )));
                }
                validate_target(opcode, target)?;
                target.to_vec()
            }
            ArgShape::KeyParam | ArgShape::PrefixParam => {
                validate_target(opcode, target)?;
                let param = param.ok_or_else(|| {
                    GibsonError::InvalidArgument(format!("{:?} requires a parameter", opcode))
                })?;

                let mut args = Vec::with_capacity(target.len() + 1 + param.len());
                args.extend_from_slice(target);
                args.push(b' ');
                args.extend_from_slice(param);
                args
            }
        };

        Ok(Self { opcode, args })
    }

    /// Build a command from raw argument bytes, skipping shape validation
    pub fn raw(opcode: Opcode, args: impl Into<Vec<u8>>) -> Self {
        Self {
            opcode,
            args: args.into(),
        }
    }

    pub fn opcode(&self) -> Opcode {
        self.opcode
    }

    pub fn args(&self) -> &[u8] {
        &self.args
    }

    pub fn spec(&self) -> OpSpec {
        self.opcode.spec()
    }
}

fn validate_target(opcode: Opcode, target: &[u8]) -> Result<()> {
    if target.is_empty() {
        return Err(GibsonError::InvalidArgument(format!(
            "{:?}: key must not be empty",
            opcode
        )));
    }
    if let Some(pos) = target.iter().position(|&b| b == b' ') {
        return Err(GibsonError::InvalidArgument(format!(
            "{:?}: key contains a space at byte {}",
            opcode, pos
        )));
    }
    Ok(())
}

/// Item fields readable with META
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetaField {
    /// Stored size in bytes
    Size,
    /// Encoding tag (see `Encoding`)
    Encoding,
    /// Last access time (unix seconds)
    Access,
    /// Creation time (unix seconds)
    Created,
    /// Configured TTL in seconds, -1 if none
    Ttl,
    /// Seconds left before expiry, -1 if none
    Left,
    /// Lock duration in seconds, 0 if unlocked
    Lock,
}

impl MetaField {
    pub const ALL: [MetaField; 7] = [
        MetaField::Size,
        MetaField::Encoding,
        MetaField::Access,
        MetaField::Created,
        MetaField::Ttl,
        MetaField::Left,
        MetaField::Lock,
    ];

    /// Name sent on the wire
    pub fn as_str(self) -> &'static str {
        match self {
            MetaField::Size => "size",
            MetaField::Encoding => "encoding",
            MetaField::Access => "access",
            MetaField::Created => "created",
            MetaField::Ttl => "ttl",
            MetaField::Left => "left",
            MetaField::Lock => "lock",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|f| f.as_str() == name)
    }
}
