//! Protocol codec
//!
//! Framing functions for the wire protocol. These know nothing about what a
//! command means, only how bytes are laid out.
//!
//! All integers are little-endian with the widths below, matching the
//! reference server's native layout.
//!
//! ## Wire Format
//!
//! ### Request Format
//! ```text
//! ┌──────────┬────────────┬─────────────────────────────┐
//! │ Len (4)  │ Opcode (2) │         Arguments           │
//! └──────────┴────────────┴─────────────────────────────┘
//!   Len = 2 + arguments.len()
//! ```
//!
//! ### Reply Format (legacy)
//! ```text
//! ┌───────────┬──────────┬─────────────────────────────┐
//! │Status (2) │ Len (4)  │         Payload             │
//! └───────────┴──────────┴─────────────────────────────┘
//! ```
//!
//! ### Reply Format (encoded)
//! ```text
//! ┌───────────┬─────────┬──────────┬─────────────────────────────┐
//! │Status (2) │ Enc (1) │ Len (4)  │         Payload             │
//! └───────────┴─────────┴──────────┴─────────────────────────────┘
//! ```

use std::io::{self, Read, Write};

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{GibsonError, Result};
use super::{Command, Encoding, ProtocolVariant, Reply};

/// Width of every length field
pub const LENGTH_SIZE: usize = 4;

/// Width of the request opcode
pub const OPCODE_SIZE: usize = 2;

/// Width of the reply status
pub const STATUS_SIZE: usize = 2;

/// Width of the encoding tag
pub const ENCODING_SIZE: usize = 1;

// =============================================================================
// Request Encoding/Decoding
// =============================================================================

/// Frame an opcode and its argument bytes
///
/// Format: len (4) + opcode (2) + args, where len counts opcode + args.
/// Argument bytes are copied untouched.
pub fn encode_frame(opcode: u16, args: &[u8]) -> Result<Bytes> {
    let body_len = u32::try_from(OPCODE_SIZE + args.len()).map_err(|_| {
        GibsonError::InvalidArgument(format!(
            "request of {} bytes does not fit a frame",
            args.len()
        ))
    })?;

    let mut frame = BytesMut::with_capacity(LENGTH_SIZE + body_len as usize);
    frame.put_u32_le(body_len);
    frame.put_u16_le(opcode);
    frame.put_slice(args);

    Ok(frame.freeze())
}

/// Frame a command
pub fn encode_command(command: &Command) -> Result<Bytes> {
    encode_frame(command.opcode().id(), command.args())
}

/// Write a command to a stream
pub fn write_command<W: Write>(writer: &mut W, command: &Command) -> Result<()> {
    let frame = encode_command(command)?;
    writer.write_all(&frame)?;
    writer.flush()?;
    Ok(())
}

/// Read one request frame, returning the raw opcode and argument bytes
///
/// This is the peer side of `write_command`.
pub fn read_request<R: Read>(reader: &mut R, max_len: u32) -> Result<(u16, Bytes)> {
    let body_len = read_u32(reader)?;

    if (body_len as usize) < OPCODE_SIZE {
        return Err(GibsonError::Protocol(format!(
            "Request frame too short: {} bytes",
            body_len
        )));
    }
    if body_len > max_len {
        return Err(GibsonError::Protocol(format!(
            "Request too large: {} bytes (max {})",
            body_len, max_len
        )));
    }

    let opcode = read_u16(reader)?;
    let args = read_exact(reader, body_len as usize - OPCODE_SIZE)?;

    Ok((opcode, args))
}

// =============================================================================
// Reply Encoding/Decoding
// =============================================================================

/// Fixed part of a reply frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplyHeader {
    pub status: u16,
    pub encoding: Option<Encoding>,
    pub length: u32,
}

impl ReplyHeader {
    /// Size of the header on the wire
    pub fn size(variant: ProtocolVariant) -> usize {
        match variant {
            ProtocolVariant::Legacy => STATUS_SIZE + LENGTH_SIZE,
            ProtocolVariant::Encoded => STATUS_SIZE + ENCODING_SIZE + LENGTH_SIZE,
        }
    }
}

/// Read a reply header field by field
///
/// Each field is read to its exact width before it is interpreted.
pub fn decode_reply_header<R: Read>(reader: &mut R, variant: ProtocolVariant) -> Result<ReplyHeader> {
    let status = read_u16(reader)?;

    let encoding = match variant {
        ProtocolVariant::Legacy => None,
        ProtocolVariant::Encoded => {
            let tag = read_exact(reader, ENCODING_SIZE)?[0];
            let encoding = Encoding::from_u8(tag).ok_or_else(|| {
                GibsonError::Protocol(format!("Unknown encoding tag: 0x{:02x}", tag))
            })?;
            Some(encoding)
        }
    };

    let length = read_u32(reader)?;

    Ok(ReplyHeader {
        status,
        encoding,
        length,
    })
}

/// Read a complete reply from a stream
///
/// Blocks until the whole declared payload has arrived.
pub fn read_reply<R: Read>(reader: &mut R, variant: ProtocolVariant, max_len: u32) -> Result<Reply> {
    let header = decode_reply_header(reader, variant)?;

    if header.length > max_len {
        return Err(GibsonError::Protocol(format!(
            "Reply payload too large: {} bytes (max {})",
            header.length, max_len
        )));
    }

    let payload = read_exact(reader, header.length as usize)?;

    Ok(Reply {
        status: header.status,
        encoding: header.encoding,
        payload,
    })
}

/// Encode a reply frame
///
/// The encoding tag is written only for the encoded variant; a reply without
/// a tag is written as plain.
pub fn encode_reply(reply: &Reply, variant: ProtocolVariant) -> Result<Bytes> {
    let length = u32::try_from(reply.payload.len()).map_err(|_| {
        GibsonError::InvalidArgument(format!(
            "reply of {} bytes does not fit a frame",
            reply.payload.len()
        ))
    })?;

    let mut frame = BytesMut::with_capacity(ReplyHeader::size(variant) + reply.payload.len());
    frame.put_u16_le(reply.status);
    if variant == ProtocolVariant::Encoded {
        frame.put_u8(reply.encoding.unwrap_or(Encoding::Plain) as u8);
    }
    frame.put_u32_le(length);
    frame.put_slice(&reply.payload);

    Ok(frame.freeze())
}

// =============================================================================
// Stream-based I/O helpers
// =============================================================================

/// Read exactly `len` bytes
///
/// Short reads are normal and simply continue; only a closed stream or an
/// I/O error ends the loop early, and both are reported as `GibsonError::Io`.
pub fn read_exact<R: Read>(reader: &mut R, len: usize) -> Result<Bytes> {
    let mut buf = vec![0u8; len];
    let mut filled = 0;

    while filled < len {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => {
                return Err(GibsonError::Io(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("connection closed after {} of {} bytes", filled, len),
                )))
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }

    Ok(Bytes::from(buf))
}

fn read_u16<R: Read>(reader: &mut R) -> Result<u16> {
    let raw = read_exact(reader, 2)?;
    Ok(u16::from_le_bytes([raw[0], raw[1]]))
}

fn read_u32<R: Read>(reader: &mut R) -> Result<u32> {
    let raw = read_exact(reader, 4)?;
    Ok(u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
}
