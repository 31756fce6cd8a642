//! Protocol Module
//!
//! Defines the binary wire protocol spoken by Gibson servers.
//!
//! ## Request Format
//! ```text
//! ┌──────────┬────────────┬─────────────────────────────┐
//! │ Len (4)  │ Opcode (2) │         Arguments           │
//! └──────────┴────────────┴─────────────────────────────┘
//! ```
//!
//! ### Opcodes
//! - 1..=8:   SET TTL GET DEL INC DEC LOCK UNLOCK        (single key)
//! - 9..=16:  MSET MTTL MGET MDEL MINC MDEC MLOCK MUNLOCK (key prefix)
//! - 17..=21: COUNT STATS PING META KEYS
//! - 0xFF:    END (close the session)
//!
//! ## Reply Format
//! ```text
//! ┌───────────┬─────────┬──────────┬─────────────────────────────┐
//! │Status (2) │ Enc (1) │ Len (4)  │         Payload             │
//! └───────────┴─────────┴──────────┴─────────────────────────────┘
//! ```
//! `Enc` is absent in the legacy variant.
//!
//! ### Status Codes
//! - 0: ERR, 1: NOT_FOUND, 2: NAN, 3: MEM, 4: LOCKED
//! - 5: OK, 6: VAL, 7: KVAL
//!
//! ### Encodings
//! - 0: PLAIN, 1: COMPRESSED, 2: NUMBER

use serde::{Deserialize, Serialize};

mod command;
mod response;
mod codec;
mod keyvalue;

pub use command::{ArgShape, Command, MetaField, OpSpec, Opcode, ReplyShape};
pub use response::{Encoding, Reply, Status, Value};
pub use codec::{
    decode_reply_header, encode_command, encode_frame, encode_reply, read_exact, read_reply,
    read_request, write_command, ReplyHeader, ENCODING_SIZE, LENGTH_SIZE, OPCODE_SIZE,
    STATUS_SIZE,
};
pub use keyvalue::{
    decode_key_value_set, decode_number, decode_value, encode_key_value_set, KeyValueSet,
    PayloadReader,
};

/// Reply layout spoken by a server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ProtocolVariant {
    /// No per-value encoding tags; no PING/META/KEYS
    Legacy,

    /// Replies and key/value set elements carry an encoding tag
    #[default]
    Encoded,
}
