//! Redis protocol implementation
//!
//! This module provides RESP (REdis Serialization Protocol) framing and the
//! typed command set the durable counter store sends to its backend.

pub mod command;
pub mod resp;

pub use command::Command;
pub use resp::{Parser, Value};

/// Errors raised while decoding RESP frames or replies
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("unknown RESP type byte {0:#04x}")]
    UnknownType(u8),
    #[error("invalid RESP integer '{0}'")]
    InvalidInteger(String),
    #[error("invalid RESP length {0}")]
    InvalidLength(i64),
    #[error("bulk string is not terminated by CRLF")]
    MissingTerminator,
    #[error("unexpected reply to {command}: {reply:?}")]
    UnexpectedReply { command: &'static str, reply: Value },
}
