//! Error types for the MQTT codec.

use std::io;

use thiserror::Error;

/// Top-level codec error.
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

/// MQTT protocol errors.
///
/// Any of these surfacing from a stream decode means the framing offset can
/// no longer be trusted and the connection must be dropped.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Malformed variable byte integer")]
    MalformedVarInt,

    #[error("Malformed packet: {0}")]
    MalformedPacket(String),

    #[error("Incomplete packet: need {needed} bytes, have {have}")]
    IncompletePacket { needed: usize, have: usize },

    #[error("Invalid packet type: {0}")]
    InvalidPacketType(u8),

    #[error("Invalid UTF-8 string")]
    InvalidUtf8,

    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    #[error("Unsupported for protocol version: {0}")]
    UnsupportedVersion(String),

    #[error("Packet too large: {size} bytes exceeds maximum {max}")]
    PacketTooLarge { size: usize, max: usize },
}

impl ProtocolError {
    /// True for structural failures (truncated, impossible encodings).
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            ProtocolError::MalformedVarInt
                | ProtocolError::MalformedPacket(_)
                | ProtocolError::IncompletePacket { .. }
                | ProtocolError::InvalidPacketType(_)
                | ProtocolError::InvalidUtf8
        )
    }

    pub(crate) fn malformed(msg: impl Into<String>) -> Self {
        ProtocolError::MalformedPacket(msg.into())
    }

    pub(crate) fn violation(msg: impl Into<String>) -> Self {
        ProtocolError::ProtocolViolation(msg.into())
    }

    pub(crate) fn unsupported(msg: impl Into<String>) -> Self {
        ProtocolError::UnsupportedVersion(msg.into())
    }
}

impl Error {
    /// The protocol error, if this is not an I/O failure.
    pub fn protocol(&self) -> Option<&ProtocolError> {
        match self {
            Error::Protocol(e) => Some(e),
            Error::Io(_) => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
