//! Session error types.

use std::io;

use thiserror::Error;

/// Session error type.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Protocol error: {0}")]
    Protocol(#[from] mqwire_core::ProtocolError),

    /// All 65535 packet identifiers are in flight.
    #[error("Packet identifier space exhausted")]
    IdSpaceExhausted,

    /// The peer's acknowledgment does not match what is in flight.
    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    #[error("In-flight limit of {0} outbound publishes reached")]
    InflightLimit(u16),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<mqwire_core::Error> for SessionError {
    fn from(err: mqwire_core::Error) -> Self {
        match err {
            mqwire_core::Error::Io(e) => SessionError::Io(e),
            mqwire_core::Error::Protocol(e) => SessionError::Protocol(e),
        }
    }
}

impl From<config::ConfigError> for SessionError {
    fn from(err: config::ConfigError) -> Self {
        SessionError::Config(err.to_string())
    }
}

impl From<toml::de::Error> for SessionError {
    fn from(err: toml::de::Error) -> Self {
        SessionError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SessionError>;
