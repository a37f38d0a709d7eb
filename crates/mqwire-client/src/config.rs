//! Session configuration.
//!
//! Supports configuration from:
//! - TOML file
//! - Environment variables with `MQWIRE__` prefix
//!
//! Environment variable examples:
//! - `MQWIRE__PROTOCOL_VERSION=v5`
//! - `MQWIRE__MAX_INFLIGHT=100`
//! - `MQWIRE__ANOMALY_POLICY=disconnect`

use std::path::Path;

use config::{Environment, File, FileFormat};
use mqwire_core::ProtocolVersion;
use serde::Deserialize;

use crate::error::{Result, SessionError};
use crate::events::AnomalyPolicy;

/// Default maximum packet size (1MB).
pub const DEFAULT_MAX_PACKET_SIZE: u32 = 1024 * 1024;

/// Largest packet the wire format can carry: a 268,435,455 byte
/// remaining length behind a 5 byte fixed header.
pub const MAX_PACKET_SIZE_LIMIT: u32 = 268_435_460;

/// Default cap on outbound QoS 1/2 publishes in flight (5.0 Receive Maximum default).
pub const DEFAULT_MAX_INFLIGHT: u16 = 65535;

/// Per-session settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Protocol version the session's codec speaks.
    pub protocol_version: ProtocolVersion,

    /// Maximum total packet size in bytes (0 = unlimited).
    #[serde(default = "default_max_packet_size")]
    pub max_packet_size: u32,

    /// Maximum outbound QoS 1/2 publishes awaiting acknowledgment.
    #[serde(default = "default_max_inflight")]
    pub max_inflight: u16,

    /// Reaction to acknowledgments for unknown packet ids.
    pub anomaly_policy: AnomalyPolicy,
}

fn default_max_packet_size() -> u32 {
    DEFAULT_MAX_PACKET_SIZE
}
fn default_max_inflight() -> u16 {
    DEFAULT_MAX_INFLIGHT
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            protocol_version: ProtocolVersion::default(),
            max_packet_size: DEFAULT_MAX_PACKET_SIZE,
            max_inflight: DEFAULT_MAX_INFLIGHT,
            anomaly_policy: AnomalyPolicy::default(),
        }
    }
}

impl SessionConfig {
    pub fn new(protocol_version: ProtocolVersion) -> Self {
        Self {
            protocol_version,
            ..Default::default()
        }
    }

    /// Load configuration from a TOML file with environment variable overrides.
    ///
    /// A missing file is not an error; defaults and `MQWIRE__` variables
    /// still apply.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut builder = config::Config::builder()
            .set_default("protocol_version", "v311")?
            .set_default("max_packet_size", DEFAULT_MAX_PACKET_SIZE as i64)?
            .set_default("max_inflight", DEFAULT_MAX_INFLIGHT as i64)?
            .set_default("anomaly_policy", "report")?;

        let path = path.as_ref();
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            builder = builder.add_source(File::from_str(&content, FileFormat::Toml));
        }

        let cfg = builder
            .add_source(
                Environment::with_prefix("MQWIRE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: SessionConfig = cfg.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        let config: SessionConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.max_packet_size > MAX_PACKET_SIZE_LIMIT {
            return Err(SessionError::Config(format!(
                "max_packet_size {} exceeds the protocol maximum of {}",
                self.max_packet_size, MAX_PACKET_SIZE_LIMIT
            )));
        }
        if self.max_inflight == 0 {
            return Err(SessionError::Config(
                "max_inflight must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
