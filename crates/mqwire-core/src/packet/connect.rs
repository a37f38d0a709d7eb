//! CONNECT and CONNACK.

use bytes::Bytes;

use crate::error::{ProtocolError, Result};
use crate::properties::{Properties, PropertyContext};
use crate::wire::{self, Decoder};

use super::{require_no_properties, validate_topic_name, ConnectReasonCode, ProtocolVersion, QoS};

const PROTOCOL_NAME: &str = "MQTT";
/// Protocol name used by MQTT 3.1 (level 3).
const LEGACY_PROTOCOL_NAME: &str = "MQIsdp";

/// CONNECT packet data.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Connect {
    /// Clean Session (3.1.1) / Clean Start (5.0).
    pub clean_session: bool,
    pub keep_alive: u16,
    pub client_id: String,
    pub will: Option<Will>,
    pub username: Option<String>,
    pub password: Option<Bytes>,
    pub properties: Properties,
}

/// Will message configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Will {
    pub topic: String,
    pub message: Bytes,
    pub qos: QoS,
    pub retain: bool,
    pub properties: Properties,
}

impl Will {
    pub fn new(topic: impl Into<String>, message: impl Into<Bytes>, qos: QoS) -> Self {
        Self {
            topic: topic.into(),
            message: message.into(),
            qos,
            retain: false,
            properties: Properties::new(),
        }
    }
}

impl Connect {
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            clean_session: true,
            client_id: client_id.into(),
            ..Default::default()
        }
    }

    pub(crate) fn encode(&self, version: ProtocolVersion, buf: &mut Vec<u8>) -> Result<()> {
        // MQTT-3.1.2-22: 3.1.1 forbids a password without a user name
        if !version.is_v5() && self.password.is_some() && self.username.is_none() {
            return Err(ProtocolError::violation(
                "password set without user name on MQTT 3.1.1",
            )
            .into());
        }
        require_no_properties(&self.properties, version, "CONNECT")?;

        wire::write_string(PROTOCOL_NAME, buf)?;
        buf.push(version.level());

        let mut flags = 0u8;
        if self.clean_session {
            flags |= 0x02;
        }
        if let Some(ref will) = self.will {
            flags |= 0x04;
            flags |= (will.qos as u8) << 3;
            if will.retain {
                flags |= 0x20;
            }
        }
        if self.password.is_some() {
            flags |= 0x40;
        }
        if self.username.is_some() {
            flags |= 0x80;
        }
        buf.push(flags);
        wire::write_u16(self.keep_alive, buf);

        if version.is_v5() {
            self.properties.encode(PropertyContext::Connect, buf)?;
        }

        wire::write_string(&self.client_id, buf)?;

        if let Some(ref will) = self.will {
            validate_will_topic(&will.topic)?;
            if version.is_v5() {
                will.properties.encode(PropertyContext::Will, buf)?;
            } else {
                require_no_properties(&will.properties, version, "Will")?;
            }
            wire::write_string(&will.topic, buf)?;
            wire::write_binary(&will.message, buf)?;
        }

        if let Some(ref username) = self.username {
            wire::write_string(username, buf)?;
        }
        if let Some(ref password) = self.password {
            wire::write_binary(password, buf)?;
        }
        Ok(())
    }

    pub(crate) fn decode(dec: &mut Decoder<'_>, version: ProtocolVersion) -> Result<Self> {
        let protocol_name = dec.read_string()?;
        if protocol_name == LEGACY_PROTOCOL_NAME {
            return Err(ProtocolError::unsupported("MQTT 3.1 (MQIsdp)").into());
        }
        if protocol_name != PROTOCOL_NAME {
            return Err(ProtocolError::malformed(format!(
                "invalid protocol name {:?}",
                protocol_name
            ))
            .into());
        }

        let level = dec.read_u8()?;
        if ProtocolVersion::from_level(level)? != version {
            return Err(ProtocolError::unsupported(format!(
                "CONNECT level {} on a {:?} codec",
                level, version
            ))
            .into());
        }

        let flags = dec.read_u8()?;
        let clean_session = (flags & 0x02) != 0;
        let will_flag = (flags & 0x04) != 0;
        let will_qos = QoS::try_from((flags >> 3) & 0x03)?;
        let will_retain = (flags & 0x20) != 0;
        let password_flag = (flags & 0x40) != 0;
        let username_flag = (flags & 0x80) != 0;

        // Reserved bit must be 0
        if (flags & 0x01) != 0 {
            return Err(ProtocolError::malformed("CONNECT reserved flag is set").into());
        }

        // MQTT-3.1.2-11/13: If Will Flag is 0, Will QoS MUST be 0
        if !will_flag && will_qos != QoS::AtMostOnce {
            return Err(
                ProtocolError::malformed("Will QoS must be 0 when Will Flag is 0").into(),
            );
        }

        // MQTT-3.1.2-15: If Will Flag is 0, Will Retain MUST be 0
        if !will_flag && will_retain {
            return Err(
                ProtocolError::malformed("Will Retain must be 0 when Will Flag is 0").into(),
            );
        }

        // MQTT-3.1.2-22: 5.0 allows a password without a user name
        if !version.is_v5() && !username_flag && password_flag {
            return Err(ProtocolError::violation(
                "Password Flag must be 0 when Username Flag is 0",
            )
            .into());
        }

        let keep_alive = dec.read_u16()?;

        let properties = if version.is_v5() {
            Properties::decode(dec, PropertyContext::Connect)?
        } else {
            Properties::new()
        };

        let client_id = dec.read_string()?;

        let will = if will_flag {
            let will_properties = if version.is_v5() {
                Properties::decode(dec, PropertyContext::Will)?
            } else {
                Properties::new()
            };
            let topic = dec.read_string()?;
            validate_will_topic(&topic)?;
            let message = dec.read_binary()?;
            Some(Will {
                topic,
                message,
                qos: will_qos,
                retain: will_retain,
                properties: will_properties,
            })
        } else {
            None
        };

        let username = if username_flag {
            Some(dec.read_string()?)
        } else {
            None
        };

        let password = if password_flag {
            Some(dec.read_binary()?)
        } else {
            None
        };

        Ok(Connect {
            clean_session,
            keep_alive,
            client_id,
            will,
            username,
            password,
            properties,
        })
    }
}

/// CONNACK packet data.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Connack {
    pub session_present: bool,
    pub reason_code: ConnectReasonCode,
    pub properties: Properties,
}

impl Connack {
    pub fn new(session_present: bool, reason_code: ConnectReasonCode) -> Self {
        Self {
            session_present,
            reason_code,
            properties: Properties::new(),
        }
    }

    fn check(&self) -> Result<()> {
        // MQTT-3.2.2-4 / MQTT-3.2.2-6
        if self.session_present && self.reason_code != ConnectReasonCode::Success {
            return Err(ProtocolError::violation(
                "session present must be 0 on a refused connection",
            )
            .into());
        }
        Ok(())
    }

    pub(crate) fn encode(&self, version: ProtocolVersion, buf: &mut Vec<u8>) -> Result<()> {
        self.check()?;
        require_no_properties(&self.properties, version, "CONNACK")?;
        let code = self.reason_code.to_wire(version)?;

        buf.push(u8::from(self.session_present));
        buf.push(code);
        if version.is_v5() {
            self.properties.encode(PropertyContext::Connack, buf)?;
        }
        Ok(())
    }

    pub(crate) fn decode(dec: &mut Decoder<'_>, version: ProtocolVersion) -> Result<Self> {
        let ack_flags = dec.read_u8()?;
        if ack_flags & 0xFE != 0 {
            return Err(ProtocolError::malformed("CONNACK reserved flags are set").into());
        }
        let reason_code = ConnectReasonCode::from_wire(dec.read_u8()?, version)?;
        let properties = if version.is_v5() {
            Properties::decode(dec, PropertyContext::Connack)?
        } else {
            Properties::new()
        };

        let connack = Connack {
            session_present: ack_flags & 0x01 != 0,
            reason_code,
            properties,
        };
        connack.check()?;
        Ok(connack)
    }
}

/// Will topic: non-empty and free of wildcards.
fn validate_will_topic(topic: &str) -> Result<()> {
    if topic.is_empty() {
        return Err(ProtocolError::violation("will topic must not be empty").into());
    }
    validate_topic_name(topic)
}
