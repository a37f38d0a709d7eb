//! SUBSCRIBE, SUBACK, UNSUBSCRIBE and UNSUBACK.

use crate::error::{ProtocolError, Result};
use crate::properties::{Properties, PropertyContext};
use crate::wire::{self, Decoder};

use super::{require_no_properties, ProtocolVersion, QoS, SubAckReasonCode, UnsubAckReasonCode};

/// Retain Handling subscription option (MQTT 5.0).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum RetainHandling {
    /// Send retained messages at the time of the subscribe.
    #[default]
    SendAtSubscribe = 0,
    /// Send retained messages only if the subscription does not exist yet.
    SendIfNew = 1,
    DoNotSend = 2,
}

impl TryFrom<u8> for RetainHandling {
    type Error = ProtocolError;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            0 => Ok(RetainHandling::SendAtSubscribe),
            1 => Ok(RetainHandling::SendIfNew),
            2 => Ok(RetainHandling::DoNotSend),
            _ => Err(ProtocolError::malformed(format!(
                "invalid retain handling: {}",
                value
            ))),
        }
    }
}

/// Subscription options byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SubscriptionOptions {
    pub qos: QoS,
    pub no_local: bool,
    pub retain_as_published: bool,
    pub retain_handling: RetainHandling,
}

impl SubscriptionOptions {
    pub fn new(qos: QoS) -> Self {
        Self {
            qos,
            ..Default::default()
        }
    }

    /// Parse from SUBSCRIBE options byte.
    pub fn from_byte(byte: u8, version: ProtocolVersion) -> Result<Self> {
        let reserved = if version.is_v5() { 0xC0 } else { 0xFC };
        if byte & reserved != 0 {
            return Err(ProtocolError::malformed(format!(
                "reserved subscription option bits set: {:#04x}",
                byte
            ))
            .into());
        }
        Ok(Self {
            qos: QoS::try_from(byte & 0x03)?,
            no_local: (byte & 0x04) != 0,
            retain_as_published: (byte & 0x08) != 0,
            retain_handling: RetainHandling::try_from((byte >> 4) & 0x03)?,
        })
    }

    pub fn to_byte(&self, version: ProtocolVersion) -> Result<u8> {
        let mut byte = self.qos as u8;
        if !version.is_v5() {
            if self.no_local
                || self.retain_as_published
                || self.retain_handling != RetainHandling::SendAtSubscribe
            {
                return Err(ProtocolError::unsupported(
                    "subscription options beyond QoS on MQTT 3.1.1",
                )
                .into());
            }
            return Ok(byte);
        }
        if self.no_local {
            byte |= 0x04;
        }
        if self.retain_as_published {
            byte |= 0x08;
        }
        byte |= (self.retain_handling as u8) << 4;
        Ok(byte)
    }
}

/// A topic filter with its requested options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topic {
    /// Topic filter; may contain `+` and `#` wildcards.
    pub name: String,
    pub options: SubscriptionOptions,
}

impl Topic {
    pub fn new(name: impl Into<String>, qos: QoS) -> Self {
        Self {
            name: name.into(),
            options: SubscriptionOptions::new(qos),
        }
    }

    pub fn qos(&self) -> QoS {
        self.options.qos
    }
}

fn check_filter(filter: &str) -> Result<()> {
    // MQTT-4.7.3-1
    if filter.is_empty() {
        return Err(ProtocolError::violation("topic filter must not be empty").into());
    }
    Ok(())
}

/// SUBSCRIBE packet data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscribe {
    pub packet_id: u16,
    pub topics: Vec<Topic>,
    pub properties: Properties,
}

impl Subscribe {
    pub fn new(packet_id: u16, topics: Vec<Topic>) -> Self {
        Self {
            packet_id,
            topics,
            properties: Properties::new(),
        }
    }

    pub(crate) fn encode(&self, version: ProtocolVersion, buf: &mut Vec<u8>) -> Result<()> {
        // MQTT-3.8.3-3
        if self.topics.is_empty() {
            return Err(ProtocolError::violation("SUBSCRIBE with no topic filters").into());
        }
        require_no_properties(&self.properties, version, "SUBSCRIBE")?;

        wire::write_packet_id(self.packet_id, buf)?;
        if version.is_v5() {
            self.properties.encode(PropertyContext::Subscribe, buf)?;
        }
        for topic in &self.topics {
            check_filter(&topic.name)?;
            wire::write_string(&topic.name, buf)?;
            buf.push(topic.options.to_byte(version)?);
        }
        Ok(())
    }

    pub(crate) fn decode(dec: &mut Decoder<'_>, version: ProtocolVersion) -> Result<Self> {
        let packet_id = dec.read_packet_id()?;
        let properties = if version.is_v5() {
            Properties::decode(dec, PropertyContext::Subscribe)?
        } else {
            Properties::new()
        };

        let mut topics = Vec::new();
        while dec.has_remaining() {
            let name = dec.read_string()?;
            check_filter(&name)?;
            let options = SubscriptionOptions::from_byte(dec.read_u8()?, version)?;
            topics.push(Topic { name, options });
        }

        if topics.is_empty() {
            return Err(ProtocolError::violation("SUBSCRIBE with no topic filters").into());
        }

        Ok(Subscribe {
            packet_id,
            topics,
            properties,
        })
    }
}

/// SUBACK packet data. One reason code per requested topic, in request order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubAck {
    pub packet_id: u16,
    pub reason_codes: Vec<SubAckReasonCode>,
    pub properties: Properties,
}

impl SubAck {
    pub fn new(packet_id: u16, reason_codes: Vec<SubAckReasonCode>) -> Self {
        Self {
            packet_id,
            reason_codes,
            properties: Properties::new(),
        }
    }

    pub(crate) fn encode(&self, version: ProtocolVersion, buf: &mut Vec<u8>) -> Result<()> {
        if self.reason_codes.is_empty() {
            return Err(ProtocolError::violation("SUBACK with no reason codes").into());
        }
        require_no_properties(&self.properties, version, "SUBACK")?;
        if !version.is_v5() {
            if let Some(code) = self.reason_codes.iter().find(|c| !c.is_v311()) {
                return Err(ProtocolError::unsupported(format!(
                    "SUBACK reason {:?} on MQTT 3.1.1",
                    code
                ))
                .into());
            }
        }

        wire::write_packet_id(self.packet_id, buf)?;
        if version.is_v5() {
            self.properties.encode(PropertyContext::SubAck, buf)?;
        }
        buf.extend(self.reason_codes.iter().map(|&c| u8::from(c)));
        Ok(())
    }

    pub(crate) fn decode(dec: &mut Decoder<'_>, version: ProtocolVersion) -> Result<Self> {
        let packet_id = dec.read_packet_id()?;
        let properties = if version.is_v5() {
            Properties::decode(dec, PropertyContext::SubAck)?
        } else {
            Properties::new()
        };

        let reason_codes = dec
            .read_rest()
            .iter()
            .map(|&b| {
                let code = SubAckReasonCode::try_from(b)?;
                if !version.is_v5() && !code.is_v311() {
                    return Err(ProtocolError::malformed(format!(
                        "invalid SUBACK return code: {:#04x}",
                        b
                    )));
                }
                Ok(code)
            })
            .collect::<std::result::Result<Vec<_>, ProtocolError>>()?;

        if reason_codes.is_empty() {
            return Err(ProtocolError::violation("SUBACK with no reason codes").into());
        }

        Ok(SubAck {
            packet_id,
            reason_codes,
            properties,
        })
    }
}

/// UNSUBSCRIBE packet data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unsubscribe {
    pub packet_id: u16,
    pub topics: Vec<String>,
    pub properties: Properties,
}

impl Unsubscribe {
    pub fn new(packet_id: u16, topics: Vec<String>) -> Self {
        Self {
            packet_id,
            topics,
            properties: Properties::new(),
        }
    }

    pub(crate) fn encode(&self, version: ProtocolVersion, buf: &mut Vec<u8>) -> Result<()> {
        // MQTT-3.10.3-2
        if self.topics.is_empty() {
            return Err(ProtocolError::violation("UNSUBSCRIBE with no topic filters").into());
        }
        require_no_properties(&self.properties, version, "UNSUBSCRIBE")?;

        wire::write_packet_id(self.packet_id, buf)?;
        if version.is_v5() {
            self.properties.encode(PropertyContext::Unsubscribe, buf)?;
        }
        for topic in &self.topics {
            check_filter(topic)?;
            wire::write_string(topic, buf)?;
        }
        Ok(())
    }

    pub(crate) fn decode(dec: &mut Decoder<'_>, version: ProtocolVersion) -> Result<Self> {
        let packet_id = dec.read_packet_id()?;
        let properties = if version.is_v5() {
            Properties::decode(dec, PropertyContext::Unsubscribe)?
        } else {
            Properties::new()
        };

        let mut topics = Vec::new();
        while dec.has_remaining() {
            let topic = dec.read_string()?;
            check_filter(&topic)?;
            topics.push(topic);
        }

        if topics.is_empty() {
            return Err(ProtocolError::violation("UNSUBSCRIBE with no topic filters").into());
        }

        Ok(Unsubscribe {
            packet_id,
            topics,
            properties,
        })
    }
}

/// UNSUBACK packet data.
///
/// On 3.1.1 the packet is a bare packet identifier and `reason_codes` is
/// always empty. On 5.0 it carries one reason code per filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsubAck {
    pub packet_id: u16,
    pub reason_codes: Vec<UnsubAckReasonCode>,
    pub properties: Properties,
}

impl UnsubAck {
    pub fn new(packet_id: u16, reason_codes: Vec<UnsubAckReasonCode>) -> Self {
        Self {
            packet_id,
            reason_codes,
            properties: Properties::new(),
        }
    }

    pub(crate) fn encode(&self, version: ProtocolVersion, buf: &mut Vec<u8>) -> Result<()> {
        require_no_properties(&self.properties, version, "UNSUBACK")?;
        if version.is_v5() {
            if self.reason_codes.is_empty() {
                return Err(ProtocolError::violation("UNSUBACK with no reason codes").into());
            }
        } else if !self.reason_codes.is_empty() {
            return Err(ProtocolError::unsupported("UNSUBACK reason codes on MQTT 3.1.1").into());
        }

        wire::write_packet_id(self.packet_id, buf)?;
        if version.is_v5() {
            self.properties.encode(PropertyContext::UnsubAck, buf)?;
            buf.extend(self.reason_codes.iter().map(|&c| u8::from(c)));
        }
        Ok(())
    }

    pub(crate) fn decode(dec: &mut Decoder<'_>, version: ProtocolVersion) -> Result<Self> {
        let packet_id = dec.read_packet_id()?;
        if !version.is_v5() {
            return Ok(UnsubAck::new(packet_id, Vec::new()));
        }

        let properties = Properties::decode(dec, PropertyContext::UnsubAck)?;
        let reason_codes = dec
            .read_rest()
            .iter()
            .map(|&b| UnsubAckReasonCode::try_from(b))
            .collect::<std::result::Result<Vec<_>, ProtocolError>>()?;

        if reason_codes.is_empty() {
            return Err(ProtocolError::violation("UNSUBACK with no reason codes").into());
        }

        Ok(UnsubAck {
            packet_id,
            reason_codes,
            properties,
        })
    }
}
