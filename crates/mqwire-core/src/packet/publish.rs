//! PUBLISH.

use bytes::Bytes;

use crate::error::{ProtocolError, Result};
use crate::properties::{Properties, PropertyContext, PropertyId};
use crate::wire::{self, Decoder};

use super::{require_no_properties, validate_topic_name, ProtocolVersion, QoS};

/// PUBLISH packet data.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Publish {
    pub dup: bool,
    pub qos: QoS,
    pub retain: bool,
    pub topic: String,
    /// Present exactly when `qos > 0`.
    pub packet_id: Option<u16>,
    /// Application payload; its length is implied by the remaining length.
    pub payload: Bytes,
    pub properties: Properties,
}

impl Publish {
    /// QoS 0 publish.
    pub fn new(topic: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
            ..Default::default()
        }
    }

    /// QoS 1 or 2 publish carrying `packet_id`.
    pub fn with_qos(
        topic: impl Into<String>,
        payload: impl Into<Bytes>,
        qos: QoS,
        packet_id: u16,
    ) -> Self {
        Self {
            qos,
            packet_id: Some(packet_id),
            ..Self::new(topic, payload)
        }
    }

    /// Fixed header flag nibble: DUP, QoS, RETAIN.
    pub(crate) fn flags(&self) -> u8 {
        let mut flags = (self.qos as u8) << 1;
        if self.dup {
            flags |= 0x08;
        }
        if self.retain {
            flags |= 0x01;
        }
        flags
    }

    fn check(&self, version: ProtocolVersion) -> Result<()> {
        match (self.qos, self.packet_id) {
            (QoS::AtMostOnce, Some(_)) => {
                return Err(
                    ProtocolError::violation("QoS 0 PUBLISH must not carry a packet id").into(),
                )
            }
            (QoS::AtLeastOnce | QoS::ExactlyOnce, None) => {
                return Err(ProtocolError::violation(format!(
                    "{:?} PUBLISH requires a packet id",
                    self.qos
                ))
                .into())
            }
            _ => {}
        }

        // MQTT-3.3.1-2
        if self.dup && self.qos == QoS::AtMostOnce {
            return Err(ProtocolError::violation("DUP must be 0 for QoS 0 PUBLISH").into());
        }

        validate_topic_name(&self.topic)?;
        if self.topic.is_empty()
            && !(version.is_v5() && self.properties.contains(PropertyId::TopicAlias))
        {
            return Err(ProtocolError::violation(
                "empty topic name requires a Topic Alias (MQTT 5.0)",
            )
            .into());
        }
        Ok(())
    }

    pub(crate) fn encode(&self, version: ProtocolVersion, buf: &mut Vec<u8>) -> Result<()> {
        self.check(version)?;
        require_no_properties(&self.properties, version, "PUBLISH")?;

        wire::write_string(&self.topic, buf)?;
        if let Some(id) = self.packet_id {
            wire::write_packet_id(id, buf)?;
        }
        if version.is_v5() {
            self.properties.encode(PropertyContext::Publish, buf)?;
        }
        buf.extend_from_slice(&self.payload);
        Ok(())
    }

    pub(crate) fn decode(
        flags: u8,
        dec: &mut Decoder<'_>,
        version: ProtocolVersion,
    ) -> Result<Self> {
        let dup = (flags & 0x08) != 0;
        let qos = QoS::try_from((flags >> 1) & 0x03)?;
        let retain = (flags & 0x01) != 0;

        let topic = dec.read_string()?;

        let packet_id = if qos != QoS::AtMostOnce {
            Some(dec.read_packet_id()?)
        } else {
            None
        };

        let properties = if version.is_v5() {
            Properties::decode(dec, PropertyContext::Publish)?
        } else {
            Properties::new()
        };

        let payload = Bytes::copy_from_slice(dec.read_rest());

        let publish = Publish {
            dup,
            qos,
            retain,
            topic,
            packet_id,
            payload,
            properties,
        };
        publish.check(version)?;
        Ok(publish)
    }
}
