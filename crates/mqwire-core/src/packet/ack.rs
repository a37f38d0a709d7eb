//! PUBACK, PUBREC, PUBREL and PUBCOMP.
//!
//! All four share one layout: a packet identifier, then on 5.0 an
//! optional reason code and an optional property block. A remaining
//! length of 2 means Success with no properties, 3 means a reason code
//! with no properties.

use crate::error::{ProtocolError, Result};
use crate::properties::{Properties, PropertyContext};
use crate::wire::{self, Decoder};

use super::{ProtocolVersion, PubAckReasonCode, PubRelReasonCode};

/// PUBACK / PUBREC packet data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PubAck {
    pub packet_id: u16,
    pub reason_code: PubAckReasonCode,
    pub properties: Properties,
}

/// PUBREL / PUBCOMP packet data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PubRel {
    pub packet_id: u16,
    pub reason_code: PubRelReasonCode,
    pub properties: Properties,
}

impl PubAck {
    pub fn new(packet_id: u16) -> Self {
        Self {
            packet_id,
            reason_code: PubAckReasonCode::Success,
            properties: Properties::new(),
        }
    }

    pub fn with_reason(packet_id: u16, reason_code: PubAckReasonCode) -> Self {
        Self {
            reason_code,
            ..Self::new(packet_id)
        }
    }

    pub(crate) fn encode(&self, version: ProtocolVersion, buf: &mut Vec<u8>) -> Result<()> {
        encode_ack(self.packet_id, self.reason_code, &self.properties, version, buf)
    }

    pub(crate) fn decode(dec: &mut Decoder<'_>, version: ProtocolVersion) -> Result<Self> {
        let (packet_id, reason_code, properties) = decode_ack(dec, version)?;
        Ok(Self {
            packet_id,
            reason_code,
            properties,
        })
    }
}

impl PubRel {
    pub fn new(packet_id: u16) -> Self {
        Self {
            packet_id,
            reason_code: PubRelReasonCode::Success,
            properties: Properties::new(),
        }
    }

    pub fn with_reason(packet_id: u16, reason_code: PubRelReasonCode) -> Self {
        Self {
            reason_code,
            ..Self::new(packet_id)
        }
    }

    pub(crate) fn encode(&self, version: ProtocolVersion, buf: &mut Vec<u8>) -> Result<()> {
        encode_ack(self.packet_id, self.reason_code, &self.properties, version, buf)
    }

    pub(crate) fn decode(dec: &mut Decoder<'_>, version: ProtocolVersion) -> Result<Self> {
        let (packet_id, reason_code, properties) = decode_ack(dec, version)?;
        Ok(Self {
            packet_id,
            reason_code,
            properties,
        })
    }
}

fn encode_ack<R>(
    packet_id: u16,
    reason_code: R,
    properties: &Properties,
    version: ProtocolVersion,
    buf: &mut Vec<u8>,
) -> Result<()>
where
    R: Copy + Default + PartialEq + Into<u8> + std::fmt::Debug,
{
    let success = reason_code == R::default();
    if !version.is_v5() {
        if !success {
            return Err(ProtocolError::unsupported(format!(
                "ack reason {:?} on MQTT 3.1.1",
                reason_code
            ))
            .into());
        }
        if !properties.is_empty() {
            return Err(ProtocolError::unsupported("ack properties on MQTT 3.1.1").into());
        }
    }

    wire::write_packet_id(packet_id, buf)?;
    if !version.is_v5() || (success && properties.is_empty()) {
        return Ok(());
    }

    buf.push(reason_code.into());
    if !properties.is_empty() {
        properties.encode(PropertyContext::PubAck, buf)?;
    }
    Ok(())
}

fn decode_ack<R>(dec: &mut Decoder<'_>, version: ProtocolVersion) -> Result<(u16, R, Properties)>
where
    R: Default + TryFrom<u8, Error = ProtocolError>,
{
    let packet_id = dec.read_packet_id()?;
    if !version.is_v5() || !dec.has_remaining() {
        return Ok((packet_id, R::default(), Properties::new()));
    }

    let reason_code = R::try_from(dec.read_u8()?)?;
    let properties = if dec.has_remaining() {
        Properties::decode(dec, PropertyContext::PubAck)?
    } else {
        Properties::new()
    };
    Ok((packet_id, reason_code, properties))
}

#[cfg(test)]
mod tests {
    use super::super::test_util::*;
    use super::super::Packet;
    use super::*;
    use crate::codec::Codec;

    #[test]
    fn test_ack_shorthand_bytes() {
        for version in [ProtocolVersion::V311, ProtocolVersion::V5] {
            assert_eq!(
                encode(&Packet::PubAck(PubAck::new(5)), version),
                vec![0x40, 0x02, 0x00, 0x05]
            );
            assert_eq!(
                encode(&Packet::PubRec(PubAck::new(5)), version),
                vec![0x50, 0x02, 0x00, 0x05]
            );
            assert_eq!(
                encode(&Packet::PubRel(PubRel::new(5)), version),
                vec![0x62, 0x02, 0x00, 0x05]
            );
            assert_eq!(
                encode(&Packet::PubComp(PubRel::new(5)), version),
                vec![0x70, 0x02, 0x00, 0x05]
            );
        }
    }

    #[test]
    fn test_ack_reason_only() {
        let packet = Packet::PubAck(PubAck::with_reason(
            1,
            PubAckReasonCode::NoMatchingSubscribers,
        ));
        assert_eq!(
            encode(&packet, ProtocolVersion::V5),
            vec![0x40, 0x03, 0x00, 0x01, 0x10]
        );
        assert_eq!(roundtrip(&packet, ProtocolVersion::V5), packet);
    }

    #[test]
    fn test_ack_reason_and_properties() {
        let mut ack = PubRel::with_reason(2, PubRelReasonCode::PacketIdentifierNotFound);
        ack.properties
            .push(
                crate::properties::PropertyId::ReasonString,
                crate::properties::PropertyValue::Utf8("gone".into()),
            )
            .unwrap();
        let packet = Packet::PubComp(ack);
        let bytes = encode(&packet, ProtocolVersion::V5);
        assert_eq!(
            bytes,
            vec![0x70, 0x0B, 0x00, 0x02, 0x92, 0x07, 0x1F, 0x00, 0x04, b'g', b'o', b'n', b'e']
        );
        assert_eq!(roundtrip(&packet, ProtocolVersion::V5), packet);
    }

    #[test]
    fn test_success_with_empty_property_block() {
        // Remaining length 4: success code plus a zero-length property block
        let packet = decode(&[0x40, 0x04, 0x00, 0x09, 0x00, 0x00], ProtocolVersion::V5).unwrap();
        assert_eq!(packet, Packet::PubAck(PubAck::new(9)));
    }

    #[test]
    fn test_v311_ack_must_be_two_bytes() {
        let err = decode(&[0x40, 0x03, 0x00, 0x01, 0x00], ProtocolVersion::V311).unwrap_err();
        assert!(is_malformed(&err));
    }

    #[test]
    fn test_v311_rejects_reason_codes() {
        let packet = Packet::PubRec(PubAck::with_reason(1, PubAckReasonCode::QuotaExceeded));
        let err = Codec::new(ProtocolVersion::V311).encode(&packet).unwrap_err();
        assert!(is_unsupported(&err));
    }

    #[test]
    fn test_ack_zero_packet_id() {
        for version in [ProtocolVersion::V311, ProtocolVersion::V5] {
            let err = decode(&[0x40, 0x02, 0x00, 0x00], version).unwrap_err();
            assert!(is_violation(&err));
            let err = Codec::new(version)
                .encode(&Packet::PubRel(PubRel::new(0)))
                .unwrap_err();
            assert!(is_violation(&err));
        }
    }

    #[test]
    fn test_unknown_reason_code_is_malformed() {
        let err = decode(&[0x62, 0x03, 0x00, 0x01, 0x80], ProtocolVersion::V5).unwrap_err();
        assert!(is_malformed(&err));
    }
}
