//! MQTT packet types and body codecs for MQTT 3.1.1 and MQTT 5.0.
//!
//! Every body codec takes the [`ProtocolVersion`] as a parameter rather
//! than having a type per version: on 5.0 the same packets grow property
//! blocks and reason codes.

mod ack;
mod connect;
mod disconnect;
mod publish;
mod reason;
mod subscribe;

pub use ack::{PubAck, PubRel};
pub use connect::{Connack, Connect, Will};
pub use disconnect::{Auth, Disconnect};
pub use publish::Publish;
pub use reason::{
    AuthReasonCode, ConnectReasonCode, DisconnectReasonCode, PubAckReasonCode, PubRelReasonCode,
    SubAckReasonCode, UnsubAckReasonCode,
};
pub use subscribe::{
    RetainHandling, SubAck, Subscribe, SubscriptionOptions, Topic, UnsubAck, Unsubscribe,
};

use crate::error::{ProtocolError, Result};
use crate::header::{FixedHeader, PacketType};
use crate::wire::Decoder;

/// Protocol version negotiated for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize),
    serde(rename_all = "lowercase")
)]
pub enum ProtocolVersion {
    /// MQTT 3.1.1 (protocol level 4).
    #[default]
    V311,
    /// MQTT 5.0 (protocol level 5).
    V5,
}

impl ProtocolVersion {
    /// Protocol level byte carried in CONNECT.
    pub fn level(self) -> u8 {
        match self {
            ProtocolVersion::V311 => 4,
            ProtocolVersion::V5 => 5,
        }
    }

    pub fn from_level(level: u8) -> Result<Self> {
        match level {
            4 => Ok(ProtocolVersion::V311),
            5 => Ok(ProtocolVersion::V5),
            _ => Err(ProtocolError::unsupported(format!("protocol level {}", level)).into()),
        }
    }

    pub fn is_v5(self) -> bool {
        self == ProtocolVersion::V5
    }
}

/// Accepts the names `v311` / `v5` (or `3.1.1`, `mqtt3.1.1`, `5.0`,
/// `mqtt5`) and the protocol levels 4 / 5, as strings or numbers.
#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for ProtocolVersion {
    fn deserialize<D: serde::Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Self, D::Error> {
        struct VersionVisitor;

        impl serde::de::Visitor<'_> for VersionVisitor {
            type Value = ProtocolVersion;

            fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str("an MQTT protocol version such as \"v311\", \"v5\" or 5")
            }

            fn visit_str<E: serde::de::Error>(self, v: &str) -> std::result::Result<Self::Value, E> {
                match v.to_ascii_lowercase().as_str() {
                    "v311" | "3.1.1" | "mqtt3.1.1" | "4" => Ok(ProtocolVersion::V311),
                    "v5" | "5" | "5.0" | "mqtt5" => Ok(ProtocolVersion::V5),
                    _ => Err(E::invalid_value(serde::de::Unexpected::Str(v), &self)),
                }
            }

            fn visit_u64<E: serde::de::Error>(self, v: u64) -> std::result::Result<Self::Value, E> {
                u8::try_from(v)
                    .ok()
                    .and_then(|level| ProtocolVersion::from_level(level).ok())
                    .ok_or_else(|| E::invalid_value(serde::de::Unexpected::Unsigned(v), &self))
            }

            fn visit_i64<E: serde::de::Error>(self, v: i64) -> std::result::Result<Self::Value, E> {
                match u64::try_from(v) {
                    Ok(level) => self.visit_u64(level),
                    Err(_) => Err(E::invalid_value(serde::de::Unexpected::Signed(v), &self)),
                }
            }

            fn visit_f64<E: serde::de::Error>(self, v: f64) -> std::result::Result<Self::Value, E> {
                if v == 5.0 {
                    Ok(ProtocolVersion::V5)
                } else if v == 4.0 {
                    Ok(ProtocolVersion::V311)
                } else {
                    Err(E::invalid_value(serde::de::Unexpected::Float(v), &self))
                }
            }
        }

        deserializer.deserialize_any(VersionVisitor)
    }
}

/// Quality of Service levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
#[repr(u8)]
#[allow(clippy::enum_variant_names)] // MQTT protocol names
pub enum QoS {
    #[default]
    AtMostOnce = 0,
    AtLeastOnce = 1,
    ExactlyOnce = 2,
}

impl TryFrom<u8> for QoS {
    type Error = ProtocolError;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            0 => Ok(QoS::AtMostOnce),
            1 => Ok(QoS::AtLeastOnce),
            2 => Ok(QoS::ExactlyOnce),
            _ => Err(ProtocolError::MalformedPacket(format!(
                "Invalid QoS: {}",
                value
            ))),
        }
    }
}

/// MQTT Packets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    Connect(Connect),
    Connack(Connack),
    Publish(Publish),
    PubAck(PubAck),
    /// PUBREC shares the PUBACK layout and reason codes.
    PubRec(PubAck),
    PubRel(PubRel),
    /// PUBCOMP shares the PUBREL layout and reason codes.
    PubComp(PubRel),
    Subscribe(Subscribe),
    SubAck(SubAck),
    Unsubscribe(Unsubscribe),
    UnsubAck(UnsubAck),
    PingReq,
    PingResp,
    Disconnect(Disconnect),
    Auth(Auth),
}

impl Packet {
    pub fn packet_type(&self) -> PacketType {
        match self {
            Packet::Connect(_) => PacketType::Connect,
            Packet::Connack(_) => PacketType::Connack,
            Packet::Publish(_) => PacketType::Publish,
            Packet::PubAck(_) => PacketType::Puback,
            Packet::PubRec(_) => PacketType::Pubrec,
            Packet::PubRel(_) => PacketType::Pubrel,
            Packet::PubComp(_) => PacketType::Pubcomp,
            Packet::Subscribe(_) => PacketType::Subscribe,
            Packet::SubAck(_) => PacketType::Suback,
            Packet::Unsubscribe(_) => PacketType::Unsubscribe,
            Packet::UnsubAck(_) => PacketType::Unsuback,
            Packet::PingReq => PacketType::Pingreq,
            Packet::PingResp => PacketType::Pingresp,
            Packet::Disconnect(_) => PacketType::Disconnect,
            Packet::Auth(_) => PacketType::Auth,
        }
    }

    /// Packet identifier, for the packet types that carry one.
    pub fn packet_id(&self) -> Option<u16> {
        match self {
            Packet::Publish(p) => p.packet_id,
            Packet::PubAck(p) | Packet::PubRec(p) => Some(p.packet_id),
            Packet::PubRel(p) | Packet::PubComp(p) => Some(p.packet_id),
            Packet::Subscribe(p) => Some(p.packet_id),
            Packet::SubAck(p) => Some(p.packet_id),
            Packet::Unsubscribe(p) => Some(p.packet_id),
            Packet::UnsubAck(p) => Some(p.packet_id),
            _ => None,
        }
    }

    /// Encode variable header + payload into `buf`, returning the fixed
    /// header flags.
    pub(crate) fn encode_body(&self, version: ProtocolVersion, buf: &mut Vec<u8>) -> Result<u8> {
        let flags = match self {
            Packet::Connect(p) => {
                p.encode(version, buf)?;
                0
            }
            Packet::Connack(p) => {
                p.encode(version, buf)?;
                0
            }
            Packet::Publish(p) => {
                p.encode(version, buf)?;
                p.flags()
            }
            Packet::PubAck(p) | Packet::PubRec(p) => {
                p.encode(version, buf)?;
                0
            }
            Packet::PubRel(p) => {
                p.encode(version, buf)?;
                0x02
            }
            Packet::PubComp(p) => {
                p.encode(version, buf)?;
                0
            }
            Packet::Subscribe(p) => {
                p.encode(version, buf)?;
                0x02
            }
            Packet::SubAck(p) => {
                p.encode(version, buf)?;
                0
            }
            Packet::Unsubscribe(p) => {
                p.encode(version, buf)?;
                0x02
            }
            Packet::UnsubAck(p) => {
                p.encode(version, buf)?;
                0
            }
            Packet::PingReq | Packet::PingResp => 0,
            Packet::Disconnect(p) => {
                p.encode(version, buf)?;
                0
            }
            Packet::Auth(p) => {
                p.encode(version, buf)?;
                0
            }
        };
        Ok(flags)
    }

    /// Decode the framed body of a packet whose fixed header is `header`.
    /// `body` must be exactly `header.remaining_length` bytes.
    pub(crate) fn decode_body(
        header: &FixedHeader,
        body: &[u8],
        version: ProtocolVersion,
    ) -> Result<Packet> {
        if body.len() != header.remaining_length {
            return Err(ProtocolError::IncompletePacket {
                needed: header.remaining_length,
                have: body.len(),
            }
            .into());
        }

        let mut dec = Decoder::new(body);
        let packet = match header.packet_type {
            PacketType::Connect => Packet::Connect(Connect::decode(&mut dec, version)?),
            PacketType::Connack => Packet::Connack(Connack::decode(&mut dec, version)?),
            PacketType::Publish => {
                Packet::Publish(Publish::decode(header.flags, &mut dec, version)?)
            }
            PacketType::Puback => Packet::PubAck(PubAck::decode(&mut dec, version)?),
            PacketType::Pubrec => Packet::PubRec(PubAck::decode(&mut dec, version)?),
            PacketType::Pubrel => Packet::PubRel(PubRel::decode(&mut dec, version)?),
            PacketType::Pubcomp => Packet::PubComp(PubRel::decode(&mut dec, version)?),
            PacketType::Subscribe => Packet::Subscribe(Subscribe::decode(&mut dec, version)?),
            PacketType::Suback => Packet::SubAck(SubAck::decode(&mut dec, version)?),
            PacketType::Unsubscribe => {
                Packet::Unsubscribe(Unsubscribe::decode(&mut dec, version)?)
            }
            PacketType::Unsuback => Packet::UnsubAck(UnsubAck::decode(&mut dec, version)?),
            PacketType::Pingreq => Packet::PingReq,
            PacketType::Pingresp => Packet::PingResp,
            PacketType::Disconnect => Packet::Disconnect(Disconnect::decode(&mut dec, version)?),
            PacketType::Auth => Packet::Auth(Auth::decode(&mut dec, version)?),
        };

        // Decoding stops exactly at the remaining length
        dec.finish(&format!("{:?}", header.packet_type))?;
        Ok(packet)
    }
}

/// Reject a non-empty property block on 3.1.1.
pub(crate) fn require_no_properties(
    props: &crate::properties::Properties,
    version: ProtocolVersion,
    what: &str,
) -> Result<()> {
    if !version.is_v5() && !props.is_empty() {
        return Err(ProtocolError::unsupported(format!("{} properties on MQTT 3.1.1", what)).into());
    }
    Ok(())
}

/// Topic names (not filters) must not contain wildcards.
pub(crate) fn validate_topic_name(topic: &str) -> Result<()> {
    if topic.contains(['+', '#']) {
        return Err(ProtocolError::violation(format!(
            "topic name {:?} must not contain wildcards",
            topic
        ))
        .into());
    }
    Ok(())
}
