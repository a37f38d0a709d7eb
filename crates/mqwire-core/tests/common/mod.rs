//! Shared fixtures for the golden byte tests.
//!
//! Expected bytes are assembled field by field from the MQTT packet layouts,
//! independently of the crate's own encoder.

#![allow(dead_code)]

use mqwire_core::{
    varint, Codec, Error, Packet, Properties, PropertyId, PropertyValue, ProtocolError,
    ProtocolVersion, QoS,
};

pub const TOPICS: [&str; 3] = ["/test", "/test/foo", "/test/bar"];
pub const TOPIC_QOS: [QoS; 3] = [QoS::AtMostOnce, QoS::AtLeastOnce, QoS::ExactlyOnce];
pub const USER_PROPS: [(&str, &str); 2] = [("hello", "world"), ("foo", "bar")];

pub const BOTH: [ProtocolVersion; 2] = [ProtocolVersion::V311, ProtocolVersion::V5];

/// u16 length-prefixed UTF-8 string.
pub fn string(s: &str) -> Vec<u8> {
    let mut out = (s.len() as u16).to_be_bytes().to_vec();
    out.extend_from_slice(s.as_bytes());
    out
}

pub fn id(packet_id: u16) -> Vec<u8> {
    packet_id.to_be_bytes().to_vec()
}

/// Fixed header byte plus remaining length, followed by `body`.
pub fn frame(first_byte: u8, body: &[u8]) -> Vec<u8> {
    let mut out = vec![first_byte];
    varint::encode_to_vec(body.len() as u32, &mut out).unwrap();
    out.extend_from_slice(body);
    out
}

/// Property block: length prefix then raw (id, value) bytes.
pub fn property_block(raw: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    varint::encode_to_vec(raw.len() as u32, &mut out).unwrap();
    out.extend_from_slice(raw);
    out
}

pub fn raw_user_props() -> Vec<u8> {
    let mut out = Vec::new();
    for (k, v) in USER_PROPS {
        out.push(0x26);
        out.extend(string(k));
        out.extend(string(v));
    }
    out
}

pub fn raw_reason_string(reason: &str) -> Vec<u8> {
    let mut out = vec![0x1F];
    out.extend(string(reason));
    out
}

pub fn user_props() -> Properties {
    let mut props = Properties::new();
    for (k, v) in USER_PROPS {
        props.push_user(k, v);
    }
    props
}

/// Reason string "MQTT" followed by the fixture user properties.
pub fn ack_props() -> Properties {
    let mut props = Properties::new()
        .with(PropertyId::ReasonString, PropertyValue::Utf8("MQTT".into()))
        .unwrap();
    for (k, v) in USER_PROPS {
        props.push_user(k, v);
    }
    props
}

pub fn encode(packet: &Packet, version: ProtocolVersion) -> Vec<u8> {
    Codec::new(version).encode(packet).unwrap().to_vec()
}

pub fn decode(bytes: &[u8], version: ProtocolVersion) -> Result<Packet, Error> {
    let (packet, used) = Codec::new(version)
        .decode(bytes)?
        .expect("complete packet");
    assert_eq!(used, bytes.len(), "decoder must consume the whole frame");
    Ok(packet)
}

/// Encode, compare to `expected`, then decode back to `packet`.
pub fn assert_golden(packet: &Packet, version: ProtocolVersion, expected: &[u8]) {
    let bytes = encode(packet, version);
    assert_eq!(bytes, expected, "{:?} encoding of {:?}", version, packet);
    assert_eq!(&decode(&bytes, version).unwrap(), packet);
}

pub fn assert_violation(result: Result<impl std::fmt::Debug, Error>) {
    match result {
        Err(Error::Protocol(ProtocolError::ProtocolViolation(_))) => {}
        other => panic!("expected ProtocolViolation, got {:?}", other),
    }
}

pub fn assert_malformed(result: Result<impl std::fmt::Debug, Error>) {
    match result {
        Err(Error::Protocol(e)) if e.is_malformed() => {}
        other => panic!("expected a malformed packet error, got {:?}", other),
    }
}
