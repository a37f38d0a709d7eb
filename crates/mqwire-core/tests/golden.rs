//! Golden byte fixtures for SUBSCRIBE / SUBACK / UNSUBSCRIBE / UNSUBACK and
//! round trips of every packet variant on both protocol versions.

mod common;

use bytes::Bytes;
use common::*;
use mqwire_core::{
    Auth, AuthReasonCode, Connack, Connect, ConnectReasonCode, Disconnect, DisconnectReasonCode,
    Packet, PropertyId, PropertyValue, ProtocolVersion, PubAck, PubAckReasonCode, PubRel,
    PubRelReasonCode, Publish, QoS, SubAck, SubAckReasonCode, Subscribe, Topic, UnsubAck,
    UnsubAckReasonCode, Unsubscribe, Will,
};

const SUBACK_CODES: [SubAckReasonCode; 3] = [
    SubAckReasonCode::GrantedQos0,
    SubAckReasonCode::GrantedQos1,
    SubAckReasonCode::GrantedQos2,
];

fn sub_topics(n: usize) -> Vec<Topic> {
    TOPICS[..n]
        .iter()
        .zip(TOPIC_QOS)
        .map(|(name, qos)| Topic::new(*name, qos))
        .collect()
}

fn raw_sub_topics(n: usize) -> Vec<u8> {
    let mut out = Vec::new();
    for (name, qos) in TOPICS[..n].iter().zip(TOPIC_QOS) {
        out.extend(string(name));
        out.push(qos as u8);
    }
    out
}

#[test]
fn subscribe_single_topic_v311() {
    let packet = Packet::Subscribe(Subscribe::new(1, vec![Topic::new("a/b", QoS::AtLeastOnce)]));
    assert_golden(
        &packet,
        ProtocolVersion::V311,
        &[0x82, 0x08, 0x00, 0x01, 0x00, 0x03, b'a', b'/', b'b', 0x01],
    );
}

#[test]
fn subscribe_fixtures_v311() {
    for n in 1..=TOPICS.len() {
        let packet_id = n as u16;
        let packet = Packet::Subscribe(Subscribe::new(packet_id, sub_topics(n)));

        let mut body = id(packet_id);
        body.extend(raw_sub_topics(n));
        assert_golden(&packet, ProtocolVersion::V311, &frame(0x82, &body));
    }
}

#[test]
fn subscribe_fixtures_v5() {
    for n in 1..=TOPICS.len() {
        let packet_id = n as u16;
        let mut subscribe = Subscribe::new(packet_id, sub_topics(n));
        subscribe.properties.push_subscription_id(100).unwrap();
        for (k, v) in USER_PROPS {
            subscribe.properties.push_user(k, v);
        }
        let packet = Packet::Subscribe(subscribe);

        let mut props = vec![0x0B, 100];
        props.extend(raw_user_props());
        let mut body = id(packet_id);
        body.extend(property_block(&props));
        body.extend(raw_sub_topics(n));
        assert_golden(&packet, ProtocolVersion::V5, &frame(0x82, &body));
    }
}

#[test]
fn suback_fixtures_v311() {
    for n in 1..=SUBACK_CODES.len() {
        let packet_id = n as u16;
        let packet = Packet::SubAck(SubAck::new(packet_id, SUBACK_CODES[..n].to_vec()));

        let mut body = id(packet_id);
        body.extend(SUBACK_CODES[..n].iter().map(|&c| u8::from(c)));
        assert_golden(&packet, ProtocolVersion::V311, &frame(0x90, &body));
    }
}

#[test]
fn suback_fixtures_v5() {
    for n in 1..=SUBACK_CODES.len() {
        let packet_id = n as u16;
        let mut suback = SubAck::new(packet_id, SUBACK_CODES[..n].to_vec());
        suback.properties = ack_props();
        let packet = Packet::SubAck(suback);

        let mut props = raw_reason_string("MQTT");
        props.extend(raw_user_props());
        let mut body = id(packet_id);
        body.extend(property_block(&props));
        body.extend(SUBACK_CODES[..n].iter().map(|&c| u8::from(c)));
        assert_golden(&packet, ProtocolVersion::V5, &frame(0x90, &body));
    }
}

#[test]
fn suback_codes_keep_request_order() {
    let request = Subscribe::new(
        7,
        vec![
            Topic::new("A", QoS::AtLeastOnce),
            Topic::new("B", QoS::ExactlyOnce),
        ],
    );

    let packet = decode(&[0x90, 0x04, 0x00, 0x07, 0x01, 0x02], ProtocolVersion::V311).unwrap();
    let suback = match packet {
        Packet::SubAck(suback) => suback,
        other => panic!("expected SUBACK, got {:?}", other),
    };
    let codes: Vec<u8> = suback.reason_codes.iter().map(|&c| u8::from(c)).collect();
    assert_eq!(codes, vec![1, 2]);
    assert_eq!(suback.reason_codes.len(), request.topics.len());
}

#[test]
fn unsubscribe_fixtures() {
    for n in 1..=TOPICS.len() {
        let packet_id = n as u16;
        let topics: Vec<String> = TOPICS[..n].iter().map(|t| t.to_string()).collect();

        let mut raw_topics = Vec::new();
        for t in &TOPICS[..n] {
            raw_topics.extend(string(t));
        }

        let packet = Packet::Unsubscribe(Unsubscribe::new(packet_id, topics.clone()));
        let mut body = id(packet_id);
        body.extend(&raw_topics);
        assert_golden(&packet, ProtocolVersion::V311, &frame(0xA2, &body));

        let mut unsubscribe = Unsubscribe::new(packet_id, topics);
        unsubscribe.properties = user_props();
        let packet = Packet::Unsubscribe(unsubscribe);
        let mut body = id(packet_id);
        body.extend(property_block(&raw_user_props()));
        body.extend(&raw_topics);
        assert_golden(&packet, ProtocolVersion::V5, &frame(0xA2, &body));
    }
}

#[test]
fn unsuback_fixtures() {
    let packet = Packet::UnsubAck(UnsubAck::new(1, Vec::new()));
    assert_golden(&packet, ProtocolVersion::V311, &[0xB0, 0x02, 0x00, 0x01]);

    let mut unsuback = UnsubAck::new(1, vec![UnsubAckReasonCode::Success]);
    unsuback.properties = ack_props();
    let packet = Packet::UnsubAck(unsuback);

    let mut props = raw_reason_string("MQTT");
    props.extend(raw_user_props());
    let mut body = id(1);
    body.extend(property_block(&props));
    body.push(0x00);
    assert_golden(&packet, ProtocolVersion::V5, &frame(0xB0, &body));
}

#[test]
fn subscribe_requires_topics() {
    for version in BOTH {
        assert_violation(
            mqwire_core::encode_packet(&Packet::Subscribe(Subscribe::new(1, Vec::new())), version),
        );
        assert_violation(mqwire_core::encode_packet(
            &Packet::Unsubscribe(Unsubscribe::new(1, Vec::new())),
            version,
        ));
    }
    assert_violation(decode(&[0x82, 0x02, 0x00, 0x01], ProtocolVersion::V311));
    assert_violation(decode(&[0x82, 0x03, 0x00, 0x01, 0x00], ProtocolVersion::V5));
}

#[test]
fn zero_packet_id_is_rejected() {
    let packets = vec![
        Packet::Publish(Publish::with_qos("t", Bytes::new(), QoS::AtLeastOnce, 0)),
        Packet::PubAck(PubAck::new(0)),
        Packet::PubRec(PubAck::new(0)),
        Packet::PubRel(PubRel::new(0)),
        Packet::PubComp(PubRel::new(0)),
        Packet::Subscribe(Subscribe::new(0, sub_topics(1))),
        Packet::SubAck(SubAck::new(0, vec![SubAckReasonCode::GrantedQos0])),
        Packet::Unsubscribe(Unsubscribe::new(0, vec!["t".into()])),
        Packet::UnsubAck(UnsubAck::new(0, Vec::new())),
    ];
    for packet in &packets {
        assert_violation(mqwire_core::encode_packet(packet, ProtocolVersion::V311));
    }

    let wire: [&[u8]; 6] = [
        &[0x40, 0x02, 0x00, 0x00],
        &[0x62, 0x02, 0x00, 0x00],
        &[0x82, 0x06, 0x00, 0x00, 0x00, 0x01, b't', 0x00],
        &[0x90, 0x03, 0x00, 0x00, 0x00],
        &[0xA2, 0x05, 0x00, 0x00, 0x00, 0x01, b't'],
        &[0xB0, 0x02, 0x00, 0x00],
    ];
    for bytes in wire {
        assert_violation(decode(bytes, ProtocolVersion::V311));
    }
}

#[test]
fn trailing_and_missing_bytes_are_malformed() {
    // PINGRESP with a body byte
    assert_malformed(decode(&[0xD0, 0x01, 0x00], ProtocolVersion::V5));
    // SUBSCRIBE whose topic string runs past the remaining length
    assert_malformed(decode(
        &[0x82, 0x05, 0x00, 0x01, 0x00, 0x02, b'a'],
        ProtocolVersion::V311,
    ));
    // PUBACK with a truncated property block
    assert_malformed(decode(
        &[0x40, 0x05, 0x00, 0x01, 0x00, 0x05, 0x1F],
        ProtocolVersion::V5,
    ));
    // Variable byte integer with a fifth byte
    assert_malformed(decode(
        &[0x30, 0x80, 0x80, 0x80, 0x80, 0x01],
        ProtocolVersion::V311,
    ));
}

fn every_variant(version: ProtocolVersion) -> Vec<Packet> {
    let v5 = version.is_v5();

    let mut connect = Connect {
        keep_alive: 15,
        username: Some("user".into()),
        password: Some(Bytes::from_static(b"pass")),
        will: Some(Will::new(
            "status/offline",
            Bytes::from_static(b"bye"),
            QoS::ExactlyOnce,
        )),
        ..Connect::new("fixture")
    };
    let mut connack = Connack::new(true, ConnectReasonCode::Success);
    let mut publish = Publish::with_qos("a/b", Bytes::from_static(b"payload"), QoS::ExactlyOnce, 9);
    let mut puback = PubAck::new(1);
    let mut pubrec = PubAck::new(2);
    let mut pubrel = PubRel::new(3);
    let mut pubcomp = PubRel::new(4);
    let mut subscribe = Subscribe::new(5, sub_topics(3));
    let mut suback = SubAck::new(5, SUBACK_CODES.to_vec());
    let mut unsubscribe = Unsubscribe::new(6, vec!["a/+".into(), "#".into()]);
    let mut unsuback = UnsubAck::new(6, Vec::new());
    let mut disconnect = Disconnect::default();

    if v5 {
        connect.properties = user_props();
        connect
            .properties
            .push(PropertyId::ReceiveMaximum, PropertyValue::TwoByteInt(20))
            .unwrap();
        connack.properties = ack_props();
        publish.properties = user_props();
        publish
            .properties
            .push(PropertyId::MessageExpiryInterval, PropertyValue::FourByteInt(60))
            .unwrap();
        puback = PubAck::with_reason(1, PubAckReasonCode::NoMatchingSubscribers);
        pubrec.properties = ack_props();
        pubrel = PubRel::with_reason(3, PubRelReasonCode::PacketIdentifierNotFound);
        pubcomp.properties = ack_props();
        subscribe.properties.push_subscription_id(100).unwrap();
        suback.properties = ack_props();
        unsubscribe.properties = user_props();
        unsuback = UnsubAck::new(
            6,
            vec![
                UnsubAckReasonCode::Success,
                UnsubAckReasonCode::NoSubscriptionExisted,
            ],
        );
        disconnect = Disconnect::new(DisconnectReasonCode::DisconnectWithWillMessage);
        disconnect.properties = user_props();
    }

    let mut packets = vec![
        Packet::Connect(connect),
        Packet::Connack(connack),
        Packet::Publish(publish),
        Packet::PubAck(puback),
        Packet::PubRec(pubrec),
        Packet::PubRel(pubrel),
        Packet::PubComp(pubcomp),
        Packet::Subscribe(subscribe),
        Packet::SubAck(suback),
        Packet::Unsubscribe(unsubscribe),
        Packet::UnsubAck(unsuback),
        Packet::PingReq,
        Packet::PingResp,
        Packet::Disconnect(disconnect),
    ];
    if v5 {
        let mut auth = Auth::new(AuthReasonCode::ReAuthenticate);
        auth.properties
            .push(
                PropertyId::AuthenticationMethod,
                PropertyValue::Utf8("PLAIN".into()),
            )
            .unwrap();
        packets.push(Packet::Auth(auth));
    }
    packets
}

#[test]
fn every_variant_roundtrips() {
    for version in BOTH {
        for packet in every_variant(version) {
            let bytes = encode(&packet, version);
            assert_eq!(decode(&bytes, version).unwrap(), packet, "{:?}", version);
        }
    }
}

#[test]
fn stream_of_packets_decodes_in_order() {
    let version = ProtocolVersion::V5;
    let packets = every_variant(version);
    let mut stream = Vec::new();
    for packet in &packets {
        stream.extend(encode(packet, version));
    }

    let codec = mqwire_core::Codec::new(version);
    let mut offset = 0;
    let mut decoded = Vec::new();
    while let Some((packet, used)) = codec.decode(&stream[offset..]).unwrap() {
        decoded.push(packet);
        offset += used;
    }
    assert_eq!(offset, stream.len());
    assert_eq!(decoded, packets);
}
