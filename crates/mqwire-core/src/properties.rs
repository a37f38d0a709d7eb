//! MQTT v5 property lists.
//!
//! A property block is a Variable Byte Integer length followed by
//! `(identifier, value)` pairs. Each identifier has a fixed value encoding
//! and is only valid on certain packets; most may appear once, User
//! Property (and Subscription Identifier on PUBLISH) may repeat.

use bytes::Bytes;

use crate::error::{ProtocolError, Result};
use crate::varint;
use crate::wire::{self, Decoder};

/// Wire encoding of a property value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Byte,
    TwoByteInt,
    FourByteInt,
    VarInt,
    Utf8,
    Utf8Pair,
    Binary,
}

/// Where a property block appears. PUBACK, PUBREC, PUBREL and PUBCOMP
/// share one allowed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyContext {
    Connect,
    Will,
    Connack,
    Publish,
    PubAck,
    Subscribe,
    SubAck,
    Unsubscribe,
    UnsubAck,
    Disconnect,
    Auth,
}

/// MQTT v5 property identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PropertyId {
    PayloadFormatIndicator = 0x01,
    MessageExpiryInterval = 0x02,
    ContentType = 0x03,
    ResponseTopic = 0x08,
    CorrelationData = 0x09,
    SubscriptionIdentifier = 0x0B,
    SessionExpiryInterval = 0x11,
    AssignedClientIdentifier = 0x12,
    ServerKeepAlive = 0x13,
    AuthenticationMethod = 0x15,
    AuthenticationData = 0x16,
    RequestProblemInformation = 0x17,
    WillDelayInterval = 0x18,
    RequestResponseInformation = 0x19,
    ResponseInformation = 0x1A,
    ServerReference = 0x1C,
    ReasonString = 0x1F,
    ReceiveMaximum = 0x21,
    TopicAliasMaximum = 0x22,
    TopicAlias = 0x23,
    MaximumQos = 0x24,
    RetainAvailable = 0x25,
    UserProperty = 0x26,
    MaximumPacketSize = 0x27,
    WildcardSubscriptionAvailable = 0x28,
    SubscriptionIdentifierAvailable = 0x29,
    SharedSubscriptionAvailable = 0x2A,
}

impl TryFrom<u32> for PropertyId {
    type Error = ProtocolError;

    fn try_from(value: u32) -> std::result::Result<Self, Self::Error> {
        use PropertyId::*;
        let id = match value {
            0x01 => PayloadFormatIndicator,
            0x02 => MessageExpiryInterval,
            0x03 => ContentType,
            0x08 => ResponseTopic,
            0x09 => CorrelationData,
            0x0B => SubscriptionIdentifier,
            0x11 => SessionExpiryInterval,
            0x12 => AssignedClientIdentifier,
            0x13 => ServerKeepAlive,
            0x15 => AuthenticationMethod,
            0x16 => AuthenticationData,
            0x17 => RequestProblemInformation,
            0x18 => WillDelayInterval,
            0x19 => RequestResponseInformation,
            0x1A => ResponseInformation,
            0x1C => ServerReference,
            0x1F => ReasonString,
            0x21 => ReceiveMaximum,
            0x22 => TopicAliasMaximum,
            0x23 => TopicAlias,
            0x24 => MaximumQos,
            0x25 => RetainAvailable,
            0x26 => UserProperty,
            0x27 => MaximumPacketSize,
            0x28 => WildcardSubscriptionAvailable,
            0x29 => SubscriptionIdentifierAvailable,
            0x2A => SharedSubscriptionAvailable,
            _ => {
                return Err(ProtocolError::violation(format!(
                    "unknown property identifier: {:#04x}",
                    value
                )))
            }
        };
        Ok(id)
    }
}

impl PropertyId {
    pub fn value_type(self) -> ValueType {
        use PropertyId::*;
        match self {
            PayloadFormatIndicator
            | RequestProblemInformation
            | RequestResponseInformation
            | MaximumQos
            | RetainAvailable
            | WildcardSubscriptionAvailable
            | SubscriptionIdentifierAvailable
            | SharedSubscriptionAvailable => ValueType::Byte,
            ServerKeepAlive | ReceiveMaximum | TopicAliasMaximum | TopicAlias => {
                ValueType::TwoByteInt
            }
            MessageExpiryInterval
            | SessionExpiryInterval
            | WillDelayInterval
            | MaximumPacketSize => ValueType::FourByteInt,
            SubscriptionIdentifier => ValueType::VarInt,
            ContentType
            | ResponseTopic
            | AssignedClientIdentifier
            | AuthenticationMethod
            | ResponseInformation
            | ServerReference
            | ReasonString => ValueType::Utf8,
            CorrelationData | AuthenticationData => ValueType::Binary,
            UserProperty => ValueType::Utf8Pair,
        }
    }

    /// Allowed-identifier table (MQTT 5.0 section 2.2.2.2).
    pub fn allowed_in(self, ctx: PropertyContext) -> bool {
        use PropertyContext as C;
        use PropertyId::*;
        match self {
            PayloadFormatIndicator
            | MessageExpiryInterval
            | ContentType
            | ResponseTopic
            | CorrelationData => matches!(ctx, C::Publish | C::Will),
            SubscriptionIdentifier => matches!(ctx, C::Publish | C::Subscribe),
            SessionExpiryInterval => matches!(ctx, C::Connect | C::Connack | C::Disconnect),
            AssignedClientIdentifier | ServerKeepAlive | ResponseInformation => {
                ctx == C::Connack
            }
            AuthenticationMethod | AuthenticationData => {
                matches!(ctx, C::Connect | C::Connack | C::Auth)
            }
            RequestProblemInformation | RequestResponseInformation => ctx == C::Connect,
            WillDelayInterval => ctx == C::Will,
            ServerReference => matches!(ctx, C::Connack | C::Disconnect),
            ReasonString => matches!(
                ctx,
                C::Connack | C::PubAck | C::SubAck | C::UnsubAck | C::Disconnect | C::Auth
            ),
            ReceiveMaximum | TopicAliasMaximum | MaximumPacketSize => {
                matches!(ctx, C::Connect | C::Connack)
            }
            TopicAlias => ctx == C::Publish,
            MaximumQos
            | RetainAvailable
            | WildcardSubscriptionAvailable
            | SubscriptionIdentifierAvailable
            | SharedSubscriptionAvailable => ctx == C::Connack,
            UserProperty => true,
        }
    }

    /// Whether the identifier may appear more than once in `ctx`.
    pub fn repeatable_in(self, ctx: PropertyContext) -> bool {
        match self {
            PropertyId::UserProperty => true,
            PropertyId::SubscriptionIdentifier => ctx == PropertyContext::Publish,
            _ => false,
        }
    }
}

/// A typed property value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyValue {
    Byte(u8),
    TwoByteInt(u16),
    FourByteInt(u32),
    VarInt(u32),
    Utf8(String),
    Utf8Pair(String, String),
    Binary(Bytes),
}

impl PropertyValue {
    pub fn value_type(&self) -> ValueType {
        match self {
            PropertyValue::Byte(_) => ValueType::Byte,
            PropertyValue::TwoByteInt(_) => ValueType::TwoByteInt,
            PropertyValue::FourByteInt(_) => ValueType::FourByteInt,
            PropertyValue::VarInt(_) => ValueType::VarInt,
            PropertyValue::Utf8(_) => ValueType::Utf8,
            PropertyValue::Utf8Pair(_, _) => ValueType::Utf8Pair,
            PropertyValue::Binary(_) => ValueType::Binary,
        }
    }
}

/// Ordered property list, kept in encounter order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Properties {
    entries: Vec<(PropertyId, PropertyValue)>,
}

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(PropertyId, PropertyValue)> {
        self.entries.iter()
    }

    /// Append a property.
    ///
    /// Fails if the value encoding does not match the identifier, the value
    /// is outside its allowed domain, or a singular identifier is already
    /// present. Subscription Identifier is treated as singular here; use
    /// [`Properties::push_subscription_id`] on PUBLISH.
    pub fn push(&mut self, id: PropertyId, value: PropertyValue) -> Result<()> {
        check_value(id, &value)?;
        if id != PropertyId::UserProperty && self.contains(id) {
            return Err(ProtocolError::violation(format!("duplicate property {:?}", id)).into());
        }
        self.entries.push((id, value));
        Ok(())
    }

    /// Builder form of [`Properties::push`].
    pub fn with(mut self, id: PropertyId, value: PropertyValue) -> Result<Self> {
        self.push(id, value)?;
        Ok(self)
    }

    /// Append a User Property (always repeatable).
    pub fn push_user(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.push((
            PropertyId::UserProperty,
            PropertyValue::Utf8Pair(key.into(), value.into()),
        ));
    }

    /// Append a Subscription Identifier, which PUBLISH may carry repeatedly.
    pub fn push_subscription_id(&mut self, id: u32) -> Result<()> {
        let value = PropertyValue::VarInt(id);
        check_value(PropertyId::SubscriptionIdentifier, &value)?;
        self.entries.push((PropertyId::SubscriptionIdentifier, value));
        Ok(())
    }

    pub fn contains(&self, id: PropertyId) -> bool {
        self.entries.iter().any(|(pid, _)| *pid == id)
    }

    /// First value for `id`.
    pub fn get(&self, id: PropertyId) -> Option<&PropertyValue> {
        self.entries
            .iter()
            .find(|(pid, _)| *pid == id)
            .map(|(_, v)| v)
    }

    /// Every value for `id`, in encounter order.
    pub fn get_all(&self, id: PropertyId) -> impl Iterator<Item = &PropertyValue> {
        self.entries
            .iter()
            .filter(move |(pid, _)| *pid == id)
            .map(|(_, v)| v)
    }

    pub fn get_u8(&self, id: PropertyId) -> Option<u8> {
        match self.get(id)? {
            PropertyValue::Byte(v) => Some(*v),
            _ => None,
        }
    }

    pub fn get_u16(&self, id: PropertyId) -> Option<u16> {
        match self.get(id)? {
            PropertyValue::TwoByteInt(v) => Some(*v),
            _ => None,
        }
    }

    /// Four-byte or variable byte integer value.
    pub fn get_u32(&self, id: PropertyId) -> Option<u32> {
        match self.get(id)? {
            PropertyValue::FourByteInt(v) | PropertyValue::VarInt(v) => Some(*v),
            _ => None,
        }
    }

    pub fn get_str(&self, id: PropertyId) -> Option<&str> {
        match self.get(id)? {
            PropertyValue::Utf8(v) => Some(v.as_str()),
            _ => None,
        }
    }

    pub fn get_binary(&self, id: PropertyId) -> Option<&Bytes> {
        match self.get(id)? {
            PropertyValue::Binary(v) => Some(v),
            _ => None,
        }
    }

    pub fn reason_string(&self) -> Option<&str> {
        self.get_str(PropertyId::ReasonString)
    }

    pub fn user_properties(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().filter_map(|(_, v)| match v {
            PropertyValue::Utf8Pair(k, v) => Some((k.as_str(), v.as_str())),
            _ => None,
        })
    }

    /// Encode as length-prefixed block, validating against `ctx`.
    pub(crate) fn encode(&self, ctx: PropertyContext, buf: &mut Vec<u8>) -> Result<()> {
        let mut body = Vec::new();
        for (index, (id, value)) in self.entries.iter().enumerate() {
            if !id.allowed_in(ctx) {
                return Err(ProtocolError::violation(format!(
                    "property {:?} not allowed in {:?}",
                    id, ctx
                ))
                .into());
            }
            if !id.repeatable_in(ctx) && self.entries[..index].iter().any(|(p, _)| p == id) {
                return Err(
                    ProtocolError::violation(format!("duplicate property {:?}", id)).into(),
                );
            }
            check_value(*id, value)?;
            varint::encode_to_vec(*id as u32, &mut body)?;
            encode_value(value, &mut body)?;
        }
        varint::encode_len(body.len(), buf)?;
        buf.extend_from_slice(&body);
        Ok(())
    }

    /// Decode a length-prefixed block, validating against `ctx`.
    pub(crate) fn decode(dec: &mut Decoder<'_>, ctx: PropertyContext) -> Result<Self> {
        let len = dec.read_variable_byte_integer()? as usize;
        let mut block = dec.sub(len).map_err(|_| {
            ProtocolError::malformed(format!("property length {} exceeds packet", len))
        })?;
        let mut props = Properties::new();

        while block.has_remaining() {
            let raw = block.read_variable_byte_integer()?;
            let id = PropertyId::try_from(raw)?;
            if !id.allowed_in(ctx) {
                return Err(ProtocolError::violation(format!(
                    "property {:?} not allowed in {:?}",
                    id, ctx
                ))
                .into());
            }
            if !id.repeatable_in(ctx) && props.contains(id) {
                return Err(
                    ProtocolError::violation(format!("duplicate property {:?}", id)).into(),
                );
            }
            let value = decode_value(id.value_type(), &mut block)?;
            check_value(id, &value)?;
            props.entries.push((id, value));
        }

        Ok(props)
    }
}

fn encode_value(value: &PropertyValue, buf: &mut Vec<u8>) -> Result<()> {
    match value {
        PropertyValue::Byte(v) => buf.push(*v),
        PropertyValue::TwoByteInt(v) => wire::write_u16(*v, buf),
        PropertyValue::FourByteInt(v) => wire::write_u32(*v, buf),
        PropertyValue::VarInt(v) => {
            varint::encode_to_vec(*v, buf)?;
        }
        PropertyValue::Utf8(v) => wire::write_string(v, buf)?,
        PropertyValue::Utf8Pair(k, v) => {
            wire::write_string(k, buf)?;
            wire::write_string(v, buf)?;
        }
        PropertyValue::Binary(v) => wire::write_binary(v, buf)?,
    }
    Ok(())
}

fn decode_value(ty: ValueType, dec: &mut Decoder<'_>) -> Result<PropertyValue> {
    let value = match ty {
        ValueType::Byte => PropertyValue::Byte(dec.read_u8()?),
        ValueType::TwoByteInt => PropertyValue::TwoByteInt(dec.read_u16()?),
        ValueType::FourByteInt => PropertyValue::FourByteInt(dec.read_u32()?),
        ValueType::VarInt => PropertyValue::VarInt(dec.read_variable_byte_integer()?),
        ValueType::Utf8 => PropertyValue::Utf8(dec.read_string()?),
        ValueType::Utf8Pair => {
            let key = dec.read_string()?;
            let value = dec.read_string()?;
            PropertyValue::Utf8Pair(key, value)
        }
        ValueType::Binary => PropertyValue::Binary(dec.read_binary()?),
    };
    Ok(value)
}

/// Check encoding kind and value domain for `id`.
fn check_value(id: PropertyId, value: &PropertyValue) -> Result<()> {
    if value.value_type() != id.value_type() {
        return Err(ProtocolError::violation(format!(
            "property {:?} expects {:?}, got {:?}",
            id,
            id.value_type(),
            value.value_type()
        ))
        .into());
    }

    use PropertyId::*;
    let valid = match (id, value) {
        (
            PayloadFormatIndicator
            | RequestProblemInformation
            | RequestResponseInformation
            | MaximumQos
            | RetainAvailable
            | WildcardSubscriptionAvailable
            | SubscriptionIdentifierAvailable
            | SharedSubscriptionAvailable,
            PropertyValue::Byte(v),
        ) => *v <= 1,
        (ReceiveMaximum | TopicAlias, PropertyValue::TwoByteInt(v)) => *v != 0,
        (MaximumPacketSize, PropertyValue::FourByteInt(v)) => *v != 0,
        (SubscriptionIdentifier, PropertyValue::VarInt(v)) => *v != 0 && *v <= varint::MAX_VALUE,
        _ => true,
    };
    if !valid {
        return Err(ProtocolError::violation(format!("invalid value for property {:?}", id)).into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn encode(props: &Properties, ctx: PropertyContext) -> Vec<u8> {
        let mut buf = Vec::new();
        props.encode(ctx, &mut buf).unwrap();
        buf
    }

    fn decode(bytes: &[u8], ctx: PropertyContext) -> Result<Properties> {
        let mut dec = Decoder::new(bytes);
        let props = Properties::decode(&mut dec, ctx)?;
        dec.finish("properties")?;
        Ok(props)
    }

    fn is_violation(err: Error) -> bool {
        matches!(err, Error::Protocol(ProtocolError::ProtocolViolation(_)))
    }

    #[test]
    fn test_empty_block() {
        let props = Properties::new();
        assert_eq!(encode(&props, PropertyContext::Connect), vec![0x00]);
        assert!(decode(&[0x00], PropertyContext::Connect).unwrap().is_empty());
    }

    #[test]
    fn test_encode_preserves_order() {
        let mut props = Properties::new();
        props.push_user("k", "v");
        props
            .push(PropertyId::SessionExpiryInterval, PropertyValue::FourByteInt(10))
            .unwrap();
        let bytes = encode(&props, PropertyContext::Connect);
        assert_eq!(
            bytes,
            vec![
                0x0C, // block length
                0x26, 0x00, 0x01, b'k', 0x00, 0x01, b'v', // user property
                0x11, 0x00, 0x00, 0x00, 0x0A, // session expiry
            ]
        );
        let decoded = decode(&bytes, PropertyContext::Connect).unwrap();
        assert_eq!(decoded, props);
    }

    #[test]
    fn test_all_value_types_roundtrip() {
        let mut props = Properties::new();
        props
            .push(PropertyId::PayloadFormatIndicator, PropertyValue::Byte(1))
            .unwrap();
        props
            .push(PropertyId::TopicAlias, PropertyValue::TwoByteInt(7))
            .unwrap();
        props
            .push(PropertyId::MessageExpiryInterval, PropertyValue::FourByteInt(3600))
            .unwrap();
        props.push_subscription_id(200_000).unwrap();
        props.push_subscription_id(3).unwrap();
        props
            .push(PropertyId::ContentType, PropertyValue::Utf8("text/plain".into()))
            .unwrap();
        props
            .push(
                PropertyId::CorrelationData,
                PropertyValue::Binary(Bytes::from_static(&[1, 2, 3])),
            )
            .unwrap();
        props.push_user("a", "b");
        props.push_user("a", "c");

        let bytes = encode(&props, PropertyContext::Publish);
        let decoded = decode(&bytes, PropertyContext::Publish).unwrap();
        assert_eq!(decoded, props);
        assert_eq!(decoded.get_u16(PropertyId::TopicAlias), Some(7));
        assert_eq!(decoded.get_u32(PropertyId::SubscriptionIdentifier), Some(200_000));
        assert_eq!(decoded.get_all(PropertyId::SubscriptionIdentifier).count(), 2);
        assert_eq!(
            decoded.user_properties().collect::<Vec<_>>(),
            vec![("a", "b"), ("a", "c")]
        );
    }

    #[test]
    fn test_identifier_not_allowed_in_context() {
        // Topic Alias (0x23) in a SUBACK block
        let err = decode(&[0x03, 0x23, 0x00, 0x01], PropertyContext::SubAck).unwrap_err();
        assert!(is_violation(err));

        let props = Properties::new()
            .with(PropertyId::TopicAlias, PropertyValue::TwoByteInt(1))
            .unwrap();
        let mut buf = Vec::new();
        assert!(is_violation(
            props.encode(PropertyContext::SubAck, &mut buf).unwrap_err()
        ));
    }

    #[test]
    fn test_unknown_identifier() {
        let err = decode(&[0x02, 0x7F, 0x00], PropertyContext::Connect).unwrap_err();
        assert!(is_violation(err));
    }

    #[test]
    fn test_duplicate_singular_property() {
        let bytes = [0x06, 0x1F, 0x00, 0x00, 0x1F, 0x00, 0x00];
        let err = decode(&bytes, PropertyContext::SubAck).unwrap_err();
        assert!(is_violation(err));

        let mut props = Properties::new();
        props
            .push(PropertyId::ReasonString, PropertyValue::Utf8("a".into()))
            .unwrap();
        assert!(is_violation(
            props
                .push(PropertyId::ReasonString, PropertyValue::Utf8("b".into()))
                .unwrap_err()
        ));
    }

    #[test]
    fn test_subscription_id_singular_in_subscribe() {
        let bytes = [0x04, 0x0B, 0x01, 0x0B, 0x02];
        assert!(is_violation(
            decode(&bytes, PropertyContext::Subscribe).unwrap_err()
        ));
        assert_eq!(
            decode(&bytes, PropertyContext::Publish).unwrap().len(),
            2
        );
    }

    #[test]
    fn test_wrong_value_type_rejected() {
        let mut props = Properties::new();
        let err = props
            .push(PropertyId::SessionExpiryInterval, PropertyValue::TwoByteInt(5))
            .unwrap_err();
        assert!(is_violation(err));
        assert!(props.is_empty());
    }

    #[test]
    fn test_value_domain() {
        // Payload Format Indicator must be 0 or 1
        assert!(is_violation(
            decode(&[0x02, 0x01, 0x02], PropertyContext::Publish).unwrap_err()
        ));
        // Receive Maximum of zero
        assert!(is_violation(
            decode(&[0x03, 0x21, 0x00, 0x00], PropertyContext::Connect).unwrap_err()
        ));
        // Subscription Identifier of zero
        let mut props = Properties::new();
        assert!(props.push_subscription_id(0).is_err());
    }

    #[test]
    fn test_truncated_value_is_malformed() {
        // Claims 3 bytes but Session Expiry needs 4 after the id
        let err = decode(&[0x03, 0x11, 0x00, 0x00], PropertyContext::Connect).unwrap_err();
        assert!(err.protocol().is_some_and(|e| e.is_malformed()));
    }

    #[test]
    fn test_block_longer_than_packet_is_malformed() {
        let err = decode(&[0x05, 0x11, 0x00], PropertyContext::Connect).unwrap_err();
        assert!(err.protocol().is_some_and(|e| e.is_malformed()));
    }
}
