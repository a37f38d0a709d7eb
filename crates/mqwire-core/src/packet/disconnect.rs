//! DISCONNECT and AUTH.
//!
//! On 5.0 both carry an optional reason code and an optional property
//! block. An empty body means Success / Normal Disconnection.

use crate::error::{ProtocolError, Result};
use crate::properties::{Properties, PropertyContext};
use crate::wire::Decoder;

use super::{AuthReasonCode, DisconnectReasonCode, ProtocolVersion};

/// DISCONNECT packet data.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Disconnect {
    pub reason_code: DisconnectReasonCode,
    pub properties: Properties,
}

impl Disconnect {
    pub fn new(reason_code: DisconnectReasonCode) -> Self {
        Self {
            reason_code,
            properties: Properties::new(),
        }
    }

    pub(crate) fn encode(&self, version: ProtocolVersion, buf: &mut Vec<u8>) -> Result<()> {
        if !version.is_v5() {
            if self.reason_code != DisconnectReasonCode::NormalDisconnection
                || !self.properties.is_empty()
            {
                return Err(ProtocolError::unsupported(
                    "DISCONNECT reason code or properties on MQTT 3.1.1",
                )
                .into());
            }
            return Ok(());
        }
        encode_tail(
            self.reason_code.into(),
            self.reason_code == DisconnectReasonCode::NormalDisconnection,
            &self.properties,
            PropertyContext::Disconnect,
            buf,
        )
    }

    pub(crate) fn decode(dec: &mut Decoder<'_>, version: ProtocolVersion) -> Result<Self> {
        if !version.is_v5() {
            return Ok(Disconnect::default());
        }
        let (reason_code, properties) = decode_tail(dec, PropertyContext::Disconnect)?;
        Ok(Disconnect {
            reason_code,
            properties,
        })
    }
}

/// AUTH packet data (MQTT 5.0 only). Authentication data stays opaque.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Auth {
    pub reason_code: AuthReasonCode,
    pub properties: Properties,
}

impl Auth {
    pub fn new(reason_code: AuthReasonCode) -> Self {
        Self {
            reason_code,
            properties: Properties::new(),
        }
    }

    pub(crate) fn encode(&self, version: ProtocolVersion, buf: &mut Vec<u8>) -> Result<()> {
        if !version.is_v5() {
            return Err(ProtocolError::unsupported("AUTH on MQTT 3.1.1").into());
        }
        encode_tail(
            self.reason_code.into(),
            self.reason_code == AuthReasonCode::Success,
            &self.properties,
            PropertyContext::Auth,
            buf,
        )
    }

    pub(crate) fn decode(dec: &mut Decoder<'_>, version: ProtocolVersion) -> Result<Self> {
        if !version.is_v5() {
            return Err(ProtocolError::unsupported("AUTH on MQTT 3.1.1").into());
        }
        let (reason_code, properties) = decode_tail(dec, PropertyContext::Auth)?;
        Ok(Auth {
            reason_code,
            properties,
        })
    }
}

fn encode_tail(
    code: u8,
    success: bool,
    properties: &Properties,
    ctx: PropertyContext,
    buf: &mut Vec<u8>,
) -> Result<()> {
    if success && properties.is_empty() {
        return Ok(());
    }
    buf.push(code);
    if !properties.is_empty() {
        properties.encode(ctx, buf)?;
    }
    Ok(())
}

fn decode_tail<R>(dec: &mut Decoder<'_>, ctx: PropertyContext) -> Result<(R, Properties)>
where
    R: Default + TryFrom<u8, Error = ProtocolError>,
{
    if !dec.has_remaining() {
        return Ok((R::default(), Properties::new()));
    }
    let reason_code = R::try_from(dec.read_u8()?)?;
    let properties = if dec.has_remaining() {
        Properties::decode(dec, ctx)?
    } else {
        Properties::new()
    };
    Ok((reason_code, properties))
}

#[cfg(test)]
mod tests {
    use super::super::test_util::*;
    use super::super::Packet;
    use super::*;
    use crate::codec::Codec;
    use crate::properties::{PropertyId, PropertyValue};
    use bytes::Bytes;

    #[test]
    fn test_disconnect_empty_body() {
        let packet = Packet::Disconnect(Disconnect::default());
        for version in [ProtocolVersion::V311, ProtocolVersion::V5] {
            assert_eq!(encode(&packet, version), vec![0xE0, 0x00]);
            assert_eq!(roundtrip(&packet, version), packet);
        }
    }

    #[test]
    fn test_disconnect_reason_v5() {
        let packet = Packet::Disconnect(Disconnect::new(DisconnectReasonCode::ServerShuttingDown));
        assert_eq!(encode(&packet, ProtocolVersion::V5), vec![0xE0, 0x01, 0x8B]);
        assert_eq!(roundtrip(&packet, ProtocolVersion::V5), packet);

        let err = Codec::new(ProtocolVersion::V311).encode(&packet).unwrap_err();
        assert!(is_unsupported(&err));
    }

    #[test]
    fn test_disconnect_properties() {
        let mut disconnect = Disconnect::new(DisconnectReasonCode::NormalDisconnection);
        disconnect
            .properties
            .push(PropertyId::SessionExpiryInterval, PropertyValue::FourByteInt(0))
            .unwrap();
        let packet = Packet::Disconnect(disconnect);
        assert_eq!(
            encode(&packet, ProtocolVersion::V5),
            vec![0xE0, 0x07, 0x00, 0x05, 0x11, 0x00, 0x00, 0x00, 0x00]
        );
        assert_eq!(roundtrip(&packet, ProtocolVersion::V5), packet);
    }

    #[test]
    fn test_disconnect_v311_trailing_byte() {
        let err = decode(&[0xE0, 0x01, 0x00], ProtocolVersion::V311).unwrap_err();
        assert!(is_malformed(&err));
    }

    #[test]
    fn test_auth_v5_only() {
        let mut auth = Auth::new(AuthReasonCode::ContinueAuthentication);
        auth.properties
            .push(
                PropertyId::AuthenticationMethod,
                PropertyValue::Utf8("SCRAM-SHA-1".into()),
            )
            .unwrap();
        auth.properties
            .push(
                PropertyId::AuthenticationData,
                PropertyValue::Binary(Bytes::from_static(&[0xde, 0xad])),
            )
            .unwrap();
        let packet = Packet::Auth(auth);
        assert_eq!(roundtrip(&packet, ProtocolVersion::V5), packet);

        let err = Codec::new(ProtocolVersion::V311).encode(&packet).unwrap_err();
        assert!(is_unsupported(&err));
        assert!(is_unsupported(
            &decode(&[0xF0, 0x00], ProtocolVersion::V311).unwrap_err()
        ));
    }

    #[test]
    fn test_auth_shorthand() {
        let packet = decode(&[0xF0, 0x00], ProtocolVersion::V5).unwrap();
        assert_eq!(packet, Packet::Auth(Auth::default()));
    }
}
