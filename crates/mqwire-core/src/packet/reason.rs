//! Reason codes (MQTT 5.0) and the narrower 3.1.1 return code sets.

use crate::error::ProtocolError;

use super::ProtocolVersion;

macro_rules! reason_code {
    (
        $(#[$attr:meta])*
        pub enum $name:ident {
            $($(#[$vattr:meta])* $variant:ident = $value:literal),+ $(,)?
        }
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u8)]
        pub enum $name {
            $($(#[$vattr])* $variant = $value),+
        }

        impl TryFrom<u8> for $name {
            type Error = ProtocolError;

            fn try_from(value: u8) -> Result<Self, Self::Error> {
                match value {
                    $($value => Ok($name::$variant),)+
                    _ => Err(ProtocolError::MalformedPacket(format!(
                        concat!("invalid ", stringify!($name), ": {:#04x}"),
                        value
                    ))),
                }
            }
        }

        impl From<$name> for u8 {
            fn from(code: $name) -> u8 {
                code as u8
            }
        }

        impl $name {
            /// Codes 0x80 and above indicate failure.
            pub fn is_error(self) -> bool {
                (self as u8) >= 0x80
            }
        }
    };
}

reason_code! {
    /// CONNACK reason codes. On 3.1.1 only the six legacy return codes exist.
    #[derive(Default)]
    pub enum ConnectReasonCode {
        #[default]
        Success = 0x00,
        UnspecifiedError = 0x80,
        MalformedPacket = 0x81,
        ProtocolError = 0x82,
        ImplementationSpecificError = 0x83,
        UnsupportedProtocolVersion = 0x84,
        ClientIdentifierNotValid = 0x85,
        BadUserNameOrPassword = 0x86,
        NotAuthorized = 0x87,
        ServerUnavailable = 0x88,
        ServerBusy = 0x89,
        Banned = 0x8A,
        BadAuthenticationMethod = 0x8C,
        TopicNameInvalid = 0x90,
        PacketTooLarge = 0x95,
        QuotaExceeded = 0x97,
        PayloadFormatInvalid = 0x99,
        RetainNotSupported = 0x9A,
        QosNotSupported = 0x9B,
        UseAnotherServer = 0x9C,
        ServerMoved = 0x9D,
        ConnectionRateExceeded = 0x9F,
    }
}

impl ConnectReasonCode {
    /// Byte for the given protocol version.
    pub(crate) fn to_wire(self, version: ProtocolVersion) -> Result<u8, ProtocolError> {
        if version.is_v5() {
            return Ok(self.into());
        }
        let code = match self {
            ConnectReasonCode::Success => 0,
            ConnectReasonCode::UnsupportedProtocolVersion => 1,
            ConnectReasonCode::ClientIdentifierNotValid => 2,
            ConnectReasonCode::ServerUnavailable => 3,
            ConnectReasonCode::BadUserNameOrPassword => 4,
            ConnectReasonCode::NotAuthorized => 5,
            other => {
                return Err(ProtocolError::unsupported(format!(
                    "CONNACK reason {:?} has no 3.1.1 return code",
                    other
                )))
            }
        };
        Ok(code)
    }

    pub(crate) fn from_wire(byte: u8, version: ProtocolVersion) -> Result<Self, ProtocolError> {
        if version.is_v5() {
            return Self::try_from(byte);
        }
        match byte {
            0 => Ok(ConnectReasonCode::Success),
            1 => Ok(ConnectReasonCode::UnsupportedProtocolVersion),
            2 => Ok(ConnectReasonCode::ClientIdentifierNotValid),
            3 => Ok(ConnectReasonCode::ServerUnavailable),
            4 => Ok(ConnectReasonCode::BadUserNameOrPassword),
            5 => Ok(ConnectReasonCode::NotAuthorized),
            _ => Err(ProtocolError::malformed(format!(
                "invalid CONNACK return code: {:#04x}",
                byte
            ))),
        }
    }
}

reason_code! {
    /// PUBACK / PUBREC reason codes.
    #[derive(Default)]
    pub enum PubAckReasonCode {
        #[default]
        Success = 0x00,
        NoMatchingSubscribers = 0x10,
        UnspecifiedError = 0x80,
        ImplementationSpecificError = 0x83,
        NotAuthorized = 0x87,
        TopicNameInvalid = 0x90,
        PacketIdentifierInUse = 0x91,
        QuotaExceeded = 0x97,
        PayloadFormatInvalid = 0x99,
    }
}

reason_code! {
    /// PUBREL / PUBCOMP reason codes.
    #[derive(Default)]
    pub enum PubRelReasonCode {
        #[default]
        Success = 0x00,
        PacketIdentifierNotFound = 0x92,
    }
}

reason_code! {
    /// SUBACK reason codes. 3.1.1 return codes are the 0x00-0x02 and 0x80 subset.
    pub enum SubAckReasonCode {
        GrantedQos0 = 0x00,
        GrantedQos1 = 0x01,
        GrantedQos2 = 0x02,
        UnspecifiedError = 0x80,
        ImplementationSpecificError = 0x83,
        NotAuthorized = 0x87,
        TopicFilterInvalid = 0x8F,
        PacketIdentifierInUse = 0x91,
        QuotaExceeded = 0x97,
        SharedSubscriptionsNotSupported = 0x9E,
        SubscriptionIdentifiersNotSupported = 0xA1,
        WildcardSubscriptionsNotSupported = 0xA2,
    }
}

impl SubAckReasonCode {
    pub(crate) fn is_v311(self) -> bool {
        matches!(
            self,
            SubAckReasonCode::GrantedQos0
                | SubAckReasonCode::GrantedQos1
                | SubAckReasonCode::GrantedQos2
                | SubAckReasonCode::UnspecifiedError
        )
    }
}

reason_code! {
    /// UNSUBACK reason codes (5.0 only).
    #[derive(Default)]
    pub enum UnsubAckReasonCode {
        #[default]
        Success = 0x00,
        NoSubscriptionExisted = 0x11,
        UnspecifiedError = 0x80,
        ImplementationSpecificError = 0x83,
        NotAuthorized = 0x87,
        TopicFilterInvalid = 0x8F,
        PacketIdentifierInUse = 0x91,
    }
}

reason_code! {
    /// DISCONNECT reason codes.
    #[derive(Default)]
    pub enum DisconnectReasonCode {
        #[default]
        NormalDisconnection = 0x00,
        DisconnectWithWillMessage = 0x04,
        UnspecifiedError = 0x80,
        MalformedPacket = 0x81,
        ProtocolError = 0x82,
        ImplementationSpecificError = 0x83,
        NotAuthorized = 0x87,
        ServerBusy = 0x89,
        ServerShuttingDown = 0x8B,
        BadAuthenticationMethod = 0x8C,
        KeepAliveTimeout = 0x8D,
        SessionTakenOver = 0x8E,
        TopicFilterInvalid = 0x8F,
        TopicNameInvalid = 0x90,
        ReceiveMaximumExceeded = 0x93,
        TopicAliasInvalid = 0x94,
        PacketTooLarge = 0x95,
        MessageRateTooHigh = 0x96,
        QuotaExceeded = 0x97,
        AdministrativeAction = 0x98,
        PayloadFormatInvalid = 0x99,
        RetainNotSupported = 0x9A,
        QosNotSupported = 0x9B,
        UseAnotherServer = 0x9C,
        ServerMoved = 0x9D,
        SharedSubscriptionsNotSupported = 0x9E,
        ConnectionRateExceeded = 0x9F,
        MaximumConnectTime = 0xA0,
        SubscriptionIdentifiersNotSupported = 0xA1,
        WildcardSubscriptionsNotSupported = 0xA2,
    }
}

reason_code! {
    /// AUTH reason codes.
    #[derive(Default)]
    pub enum AuthReasonCode {
        #[default]
        Success = 0x00,
        ContinueAuthentication = 0x18,
        ReAuthenticate = 0x19,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_try_from_roundtrip() {
        assert_eq!(
            SubAckReasonCode::try_from(0x02).unwrap(),
            SubAckReasonCode::GrantedQos2
        );
        assert_eq!(u8::from(DisconnectReasonCode::ServerMoved), 0x9D);
        assert!(PubRelReasonCode::try_from(0x10).is_err());
    }

    #[test]
    fn test_is_error() {
        assert!(!PubAckReasonCode::NoMatchingSubscribers.is_error());
        assert!(PubAckReasonCode::QuotaExceeded.is_error());
    }

    #[test]
    fn test_connack_legacy_codes() {
        let v311 = ProtocolVersion::V311;
        assert_eq!(
            ConnectReasonCode::NotAuthorized.to_wire(v311).unwrap(),
            5
        );
        assert_eq!(
            ConnectReasonCode::NotAuthorized
                .to_wire(ProtocolVersion::V5)
                .unwrap(),
            0x87
        );
        assert!(matches!(
            ConnectReasonCode::Banned.to_wire(v311),
            Err(ProtocolError::UnsupportedVersion(_))
        ));
        assert_eq!(
            ConnectReasonCode::from_wire(2, v311).unwrap(),
            ConnectReasonCode::ClientIdentifierNotValid
        );
        assert!(ConnectReasonCode::from_wire(6, v311).is_err());
    }
}
