//! Fixed header: packet type + flags byte, then the remaining length.

use crate::codec::Transport;
use crate::error::{ProtocolError, Result};
use crate::varint;

/// MQTT Control Packet Types (4 bits).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PacketType {
    Connect = 1,
    Connack = 2,
    Publish = 3,
    Puback = 4,
    Pubrec = 5,
    Pubrel = 6,
    Pubcomp = 7,
    Subscribe = 8,
    Suback = 9,
    Unsubscribe = 10,
    Unsuback = 11,
    Pingreq = 12,
    Pingresp = 13,
    Disconnect = 14,
    Auth = 15,
}

impl TryFrom<u8> for PacketType {
    type Error = ProtocolError;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            1 => Ok(PacketType::Connect),
            2 => Ok(PacketType::Connack),
            3 => Ok(PacketType::Publish),
            4 => Ok(PacketType::Puback),
            5 => Ok(PacketType::Pubrec),
            6 => Ok(PacketType::Pubrel),
            7 => Ok(PacketType::Pubcomp),
            8 => Ok(PacketType::Subscribe),
            9 => Ok(PacketType::Suback),
            10 => Ok(PacketType::Unsubscribe),
            11 => Ok(PacketType::Unsuback),
            12 => Ok(PacketType::Pingreq),
            13 => Ok(PacketType::Pingresp),
            14 => Ok(PacketType::Disconnect),
            15 => Ok(PacketType::Auth),
            _ => Err(ProtocolError::InvalidPacketType(value)),
        }
    }
}

impl PacketType {
    /// Required flag nibble, or `None` for PUBLISH whose flags carry state.
    pub fn required_flags(self) -> Option<u8> {
        match self {
            PacketType::Publish => None,
            // MQTT-3.6.1-1, MQTT-3.8.1-1, MQTT-3.10.1-1
            PacketType::Pubrel | PacketType::Subscribe | PacketType::Unsubscribe => Some(0x02),
            _ => Some(0x00),
        }
    }

    fn validate_flags(self, flags: u8) -> Result<()> {
        match self.required_flags() {
            Some(required) if flags != required => Err(ProtocolError::malformed(format!(
                "{:?} fixed header flags must be {:#04x}, got {:#04x}",
                self, required, flags
            ))
            .into()),
            Some(_) => Ok(()),
            None => {
                // QoS bits 0b11 are reserved
                if (flags >> 1) & 0x03 == 0x03 {
                    return Err(ProtocolError::malformed("PUBLISH QoS bits set to 3").into());
                }
                Ok(())
            }
        }
    }
}

/// Decoded fixed header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedHeader {
    pub packet_type: PacketType,
    pub flags: u8,
    pub remaining_length: usize,
}

impl FixedHeader {
    pub fn new(packet_type: PacketType, flags: u8, remaining_length: usize) -> Self {
        Self {
            packet_type,
            flags,
            remaining_length,
        }
    }

    /// Try to decode a fixed header from the start of `buf`.
    ///
    /// Returns `Ok(Some((header, header_len)))`, `Ok(None)` if more bytes
    /// are needed, or `Err` on an invalid type, flags or length.
    pub fn decode(buf: &[u8]) -> Result<Option<(FixedHeader, usize)>> {
        let Some(&first) = buf.first() else {
            return Ok(None);
        };
        let header = Self::from_first_byte(first)?;

        let Some((remaining_length, len_bytes)) = varint::decode(&buf[1..])? else {
            return Ok(None);
        };

        Ok(Some((
            FixedHeader {
                remaining_length: remaining_length as usize,
                ..header
            },
            1 + len_bytes,
        )))
    }

    /// Read a fixed header from a transport, one length byte at a time.
    pub fn read<T: Transport + ?Sized>(transport: &mut T) -> Result<FixedHeader> {
        let first = transport.read_exact(1)?;
        let mut header = Self::from_first_byte(first[0])?;

        let mut len_buf = Vec::with_capacity(varint::MAX_LEN);
        loop {
            let byte = transport.read_exact(1)?;
            len_buf.push(byte[0]);
            if let Some((remaining_length, _)) = varint::decode(&len_buf)? {
                header.remaining_length = remaining_length as usize;
                return Ok(header);
            }
        }
    }

    fn from_first_byte(byte: u8) -> Result<FixedHeader> {
        let packet_type = PacketType::try_from(byte >> 4)?;
        let flags = byte & 0x0F;
        packet_type.validate_flags(flags)?;
        Ok(FixedHeader::new(packet_type, flags, 0))
    }

    /// Encoded size of this header.
    pub fn encoded_len(&self) -> usize {
        1 + varint::encoded_len(self.remaining_length as u32)
    }

    pub fn encode(&self, buf: &mut Vec<u8>) -> Result<()> {
        if self.remaining_length > varint::MAX_VALUE as usize {
            return Err(ProtocolError::PacketTooLarge {
                size: self.remaining_length,
                max: varint::MAX_VALUE as usize,
            }
            .into());
        }
        buf.push(((self.packet_type as u8) << 4) | (self.flags & 0x0F));
        varint::encode_len(self.remaining_length, buf)?;
        Ok(())
    }
}
