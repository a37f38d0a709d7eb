//! Variable Byte Integer encoding/decoding for MQTT.
//!
//! MQTT uses a variable-length encoding scheme for the remaining length
//! field, property lengths and several property values.
//!
//! The encoding uses 7 bits per byte for the value, least significant
//! group first, with the high bit indicating whether more bytes follow:
//! - 0-127: 1 byte
//! - 128-16383: 2 bytes
//! - 16384-2097151: 3 bytes
//! - 2097152-268435455: 4 bytes

use crate::error::{ProtocolError, Result};

/// Largest value representable in four bytes.
pub const MAX_VALUE: u32 = 268_435_455;

/// Maximum number of bytes in an encoded value.
pub const MAX_LEN: usize = 4;

/// Decode a variable byte integer from a buffer.
///
/// Returns `Ok(Some((value, bytes_consumed)))` if successful,
/// `Ok(None)` if more data is needed, or `Err` if the fourth byte still
/// carries the continuation bit or the encoding is not minimal.
///
/// # Example
/// ```
/// use mqwire_core::varint::decode;
/// let buf = [0x80, 0x01]; // Encodes 128
/// let (value, consumed) = decode(&buf).unwrap().unwrap();
/// assert_eq!(value, 128);
/// assert_eq!(consumed, 2);
/// ```
pub fn decode(buf: &[u8]) -> Result<Option<(u32, usize)>> {
    let mut value = 0u32;

    for (i, &byte) in buf.iter().take(MAX_LEN).enumerate() {
        value |= ((byte & 0x7F) as u32) << (7 * i);

        if (byte & 0x80) == 0 {
            // [MQTT-1.5.5-1] minimum number of bytes: no zero final group
            if i > 0 && byte == 0 {
                return Err(ProtocolError::MalformedVarInt.into());
            }
            return Ok(Some((value, i + 1)));
        }

        if i == MAX_LEN - 1 {
            return Err(ProtocolError::MalformedVarInt.into());
        }
    }

    // Need more bytes
    Ok(None)
}

/// Encode a value as a variable byte integer, appending to a Vec.
///
/// Returns the number of bytes written.
///
/// # Example
/// ```
/// use mqwire_core::varint::encode_to_vec;
/// let mut buf = Vec::new();
/// let written = encode_to_vec(300, &mut buf).unwrap();
/// assert_eq!(written, 2);
/// assert_eq!(&buf, &[0xAC, 0x02]);
/// ```
pub fn encode_to_vec(mut value: u32, buf: &mut Vec<u8>) -> Result<usize> {
    if value > MAX_VALUE {
        return Err(ProtocolError::MalformedVarInt.into());
    }
    let start = buf.len();
    loop {
        let mut byte = (value % 128) as u8;
        value /= 128;
        if value > 0 {
            byte |= 0x80;
        }
        buf.push(byte);
        if value == 0 {
            break;
        }
    }
    Ok(buf.len() - start)
}

/// Encode a length, rejecting anything above [`MAX_VALUE`].
pub(crate) fn encode_len(len: usize, buf: &mut Vec<u8>) -> Result<usize> {
    let value = u32::try_from(len).map_err(|_| ProtocolError::MalformedVarInt)?;
    encode_to_vec(value, buf)
}

/// Calculate the number of bytes needed to encode a value.
///
/// # Example
/// ```
/// use mqwire_core::varint::encoded_len;
/// assert_eq!(encoded_len(0), 1);
/// assert_eq!(encoded_len(127), 1);
/// assert_eq!(encoded_len(128), 2);
/// assert_eq!(encoded_len(16383), 2);
/// assert_eq!(encoded_len(16384), 3);
/// ```
pub fn encoded_len(mut value: u32) -> usize {
    let mut len = 0;
    loop {
        len += 1;
        value /= 128;
        if value == 0 {
            break;
        }
    }
    len
}
