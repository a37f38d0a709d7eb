//! Primitive field readers and writers shared by the packet codecs.

use bytes::Bytes;

use crate::error::{ProtocolError, Result};
use crate::varint;

/// Cursor over the framed region of a single packet.
pub(crate) struct Decoder<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Decoder<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn has_remaining(&self) -> bool {
        self.pos < self.buf.len()
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        if self.pos >= self.buf.len() {
            return Err(ProtocolError::IncompletePacket { needed: 1, have: 0 }.into());
        }
        let b = self.buf[self.pos];
        self.pos += 1;
        Ok(b)
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        let bytes = self.read_bytes(2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        let bytes = self.read_bytes(4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Read a packet identifier, rejecting the reserved value 0.
    pub fn read_packet_id(&mut self) -> Result<u16> {
        let id = self.read_u16()?;
        if id == 0 {
            return Err(ProtocolError::violation("packet identifier must be non-zero").into());
        }
        Ok(id)
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        if self.remaining() < len {
            return Err(ProtocolError::IncompletePacket {
                needed: len,
                have: self.remaining(),
            }
            .into());
        }
        let bytes = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }

    /// Consume everything left in the framed region.
    pub fn read_rest(&mut self) -> &'a [u8] {
        let bytes = &self.buf[self.pos..];
        self.pos = self.buf.len();
        bytes
    }

    pub fn read_string(&mut self) -> Result<String> {
        let len = self.read_u16()? as usize;
        let bytes = self.read_bytes(len)?;
        // MQTT-1.5.3-2: UTF-8 string MUST NOT contain null character U+0000
        if bytes.contains(&0u8) {
            return Err(ProtocolError::malformed(
                "UTF-8 string must not contain null character",
            )
            .into());
        }
        String::from_utf8(bytes.to_vec()).map_err(|_| ProtocolError::InvalidUtf8.into())
    }

    pub fn read_binary(&mut self) -> Result<Bytes> {
        let len = self.read_u16()? as usize;
        let bytes = self.read_bytes(len)?;
        Ok(Bytes::copy_from_slice(bytes))
    }

    pub fn read_variable_byte_integer(&mut self) -> Result<u32> {
        match varint::decode(&self.buf[self.pos..])? {
            Some((value, consumed)) => {
                self.pos += consumed;
                Ok(value)
            }
            None => Err(ProtocolError::malformed("truncated variable byte integer").into()),
        }
    }

    /// Split off a nested region of `len` bytes (e.g. a property block).
    pub fn sub(&mut self, len: usize) -> Result<Decoder<'a>> {
        Ok(Decoder::new(self.read_bytes(len)?))
    }

    /// Fail if anything is left in the framed region.
    pub fn finish(&self, what: &str) -> Result<()> {
        if self.has_remaining() {
            return Err(ProtocolError::malformed(format!(
                "{} has {} trailing bytes",
                what,
                self.remaining()
            ))
            .into());
        }
        Ok(())
    }
}

pub(crate) fn write_u16(value: u16, buf: &mut Vec<u8>) {
    buf.extend_from_slice(&value.to_be_bytes());
}

pub(crate) fn write_u32(value: u32, buf: &mut Vec<u8>) {
    buf.extend_from_slice(&value.to_be_bytes());
}

pub(crate) fn write_packet_id(id: u16, buf: &mut Vec<u8>) -> Result<()> {
    if id == 0 {
        return Err(ProtocolError::violation("packet identifier must be non-zero").into());
    }
    write_u16(id, buf);
    Ok(())
}

pub(crate) fn write_binary(data: &[u8], buf: &mut Vec<u8>) -> Result<()> {
    let len = u16::try_from(data.len()).map_err(|_| {
        ProtocolError::violation(format!(
            "field of {} bytes exceeds 65535 byte limit",
            data.len()
        ))
    })?;
    write_u16(len, buf);
    buf.extend_from_slice(data);
    Ok(())
}

pub(crate) fn write_string(value: &str, buf: &mut Vec<u8>) -> Result<()> {
    if value.contains('\0') {
        return Err(
            ProtocolError::violation("UTF-8 string must not contain null character").into(),
        );
    }
    write_binary(value.as_bytes(), buf)
}
