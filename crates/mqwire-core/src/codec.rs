//! Whole-packet framing: fixed header + body, from buffers or a transport.
//!
//! The codec owns no mutable state. A [`Codec`] is just the protocol
//! version and size limit for one connection, and is `Copy`.

use std::io::{self, Read, Write};

use bytes::{BufMut, Bytes, BytesMut};
use log::trace;

use crate::error::{ProtocolError, Result};
use crate::header::FixedHeader;
use crate::packet::{Packet, ProtocolVersion};

/// Byte stream the codec reads from and writes to.
pub trait Transport {
    /// Read exactly `n` bytes, failing on EOF.
    fn read_exact(&mut self, n: usize) -> io::Result<Bytes>;

    /// Write every byte of `buf`.
    fn write(&mut self, buf: &[u8]) -> io::Result<()>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn read_exact(&mut self, n: usize) -> io::Result<Bytes> {
        (**self).read_exact(n)
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<()> {
        (**self).write(buf)
    }
}

/// [`Transport`] over any blocking `Read + Write` stream.
#[derive(Debug)]
pub struct IoTransport<T> {
    inner: T,
}

impl<T: Read + Write> IoTransport<T> {
    pub fn new(inner: T) -> Self {
        Self { inner }
    }

    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<T: Read + Write> Transport for IoTransport<T> {
    fn read_exact(&mut self, n: usize) -> io::Result<Bytes> {
        let mut buf = vec![0u8; n];
        Read::read_exact(&mut self.inner, &mut buf)?;
        Ok(Bytes::from(buf))
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<()> {
        self.inner.write_all(buf)?;
        self.inner.flush()
    }
}

/// Encoder/decoder bound to one protocol version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Codec {
    version: ProtocolVersion,
    /// Maximum total packet size in bytes (0 = no limit).
    max_packet_size: u32,
}

impl Codec {
    pub fn new(version: ProtocolVersion) -> Self {
        Self {
            version,
            max_packet_size: 0,
        }
    }

    /// Limit the total size of encoded and decoded packets (0 = no limit).
    pub fn max_packet_size(mut self, max: u32) -> Self {
        self.max_packet_size = max;
        self
    }

    pub fn version(&self) -> ProtocolVersion {
        self.version
    }

    pub fn packet_size_limit(&self) -> u32 {
        self.max_packet_size
    }

    fn check_size(&self, size: usize) -> Result<()> {
        if self.max_packet_size > 0 && size > self.max_packet_size as usize {
            return Err(ProtocolError::PacketTooLarge {
                size,
                max: self.max_packet_size as usize,
            }
            .into());
        }
        Ok(())
    }

    /// Encode a complete packet.
    ///
    /// The body is built and validated before the fixed header is written,
    /// so a failed encode never yields partial bytes.
    pub fn encode(&self, packet: &Packet) -> Result<Bytes> {
        let mut body = Vec::new();
        let flags = packet.encode_body(self.version, &mut body)?;
        let header = FixedHeader::new(packet.packet_type(), flags, body.len());

        let total = header.encoded_len() + body.len();
        self.check_size(total)?;

        let mut head = Vec::with_capacity(header.encoded_len());
        header.encode(&mut head)?;

        let mut buf = BytesMut::with_capacity(total);
        buf.put_slice(&head);
        buf.put_slice(&body);

        trace!(
            "encoded {:?} ({} bytes, {:?})",
            header.packet_type,
            total,
            self.version
        );
        Ok(buf.freeze())
    }

    /// Try to decode one packet from the start of `buf`.
    ///
    /// Returns `Ok(Some((packet, bytes_consumed)))` if successful,
    /// `Ok(None)` if more data is needed, or `Err` on protocol errors.
    pub fn decode(&self, buf: &[u8]) -> Result<Option<(Packet, usize)>> {
        let Some((header, header_len)) = FixedHeader::decode(buf)? else {
            return Ok(None);
        };

        let total_len = header_len + header.remaining_length;
        self.check_size(total_len)?;

        if buf.len() < total_len {
            return Ok(None);
        }

        let packet = Packet::decode_body(&header, &buf[header_len..total_len], self.version)?;
        trace!(
            "decoded {:?} ({} bytes, {:?})",
            header.packet_type,
            total_len,
            self.version
        );
        Ok(Some((packet, total_len)))
    }

    /// Read exactly one packet from `transport`.
    ///
    /// Any error leaves the stream at an unknown offset; the connection
    /// must be dropped.
    pub fn read_packet<T: Transport + ?Sized>(&self, transport: &mut T) -> Result<Packet> {
        let header = FixedHeader::read(transport)?;
        self.check_size(header.encoded_len() + header.remaining_length)?;

        let body = transport.read_exact(header.remaining_length)?;
        let packet = Packet::decode_body(&header, &body, self.version)?;
        trace!(
            "read {:?} ({} byte body, {:?})",
            header.packet_type,
            header.remaining_length,
            self.version
        );
        Ok(packet)
    }

    /// Encode `packet` and write it in one call.
    pub fn write_packet<T: Transport + ?Sized>(
        &self,
        packet: &Packet,
        transport: &mut T,
    ) -> Result<()> {
        let bytes = self.encode(packet)?;
        transport.write(&bytes)?;
        Ok(())
    }
}

/// Encode `packet` for `version` with no size limit.
pub fn encode_packet(packet: &Packet, version: ProtocolVersion) -> Result<Bytes> {
    Codec::new(version).encode(packet)
}

/// Buffered incremental decode; see [`Codec::decode`].
pub fn decode_packet(buf: &[u8], version: ProtocolVersion) -> Result<Option<(Packet, usize)>> {
    Codec::new(version).decode(buf)
}

/// Read the next packet from a transport; see [`Codec::read_packet`].
pub fn decode_next<T: Transport + ?Sized>(
    transport: &mut T,
    version: ProtocolVersion,
) -> Result<Packet> {
    Codec::new(version).read_packet(transport)
}
