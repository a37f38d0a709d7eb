//! mqwire-core - MQTT 3.1.1 / 5.0 packet codec.
//!
//! This crate turns [`Packet`] values into wire bytes and back: variable
//! byte integers, 5.0 property blocks, fixed headers and the per-packet
//! bodies. It performs no I/O of its own beyond the [`Transport`] seam.
//!
//! ```
//! use mqwire_core::{Codec, Packet, ProtocolVersion, QoS, Subscribe, Topic};
//!
//! let codec = Codec::new(ProtocolVersion::V311);
//! let packet = Packet::Subscribe(Subscribe::new(1, vec![Topic::new("a/b", QoS::AtLeastOnce)]));
//! let bytes = codec.encode(&packet).unwrap();
//! assert_eq!(&bytes[..], &[0x82, 0x08, 0x00, 0x01, 0x00, 0x03, b'a', b'/', b'b', 0x01]);
//!
//! let (decoded, used) = codec.decode(&bytes).unwrap().unwrap();
//! assert_eq!(decoded, packet);
//! assert_eq!(used, bytes.len());
//! ```

pub mod codec;
pub mod error;
pub mod header;
pub mod packet;
pub mod properties;
pub mod varint;
mod wire;

pub use codec::{decode_next, decode_packet, encode_packet, Codec, IoTransport, Transport};
pub use error::{Error, ProtocolError, Result};
pub use header::{FixedHeader, PacketType};
pub use packet::*;
pub use properties::{Properties, PropertyContext, PropertyId, PropertyValue, ValueType};
