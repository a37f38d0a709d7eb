//! mqwire-client - MQTT session core.
//!
//! Packet identifier allocation and QoS acknowledgment tracking for one
//! connection, on top of the `mqwire-core` codec. Transport, reconnect
//! and retry timing stay with the caller.
//!
//! # Example
//!
//! ```
//! use bytes::Bytes;
//! use mqwire_client::{Inbound, Session, SessionConfig};
//! use mqwire_client::{Packet, ProtocolVersion, PubAck, Publish, QoS};
//!
//! let session = Session::new(&SessionConfig::new(ProtocolVersion::V5))?;
//!
//! let id = session.next_packet_id()?;
//! let publish = Publish::with_qos("sensors/temp", Bytes::from_static(b"25.5"), QoS::AtLeastOnce, id);
//! let bytes = session.encode(&Packet::Publish(publish))?;
//! assert_eq!(session.in_flight(), 1);
//! # let _ = bytes;
//!
//! // PUBACK from the broker completes the exchange
//! let result = session.handle_received(&Packet::PubAck(PubAck::new(id)))?;
//! assert!(matches!(result, Inbound::Completed { .. }));
//! assert_eq!(session.in_flight(), 0);
//! # Ok::<(), mqwire_client::SessionError>(())
//! ```

mod config;
mod error;
mod events;
mod inflight;
mod packet_id;
mod session;

pub use config::{
    SessionConfig, DEFAULT_MAX_INFLIGHT, DEFAULT_MAX_PACKET_SIZE, MAX_PACKET_SIZE_LIMIT,
};
pub use error::{Result, SessionError};
pub use events::{Anomaly, AnomalyPolicy, SessionObserver};
pub use inflight::{AckState, AckTracker, Inbound, InflightEntry};
pub use packet_id::PacketIdAllocator;
pub use session::Session;

// Re-export useful types from core
pub use mqwire_core::{
    Codec, IoTransport, Packet, PacketType, ProtocolVersion, PubAck, PubRel, Publish, QoS,
    Transport,
};
