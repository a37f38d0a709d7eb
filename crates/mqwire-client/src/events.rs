//! Session notifications and anomaly types.

use std::fmt;

use mqwire_core::PacketType;

/// An acknowledgment that matched nothing in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Anomaly {
    /// Type of the unmatched acknowledgment (PUBACK, PUBREC, ...).
    pub packet_type: PacketType,
    pub packet_id: u16,
}

impl fmt::Display for Anomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?} for packet id {} matches nothing in flight",
            self.packet_type, self.packet_id
        )
    }
}

/// Callbacks from a [`Session`](crate::Session).
///
/// Invoked after the session lock is released, so implementations may
/// call back into the session.
pub trait SessionObserver: Send + Sync {
    /// An outbound handshake reached `Complete` and its id was released.
    fn on_ack_complete(&self, packet_id: u16, packet_type: PacketType) {
        let _ = (packet_id, packet_type);
    }

    /// An acknowledgment arrived for an unknown packet id.
    fn on_anomaly(&self, anomaly: &Anomaly) {
        let _ = anomaly;
    }
}

/// How the session reacts to an [`Anomaly`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnomalyPolicy {
    /// Log at debug and continue.
    Ignore,
    /// Log a warning, notify the observer and continue.
    #[default]
    Report,
    /// Notify the observer and fail with a protocol violation so the
    /// caller drops the connection.
    Disconnect,
}
