//! Session-scoped handle shared by the reader and writer of one connection.
//!
//! A [`Session`] couples the connection's [`Codec`] with its
//! [`AckTracker`]. Clones share the same tracker, so a reader thread
//! feeding `handle_received` and a writer thread calling `encode` see one
//! consistent in-flight table. Nothing is shared between sessions.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use log::{debug, warn};
use parking_lot::Mutex;

use mqwire_core::{Codec, Packet, ProtocolVersion, Transport};

use crate::config::SessionConfig;
use crate::error::{Result, SessionError};
use crate::events::{Anomaly, AnomalyPolicy, SessionObserver};
use crate::inflight::{AckTracker, Inbound, InflightEntry};

/// Cheaply clonable handle to one connection's session state.
#[derive(Clone)]
pub struct Session {
    tracker: Arc<Mutex<AckTracker>>,
    codec: Codec,
    policy: AnomalyPolicy,
    observer: Option<Arc<dyn SessionObserver>>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("codec", &self.codec)
            .field("policy", &self.policy)
            .field("in_flight", &self.in_flight())
            .field("observer", &self.observer.is_some())
            .finish()
    }
}

impl Session {
    pub fn new(config: &SessionConfig) -> Result<Self> {
        config.validate()?;
        let tracker =
            AckTracker::new(config.protocol_version).with_max_inflight(config.max_inflight);
        Ok(Self {
            tracker: Arc::new(Mutex::new(tracker)),
            codec: Codec::new(config.protocol_version).max_packet_size(config.max_packet_size),
            policy: config.anomaly_policy,
            observer: None,
        })
    }

    /// Attach an observer for completion and anomaly notifications.
    pub fn with_observer(mut self, observer: Arc<dyn SessionObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn version(&self) -> ProtocolVersion {
        self.codec.version()
    }

    pub fn codec(&self) -> Codec {
        self.codec
    }

    pub fn anomaly_policy(&self) -> AnomalyPolicy {
        self.policy
    }

    /// Allocate the smallest free packet identifier.
    pub fn next_packet_id(&self) -> Result<u16> {
        self.tracker.lock().next_packet_id()
    }

    /// Record a packet sent by other means than [`Session::encode`].
    pub fn record_sent(&self, packet: &Packet) -> Result<()> {
        self.tracker.lock().record_sent(packet)
    }

    /// Encode `packet` and record it as sent.
    ///
    /// Nothing is recorded if encoding fails. A packet refused by the
    /// tracker (reused id, in-flight limit) yields an error and no bytes.
    pub fn encode(&self, packet: &Packet) -> Result<Bytes> {
        let bytes = self.codec.encode(packet)?;
        self.tracker.lock().record_sent(packet)?;
        Ok(bytes)
    }

    /// Encode, record and write `packet` to `transport`.
    ///
    /// The packet stays in flight if the write fails; it is re-sent by
    /// [`Session::replay`] after reconnecting.
    pub fn write_packet<T: Transport + ?Sized>(
        &self,
        packet: &Packet,
        transport: &mut T,
    ) -> Result<()> {
        let bytes = self.encode(packet)?;
        transport.write(&bytes)?;
        Ok(())
    }

    /// Decode one packet from the start of `buf`; `Ok(None)` if more
    /// bytes are needed. Pass the result to [`Session::handle_received`].
    pub fn decode(&self, buf: &[u8]) -> Result<Option<(Packet, usize)>> {
        Ok(self.codec.decode(buf)?)
    }

    /// Read one packet from `transport`.
    pub fn read_packet<T: Transport + ?Sized>(&self, transport: &mut T) -> Result<Packet> {
        Ok(self.codec.read_packet(transport)?)
    }

    /// Advance the session for an inbound packet.
    ///
    /// Observer callbacks run after the tracker lock is released. Under
    /// [`AnomalyPolicy::Disconnect`] an anomaly is returned as
    /// [`SessionError::ProtocolViolation`].
    pub fn handle_received(&self, packet: &Packet) -> Result<Inbound> {
        let inbound = self.tracker.lock().handle_received(packet)?;

        match &inbound {
            Inbound::Completed {
                packet_id,
                packet_type,
            } => {
                if let Some(observer) = &self.observer {
                    observer.on_ack_complete(*packet_id, *packet_type);
                }
            }
            Inbound::Anomaly { anomaly, .. } => self.report(anomaly)?,
            _ => {}
        }
        Ok(inbound)
    }

    fn report(&self, anomaly: &Anomaly) -> Result<()> {
        match self.policy {
            AnomalyPolicy::Ignore => {
                debug!("ignoring {}", anomaly);
                Ok(())
            }
            AnomalyPolicy::Report => {
                warn!("{}", anomaly);
                self.notify_anomaly(anomaly);
                Ok(())
            }
            AnomalyPolicy::Disconnect => {
                self.notify_anomaly(anomaly);
                Err(SessionError::ProtocolViolation(anomaly.to_string()))
            }
        }
    }

    fn notify_anomaly(&self, anomaly: &Anomaly) {
        if let Some(observer) = &self.observer {
            observer.on_anomaly(anomaly);
        }
    }

    /// Drop an outbound handshake and release its identifier.
    pub fn abandon(&self, packet_id: u16) -> Option<InflightEntry> {
        self.tracker.lock().abandon(packet_id)
    }

    /// Outbound entries created at least `age` ago, oldest first.
    pub fn older_than(&self, age: Duration) -> Vec<InflightEntry> {
        self.tracker.lock().older_than(age)
    }

    /// Packets to re-send after reconnecting, in original send order.
    pub fn replay(&self) -> Vec<Packet> {
        self.tracker.lock().replay()
    }

    /// Discard all in-flight state (clean start).
    pub fn reset(&self) {
        self.tracker.lock().reset();
    }

    pub fn get(&self, packet_id: u16) -> Option<InflightEntry> {
        self.tracker.lock().get(packet_id).cloned()
    }

    pub fn in_flight(&self) -> usize {
        self.tracker.lock().in_flight()
    }

    pub fn inbound_pending(&self) -> usize {
        self.tracker.lock().inbound_pending()
    }
}
