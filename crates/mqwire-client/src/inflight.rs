//! Acknowledgment state machine for in-flight packets.
//!
//! Implements the QoS handshakes from MQTT Section 4.3:
//! - QoS 1 sender: `Sent` -> PUBACK -> `Complete`
//! - QoS 2 sender: `Sent` -> PUBREC -> `RecAcked` -> PUBREL sent -> `RelSent` -> PUBCOMP -> `Complete`
//! - QoS 2 receiver: `Received` -> PUBREC sent -> `RecSent` -> PUBREL -> `RelReceived` -> PUBCOMP sent -> `Complete`
//! - SUBSCRIBE / UNSUBSCRIBE: `Sent` -> SUBACK / UNSUBACK -> `Complete`
//!
//! Outbound entries use the local identifier space and hold an allocator id
//! until they complete. Inbound QoS 2 entries are keyed by the peer's
//! identifiers and never touch the allocator.

use std::time::{Duration, Instant};

use ahash::AHashMap;
use log::debug;
use mqwire_core::{
    Packet, PacketType, ProtocolVersion, PubAck, PubRel, PubRelReasonCode, Publish, QoS,
};

use crate::error::{Result, SessionError};
use crate::events::Anomaly;
use crate::packet_id::PacketIdAllocator;

/// Handshake progress of one in-flight packet identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AckState {
    /// Request sent, awaiting its first acknowledgment.
    Sent,
    /// QoS 2 sender: PUBREC received, PUBREL not sent yet.
    RecAcked,
    /// QoS 2 sender: PUBREL sent, awaiting PUBCOMP.
    RelSent,
    /// QoS 2 receiver: PUBLISH received, PUBREC not sent yet.
    Received,
    /// QoS 2 receiver: PUBREC sent, awaiting PUBREL.
    RecSent,
    /// QoS 2 receiver: PUBREL received, PUBCOMP not sent yet.
    RelReceived,
    Complete,
}

/// One in-flight handshake.
#[derive(Debug, Clone)]
pub struct InflightEntry {
    pub packet_id: u16,
    /// Packet that opened the handshake: PUBLISH, SUBSCRIBE or UNSUBSCRIBE.
    pub packet_type: PacketType,
    pub state: AckState,
    pub created_at: Instant,
    qos: QoS,
    /// Send order, for replay.
    seq: u64,
    /// Outbound PUBLISH kept for re-sending.
    message: Option<Publish>,
    /// Topic filter count of a SUBSCRIBE / UNSUBSCRIBE.
    filters: usize,
}

impl InflightEntry {
    /// QoS of a PUBLISH entry; `AtMostOnce` for subscribe requests.
    pub fn qos(&self) -> QoS {
        self.qos
    }

    fn is_publish(&self, qos: QoS) -> bool {
        self.packet_type == PacketType::Publish && self.qos == qos
    }
}

/// What the session manager must do after an inbound packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// Hand `publish` to the application, then send `reply` if present.
    Deliver {
        publish: Publish,
        reply: Option<Packet>,
    },
    /// A QoS 2 PUBLISH that was already delivered. Send `reply` only.
    Duplicate { packet_id: u16, reply: Packet },
    /// Send this packet.
    Reply(Packet),
    /// An outbound handshake finished and its identifier was released.
    Completed {
        packet_id: u16,
        packet_type: PacketType,
    },
    /// Acknowledgment for an identifier with nothing in flight. `reply`
    /// is still owed to the peer (PUBCOMP for an unknown PUBREL).
    Anomaly {
        anomaly: Anomaly,
        reply: Option<Packet>,
    },
    /// Not part of any handshake.
    Nothing,
}

/// Per-session in-flight state: allocator plus outbound and inbound maps.
#[derive(Debug)]
pub struct AckTracker {
    version: ProtocolVersion,
    /// Cap on outbound QoS 1/2 publishes (0 = unlimited).
    max_inflight: u16,
    ids: PacketIdAllocator,
    outbound: AHashMap<u16, InflightEntry>,
    inbound: AHashMap<u16, InflightEntry>,
    outbound_publishes: usize,
    seq: u64,
}

fn violation(msg: impl Into<String>) -> SessionError {
    SessionError::ProtocolViolation(msg.into())
}

fn mismatch(ack: PacketType, entry: &InflightEntry) -> SessionError {
    violation(format!(
        "{:?} for packet id {} which is a QoS {} {:?} in state {:?}",
        ack, entry.packet_id, entry.qos as u8, entry.packet_type, entry.state
    ))
}

impl AckTracker {
    pub fn new(version: ProtocolVersion) -> Self {
        Self {
            version,
            max_inflight: 0,
            ids: PacketIdAllocator::new(),
            outbound: AHashMap::new(),
            inbound: AHashMap::new(),
            outbound_publishes: 0,
            seq: 0,
        }
    }

    /// Limit outbound QoS 1/2 publishes in flight (5.0 Receive Maximum).
    pub fn with_max_inflight(mut self, max: u16) -> Self {
        self.max_inflight = max;
        self
    }

    pub fn version(&self) -> ProtocolVersion {
        self.version
    }

    /// Allocate the smallest free packet identifier.
    pub fn next_packet_id(&mut self) -> Result<u16> {
        self.ids.next()
    }

    pub fn packet_ids(&self) -> &PacketIdAllocator {
        &self.ids
    }

    /// Outbound entry for `packet_id`.
    pub fn get(&self, packet_id: u16) -> Option<&InflightEntry> {
        self.outbound.get(&packet_id)
    }

    /// Inbound QoS 2 entry for the peer's `packet_id`.
    pub fn get_inbound(&self, packet_id: u16) -> Option<&InflightEntry> {
        self.inbound.get(&packet_id)
    }

    /// Number of outbound handshakes in flight.
    pub fn in_flight(&self) -> usize {
        self.outbound.len()
    }

    /// Number of inbound QoS 2 handshakes in flight.
    pub fn inbound_pending(&self) -> usize {
        self.inbound.len()
    }

    fn entry(&mut self, packet_id: u16, packet_type: PacketType, state: AckState) -> InflightEntry {
        self.seq += 1;
        InflightEntry {
            packet_id,
            packet_type,
            state,
            created_at: Instant::now(),
            qos: QoS::AtMostOnce,
            seq: self.seq,
            message: None,
            filters: 0,
        }
    }

    /// Make sure `packet_id` is held by the allocator. Identifiers from
    /// [`AckTracker::next_packet_id`] already are.
    fn claim(&mut self, packet_id: u16) -> Result<()> {
        if !self.ids.is_in_use(packet_id) {
            self.ids.reserve(packet_id)?;
        }
        Ok(())
    }

    /// Record a packet handed to the transport.
    pub fn record_sent(&mut self, packet: &Packet) -> Result<()> {
        match packet {
            Packet::Publish(p) if p.qos != QoS::AtMostOnce => self.sent_publish(p),
            Packet::Subscribe(s) => {
                self.sent_request(s.packet_id, PacketType::Subscribe, s.topics.len())
            }
            Packet::Unsubscribe(u) => {
                self.sent_request(u.packet_id, PacketType::Unsubscribe, u.topics.len())
            }
            Packet::PubRel(p) => self.sent_pubrel(p.packet_id),
            Packet::PubRec(p) => self.sent_pubrec(p),
            Packet::PubComp(p) => self.sent_pubcomp(p.packet_id),
            _ => Ok(()),
        }
    }

    fn sent_publish(&mut self, publish: &Publish) -> Result<()> {
        let id = publish
            .packet_id
            .ok_or_else(|| violation("QoS > 0 PUBLISH without a packet id"))?;

        if let Some(entry) = self.outbound.get_mut(&id) {
            // [MQTT-2.3.1-3] a re-sent PUBLISH keeps its identifier
            if publish.dup && entry.is_publish(publish.qos) && entry.state == AckState::Sent {
                entry.message = Some(publish.clone());
                debug!("PUBLISH {} re-sent with DUP", id);
                return Ok(());
            }
            return Err(violation(format!("packet id {} is already in flight", id)));
        }

        if self.max_inflight > 0 && self.outbound_publishes >= self.max_inflight as usize {
            return Err(SessionError::InflightLimit(self.max_inflight));
        }

        self.claim(id)?;
        let mut entry = self.entry(id, PacketType::Publish, AckState::Sent);
        entry.qos = publish.qos;
        entry.message = Some(publish.clone());
        self.outbound.insert(id, entry);
        self.outbound_publishes += 1;
        debug!("PUBLISH {} (QoS {}) -> Sent", id, publish.qos as u8);
        Ok(())
    }

    fn sent_request(&mut self, id: u16, packet_type: PacketType, filters: usize) -> Result<()> {
        if self.outbound.contains_key(&id) {
            return Err(violation(format!("packet id {} is already in flight", id)));
        }
        self.claim(id)?;
        let mut entry = self.entry(id, packet_type, AckState::Sent);
        entry.filters = filters;
        self.outbound.insert(id, entry);
        debug!("{:?} {} -> Sent", packet_type, id);
        Ok(())
    }

    fn sent_pubrel(&mut self, id: u16) -> Result<()> {
        match self.outbound.get_mut(&id) {
            Some(entry)
                if entry.is_publish(QoS::ExactlyOnce)
                    && matches!(entry.state, AckState::RecAcked | AckState::RelSent) =>
            {
                entry.state = AckState::RelSent;
                debug!("PUBLISH {} -> RelSent", id);
                Ok(())
            }
            Some(entry) => Err(violation(format!(
                "PUBREL sent for packet id {} in state {:?}",
                id, entry.state
            ))),
            None => Err(violation(format!(
                "PUBREL sent for packet id {} with nothing in flight",
                id
            ))),
        }
    }

    fn sent_pubrec(&mut self, ack: &PubAck) -> Result<()> {
        let id = ack.packet_id;
        match self.inbound.get(&id).map(|e| e.state) {
            Some(AckState::Received | AckState::RecSent) => {
                // An error PUBREC ends the exchange (MQTT 5.0 4.3.3)
                if ack.reason_code.is_error() {
                    self.inbound.remove(&id);
                    debug!("inbound PUBLISH {} refused with {:?}", id, ack.reason_code);
                } else if let Some(entry) = self.inbound.get_mut(&id) {
                    entry.state = AckState::RecSent;
                    debug!("inbound PUBLISH {} -> RecSent", id);
                }
                Ok(())
            }
            Some(state) => Err(violation(format!(
                "PUBREC sent for packet id {} in state {:?}",
                id, state
            ))),
            None => Err(violation(format!(
                "PUBREC sent for packet id {} with nothing received",
                id
            ))),
        }
    }

    fn sent_pubcomp(&mut self, id: u16) -> Result<()> {
        match self.inbound.get(&id).map(|e| e.state) {
            Some(AckState::RelReceived) => {
                self.inbound.remove(&id);
                debug!("inbound PUBLISH {} -> Complete", id);
                Ok(())
            }
            Some(state) => Err(violation(format!(
                "PUBCOMP sent for packet id {} in state {:?}",
                id, state
            ))),
            // Reply to a PUBREL for an unknown id
            None => Ok(()),
        }
    }

    /// Advance the state machine for a decoded inbound packet.
    pub fn handle_received(&mut self, packet: &Packet) -> Result<Inbound> {
        match packet {
            Packet::Publish(p) => self.received_publish(p),
            Packet::PubAck(a) => self.received_puback(a.packet_id),
            Packet::PubRec(a) => self.received_pubrec(a),
            Packet::PubComp(c) => self.received_pubcomp(c.packet_id),
            Packet::PubRel(r) => Ok(self.received_pubrel(r.packet_id)),
            Packet::SubAck(s) => {
                self.received_request_ack(PacketType::Suback, s.packet_id, s.reason_codes.len())
            }
            Packet::UnsubAck(u) => {
                self.received_request_ack(PacketType::Unsuback, u.packet_id, u.reason_codes.len())
            }
            _ => Ok(Inbound::Nothing),
        }
    }

    fn received_publish(&mut self, publish: &Publish) -> Result<Inbound> {
        if publish.qos == QoS::AtMostOnce {
            return Ok(Inbound::Deliver {
                publish: publish.clone(),
                reply: None,
            });
        }

        let id = publish
            .packet_id
            .ok_or_else(|| violation("QoS > 0 PUBLISH without a packet id"))?;

        if publish.qos == QoS::AtLeastOnce {
            return Ok(Inbound::Deliver {
                publish: publish.clone(),
                reply: Some(Packet::PubAck(PubAck::new(id))),
            });
        }

        let reply = Packet::PubRec(PubAck::new(id));
        match self.inbound.get(&id).map(|e| e.state) {
            Some(AckState::Received | AckState::RecSent) => {
                debug!("inbound PUBLISH {} is a duplicate, not delivered", id);
                Ok(Inbound::Duplicate {
                    packet_id: id,
                    reply,
                })
            }
            // PUBREL already received: PUBCOMP is the answer still owed
            Some(AckState::RelReceived) => {
                debug!("inbound PUBLISH {} repeated after PUBREL, not delivered", id);
                Ok(Inbound::Duplicate {
                    packet_id: id,
                    reply: Packet::PubComp(PubRel::new(id)),
                })
            }
            _ => {
                // After PUBCOMP the peer may reuse the id for a new message
                let mut entry = self.entry(id, PacketType::Publish, AckState::Received);
                entry.qos = QoS::ExactlyOnce;
                self.inbound.insert(id, entry);
                debug!("inbound PUBLISH {} -> Received", id);
                Ok(Inbound::Deliver {
                    publish: publish.clone(),
                    reply: Some(reply),
                })
            }
        }
    }

    fn received_puback(&mut self, id: u16) -> Result<Inbound> {
        let Some(entry) = self.outbound.get(&id) else {
            return Ok(self.anomaly(PacketType::Puback, id, None));
        };
        if !entry.is_publish(QoS::AtLeastOnce) {
            return Err(mismatch(PacketType::Puback, entry));
        }
        Ok(self.complete(id))
    }

    fn received_pubrec(&mut self, ack: &PubAck) -> Result<Inbound> {
        let id = ack.packet_id;
        let Some(entry) = self.outbound.get_mut(&id) else {
            return Ok(self.anomaly(PacketType::Pubrec, id, None));
        };
        if !entry.is_publish(QoS::ExactlyOnce) {
            return Err(mismatch(PacketType::Pubrec, entry));
        }

        if ack.reason_code.is_error() {
            debug!("PUBLISH {} refused with {:?}", id, ack.reason_code);
            return Ok(self.complete(id));
        }

        // A repeated PUBREC is answered with PUBREL again
        if entry.state == AckState::Sent {
            entry.state = AckState::RecAcked;
            debug!("PUBLISH {} -> RecAcked", id);
        }
        Ok(Inbound::Reply(Packet::PubRel(PubRel::new(id))))
    }

    fn received_pubcomp(&mut self, id: u16) -> Result<Inbound> {
        let Some(entry) = self.outbound.get(&id) else {
            return Ok(self.anomaly(PacketType::Pubcomp, id, None));
        };
        if !entry.is_publish(QoS::ExactlyOnce)
            || !matches!(entry.state, AckState::RecAcked | AckState::RelSent)
        {
            return Err(mismatch(PacketType::Pubcomp, entry));
        }
        Ok(self.complete(id))
    }

    fn received_pubrel(&mut self, id: u16) -> Inbound {
        if let Some(entry) = self.inbound.get_mut(&id) {
            entry.state = AckState::RelReceived;
            debug!("inbound PUBLISH {} -> RelReceived", id);
            return Inbound::Reply(Packet::PubComp(PubRel::new(id)));
        }

        // PUBCOMP is owed even when nothing is pending
        let reply = if self.version.is_v5() {
            PubRel::with_reason(id, PubRelReasonCode::PacketIdentifierNotFound)
        } else {
            PubRel::new(id)
        };
        self.anomaly(PacketType::Pubrel, id, Some(Packet::PubComp(reply)))
    }

    fn received_request_ack(&mut self, ack: PacketType, id: u16, codes: usize) -> Result<Inbound> {
        let Some(entry) = self.outbound.get(&id) else {
            return Ok(self.anomaly(ack, id, None));
        };
        let expected = if ack == PacketType::Suback {
            PacketType::Subscribe
        } else {
            PacketType::Unsubscribe
        };
        if entry.packet_type != expected {
            return Err(mismatch(ack, entry));
        }
        // 3.1.1 UNSUBACK has no reason codes
        if (ack == PacketType::Suback || codes > 0) && codes != entry.filters {
            return Err(violation(format!(
                "{:?} for packet id {} has {} reason codes for {} topic filters",
                ack, id, codes, entry.filters
            )));
        }
        Ok(self.complete(id))
    }

    fn remove_outbound(&mut self, id: u16) -> Option<InflightEntry> {
        let entry = self.outbound.remove(&id)?;
        if entry.packet_type == PacketType::Publish {
            self.outbound_publishes -= 1;
        }
        Some(entry)
    }

    fn complete(&mut self, id: u16) -> Inbound {
        let packet_type = self
            .remove_outbound(id)
            .map_or(PacketType::Publish, |e| e.packet_type);
        self.ids.release(id);
        debug!("{:?} {} -> Complete", packet_type, id);
        Inbound::Completed {
            packet_id: id,
            packet_type,
        }
    }

    fn anomaly(&self, packet_type: PacketType, packet_id: u16, reply: Option<Packet>) -> Inbound {
        debug!("{:?} {} has nothing in flight", packet_type, packet_id);
        Inbound::Anomaly {
            anomaly: Anomaly {
                packet_type,
                packet_id,
            },
            reply,
        }
    }

    /// Drop an outbound handshake and release its identifier.
    ///
    /// Used by timeout policies. The identifier is released even if
    /// nothing was tracked for it.
    pub fn abandon(&mut self, packet_id: u16) -> Option<InflightEntry> {
        let entry = self.remove_outbound(packet_id);
        self.ids.release(packet_id);
        if entry.is_some() {
            debug!("packet id {} abandoned", packet_id);
        }
        entry
    }

    /// Outbound entries created at least `age` ago, oldest first.
    pub fn older_than(&self, age: Duration) -> Vec<InflightEntry> {
        let now = Instant::now();
        let mut stale: Vec<InflightEntry> = self
            .outbound
            .values()
            .filter(|e| now.duration_since(e.created_at) >= age)
            .cloned()
            .collect();
        stale.sort_by_key(|e| e.seq);
        stale
    }

    /// Packets to re-send on reconnect, in original send order.
    ///
    /// [MQTT-4.4.0-1] PUBLISH (DUP=1) for entries awaiting PUBACK/PUBREC
    /// and PUBREL for entries awaiting PUBCOMP.
    pub fn replay(&self) -> Vec<Packet> {
        let mut entries: Vec<&InflightEntry> = self
            .outbound
            .values()
            .filter(|e| e.packet_type == PacketType::Publish)
            .collect();
        entries.sort_by_key(|e| e.seq);

        entries
            .into_iter()
            .filter_map(|e| match e.state {
                AckState::Sent => e.message.as_ref().map(|m| {
                    Packet::Publish(Publish {
                        dup: true,
                        ..m.clone()
                    })
                }),
                AckState::RecAcked | AckState::RelSent => {
                    Some(Packet::PubRel(PubRel::new(e.packet_id)))
                }
                _ => None,
            })
            .collect()
    }

    /// Discard every entry and every allocated identifier.
    pub fn reset(&mut self) {
        let dropped = self.outbound.len() + self.inbound.len();
        self.outbound.clear();
        self.inbound.clear();
        self.ids.clear();
        self.outbound_publishes = 0;
        self.seq = 0;
        debug!("session reset, {} in-flight entries dropped", dropped);
    }
}
