//! Packet identifier allocation and tracking.
//!
//! Implements these MQTT requirements:
//! - [MQTT-2.3.1-1] Packet Identifiers are non-zero 16-bit values.
//! - [MQTT-2.3.1-2] Each time a Client sends a new packet it MUST assign a currently unused Packet Identifier.
//! - [MQTT-2.3.1-3] If a Client re-sends a particular Control Packet, then it MUST use the same Packet Identifier.

use crate::error::{Result, SessionError};

const WORDS: usize = 65536 / 64;

/// Manages packet identifier allocation.
///
/// `next` always returns the smallest identifier not currently in use.
/// In-use identifiers are kept in a 65536-bit bitmap (bit 0 is never set),
/// with a hint pointing at the lowest word that may have a free bit.
#[derive(Debug, Clone)]
pub struct PacketIdAllocator {
    bits: Box<[u64; WORDS]>,
    /// Lowest word index that may contain a free identifier.
    hint: usize,
    in_use: usize,
}

impl Default for PacketIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl PacketIdAllocator {
    /// Create a new packet ID allocator.
    pub fn new() -> Self {
        let mut bits = Box::new([0u64; WORDS]);
        // Identifier 0 is reserved
        bits[0] = 1;
        Self {
            bits,
            hint: 0,
            in_use: 0,
        }
    }

    /// Allocate the smallest unused packet identifier.
    ///
    /// Fails with [`SessionError::IdSpaceExhausted`] if all 65535
    /// identifiers are in use.
    pub fn next(&mut self) -> Result<u16> {
        for word in self.hint..WORDS {
            let free = !self.bits[word];
            if free != 0 {
                let bit = free.trailing_zeros() as usize;
                self.bits[word] |= 1 << bit;
                self.hint = word;
                self.in_use += 1;
                return Ok((word * 64 + bit) as u16);
            }
        }
        self.hint = WORDS;
        Err(SessionError::IdSpaceExhausted)
    }

    /// Mark a caller-chosen identifier as in use.
    pub fn reserve(&mut self, id: u16) -> Result<()> {
        if id == 0 {
            return Err(SessionError::ProtocolViolation(
                "packet identifier 0 is reserved".into(),
            ));
        }
        if self.is_in_use(id) {
            return Err(SessionError::ProtocolViolation(format!(
                "packet identifier {} already in use",
                id
            )));
        }
        let (word, bit) = Self::slot(id);
        self.bits[word] |= 1 << bit;
        self.in_use += 1;
        Ok(())
    }

    /// Release a packet identifier after the transaction completes.
    ///
    /// Releasing an identifier that is not allocated is a no-op.
    pub fn release(&mut self, id: u16) {
        if id == 0 || !self.is_in_use(id) {
            return;
        }
        let (word, bit) = Self::slot(id);
        self.bits[word] &= !(1 << bit);
        self.in_use -= 1;
        self.hint = self.hint.min(word);
    }

    /// Check if a packet identifier is currently in use.
    pub fn is_in_use(&self, id: u16) -> bool {
        if id == 0 {
            return false;
        }
        let (word, bit) = Self::slot(id);
        self.bits[word] & (1 << bit) != 0
    }

    /// Get the number of packet IDs currently in use.
    pub fn in_use_count(&self) -> usize {
        self.in_use
    }

    /// Clear all allocations (used on session reset).
    pub fn clear(&mut self) {
        self.bits.fill(0);
        self.bits[0] = 1;
        self.hint = 0;
        self.in_use = 0;
    }

    fn slot(id: u16) -> (usize, u32) {
        (id as usize / 64, (id % 64) as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequential_allocation() {
        let mut alloc = PacketIdAllocator::new();
        assert_eq!(alloc.next().unwrap(), 1);
        assert_eq!(alloc.next().unwrap(), 2);
        assert_eq!(alloc.next().unwrap(), 3);
    }

    #[test]
    fn test_release_and_reuse() {
        let mut alloc = PacketIdAllocator::new();
        let id1 = alloc.next().unwrap();
        let id2 = alloc.next().unwrap();

        assert!(alloc.is_in_use(id1));
        assert!(alloc.is_in_use(id2));

        alloc.release(id1);
        assert!(!alloc.is_in_use(id1));
        assert!(alloc.is_in_use(id2));

        // Smallest free identifier comes back first
        assert_eq!(alloc.next().unwrap(), id1);
        assert_eq!(alloc.next().unwrap(), 3);
    }

    #[test]
    fn test_never_reissues_in_use_id() {
        let mut alloc = PacketIdAllocator::new();
        let x = alloc.next().unwrap();
        for _ in 0..200 {
            assert_ne!(alloc.next().unwrap(), x);
        }
        alloc.release(x);
        assert_eq!(alloc.next().unwrap(), x);
    }

    #[test]
    fn test_exhaustion() {
        let mut alloc = PacketIdAllocator::new();
        for expected in 1..=u16::MAX {
            assert_eq!(alloc.next().unwrap(), expected);
        }
        assert_eq!(alloc.in_use_count(), 65535);
        assert!(matches!(alloc.next(), Err(SessionError::IdSpaceExhausted)));

        alloc.release(40_000);
        assert_eq!(alloc.next().unwrap(), 40_000);
        assert!(matches!(alloc.next(), Err(SessionError::IdSpaceExhausted)));
    }

    #[test]
    fn test_exhaustion_after_release_all() {
        let mut alloc = PacketIdAllocator::new();
        for _ in 0..65535 {
            alloc.next().unwrap();
        }
        for id in 1..=u16::MAX {
            alloc.release(id);
        }
        assert_eq!(alloc.in_use_count(), 0);
        for _ in 0..65535 {
            alloc.next().unwrap();
        }
        assert!(matches!(alloc.next(), Err(SessionError::IdSpaceExhausted)));
    }

    #[test]
    fn test_release_is_idempotent() {
        let mut alloc = PacketIdAllocator::new();
        let id = alloc.next().unwrap();
        alloc.release(id);
        alloc.release(id);
        alloc.release(0);
        alloc.release(999);
        assert_eq!(alloc.in_use_count(), 0);
    }

    #[test]
    fn test_reserve() {
        let mut alloc = PacketIdAllocator::new();
        alloc.reserve(1).unwrap();
        assert!(alloc.reserve(1).is_err());
        assert!(alloc.reserve(0).is_err());
        alloc.reserve(65535).unwrap();
        assert_eq!(alloc.next().unwrap(), 2);
        assert_eq!(alloc.in_use_count(), 3);
    }

    #[test]
    fn test_clear() {
        let mut alloc = PacketIdAllocator::new();
        alloc.next().unwrap();
        alloc.next().unwrap();
        assert_eq!(alloc.in_use_count(), 2);

        alloc.clear();
        assert_eq!(alloc.in_use_count(), 0);
        assert_eq!(alloc.next().unwrap(), 1);
    }
}
