//! Filter for display sets that are transmitted more than once.

use super::PageId;

const RING_SIZE: usize = 8;

/// Identity of one display trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DedupKey {
    pub pts_ms: i64,
    pub pid: u16,
    pub composition_id: PageId,
    pub ancillary_id: PageId,
}

/// The last eight display keys seen on a stream.
#[derive(Debug, Default)]
pub struct DedupRing {
    entries: [Option<DedupKey>; RING_SIZE],
    head: usize,
}

impl DedupRing {
    pub fn contains(&self, key: &DedupKey) -> bool {
        self.entries.iter().flatten().any(|entry| entry == key)
    }

    /// Record `key`. Returns `true` if it was already present, in which case
    /// the ring is left unchanged.
    pub fn check_and_insert(&mut self, key: DedupKey) -> bool {
        if self.contains(&key) {
            return true;
        }
        self.entries[self.head] = Some(key);
        self.head = (self.head + 1) % RING_SIZE;
        false
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
