//! The active publication set.

use crate::scheduler::ScopedTimer;
use pubsync_api::Publication;
use pubsync_iblt::{murmur3_32, CHECK_SEED};
use std::collections::HashMap;
use std::sync::Arc;

/// Bit 0: within its primary lifetime, may be offered in responses.
pub(crate) const FLAG_LIVE: u8 = 1;
/// Bit 1: published by this node (as opposed to learned from a peer).
pub(crate) const FLAG_LOCAL: u8 = 2;

/// The 32-bit digest identifying a publication.
///
/// Computed over the full wire encoding under the check seed; this is the
/// key inserted into the member IBLT and compared across peers.
pub fn publication_digest(publication: &Publication) -> u32 {
    murmur3_32(CHECK_SEED, &publication.wire_encode())
}

/// One active publication and its lifecycle state.
#[derive(Debug)]
pub(crate) struct ActiveEntry {
    pub handle: Arc<Publication>,
    pub flags: u8,
    /// The three lifecycle timers (live-end, IBLT erase, eviction).
    /// Dropping the entry cancels whichever have not fired.
    pub timers: Vec<ScopedTimer>,
}

/// Digest-keyed store of currently active publications.
///
/// A publication is "known" exactly while its entry is present, which
/// spans twice the publication lifetime. Two publications colliding on
/// the 32-bit digest are treated as one: the later arrival reads as known
/// and is dropped, an accepted loss at the design sizing.
#[derive(Debug, Default)]
pub(crate) struct PubStore {
    active: HashMap<u32, ActiveEntry>,
}

impl PubStore {
    pub fn is_known(&self, digest: u32) -> bool {
        self.active.contains_key(&digest)
    }

    pub fn get(&self, digest: u32) -> Option<&ActiveEntry> {
        self.active.get(&digest)
    }

    pub fn insert(
        &mut self,
        digest: u32,
        handle: Arc<Publication>,
        local: bool,
        timers: Vec<ScopedTimer>,
    ) {
        let flags = if local { FLAG_LIVE | FLAG_LOCAL } else { FLAG_LIVE };
        self.active.insert(
            digest,
            ActiveEntry {
                handle,
                flags,
                timers,
            },
        );
    }

    /// End the primary lifetime: the publication is no longer offered.
    /// No-op when the entry is already gone.
    pub fn clear_live(&mut self, digest: u32) {
        if let Some(entry) = self.active.get_mut(&digest) {
            entry.flags &= !FLAG_LIVE;
        }
    }

    pub fn remove(&mut self, digest: u32) -> Option<ActiveEntry> {
        self.active.remove(&digest)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pubsync_api::{Name, Timestamp};

    fn handle(tag: u8) -> (u32, Arc<Publication>) {
        let mut name: Name = "/t".parse().unwrap();
        name.push_timestamp(Timestamp::from_millis(tag as i64));
        let p = Publication::new(name, vec![tag]);
        (publication_digest(&p), Arc::new(p))
    }

    #[test]
    fn insert_sets_flags_by_origin() {
        let mut store = PubStore::default();
        let (d1, h1) = handle(1);
        let (d2, h2) = handle(2);
        store.insert(d1, h1, true, vec![]);
        store.insert(d2, h2, false, vec![]);

        assert_eq!(FLAG_LIVE | FLAG_LOCAL, store.get(d1).unwrap().flags);
        assert_eq!(FLAG_LIVE, store.get(d2).unwrap().flags);
    }

    #[test]
    fn clear_live_keeps_entry_known() {
        let mut store = PubStore::default();
        let (d, h) = handle(1);
        store.insert(d, h, true, vec![]);
        store.clear_live(d);

        assert!(store.is_known(d));
        assert_eq!(FLAG_LOCAL, store.get(d).unwrap().flags);

        // robust against firing after eviction
        store.remove(d);
        store.clear_live(d);
        assert!(!store.is_known(d));
    }

    #[test]
    fn digest_is_stable_across_encode_decode() {
        let (d, h) = handle(7);
        let decoded = Publication::decode(h.wire_encode()).unwrap();
        assert_eq!(d, publication_digest(&decoded));
    }
}
