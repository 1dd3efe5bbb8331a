//! Peer sync requests we could not satisfy immediately.

use pubsync_api::Name;
use std::collections::HashMap;
use tokio::time::Instant;

/// Sync-request names held until we can answer them or their lifetime
/// runs out. Re-recording a name replaces its deadline.
#[derive(Debug, Default)]
pub(crate) struct PendingInterests {
    map: HashMap<Name, Instant>,
}

impl PendingInterests {
    pub fn insert(&mut self, name: Name, deadline: Instant) {
        self.map.insert(name, deadline);
    }

    /// Empty the table, handing back everything for a sweep.
    pub fn take_all(&mut self) -> Vec<(Name, Instant)> {
        self.map.drain().collect()
    }
}
