//! Topic subscriptions and longest-prefix dispatch.

use pubsync_api::{Name, Publication};
use std::collections::BTreeMap;
use std::sync::Arc;

/// App callback invoked as new publications arrive for a subscribed
/// topic. Runs on the engine task and must not block.
pub type UpdateCb = Arc<dyn Fn(&Publication) + Send + Sync>;

/// Maps topic names to callbacks; a publication goes to the callback of
/// the longest topic that prefixes its name.
#[derive(Default)]
pub(crate) struct SubscriptionTable {
    subs: BTreeMap<Name, UpdateCb>,
}

impl SubscriptionTable {
    /// Add or replace the subscription for `topic`.
    pub fn subscribe(&mut self, topic: Name, cb: UpdateCb) {
        self.subs.insert(topic, cb);
    }

    /// Drop the subscription for `topic`, if any.
    pub fn unsubscribe(&mut self, topic: &Name) {
        self.subs.remove(topic);
    }

    /// The subscription whose topic is the longest prefix of `name`.
    ///
    /// A plain scan: the table is small and the lower-bound shortcut on
    /// an ordered map undershoots by one on exact matches.
    pub fn longest_prefix_match(
        &self,
        name: &Name,
    ) -> Option<(&Name, &UpdateCb)> {
        let mut best = None;
        for (topic, cb) in &self.subs {
            if topic.is_prefix_of(name) {
                // ascending order means a later hit is never shorter
                best = Some((topic, cb));
            }
        }
        best
    }
}

impl std::fmt::Debug for SubscriptionTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.subs.keys()).finish()
    }
}
