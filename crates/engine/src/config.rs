//! Configuration parameters for the sync engine.

use std::time::Duration;

/// Configuration parameters for [SyncPubsub](crate::SyncPubsub).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PubsyncConfig {
    /// How long a publication stays live, i.e. eligible to be offered in
    /// responses to peer sync requests.
    ///
    /// After this interval the publication is no longer advertised; its
    /// digest stays in the member IBLT for a further
    /// [max_clock_skew_ms](Self::max_clock_skew_ms) and the publication
    /// itself is evicted after twice this interval, so replays inside the
    /// skew window are still recognized as known.
    ///
    /// Default: 1000 (1s)
    pub max_pub_lifetime_ms: u32,

    /// The worst clock disagreement tolerated between peers.
    ///
    /// Bounds both sides of the expiry window and the extra time an
    /// expired digest is advertised.
    ///
    /// Default: 1000 (1s)
    pub max_clock_skew_ms: u32,

    /// Lifetime of an outbound sync request.
    ///
    /// A replacement request is expressed 20ms before this elapses. Peer
    /// requests we cannot satisfy immediately are also held for this
    /// long.
    ///
    /// Default: 4000 (4s)
    pub sync_interest_lifetime_ms: u32,

    /// The number of publications the member IBLT is sized for.
    ///
    /// All peers on a sync prefix must agree on this value: tables of
    /// different sizes cannot be subtracted. The table allocates 1.5x
    /// this many cells, rounded up to a multiple of three.
    ///
    /// Default: 85 (129 cells)
    pub expected_num_entries: u32,

    /// Approximate payload budget of a single sync response in bytes.
    ///
    /// Publications are packed into a response until the accumulated
    /// encoding reaches this size; the remainder is discovered on later
    /// rounds.
    ///
    /// Default: 1300
    pub max_pub_size: u32,
}

impl Default for PubsyncConfig {
    fn default() -> Self {
        Self {
            max_pub_lifetime_ms: 1000,
            max_clock_skew_ms: 1000,
            sync_interest_lifetime_ms: 4000,
            expected_num_entries: 85,
            max_pub_size: 1300,
        }
    }
}

impl PubsyncConfig {
    /// The publication lifetime.
    pub fn max_pub_lifetime(&self) -> Duration {
        Duration::from_millis(self.max_pub_lifetime_ms as u64)
    }

    /// The tolerated clock skew.
    pub fn max_clock_skew(&self) -> Duration {
        Duration::from_millis(self.max_clock_skew_ms as u64)
    }

    /// The sync request lifetime.
    pub fn sync_interest_lifetime(&self) -> Duration {
        Duration::from_millis(self.sync_interest_lifetime_ms as u64)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults_match_protocol_constants() {
        let config = PubsyncConfig::default();
        assert_eq!(1000, config.max_pub_lifetime_ms);
        assert_eq!(1000, config.max_clock_skew_ms);
        assert_eq!(4000, config.sync_interest_lifetime_ms);
        assert_eq!(85, config.expected_num_entries);
        assert_eq!(1300, config.max_pub_size);
    }

    #[test]
    fn serde_uses_camel_case() {
        let json = serde_json::to_string(&PubsyncConfig::default()).unwrap();
        assert!(json.contains("maxPubLifetimeMs"));
        assert!(json.contains("expectedNumEntries"));

        let parsed: PubsyncConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(4000, parsed.sync_interest_lifetime_ms);
    }
}
