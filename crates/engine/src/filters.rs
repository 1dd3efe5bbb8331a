//! Reference policy callbacks.
//!
//! The engine takes both callbacks at construction and applies no policy
//! of its own. These are the policies the original command/reply shims
//! install; tests and demos share them.

use crate::PubsyncConfig;
use pubsync_api::{Publication, Timestamp};
use std::sync::Arc;

/// App callback deciding whether an arriving publication is already
/// expired and should be dropped without delivery.
pub type IsExpiredCb = Arc<dyn Fn(&Publication) -> bool + Send + Sync>;

/// App callback selecting and ordering the publications offered in a
/// sync response. Receives the wanted publications we published and the
/// wanted publications others published; returns the combined reply list.
pub type FilterPubsCb = Arc<
    dyn Fn(Vec<Arc<Publication>>, Vec<Arc<Publication>>) -> Vec<Arc<Publication>>
        + Send
        + Sync,
>;

/// Reply only when at least one of the wanted publications is ours.
///
/// Orders the reply ours-then-others, each newest-first by the timestamp
/// in the final name component, so a response truncated by the packing
/// budget still carries the most recent items.
pub fn ours_first_newest() -> FilterPubsCb {
    fn ts(p: &Arc<Publication>) -> i64 {
        p.timestamp().map(|t| t.as_millis()).unwrap_or(0)
    }

    Arc::new(|mut ours, mut others| {
        if ours.is_empty() {
            return ours;
        }
        ours.sort_by_key(|p| std::cmp::Reverse(ts(p)));
        others.sort_by_key(|p| std::cmp::Reverse(ts(p)));
        ours.extend(others);
        ours
    })
}

/// The two-sided expiry window.
///
/// A publication is expired when its timestamp is further in the past
/// than lifetime + skew (an old replay) or further in the future than the
/// skew (a future-dated spoof). A publication without a decodable
/// timestamp is treated as expired.
pub fn expired_outside_window(config: &PubsyncConfig) -> IsExpiredCb {
    let too_old =
        (config.max_pub_lifetime_ms + config.max_clock_skew_ms) as i64;
    let too_new = config.max_clock_skew_ms as i64;

    Arc::new(move |p| {
        let Ok(timestamp) = p.timestamp() else {
            return true;
        };
        let dt = Timestamp::now().signed_millis_since(timestamp);
        dt >= too_old || dt <= -too_new
    })
}
