#![deny(missing_docs)]

//! Pubsync's synchronization engine.
//!
//! Peers independently hold a lifetime-bounded set of signed publications
//! and continuously reconcile that set. Each peer advertises a compressed
//! IBLT of its publication digests inside a sync request name; a peer that
//! discovers the other side lacks items it has answers with a data packet
//! carrying (a subset of) those publications.
//!
//! Applications call [SyncPubsub::publish] to add a publication to the set
//! and [SyncPubsub::subscribe_to] to be called back as new publications
//! from others arrive. Publications are deleted (without notice) at the
//! end of their lifetime.

mod config;
pub use config::*;

pub mod filters;
pub use filters::{FilterPubsCb, IsExpiredCb};

mod pending;

mod scheduler;
pub use scheduler::ScopedTimer;

mod store;
pub use store::publication_digest;

mod subscription;
pub use subscription::UpdateCb;

mod sync;
pub use sync::*;

#[cfg(any(test, feature = "test-utils"))]
pub mod harness;
