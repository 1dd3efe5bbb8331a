//! The transport boundary: interests, data, and the face trait.
//!
//! A face is the engine's only way to reach the network. It can register a
//! name prefix (with callbacks for matched interests and for the outcome of
//! the registration itself), express an interest (with callbacks for the
//! matching data, a nack, or a timeout), and answer a matched interest with
//! a data packet. Everything else — retransmission, re-expression,
//! reconciliation — is the engine's business.

use crate::{Name, Publication, PsResult};
use std::sync::Arc;
use std::time::Duration;

/// An interest: a request for data under a name.
#[derive(Debug, Clone)]
pub struct Interest {
    /// The requested name.
    pub name: Name,
    /// Random nonce, used for duplicate and loopback detection.
    pub nonce: u32,
    /// Whether data whose name extends the interest name may satisfy it.
    pub can_be_prefix: bool,
    /// Whether only fresh data may satisfy it.
    pub must_be_fresh: bool,
    /// How long the interest stays pending at forwarders.
    pub lifetime: Duration,
}

impl Interest {
    /// Construct an interest with default selectors and a 4 second
    /// lifetime.
    pub fn new(name: Name) -> Self {
        Self {
            name,
            nonce: 0,
            can_be_prefix: false,
            must_be_fresh: false,
            lifetime: Duration::from_secs(4),
        }
    }
}

/// Receives interests matching a registered prefix.
pub trait InterestHandler: 'static + Send + Sync + std::fmt::Debug {
    /// An interest arrived under `prefix`.
    fn on_interest(&self, prefix: &Name, interest: Interest);
}

/// Trait-object [InterestHandler].
pub type DynInterestHandler = Arc<dyn InterestHandler>;

/// Receives the outcome of a prefix registration.
pub trait RegisterHandler: 'static + Send + Sync + std::fmt::Debug {
    /// The prefix is registered; matching interests will now arrive.
    fn on_success(&self, prefix: &Name);
    /// The registration was refused.
    fn on_failure(&self, prefix: &Name, reason: String);
}

/// Trait-object [RegisterHandler].
pub type DynRegisterHandler = Arc<dyn RegisterHandler>;

/// Receives the resolution of an expressed interest.
pub trait ResponseHandler: 'static + Send + Sync + std::fmt::Debug {
    /// Data matching the interest arrived.
    fn on_data(&self, interest: &Interest, data: Publication);
    /// The network refused the interest.
    fn on_nack(&self, interest: &Interest);
    /// The interest lifetime elapsed without data.
    fn on_timeout(&self, interest: &Interest);
}

/// Trait-object [ResponseHandler].
pub type DynResponseHandler = Arc<dyn ResponseHandler>;

/// The transport collaborator.
///
/// All methods enqueue and return; completion is reported through the
/// handler traits on the transport's own task.
pub trait Face: 'static + Send + Sync + std::fmt::Debug {
    /// Register `prefix`; interests matching it are delivered to
    /// `interests`, the registration outcome to `registration`.
    fn register_prefix(
        &self,
        prefix: Name,
        interests: DynInterestHandler,
        registration: DynRegisterHandler,
    ) -> PsResult<()>;

    /// Express an interest. Exactly one of the [ResponseHandler]
    /// callbacks fires per expression.
    fn express_interest(
        &self,
        interest: Interest,
        response: DynResponseHandler,
    ) -> PsResult<()>;

    /// Answer a matched interest with data.
    fn put(&self, data: Publication) -> PsResult<()>;
}

/// Trait-object [Face].
pub type DynFace = Arc<dyn Face>;
