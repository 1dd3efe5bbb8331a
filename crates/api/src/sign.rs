//! Signing and validation collaborators.

use crate::{PsError, Publication, PsResult};
use std::sync::Arc;

/// Signature type code for a SHA-256 digest "signature" (a high quality
/// checksum without provenance).
pub const SIG_TYPE_DIGEST_SHA256: u64 = 0;

/// Signs publications before they enter the active set or leave the node.
pub trait Signer: 'static + Send + Sync + std::fmt::Debug {
    /// Fill in the publication's signature fields.
    fn sign(&self, publication: &mut Publication) -> PsResult<()>;
}

/// Trait-object [Signer].
pub type DynSigner = Arc<dyn Signer>;

/// Receives the verdict of a [Validator].
pub trait ValidationHandler: 'static + Send + Sync + std::fmt::Debug {
    /// The data passed validation.
    fn on_valid(&self, data: Publication);
    /// The data failed validation and is dropped.
    fn on_invalid(&self, data: Publication, reason: PsError);
}

/// Trait-object [ValidationHandler].
pub type DynValidationHandler = Arc<dyn ValidationHandler>;

/// Validates arriving data before the engine acts on it.
///
/// Validation may complete asynchronously (e.g. after fetching
/// certificates); the verdict is delivered through the handler.
pub trait Validator: 'static + Send + Sync + std::fmt::Debug {
    /// Validate `data`, reporting through `handler`.
    fn validate(&self, data: Publication, handler: DynValidationHandler);
}

/// Trait-object [Validator].
pub type DynValidator = Arc<dyn Validator>;
