#![deny(missing_docs)]

//! Default collaborator implementations for the pubsync synchronization
//! engine: an in-process face for tests and demos, a SHA-256 digest
//! signer, and an accept-all validator.

mod crypto;
pub use crypto::*;

mod mem_face;
pub use mem_face::*;

/// Enable tracing with the RUST_LOG environment variable.
///
/// This is intended to be used in tests, so it defaults to DEBUG level.
pub fn enable_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(tracing::Level::DEBUG.into())
                .from_env_lossy(),
        )
        .try_init();
}
