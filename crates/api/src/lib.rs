#![deny(missing_docs)]

//! Shared vocabulary for the pubsync synchronization engine.
//!
//! This crate defines the types that cross module boundaries: names and
//! name components, the TLV wire encoding, publications (signed data
//! objects), timestamps, interests, and the traits implemented by the
//! external collaborators a sync engine is built on: the transport
//! ([Face]), the [Signer] and the [Validator].
//!
//! No protocol logic lives here.

mod error;
pub use error::*;

mod timestamp;
pub use timestamp::*;

pub mod tlv;

mod name;
pub use name::*;

mod publication;
pub use publication::*;

mod face;
pub use face::*;

mod sign;
pub use sign::*;
