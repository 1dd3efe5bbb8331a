#![deny(missing_docs)]

//! Invertible Bloom Lookup Table for publication-set reconciliation.
//!
//! An [Iblt] is a fixed-size probabilistic multiset of 32-bit keys that
//! supports subtraction: peeling the difference of two tables recovers
//! which keys each side holds that the other lacks, without exchanging the
//! sets themselves. Peers embed their table in sync-request names, so the
//! cell layout, the compression, and the [hash seeds](hash) are all part
//! of the wire contract.

mod hash;
pub use hash::*;

mod iblt;
pub use iblt::*;
