//! Content hashing for Arbor.
//!
//! Every stored object is addressed by a BLAKE3 digest taken over a domain
//! tag followed by its bytes, so a blob and a tree with identical payloads
//! never share an id.

pub mod hasher;

pub use hasher::{ContentHasher, HashDomain};
