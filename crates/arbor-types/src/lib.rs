//! Foundation types for Arbor.
//!
//! Arbor layers a typed, path-addressed node graph over a git-style
//! content-addressed commit history. This crate holds the identifiers every
//! other Arbor crate shares.
//!
//! # Key Types
//!
//! - [`ObjectId`] -- Content-addressed identifier (BLAKE3 hash) of a stored object
//! - [`UniqueId`] -- Random, URL-safe identifier assigned to a node at creation
//! - [`DataPath`] -- Canonical address of a node or resource inside a tree snapshot
//! - [`Signature`] -- Author/committer identity plus timestamp

pub mod error;
pub mod object;
pub mod path;
pub mod signature;
pub mod unique_id;

pub use error::TypeError;
pub use object::ObjectId;
pub use path::{DataPath, RESOURCES_FOLDER};
pub use signature::Signature;
pub use unique_id::UniqueId;
