//! Content-addressed object storage for Arbor.
//!
//! Snapshots are stored git-style: node and resource payloads are blobs,
//! folders are trees, and each commit points at a root tree plus its
//! parents. Objects are immutable and keyed by a domain-separated BLAKE3
//! digest of their encoded bytes, so identical subtrees share one id.
//!
//! - [`Blob`] holds raw bytes
//! - [`Tree`] lists named entries pointing at blobs or subtrees
//! - [`CommitObject`] records root tree, parents, signatures and message
//!
//! [`InMemoryObjectStore`] is the bundled [`ObjectStore`] backend.

pub mod error;
pub mod memory;
pub mod object;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use memory::InMemoryObjectStore;
pub use object::{Blob, CommitObject, EntryMode, ObjectKind, StoredObject, Tree, TreeEntry};
pub use traits::ObjectStore;
