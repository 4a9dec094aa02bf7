//! Error types for the commit graph.

use arbor_store::StoreError;
use arbor_types::ObjectId;

/// Errors that can occur during commit graph operations.
#[derive(Debug, thiserror::Error)]
pub enum DagError {
    #[error("commit not found: {0:?}")]
    CommitNotFound(ObjectId),

    /// A parent reference points to a commit that is not in the graph.
    #[error("dangling parent reference: commit {node:?} references missing parent {parent:?}")]
    DanglingParent { node: ObjectId, parent: ObjectId },

    #[error("duplicate commit: {0:?}")]
    DuplicateNode(ObjectId),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Convenience alias for commit graph results.
pub type DagResult<T> = Result<T, DagError>;
