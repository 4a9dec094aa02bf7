//! Error types for reference operations.

use arbor_types::ObjectId;
use thiserror::Error;

/// Errors that can occur during reference operations.
#[derive(Debug, Error)]
pub enum RefError {
    #[error("ref not found: {name}")]
    NotFound { name: String },

    #[error("ref already exists: {name}")]
    AlreadyExists { name: String },

    #[error("invalid ref name {name:?}: {reason}")]
    InvalidName { name: String, reason: String },

    #[error("tag is immutable: {name}")]
    TagImmutable { name: String },

    #[error("HEAD is detached")]
    DetachedHead,

    #[error("cannot delete current branch: {name}")]
    DeleteCurrentBranch { name: String },

    /// A compare-and-swap found a different target than the caller expected.
    #[error("ref {name} was updated concurrently: expected {expected:?}, found {actual:?}")]
    ConcurrentUpdate {
        name: String,
        expected: Option<ObjectId>,
        actual: Option<ObjectId>,
    },
}

/// Convenience type alias for ref operations.
pub type RefResult<T> = std::result::Result<T, RefError>;
