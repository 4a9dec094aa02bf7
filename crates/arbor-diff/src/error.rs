//! Error types for the diff crate.

use arbor_model::ModelError;
use arbor_types::DataPath;

/// Errors that can occur while comparing snapshots.
#[derive(Debug, thiserror::Error)]
pub enum DiffError {
    /// The snapshots differ in a way a property-level diff cannot express:
    /// a node that changed type, moved to another parent, or an item that
    /// turned from a node into a resource.
    #[error("unsupported change at {path}: {reason}")]
    UnsupportedChange { path: DataPath, reason: String },

    /// A `Modified` change that lists no changed property.
    #[error("modification of {0} changes no property")]
    EmptyModification(DataPath),

    /// The same path was reported twice while building a change set.
    #[error("path {0} changed more than once")]
    DuplicatePath(DataPath),

    /// Reading or decoding a snapshot failed.
    #[error(transparent)]
    Model(#[from] ModelError),
}

/// Convenience alias for diff results.
pub type DiffResult<T> = Result<T, DiffError>;
