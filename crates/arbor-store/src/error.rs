use arbor_types::ObjectId;

use crate::object::ObjectKind;

/// Errors from object store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("object not found: {0}")]
    NotFound(ObjectId),

    #[error("object {id} is a {actual}, expected a {expected}")]
    WrongKind {
        id: ObjectId,
        expected: ObjectKind,
        actual: ObjectKind,
    },

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("corrupt object {id}: {reason}")]
    CorruptObject { id: ObjectId, reason: String },

    #[error("cannot store object with null ID")]
    NullObjectId,
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
