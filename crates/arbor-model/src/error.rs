use arbor_dag::DagError;
use arbor_refs::RefError;
use arbor_store::StoreError;
use arbor_types::{DataPath, TypeError};

/// Errors from schema, snapshot, tree-edit and commit operations.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("invalid schema: {0}")]
    Schema(String),

    #[error("unknown node type: {0}")]
    UnknownType(String),

    #[error("type {type_name} has no property {property}")]
    UnknownProperty { type_name: String, property: String },

    #[error("property {type_name}.{property} expects {expected}, got {value}")]
    PropertyKindMismatch {
        type_name: String,
        property: String,
        expected: String,
        value: serde_json::Value,
    },

    #[error("invalid item at {path}: {reason}")]
    InvalidItem { path: DataPath, reason: String },

    #[error("parent of {0} does not exist")]
    ParentMissing(DataPath),

    #[error("item not found: {0}")]
    NotFound(DataPath),

    #[error("could not decode node at {path}: {reason}")]
    Serialization { path: DataPath, reason: String },

    #[error("cannot resolve reference {0:?}")]
    UnresolvableReference(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Type(#[from] TypeError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Ref(#[from] RefError),

    #[error(transparent)]
    Dag(#[from] DagError),
}

/// Result alias for model operations.
pub type ModelResult<T> = Result<T, ModelError>;
