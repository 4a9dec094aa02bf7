//! Error types for merge, rebase and cherry-pick.

use arbor_dag::DagError;
use arbor_diff::DiffError;
use arbor_model::ModelError;
use arbor_refs::RefError;
use arbor_types::{DataPath, ObjectId};

/// Errors raised by the merge comparer and the orchestrators.
#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    /// Commit or continue was called while conflicts remain.
    #[error("{count} unresolved conflict(s)")]
    UnresolvedConflicts { count: usize },

    /// The operation already finished.
    #[error("operation already completed")]
    AlreadyCompleted,

    /// The branch moved since the operation started.
    #[error("branch {branch} moved: expected {expected:?}, found {actual:?}")]
    ConcurrentModification {
        branch: String,
        expected: Option<ObjectId>,
        actual: Option<ObjectId>,
    },

    #[error("cannot resolve {0:?}")]
    UnresolvableReference(String),

    /// A resolution did not match a pending conflict.
    #[error("invalid resolution for {path}: {reason}")]
    InvalidResolution { path: DataPath, reason: String },

    #[error(transparent)]
    Diff(#[from] DiffError),

    #[error(transparent)]
    Dag(#[from] DagError),

    #[error(transparent)]
    Model(ModelError),
}

impl From<ModelError> for MergeError {
    fn from(err: ModelError) -> Self {
        match err {
            ModelError::UnresolvableReference(name) => MergeError::UnresolvableReference(name),
            ModelError::Ref(RefError::ConcurrentUpdate {
                name,
                expected,
                actual,
            }) => MergeError::ConcurrentModification {
                branch: name.strip_prefix("refs/heads/").unwrap_or(&name).to_string(),
                expected,
                actual,
            },
            other => MergeError::Model(other),
        }
    }
}

/// Convenience alias for merge results.
pub type MergeResult<T> = Result<T, MergeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ref_races_become_concurrent_modification() {
        let err: MergeError = ModelError::Ref(RefError::ConcurrentUpdate {
            name: "refs/heads/main".into(),
            expected: Some(ObjectId::null()),
            actual: None,
        })
        .into();
        match err {
            MergeError::ConcurrentModification { branch, actual, .. } => {
                assert_eq!(branch, "main");
                assert_eq!(actual, None);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn unresolvable_reference_is_lifted() {
        let err: MergeError = ModelError::UnresolvableReference("topic".into()).into();
        assert!(matches!(err, MergeError::UnresolvableReference(name) if name == "topic"));
    }
}
