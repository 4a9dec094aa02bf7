//! Graph node for a single commit.

use arbor_store::CommitObject;
use arbor_types::ObjectId;
use chrono::{DateTime, Utc};

/// The parts of a commit the graph algorithms need.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommitNode {
    pub id: ObjectId,
    pub tree: ObjectId,
    /// First parent first.
    pub parents: Vec<ObjectId>,
    /// Committer timestamp, used to break ties between equally good
    /// candidates.
    pub committed_at: DateTime<Utc>,
}

impl CommitNode {
    /// Build the graph node for a stored commit.
    pub fn from_commit(id: ObjectId, commit: &CommitObject) -> Self {
        Self {
            id,
            tree: commit.tree,
            parents: commit.parents.clone(),
            committed_at: commit.committer.when,
        }
    }

    /// Returns `true` for a commit without parents.
    pub fn is_root(&self) -> bool {
        self.parents.is_empty()
    }

    /// Ordering key: older first, id as the final tie-breaker.
    pub fn age_key(&self) -> (DateTime<Utc>, ObjectId) {
        (self.committed_at, self.id)
    }
}
