//! Plumbing shared by the merge, rebase and cherry-pick orchestrators.

use arbor_diff::{ChangeCollection, Comparer};
use arbor_model::{ComparisonPolicy, ModelError, Repository};
use arbor_types::{ObjectId, Signature};
use tracing::warn;

use crate::change::MergeChangeSet;
use crate::comparer::MergeComparer;
use crate::error::{MergeError, MergeResult};

pub(crate) struct Engine<'r> {
    pub repo: &'r Repository,
    pub policy: ComparisonPolicy,
}

impl<'r> Engine<'r> {
    pub fn new(repo: &'r Repository, policy: &ComparisonPolicy) -> Self {
        Self {
            repo,
            policy: policy.clone(),
        }
    }

    /// Best common ancestor, `None` for unrelated histories.
    pub fn merge_base(&self, a: &ObjectId, b: &ObjectId) -> MergeResult<Option<ObjectId>> {
        let graph = self.repo.commit_graph(&[*a, *b])?;
        Ok(graph.merge_base(a, b)?)
    }

    /// Changes from `old` (the empty tree when `None`) to `new`.
    pub fn diff(&self, old: Option<ObjectId>, new: ObjectId) -> MergeResult<ChangeCollection> {
        let before = match old {
            Some(commit) => self.repo.snapshot(&commit)?,
            None => self.repo.empty_snapshot()?,
        };
        let after = self.repo.snapshot(&new)?;
        Ok(Comparer::new(self.repo.schema(), &self.policy).compare(&before, &after)?)
    }

    /// Run the merge comparer over two change sets.
    pub fn combine(&self, ours: &ChangeCollection, theirs: &ChangeCollection) -> MergeResult<MergeChangeSet> {
        MergeComparer::new(self.repo.schema(), &self.policy).compare(ours, theirs)
    }

    /// Fail if `branch` no longer points at `expected`.
    pub fn check_tip(&self, branch: &str, expected: ObjectId) -> MergeResult<()> {
        let actual = self
            .repo
            .refs()
            .branch_target(branch)
            .map_err(ModelError::from)?;
        if actual != Some(expected) {
            warn!(branch, expected = %expected.short_hex(), "branch moved during operation");
            return Err(MergeError::ConcurrentModification {
                branch: branch.to_string(),
                expected: Some(expected),
                actual,
            });
        }
        Ok(())
    }

    /// Caller's committer, else the configured identity.
    pub fn committer(&self, given: Option<Signature>) -> Option<Signature> {
        given.or_else(|| self.repo.default_signature())
    }
}
