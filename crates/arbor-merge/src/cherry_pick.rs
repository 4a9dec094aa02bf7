//! Applying a single commit's change to a branch.

use arbor_model::{BranchUpdate, CommitRequest, ComparisonPolicy, Repository};
use arbor_types::{ObjectId, Signature};
use tracing::{debug, info, warn};

use crate::change::{MergeChangeSet, Resolution};
use crate::engine::Engine;
use crate::error::{MergeError, MergeResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CherryPickStatus {
    /// The branch already has the picked change.
    UpToDate,
    /// Resolve, then call [`CherryPick::commit_changes`].
    Conflicts,
    Completed,
}

/// Replays the change introduced by `commit` (relative to its first parent)
/// on top of `branch`.
pub struct CherryPick<'r> {
    engine: Engine<'r>,
    branch: String,
    branch_tip: ObjectId,
    commit: ObjectId,
    committer: Option<Signature>,
    changes: MergeChangeSet,
    status: CherryPickStatus,
    result: Option<ObjectId>,
}

impl<'r> CherryPick<'r> {
    /// Compute the pick and commit it straight away when there is nothing
    /// to resolve.
    pub fn new(
        repo: &'r Repository,
        branch: &str,
        commit: &str,
        policy: &ComparisonPolicy,
        committer: Option<Signature>,
    ) -> MergeResult<Self> {
        let engine = Engine::new(repo, policy);
        let branch_tip = repo.branch_tip(branch)?;
        let picked = repo.resolve(commit)?;

        let mut pick = Self {
            engine,
            branch: branch.to_string(),
            branch_tip,
            commit: picked,
            committer,
            changes: MergeChangeSet::default(),
            status: CherryPickStatus::UpToDate,
            result: None,
        };

        let graph = repo.commit_graph(&[branch_tip, picked])?;
        if graph.is_ancestor(&picked, &branch_tip)? {
            info!(branch, commit, "commit already on branch");
            return Ok(pick);
        }
        let merge_base = graph.merge_base(&branch_tip, &picked)?;
        let parent = repo.read_commit(&picked)?.first_parent();

        let local = pick.engine.diff(merge_base, branch_tip)?;
        let incoming = pick.engine.diff(parent, picked)?;
        pick.changes = pick.engine.combine(&local, &incoming)?;

        if pick.changes.has_conflicts() {
            warn!(
                branch,
                commit,
                conflicts = pick.changes.conflict_count(),
                "cherry-pick has conflicts"
            );
            pick.status = CherryPickStatus::Conflicts;
            return Ok(pick);
        }
        pick.apply()?;
        Ok(pick)
    }

    /// Where the pick stands.
    pub fn status(&self) -> CherryPickStatus {
        self.status
    }

    /// Merged changes of the pick, including pending conflicts.
    pub fn current_changes(&self) -> &MergeChangeSet {
        &self.changes
    }

    /// The new commit, once one was made.
    pub fn result(&self) -> Option<ObjectId> {
        self.result
    }

    /// Apply resolutions to the pending conflicts.
    pub fn resolve(&mut self, resolutions: &[Resolution]) -> MergeResult<()> {
        if self.status != CherryPickStatus::Conflicts {
            return Err(MergeError::AlreadyCompleted);
        }
        self.changes = self.changes.resolve(resolutions)?;
        Ok(())
    }

    /// Commit the resolved change set.
    pub fn commit_changes(&mut self) -> MergeResult<CherryPickStatus> {
        if self.status != CherryPickStatus::Conflicts {
            return Err(MergeError::AlreadyCompleted);
        }
        self.apply()?;
        Ok(self.status)
    }

    fn apply(&mut self) -> MergeResult<()> {
        let transforms = self.changes.transforms()?;
        self.engine.check_tip(&self.branch, self.branch_tip)?;
        if transforms.is_empty() {
            debug!(branch = %self.branch, commit = %self.commit.short_hex(), "change already present");
            self.status = CherryPickStatus::UpToDate;
            return Ok(());
        }

        let repo = self.engine.repo;
        let original = repo.read_commit(&self.commit)?;
        let id = repo.commit(CommitRequest {
            base_tree: Some(repo.read_commit(&self.branch_tip)?.tree),
            transforms,
            parents: vec![self.branch_tip],
            committer: self.committer.clone().unwrap_or(original.committer),
            author: original.author,
            message: original.message,
            update_branch: Some(BranchUpdate {
                branch: self.branch.clone(),
                expected: Some(self.branch_tip),
            }),
        })?;
        info!(
            branch = %self.branch,
            from = %self.commit.short_hex(),
            to = %id.short_hex(),
            "cherry-picked"
        );
        self.result = Some(id);
        self.status = CherryPickStatus::Completed;
        Ok(())
    }
}
