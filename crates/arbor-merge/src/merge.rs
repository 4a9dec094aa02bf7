//! Merging another commit into a branch.

use arbor_model::{BranchUpdate, CommitRequest, ComparisonPolicy, Repository};
use arbor_types::{ObjectId, Signature};
use tracing::info;

use crate::change::{MergeChangeSet, Resolution};
use crate::engine::Engine;
use crate::error::{MergeError, MergeResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MergeStatus {
    /// The branch already contains everything upstream has.
    UpToDate,
    /// The branch tip is the merge base; committing just moves the branch.
    FastForward,
    /// A two-parent merge commit will be created.
    NonFastForward,
    /// Conflicts must be resolved before committing.
    Conflicts,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Plan {
    UpToDate,
    FastForward,
    Merge,
}

/// A pending merge of `upstream` into `branch`.
pub struct Merge<'r> {
    engine: Engine<'r>,
    branch: String,
    upstream_name: String,
    branch_tip: ObjectId,
    upstream: ObjectId,
    merge_base: Option<ObjectId>,
    plan: Plan,
    changes: MergeChangeSet,
    result: Option<ObjectId>,
}

impl<'r> Merge<'r> {
    /// Compute the merge of `upstream` into `branch`. Nothing is written until [`Merge::commit`].
    pub fn new(
        repo: &'r Repository,
        branch: &str,
        upstream: &str,
        policy: &ComparisonPolicy,
    ) -> MergeResult<Self> {
        let engine = Engine::new(repo, policy);
        let branch_tip = repo.branch_tip(branch)?;
        let upstream_id = repo.resolve(upstream)?;
        let merge_base = engine.merge_base(&branch_tip, &upstream_id)?;

        let ours = engine.diff(merge_base, branch_tip)?;
        let theirs = engine.diff(merge_base, upstream_id)?;
        let changes = engine.combine(&ours, &theirs)?;

        let plan = if merge_base == Some(upstream_id) {
            Plan::UpToDate
        } else if merge_base == Some(branch_tip) {
            Plan::FastForward
        } else if changes.is_empty() {
            Plan::UpToDate
        } else {
            Plan::Merge
        };

        let merge = Self {
            engine,
            branch: branch.to_string(),
            upstream_name: upstream.to_string(),
            branch_tip,
            upstream: upstream_id,
            merge_base,
            plan,
            changes,
            result: None,
        };
        info!(
            branch,
            upstream,
            base = ?merge.merge_base.map(|b| b.short_hex()),
            status = ?merge.status(),
            "merge prepared"
        );
        Ok(merge)
    }

    /// Outcome the merge will have when committed.
    pub fn status(&self) -> MergeStatus {
        match self.plan {
            Plan::UpToDate => MergeStatus::UpToDate,
            Plan::FastForward => MergeStatus::FastForward,
            Plan::Merge if self.changes.has_conflicts() => MergeStatus::Conflicts,
            Plan::Merge => MergeStatus::NonFastForward,
        }
    }

    /// Merged changes, including pending conflicts.
    pub fn current_changes(&self) -> &MergeChangeSet {
        &self.changes
    }

    /// Common ancestor used, `None` for unrelated histories.
    pub fn merge_base(&self) -> Option<ObjectId> {
        self.merge_base
    }

    /// Returns `true` after a successful [`Merge::commit`].
    pub fn is_completed(&self) -> bool {
        self.result.is_some()
    }

    /// Apply resolutions to the pending conflicts.
    pub fn resolve(&mut self, resolutions: &[Resolution]) -> MergeResult<()> {
        if self.is_completed() {
            return Err(MergeError::AlreadyCompleted);
        }
        self.changes = self.changes.resolve(resolutions)?;
        Ok(())
    }

    /// Finish the merge and return the commit the branch now points at.
    ///
    /// `committer` defaults to the repository identity, then to `author`;
    /// `message` defaults to `"Merge <upstream> into <branch>"`.
    pub fn commit(
        &mut self,
        author: &Signature,
        committer: Option<Signature>,
        message: Option<&str>,
    ) -> MergeResult<ObjectId> {
        if self.is_completed() {
            return Err(MergeError::AlreadyCompleted);
        }
        let repo = self.engine.repo;
        let tip = match self.plan {
            Plan::UpToDate => self.branch_tip,
            Plan::FastForward => {
                self.engine.check_tip(&self.branch, self.branch_tip)?;
                repo.update_branch(&self.branch, self.branch_tip, self.upstream)?;
                info!(branch = %self.branch, to = %self.upstream.short_hex(), "fast-forwarded");
                self.upstream
            }
            Plan::Merge => {
                let transforms = self.changes.transforms()?;
                self.engine.check_tip(&self.branch, self.branch_tip)?;
                let committer = self
                    .engine
                    .committer(committer)
                    .unwrap_or_else(|| author.clone());
                let message = message
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("Merge {} into {}", self.upstream_name, self.branch));
                let id = repo.commit(CommitRequest {
                    base_tree: Some(repo.read_commit(&self.branch_tip)?.tree),
                    transforms,
                    parents: vec![self.branch_tip, self.upstream],
                    author: author.clone(),
                    committer,
                    message,
                    update_branch: Some(BranchUpdate {
                        branch: self.branch.clone(),
                        expected: Some(self.branch_tip),
                    }),
                })?;
                info!(branch = %self.branch, commit = %id.short_hex(), "merge committed");
                id
            }
        };
        self.result = Some(tip);
        Ok(tip)
    }
}
