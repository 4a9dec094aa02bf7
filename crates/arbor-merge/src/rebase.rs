//! Replaying a branch's commits on top of another commit.

use arbor_diff::ChangeCollection;
use arbor_model::{CommitRequest, ComparisonPolicy, Repository};
use arbor_types::{ObjectId, Signature};
use tracing::{debug, info, warn};

use crate::change::{MergeChangeSet, Resolution};
use crate::engine::Engine;
use crate::error::{MergeError, MergeResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RebaseStatus {
    /// Upstream is already part of the branch; nothing was replayed.
    UpToDate,
    /// The current step needs resolutions, then [`Rebase::continue_next`].
    Conflicts,
    /// Every step was replayed and the branch moved.
    Complete,
}

/// A stepwise rebase of `branch` onto `upstream`.
///
/// Each replayed commit is compared with its predecessor in the replay list
/// (the merge base for the first) and merged against the upstream changes,
/// with upstream as "ours". Clean steps are committed immediately on the
/// running tip; the branch ref only moves once the last step is done.
pub struct Rebase<'r> {
    engine: Engine<'r>,
    branch: String,
    original_tip: ObjectId,
    upstream: ObjectId,
    merge_base: Option<ObjectId>,
    committer: Option<Signature>,
    upstream_changes: ChangeCollection,
    replayed: Vec<ObjectId>,
    completed: Vec<ObjectId>,
    step: Option<usize>,
    running_tip: ObjectId,
    changes: MergeChangeSet,
    status: RebaseStatus,
}

impl<'r> Rebase<'r> {
    /// Start the rebase and run until the first conflict or the end.
    pub fn start(
        repo: &'r Repository,
        branch: &str,
        upstream: &str,
        policy: &ComparisonPolicy,
        committer: Option<Signature>,
    ) -> MergeResult<Self> {
        let engine = Engine::new(repo, policy);
        let original_tip = repo.branch_tip(branch)?;
        let upstream_id = repo.resolve(upstream)?;
        let merge_base = engine.merge_base(&original_tip, &upstream_id)?;
        let replayed = repo
            .commit_graph(&[original_tip])?
            .commits_to_replay(&original_tip, merge_base.as_ref())?;

        let up_to_date = merge_base == Some(upstream_id);
        let upstream_changes = if up_to_date {
            ChangeCollection::new()
        } else {
            engine.diff(merge_base, upstream_id)?
        };

        let mut rebase = Self {
            engine,
            branch: branch.to_string(),
            original_tip,
            upstream: upstream_id,
            merge_base,
            committer,
            upstream_changes,
            replayed,
            completed: Vec::new(),
            step: (!up_to_date).then_some(0),
            running_tip: upstream_id,
            changes: MergeChangeSet::default(),
            status: RebaseStatus::UpToDate,
        };
        info!(
            branch,
            upstream,
            commits = rebase.replayed.len(),
            up_to_date,
            "rebase started"
        );
        rebase.run()?;
        Ok(rebase)
    }

    /// Where the rebase stands.
    pub fn status(&self) -> RebaseStatus {
        self.status
    }

    /// Index of the step being replayed, `-1` once finished.
    pub fn current_step(&self) -> isize {
        self.step.map_or(-1, |s| s as isize)
    }

    /// Commits from the original branch, in replay order.
    pub fn replayed_commits(&self) -> &[ObjectId] {
        &self.replayed
    }

    /// New commits created so far.
    pub fn completed_commits(&self) -> &[ObjectId] {
        &self.completed
    }

    /// Commit the branch is being rebased onto.
    pub fn upstream(&self) -> ObjectId {
        self.upstream
    }

    /// Merged changes of the current step.
    pub fn current_changes(&self) -> &MergeChangeSet {
        &self.changes
    }

    /// Apply resolutions to the current step.
    pub fn resolve(&mut self, resolutions: &[Resolution]) -> MergeResult<()> {
        if self.step.is_none() {
            return Err(MergeError::AlreadyCompleted);
        }
        self.changes = self.changes.resolve(resolutions)?;
        Ok(())
    }

    /// Commit the resolved step and carry on with the rest.
    pub fn continue_next(&mut self) -> MergeResult<RebaseStatus> {
        if self.step.is_none() {
            return Err(MergeError::AlreadyCompleted);
        }
        let count = self.changes.conflict_count();
        if count > 0 {
            return Err(MergeError::UnresolvedConflicts { count });
        }
        self.commit_step()?;
        self.run()?;
        Ok(self.status)
    }

    fn run(&mut self) -> MergeResult<()> {
        while let Some(index) = self.step {
            let Some(&commit) = self.replayed.get(index) else {
                return self.finish();
            };
            let previous = match index {
                0 => self.merge_base,
                i => Some(self.replayed[i - 1]),
            };
            let step_changes = self.engine.diff(previous, commit)?;
            self.changes = self.engine.combine(&self.upstream_changes, &step_changes)?;
            if self.changes.has_conflicts() {
                warn!(
                    step = index,
                    commit = %commit.short_hex(),
                    conflicts = self.changes.conflict_count(),
                    "rebase stopped on conflicts"
                );
                self.status = RebaseStatus::Conflicts;
                return Ok(());
            }
            self.commit_step()?;
        }
        Ok(())
    }

    fn commit_step(&mut self) -> MergeResult<()> {
        let index = self.step.ok_or(MergeError::AlreadyCompleted)?;
        let transforms = self.changes.transforms()?;
        self.engine.check_tip(&self.branch, self.original_tip)?;

        let original_id = self.replayed[index];
        if transforms.is_empty() {
            debug!(step = index, commit = %original_id.short_hex(), "nothing to replay");
        } else {
            let repo = self.engine.repo;
            let original = repo.read_commit(&original_id)?;
            let id = repo.commit(CommitRequest {
                base_tree: Some(repo.read_commit(&self.running_tip)?.tree),
                transforms,
                parents: vec![self.running_tip],
                committer: self.committer.clone().unwrap_or(original.committer),
                author: original.author,
                message: original.message,
                update_branch: None,
            })?;
            debug!(step = index, from = %original_id.short_hex(), to = %id.short_hex(), "replayed commit");
            self.running_tip = id;
            self.completed.push(id);
        }
        self.step = Some(index + 1);
        self.changes = MergeChangeSet::default();
        Ok(())
    }

    fn finish(&mut self) -> MergeResult<()> {
        self.engine.check_tip(&self.branch, self.original_tip)?;
        self.engine
            .repo
            .update_branch(&self.branch, self.original_tip, self.running_tip)?;
        self.step = None;
        self.status = RebaseStatus::Complete;
        info!(
            branch = %self.branch,
            tip = %self.running_tip.short_hex(),
            replayed = self.completed.len(),
            "rebase complete"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::Fixture;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn rebaser() -> Signature {
        Signature::new("Grace", "grace@example.com", Utc.with_ymd_and_hms(2024, 2, 1, 8, 0, 0).unwrap())
    }

    #[test]
    fn replays_each_commit_onto_upstream() {
        let fx = Fixture::new();
        let table = fx.add_table("main", "Customers", "old");
        fx.branch("feature", "main");
        let f1 = fx.set("feature", &table, "Name", json!("Clients"));
        let f2 = fx.set("feature", &table, "Description", json!("all clients"));
        let orders = fx.add_table("main", "Orders", "o");
        let upstream = fx.repo.branch_tip("main").unwrap();

        let rebase = Rebase::start(&fx.repo, "feature", "main", fx.policy(), Some(rebaser())).unwrap();
        assert_eq!(rebase.status(), RebaseStatus::Complete);
        assert_eq!(rebase.current_step(), -1);
        assert_eq!(rebase.replayed_commits(), &[f1, f2]);
        assert_eq!(rebase.completed_commits().len(), 2);

        let first = fx.repo.read_commit(&rebase.completed_commits()[0]).unwrap();
        let second = fx.repo.read_commit(&rebase.completed_commits()[1]).unwrap();
        assert_eq!(first.parents, vec![upstream]);
        assert_eq!(second.parents, vec![rebase.completed_commits()[0]]);
        assert_eq!(second.message, fx.repo.read_commit(&f2).unwrap().message);
        assert_eq!(second.author, fx.sig());
        assert_eq!(second.committer, rebaser());

        assert_eq!(fx.repo.branch_tip("feature").unwrap(), rebase.completed_commits()[1]);
        let t = fx.node("feature", &table);
        assert_eq!(t.get("Name"), &json!("Clients"));
        assert_eq!(t.get("Description"), &json!("all clients"));
        fx.node("feature", &orders);
    }

    #[test]
    fn conflict_stops_until_continue() {
        let fx = Fixture::new();
        let table = fx.add_table("main", "Customers", "old");
        fx.branch("feature", "main");
        let original = fx.set("feature", &table, "Description", json!("feature"));
        fx.set("main", &table, "Description", json!("main"));

        let mut rebase = Rebase::start(&fx.repo, "feature", "main", fx.policy(), None).unwrap();
        assert_eq!(rebase.status(), RebaseStatus::Conflicts);
        assert_eq!(rebase.current_step(), 0);
        let conflict = rebase
            .current_changes()
            .get(&table.path)
            .and_then(|c| c.conflict("Description"))
            .cloned()
            .unwrap();
        assert_eq!(conflict.our_value, json!("main"));
        assert_eq!(conflict.their_value, json!("feature"));
        assert_eq!(fx.repo.branch_tip("feature").unwrap(), original);

        assert!(matches!(
            rebase.continue_next(),
            Err(MergeError::UnresolvedConflicts { count: 1 })
        ));
        rebase
            .resolve(&[Resolution::property(&table.path, "Description", json!("both"))])
            .unwrap();
        assert_eq!(rebase.continue_next().unwrap(), RebaseStatus::Complete);
        assert_eq!(fx.node("feature", &table).get("Description"), &json!("both"));
        let tip = fx.repo.read_commit(&fx.repo.branch_tip("feature").unwrap()).unwrap();
        assert_eq!(tip.committer, fx.sig());

        assert!(matches!(rebase.continue_next(), Err(MergeError::AlreadyCompleted)));
    }

    #[test]
    fn empty_steps_are_skipped() {
        let fx = Fixture::new();
        let table = fx.add_table("main", "Customers", "old");
        fx.branch("feature", "main");
        fx.commit("feature", Vec::new(), "nothing");
        fx.set("feature", &table, "Name", json!("Clients"));
        fx.add_table("main", "Orders", "o");

        let rebase = Rebase::start(&fx.repo, "feature", "main", fx.policy(), None).unwrap();
        assert_eq!(rebase.status(), RebaseStatus::Complete);
        assert_eq!(rebase.replayed_commits().len(), 2);
        assert_eq!(rebase.completed_commits().len(), 1);
    }

    #[test]
    fn branch_behind_upstream_moves_to_it() {
        let fx = Fixture::new();
        let table = fx.add_table("main", "Customers", "old");
        fx.branch("feature", "main");
        let upstream = fx.set("main", &table, "Name", json!("Clients"));

        let rebase = Rebase::start(&fx.repo, "feature", "main", fx.policy(), None).unwrap();
        assert_eq!(rebase.status(), RebaseStatus::Complete);
        assert!(rebase.completed_commits().is_empty());
        assert_eq!(fx.repo.branch_tip("feature").unwrap(), upstream);
    }

    #[test]
    fn upstream_already_contained_is_up_to_date() {
        let fx = Fixture::new();
        let table = fx.add_table("main", "Customers", "old");
        fx.branch("feature", "main");
        let tip = fx.set("feature", &table, "Name", json!("Clients"));

        let mut rebase = Rebase::start(&fx.repo, "feature", "main", fx.policy(), None).unwrap();
        assert_eq!(rebase.status(), RebaseStatus::UpToDate);
        assert_eq!(rebase.current_step(), -1);
        assert_eq!(fx.repo.branch_tip("feature").unwrap(), tip);
        assert!(matches!(rebase.continue_next(), Err(MergeError::AlreadyCompleted)));
    }

    #[test]
    fn drift_between_steps_aborts() {
        let fx = Fixture::new();
        let table = fx.add_table("main", "Customers", "old");
        fx.branch("feature", "main");
        fx.set("feature", &table, "Description", json!("feature"));
        fx.set("main", &table, "Description", json!("main"));

        let mut rebase = Rebase::start(&fx.repo, "feature", "main", fx.policy(), None).unwrap();
        let moved = fx.set("feature", &table, "Name", json!("elsewhere"));
        rebase
            .resolve(&[Resolution::property(&table.path, "Description", json!("x"))])
            .unwrap();
        assert!(matches!(
            rebase.continue_next(),
            Err(MergeError::ConcurrentModification { .. })
        ));
        assert_eq!(fx.repo.branch_tip("feature").unwrap(), moved);
    }

    #[test]
    fn replayed_deletion_wins_when_upstream_edit_is_dropped() {
        let fx = Fixture::new();
        let table = fx.add_table("main", "Customers", "old");
        let field = fx.add_field("main", &table, "Id");
        fx.branch("feature", "main");
        fx.delete("feature", &table.path);
        fx.set("main", &table, "Name", json!("Clients"));

        let mut rebase = Rebase::start(&fx.repo, "feature", "main", fx.policy(), None).unwrap();
        assert_eq!(rebase.status(), RebaseStatus::Conflicts);
        assert_eq!(
            rebase.current_changes().get(&table.path).unwrap().status,
            crate::change::ItemMergeStatus::TreeConflict
        );

        rebase.resolve(&[Resolution::drop(&table.path)]).unwrap();
        assert_eq!(rebase.continue_next().unwrap(), RebaseStatus::Complete);
        let tip = fx.repo.branch_tip("feature").unwrap();
        assert_eq!(rebase.completed_commits(), &[tip]);
        assert_eq!(fx.repo.lookup(&tip, &table.path).unwrap(), None);
        assert_eq!(fx.repo.lookup(&tip, &field.path).unwrap(), None);
    }
}
