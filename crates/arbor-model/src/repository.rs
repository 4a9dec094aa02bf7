//! Repository handle: storage, refs, schema and the commit command.

use std::sync::Arc;

use arbor_dag::CommitGraph;
use arbor_refs::{branch_ref_name, tag_ref_name, Head, InMemoryRefStore, Ref, RefError, RefStore};
use arbor_store::{CommitObject, InMemoryObjectStore, ObjectKind, ObjectStore, Tree};
use arbor_types::{DataPath, ObjectId, Signature};
use tracing::{debug, info};

use crate::config::RepositoryConfig;
use crate::error::{ModelError, ModelResult};
use crate::node::TreeItem;
use crate::policy::ComparisonPolicy;
use crate::schema::Schema;
use crate::serializer::{JsonNodeSerializer, NodeSerializer};
use crate::source::TreeSource;
use crate::store_snapshot::StoreSnapshot;
use crate::transform::Transform;
use crate::tree_def::{ApplyContext, TreeDefinition};

/// Move `branch` to the new commit, but only if it still points at
/// `expected` (`None`: the branch must not exist yet).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BranchUpdate {
    pub branch: String,
    pub expected: Option<ObjectId>,
}

/// Everything needed to produce one commit.
#[derive(Clone, Debug)]
pub struct CommitRequest {
    /// Tree the transforms are applied to; `None` starts from an empty tree.
    pub base_tree: Option<ObjectId>,
    pub transforms: Vec<Transform>,
    /// First parent first.
    pub parents: Vec<ObjectId>,
    pub author: Signature,
    pub committer: Signature,
    pub message: String,
    pub update_branch: Option<BranchUpdate>,
}

/// A versioned store of typed node trees.
pub struct Repository {
    store: Arc<dyn ObjectStore>,
    refs: Arc<dyn RefStore>,
    schema: Arc<Schema>,
    serializer: Arc<dyn NodeSerializer>,
    config: RepositoryConfig,
}

impl Repository {
    /// Wrap existing backends. Nodes are encoded with [`JsonNodeSerializer`].
    pub fn with_backends(
        store: Arc<dyn ObjectStore>,
        refs: Arc<dyn RefStore>,
        schema: Arc<Schema>,
        config: RepositoryConfig,
    ) -> Self {
        Self {
            serializer: Arc::new(JsonNodeSerializer::new(schema.clone())),
            store,
            refs,
            schema,
            config,
        }
    }

    /// Replace the node serializer.
    pub fn with_serializer(mut self, serializer: Arc<dyn NodeSerializer>) -> Self {
        self.serializer = serializer;
        self
    }

    /// Fresh in-memory repository whose default branch holds one empty
    /// root commit. HEAD points at the default branch.
    pub fn init(schema: Schema, config: RepositoryConfig, signature: &Signature) -> ModelResult<Self> {
        let repo = Self::with_backends(
            Arc::new(InMemoryObjectStore::new()),
            Arc::new(InMemoryRefStore::new()),
            Arc::new(schema),
            config,
        );
        let branch = repo.config.default_branch.clone();
        let root = repo.commit(CommitRequest {
            base_tree: None,
            transforms: Vec::new(),
            parents: Vec::new(),
            author: signature.clone(),
            committer: signature.clone(),
            message: "Initial commit".into(),
            update_branch: Some(BranchUpdate {
                branch: branch.clone(),
                expected: None,
            }),
        })?;
        repo.refs.set_head(&branch)?;
        info!(branch = %branch, root = %root.short_hex(), "initialized repository");
        Ok(repo)
    }

    /// Backing object store.
    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    /// Backing ref store.
    pub fn refs(&self) -> &Arc<dyn RefStore> {
        &self.refs
    }

    /// Schema nodes are validated against.
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Serializer used for node blobs.
    pub fn serializer(&self) -> &Arc<dyn NodeSerializer> {
        &self.serializer
    }

    /// Repository settings.
    pub fn config(&self) -> &RepositoryConfig {
        &self.config
    }

    /// Comparison policy from the settings.
    pub fn policy(&self) -> &ComparisonPolicy {
        &self.config.comparison
    }

    /// Configured identity, stamped now.
    pub fn default_signature(&self) -> Option<Signature> {
        self.config.identity.as_ref().map(|i| i.signature())
    }

    /// Read a commit object.
    pub fn read_commit(&self, id: &ObjectId) -> ModelResult<CommitObject> {
        Ok(self.store.read_commit(id)?)
    }

    /// Resolve `HEAD`, a branch, a tag, a full ref name or a full commit id.
    pub fn resolve(&self, committish: &str) -> ModelResult<ObjectId> {
        let unresolvable = || ModelError::UnresolvableReference(committish.to_string());
        if committish == "HEAD" {
            return match self.refs.head()? {
                Some(Head::Symbolic(branch)) => self.branch_tip(&branch),
                Some(Head::Detached(id)) => Ok(id),
                None => Err(unresolvable()),
            };
        }
        for name in [
            branch_ref_name(committish),
            tag_ref_name(committish),
            committish.to_string(),
        ] {
            if let Some(reference) = self.refs.read_ref(&name)? {
                return Ok(reference.target());
            }
        }
        let id = ObjectId::from_hex(committish).map_err(|_| unresolvable())?;
        match self.store.read(&id)? {
            Some(object) if object.kind == ObjectKind::Commit => Ok(id),
            _ => Err(unresolvable()),
        }
    }

    /// Commit `branch` points at.
    pub fn branch_tip(&self, branch: &str) -> ModelResult<ObjectId> {
        self.refs
            .branch_target(branch)?
            .ok_or_else(|| ModelError::UnresolvableReference(branch.to_string()))
    }

    /// Branch HEAD points at, if HEAD is symbolic.
    pub fn head_branch(&self) -> ModelResult<Option<String>> {
        Ok(match self.refs.head()? {
            Some(Head::Symbolic(branch)) => Some(branch),
            _ => None,
        })
    }

    /// Create `name` at `target`. Fails if the branch exists.
    pub fn create_branch(&self, name: &str, target: ObjectId) -> ModelResult<()> {
        self.refs
            .compare_and_swap(&branch_ref_name(name), None, &Ref::branch(name, target))
            .map_err(|e| match e {
                RefError::ConcurrentUpdate { name, .. } => RefError::AlreadyExists { name }.into(),
                other => other.into(),
            })
    }

    /// Move a branch from `expected` to `target`, failing on drift.
    pub fn update_branch(&self, name: &str, expected: ObjectId, target: ObjectId) -> ModelResult<()> {
        self.refs
            .compare_and_swap(&branch_ref_name(name), Some(expected), &Ref::branch(name, target))?;
        info!(branch = name, from = %expected.short_hex(), to = %target.short_hex(), "branch advanced");
        Ok(())
    }

    /// Snapshot of the tree recorded in `commit`.
    pub fn snapshot(&self, commit: &ObjectId) -> ModelResult<StoreSnapshot> {
        let tree = self.read_commit(commit)?.tree;
        Ok(self.tree_snapshot(tree))
    }

    /// Lazy snapshot of a stored tree.
    pub fn tree_snapshot(&self, tree: ObjectId) -> StoreSnapshot {
        StoreSnapshot::new(self.store.clone(), self.serializer.clone(), tree)
    }

    /// Snapshot of the empty tree, the ancestor of unrelated histories.
    pub fn empty_snapshot(&self) -> ModelResult<StoreSnapshot> {
        let tree = self.store.write_tree(&Tree::empty())?;
        Ok(self.tree_snapshot(tree))
    }

    /// Item at `path` in the tree of `commit`.
    pub fn lookup(&self, commit: &ObjectId, path: &DataPath) -> ModelResult<Option<TreeItem>> {
        self.snapshot(commit)?.get(path)
    }

    /// History reachable from `tips`.
    pub fn commit_graph(&self, tips: &[ObjectId]) -> ModelResult<CommitGraph> {
        Ok(CommitGraph::load(self.store.as_ref(), tips)?)
    }

    /// Apply the transforms to the base tree, write the result and the
    /// commit object, then optionally move a branch. Nothing visible
    /// changes if any step fails.
    pub fn commit(&self, request: CommitRequest) -> ModelResult<ObjectId> {
        let mut tree = match &request.base_tree {
            Some(base) => TreeDefinition::load(self.store.as_ref(), base)?,
            None => TreeDefinition::empty(),
        };
        let cx = ApplyContext {
            store: self.store.as_ref(),
            serializer: self.serializer.as_ref(),
            schema: &self.schema,
        };
        for transform in &request.transforms {
            tree.apply(&cx, transform)?;
        }
        let tree = tree.write(self.store.as_ref())?;

        let commit = CommitObject {
            tree,
            parents: request.parents,
            author: request.author,
            committer: request.committer,
            message: request.message,
        };
        let id = self.store.write_commit(&commit)?;
        debug!(
            commit = %id.short_hex(),
            tree = %tree.short_hex(),
            parents = commit.parents.len(),
            transforms = request.transforms.len(),
            "wrote commit"
        );

        if let Some(update) = request.update_branch {
            self.refs.compare_and_swap(
                &branch_ref_name(&update.branch),
                update.expected,
                &Ref::branch(update.branch.as_str(), id),
            )?;
            info!(branch = %update.branch, commit = %id.short_hex(), "branch advanced");
        }
        Ok(id)
    }

    /// Commit on top of a branch tip and advance the branch.
    pub fn commit_on_branch(
        &self,
        branch: &str,
        transforms: Vec<Transform>,
        author: &Signature,
        message: impl Into<String>,
    ) -> ModelResult<ObjectId> {
        let tip = self.branch_tip(branch)?;
        let base_tree = self.read_commit(&tip)?.tree;
        self.commit(CommitRequest {
            base_tree: Some(base_tree),
            transforms,
            parents: vec![tip],
            author: author.clone(),
            committer: author.clone(),
            message: message.into(),
            update_branch: Some(BranchUpdate {
                branch: branch.to_string(),
                expected: Some(tip),
            }),
        })
    }
}

impl std::fmt::Debug for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("default_branch", &self.config.default_branch)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Node;
    use crate::schema::{PropertyKind, TypeDescriptor};
    use crate::snapshot::Snapshot;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn sig() -> Signature {
        Signature::new("Ada", "ada@example.com", Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap())
    }

    fn repo() -> Repository {
        let schema = Schema::builder()
            .register(
                TypeDescriptor::new("Table", "Tables")
                    .property("Name", PropertyKind::String)
                    .property("Description", PropertyKind::String),
            )
            .build()
            .unwrap();
        Repository::init(schema, RepositoryConfig::default(), &sig()).unwrap()
    }

    #[test]
    fn init_creates_default_branch_and_head() {
        let repo = repo();
        let tip = repo.branch_tip("main").unwrap();
        assert_eq!(repo.resolve("HEAD").unwrap(), tip);
        assert_eq!(repo.resolve("main").unwrap(), tip);
        assert_eq!(repo.resolve(&tip.to_hex()).unwrap(), tip);
        assert_eq!(repo.head_branch().unwrap().as_deref(), Some("main"));
        let commit = repo.read_commit(&tip).unwrap();
        assert!(commit.parents.is_empty());
        assert!(repo.snapshot(&tip).unwrap().items().unwrap().is_empty());
    }

    #[test]
    fn resolve_rejects_unknown_names() {
        let repo = repo();
        assert!(matches!(
            repo.resolve("nope"),
            Err(ModelError::UnresolvableReference(_))
        ));
        let tree = repo.store().write_tree(&Tree::empty()).unwrap();
        assert!(matches!(
            repo.resolve(&tree.to_hex()),
            Err(ModelError::UnresolvableReference(_))
        ));
    }

    #[test]
    fn commit_on_branch_advances_and_lookup_sees_node() {
        let repo = repo();
        let before = repo.branch_tip("main").unwrap();
        let table = Node::create(repo.schema(), "Table", None)
            .unwrap()
            .with("Name", json!("Customers"));
        let id = repo
            .commit_on_branch("main", vec![Transform::Upsert(table.clone().into())], &sig(), "add table")
            .unwrap();
        assert_eq!(repo.branch_tip("main").unwrap(), id);
        assert_eq!(repo.read_commit(&id).unwrap().parents, vec![before]);
        assert_eq!(repo.lookup(&id, &table.path).unwrap(), Some(TreeItem::Node(table.clone())));
        assert_eq!(repo.lookup(&before, &table.path).unwrap(), None);

        let snapshot = Snapshot::from_source(&repo.snapshot(&id).unwrap()).unwrap();
        assert_eq!(snapshot.len(), 1);
    }

    #[test]
    fn commit_with_stale_expectation_is_rejected() {
        let repo = repo();
        let tip = repo.branch_tip("main").unwrap();
        repo.commit_on_branch("main", Vec::new(), &sig(), "moves main").unwrap();
        let err = repo
            .commit(CommitRequest {
                base_tree: None,
                transforms: Vec::new(),
                parents: vec![tip],
                author: sig(),
                committer: sig(),
                message: "stale".into(),
                update_branch: Some(BranchUpdate {
                    branch: "main".into(),
                    expected: Some(tip),
                }),
            })
            .unwrap_err();
        assert!(matches!(err, ModelError::Ref(RefError::ConcurrentUpdate { .. })));
    }

    #[test]
    fn create_branch_twice_fails() {
        let repo = repo();
        let tip = repo.branch_tip("main").unwrap();
        repo.create_branch("feature", tip).unwrap();
        assert_eq!(repo.resolve("feature").unwrap(), tip);
        assert!(matches!(
            repo.create_branch("feature", tip),
            Err(ModelError::Ref(RefError::AlreadyExists { .. }))
        ));
    }

    #[test]
    fn commit_graph_covers_history() {
        let repo = repo();
        let root = repo.branch_tip("main").unwrap();
        let next = repo.commit_on_branch("main", Vec::new(), &sig(), "second").unwrap();
        let graph = repo.commit_graph(&[next]).unwrap();
        assert!(graph.is_ancestor(&root, &next).unwrap());
    }
}
