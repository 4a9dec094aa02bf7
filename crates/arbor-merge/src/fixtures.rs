//! Shared repository fixture for the orchestrator tests.

use std::sync::Arc;

use arbor_model::{
    BranchUpdate, CommitRequest, ComparisonPolicy, Node, PropertyKind, Repository,
    RepositoryConfig, Schema, Transform, TypeDescriptor,
};
use arbor_refs::{InMemoryRefStore, RefStore};
use arbor_store::InMemoryObjectStore;
use arbor_types::{DataPath, ObjectId, Signature};
use chrono::{TimeZone, Utc};
use serde_json::{json, Value};

pub(crate) struct Fixture {
    pub repo: Repository,
    store: Arc<InMemoryObjectStore>,
}

impl Fixture {
    pub fn new() -> Self {
        let schema = Schema::builder()
            .register(
                TypeDescriptor::new("Table", "Tables")
                    .property("Name", PropertyKind::String)
                    .property("Description", PropertyKind::String)
                    .child("Field"),
            )
            .register(
                TypeDescriptor::new("Field", "Fields")
                    .property("Name", PropertyKind::String)
                    .property("DataType", PropertyKind::String),
            )
            .build()
            .unwrap();
        let store = Arc::new(InMemoryObjectStore::new());
        let repo = Repository::with_backends(
            store.clone(),
            Arc::new(InMemoryRefStore::new()),
            Arc::new(schema),
            RepositoryConfig::default(),
        );
        let fx = Self { repo, store };
        fx.root_commit("main", "Initial commit");
        fx.repo.refs().set_head("main").unwrap();
        fx
    }

    pub fn sig(&self) -> Signature {
        Signature::new("Ada", "ada@example.com", Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap())
    }

    pub fn policy(&self) -> &ComparisonPolicy {
        self.repo.policy()
    }

    pub fn object_count(&self) -> usize {
        self.store.len()
    }

    fn root_commit(&self, branch: &str, message: &str) -> ObjectId {
        self.repo
            .commit(CommitRequest {
                base_tree: None,
                transforms: Vec::new(),
                parents: Vec::new(),
                author: self.sig(),
                committer: self.sig(),
                message: message.into(),
                update_branch: Some(BranchUpdate {
                    branch: branch.into(),
                    expected: None,
                }),
            })
            .unwrap()
    }

    /// New branch with its own empty root commit.
    pub fn orphan_branch(&self, name: &str) -> ObjectId {
        self.root_commit(name, &format!("start {name}"))
    }

    pub fn branch(&self, name: &str, from: &str) {
        let target = self.repo.resolve(from).unwrap();
        self.repo.create_branch(name, target).unwrap();
    }

    pub fn commit(&self, branch: &str, transforms: Vec<Transform>, message: &str) -> ObjectId {
        self.repo
            .commit_on_branch(branch, transforms, &self.sig(), message)
            .unwrap()
    }

    pub fn add_table(&self, branch: &str, name: &str, description: &str) -> Node {
        let table = Node::create(self.repo.schema(), "Table", None)
            .unwrap()
            .with("Name", json!(name))
            .with("Description", json!(description));
        self.commit(branch, vec![Transform::Upsert(table.clone().into())], &format!("add {name}"));
        table
    }

    pub fn add_field(&self, branch: &str, table: &Node, name: &str) -> Node {
        let field = Node::create(self.repo.schema(), "Field", Some(&table.path))
            .unwrap()
            .with("Name", json!(name));
        self.commit(branch, vec![Transform::Upsert(field.clone().into())], &format!("add field {name}"));
        field
    }

    pub fn set(&self, branch: &str, node: &Node, property: &str, value: Value) -> ObjectId {
        let message = format!("set {property} to {value}");
        self.commit(
            branch,
            vec![Transform::Patch {
                path: node.path.clone(),
                properties: vec![(property.to_string(), value)],
            }],
            &message,
        )
    }

    pub fn delete(&self, branch: &str, path: &DataPath) -> ObjectId {
        self.commit(branch, vec![Transform::Delete(path.clone())], "delete")
    }

    /// Current version of `node` at the tip of `branch`.
    pub fn node(&self, branch: &str, node: &Node) -> Node {
        let tip = self.repo.branch_tip(branch).unwrap();
        match self.repo.lookup(&tip, &node.path).unwrap() {
            Some(item) => item.as_node().cloned().unwrap(),
            None => panic!("{} missing on {branch}", node.path),
        }
    }
}
