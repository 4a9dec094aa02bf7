//! Arena-backed in-memory snapshot.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use arbor_types::{DataPath, UniqueId};

use crate::error::{ModelError, ModelResult};
use crate::node::{Node, Resource, TreeItem};
use crate::source::{ChildEntry, SiblingKey, TreeSource};

#[derive(Clone, Debug, PartialEq, Eq)]
struct NodeRecord {
    node: Node,
    parent: Option<UniqueId>,
    children: BTreeSet<UniqueId>,
    /// Keyed by path relative to the `Resources` folder.
    resources: BTreeMap<String, Vec<u8>>,
}

/// A whole tree held in memory.
///
/// Nodes live in a flat map keyed by id; parent and child links are ids
/// looked up in that map. Equality is structural: two snapshots are equal
/// when they hold the same nodes with the same properties, at the same
/// paths, with the same resources. Insertion order does not matter.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Snapshot {
    nodes: HashMap<UniqueId, NodeRecord>,
    roots: BTreeSet<UniqueId>,
}

impl Snapshot {
    /// Create an empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy every item of `source` into memory.
    pub fn from_source(source: &dyn TreeSource) -> ModelResult<Self> {
        let mut snapshot = Self::new();
        for item in source.items()? {
            snapshot.insert(item)?;
        }
        Ok(snapshot)
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` if there are no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Node with `id`, wherever it sits.
    pub fn node(&self, id: &UniqueId) -> Option<&Node> {
        self.nodes.get(id).map(|r| &r.node)
    }

    fn record_at(&self, path: &DataPath) -> Option<&NodeRecord> {
        let record = self.nodes.get(&path.unique_id()?)?;
        (record.node.path == *path).then_some(record)
    }

    fn owner_id(&self, path: &DataPath) -> ModelResult<Option<UniqueId>> {
        match path.parent() {
            None => Ok(None),
            Some(parent) => self
                .record_at(&parent)
                .map(|r| Some(r.node.id.clone()))
                .ok_or_else(|| ModelError::ParentMissing(path.clone())),
        }
    }

    /// Insert or replace an item. The parent node must already be present.
    pub fn insert(&mut self, item: TreeItem) -> ModelResult<()> {
        match item {
            TreeItem::Node(node) => self.insert_node(node),
            TreeItem::Resource(resource) => self.insert_resource(resource),
        }
    }

    /// Insert or replace a node, keeping its children and resources.
    pub fn insert_node(&mut self, node: Node) -> ModelResult<()> {
        let parent = self.owner_id(&node.path)?;
        if let Some(existing) = self.nodes.get_mut(&node.id) {
            if existing.node.path != node.path {
                return Err(ModelError::InvalidItem {
                    path: node.path,
                    reason: format!("id already used at {}", existing.node.path),
                });
            }
            existing.node = node;
            return Ok(());
        }
        match &parent {
            Some(p) => {
                if let Some(record) = self.nodes.get_mut(p) {
                    record.children.insert(node.id.clone());
                }
            }
            None => {
                self.roots.insert(node.id.clone());
            }
        }
        self.nodes.insert(
            node.id.clone(),
            NodeRecord {
                node,
                parent,
                children: BTreeSet::new(),
                resources: BTreeMap::new(),
            },
        );
        Ok(())
    }

    /// Insert or replace a resource on an existing node.
    pub fn insert_resource(&mut self, resource: Resource) -> ModelResult<()> {
        let owner = self
            .owner_id(&resource.path)?
            .ok_or_else(|| ModelError::ParentMissing(resource.path.clone()))?;
        let relative = resource.path.resource_relative_path().ok_or_else(|| {
            ModelError::InvalidItem {
                path: resource.path.clone(),
                reason: "not a resource path".into(),
            }
        })?;
        if let Some(record) = self.nodes.get_mut(&owner) {
            record.resources.insert(relative, resource.data);
        }
        Ok(())
    }

    /// Remove an item and, for a node, everything below it.
    pub fn remove(&mut self, path: &DataPath) -> bool {
        if let Some(relative) = path.resource_relative_path() {
            let Some(owner) = path.parent().and_then(|p| p.unique_id()) else {
                return false;
            };
            return self
                .nodes
                .get_mut(&owner)
                .is_some_and(|r| r.resources.remove(&relative).is_some());
        }
        let Some(record) = self.record_at(path) else {
            return false;
        };
        let id = record.node.id.clone();
        match record.parent.clone() {
            Some(parent) => {
                if let Some(p) = self.nodes.get_mut(&parent) {
                    p.children.remove(&id);
                }
            }
            None => {
                self.roots.remove(&id);
            }
        }
        let mut pending = vec![id];
        while let Some(next) = pending.pop() {
            if let Some(removed) = self.nodes.remove(&next) {
                pending.extend(removed.children);
            }
        }
        true
    }
}

impl TreeSource for Snapshot {
    fn children(&self, parent: Option<&DataPath>) -> ModelResult<Vec<ChildEntry>> {
        let child_entry = |id: &UniqueId| ChildEntry {
            key: SiblingKey::Node(id.clone()),
            path: self.nodes[id].node.path.clone(),
            object: None,
        };
        let Some(parent) = parent else {
            return Ok(self.roots.iter().map(child_entry).collect());
        };
        let Some(record) = self.record_at(parent) else {
            return Ok(Vec::new());
        };
        let mut entries: Vec<ChildEntry> = record.children.iter().map(child_entry).collect();
        for relative in record.resources.keys() {
            entries.push(ChildEntry {
                key: SiblingKey::Resource(relative.clone()),
                path: DataPath::resource(parent, relative)?,
                object: None,
            });
        }
        Ok(entries)
    }

    fn load(&self, entry: &ChildEntry) -> ModelResult<TreeItem> {
        self.get(&entry.path)?
            .ok_or_else(|| ModelError::NotFound(entry.path.clone()))
    }

    fn get(&self, path: &DataPath) -> ModelResult<Option<TreeItem>> {
        if let Some(relative) = path.resource_relative_path() {
            let data = path
                .parent()
                .and_then(|owner| self.record_at(&owner))
                .and_then(|r| r.resources.get(&relative));
            return Ok(data.map(|d| {
                TreeItem::Resource(Resource {
                    path: path.clone(),
                    data: d.clone(),
                })
            }));
        }
        Ok(self.record_at(path).map(|r| TreeItem::Node(r.node.clone())))
    }
}
