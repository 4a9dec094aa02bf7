//! Read access to a tree snapshot.

use arbor_types::{DataPath, ObjectId, UniqueId};
use serde_json::Value;

use crate::error::{ModelError, ModelResult};
use crate::node::{Link, TreeItem};

/// Sort key of an item among its siblings: child nodes by id, then
/// resources by their path relative to the owner's `Resources` folder.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SiblingKey {
    Node(UniqueId),
    Resource(String),
}

/// A child listed by [`TreeSource::children`], not yet loaded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChildEntry {
    pub key: SiblingKey,
    pub path: DataPath,
    /// Content id covering the item and, for nodes, everything below it.
    /// Two entries with equal ids are identical subtrees. `None` when the
    /// source does not know.
    pub object: Option<ObjectId>,
}

impl ChildEntry {
    /// Entry for `path`, keyed by its id or resource path.
    pub fn for_path(path: DataPath, object: Option<ObjectId>) -> ModelResult<Self> {
        let key = match (path.unique_id(), path.resource_relative_path()) {
            (Some(id), _) => SiblingKey::Node(id),
            (None, Some(relative)) => SiblingKey::Resource(relative),
            (None, None) => {
                return Err(ModelError::InvalidItem {
                    path,
                    reason: "neither a node nor a resource".into(),
                })
            }
        };
        Ok(Self { key, path, object })
    }

    /// Returns `true` if the entry is a node.
    pub fn is_node(&self) -> bool {
        matches!(self.key, SiblingKey::Node(_))
    }
}

/// An immutable tree snapshot that can be walked lazily.
pub trait TreeSource {
    /// Direct children of the node at `parent`, or the top-level nodes when
    /// `parent` is `None`, sorted by [`SiblingKey`].
    fn children(&self, parent: Option<&DataPath>) -> ModelResult<Vec<ChildEntry>>;

    /// Fetch the item behind a listed entry.
    fn load(&self, entry: &ChildEntry) -> ModelResult<TreeItem>;

    /// Fetch any item by path. `Ok(None)` if it is not in the snapshot.
    fn get(&self, path: &DataPath) -> ModelResult<Option<TreeItem>>;

    /// Follow a link property value to the item it names.
    fn resolve_link(&self, value: &Value) -> ModelResult<TreeItem> {
        let target = Link::target(value)
            .ok_or_else(|| ModelError::UnresolvableReference(value.to_string()))?;
        self.get(&target)?
            .ok_or_else(|| ModelError::UnresolvableReference(target.full_path().to_string()))
    }

    /// Every item in the snapshot, parents before children.
    fn items(&self) -> ModelResult<Vec<TreeItem>> {
        let mut out = Vec::new();
        let mut stack: Vec<ChildEntry> = self.children(None)?;
        stack.reverse();
        while let Some(entry) = stack.pop() {
            if entry.is_node() {
                let mut children = self.children(Some(&entry.path))?;
                children.reverse();
                out.push(self.load(&entry)?);
                stack.extend(children);
            } else {
                out.push(self.load(&entry)?);
            }
        }
        Ok(out)
    }
}
