//! One-sided change records produced by the comparer.

use std::collections::HashMap;

use arbor_model::{Resource, Transform, TreeItem};
use arbor_types::DataPath;
use serde_json::Value;

use crate::error::{DiffError, DiffResult};

/// Property name under which a resource's content change is reported.
/// Values are the hex-encoded bytes.
pub const RESOURCE_CONTENT: &str = "content";

/// Encode resource bytes as a property value.
pub fn content_value(data: &[u8]) -> Value {
    Value::String(hex::encode(data))
}

/// Decode a value produced by [`content_value`].
pub fn content_bytes(value: &Value) -> Option<Vec<u8>> {
    value.as_str().and_then(|s| hex::decode(s).ok())
}

/// One property whose value differs between the two snapshots.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PropertyChange {
    pub name: String,
    pub old: Value,
    pub new: Value,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Added,
    Deleted,
    Modified,
}

/// A single item that differs between two snapshots.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Change {
    /// Present only in the new snapshot.
    Added { item: TreeItem },
    /// Present only in the old snapshot.
    Deleted { item: TreeItem },
    /// Present in both with at least one differing property.
    Modified {
        old: TreeItem,
        new: TreeItem,
        properties: Vec<PropertyChange>,
    },
}

impl Change {
    /// Path of the changed item.
    pub fn path(&self) -> &DataPath {
        match self {
            Change::Added { item } | Change::Deleted { item } => item.path(),
            Change::Modified { new, .. } => new.path(),
        }
    }

    /// Whether the item was added, deleted or modified.
    pub fn kind(&self) -> ChangeKind {
        match self {
            Change::Added { .. } => ChangeKind::Added,
            Change::Deleted { .. } => ChangeKind::Deleted,
            Change::Modified { .. } => ChangeKind::Modified,
        }
    }

    /// The item as it was before the change.
    pub fn old(&self) -> Option<&TreeItem> {
        match self {
            Change::Added { .. } => None,
            Change::Deleted { item } => Some(item),
            Change::Modified { old, .. } => Some(old),
        }
    }

    /// The item as it is after the change.
    pub fn new(&self) -> Option<&TreeItem> {
        match self {
            Change::Added { item } => Some(item),
            Change::Deleted { .. } => None,
            Change::Modified { new, .. } => Some(new),
        }
    }

    /// Changed properties; empty unless `Modified`.
    pub fn properties(&self) -> &[PropertyChange] {
        match self {
            Change::Modified { properties, .. } => properties,
            _ => &[],
        }
    }

    /// The tree edit that replays this change on the old snapshot.
    pub fn to_transform(&self) -> Transform {
        match self {
            Change::Added { item } => Transform::Upsert(item.clone()),
            Change::Deleted { item } => Transform::Delete(item.path().clone()),
            Change::Modified { new: TreeItem::Resource(r), .. } => {
                Transform::Upsert(TreeItem::Resource(r.clone()))
            }
            Change::Modified { new, properties, .. } => Transform::Patch {
                path: new.path().clone(),
                properties: properties
                    .iter()
                    .map(|p| (p.name.clone(), p.new.clone()))
                    .collect(),
            },
        }
    }
}

/// Result of one comparison: added, deleted and modified items, each kept
/// in walk order. A path appears at most once.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChangeCollection {
    changes: Vec<Change>,
    index: HashMap<DataPath, usize>,
}

impl ChangeCollection {
    /// Create an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a change. Fails if its path is already present or if a
    /// `Modified` change lists no properties.
    pub fn push(&mut self, change: Change) -> DiffResult<()> {
        if matches!(&change, Change::Modified { properties, .. } if properties.is_empty()) {
            return Err(DiffError::EmptyModification(change.path().clone()));
        }
        let path = change.path().clone();
        if self.index.contains_key(&path) {
            return Err(DiffError::DuplicatePath(path));
        }
        self.index.insert(path, self.changes.len());
        self.changes.push(change);
        Ok(())
    }

    /// Returns `true` if nothing changed.
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Number of changed items.
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// Every change in walk order.
    pub fn iter(&self) -> impl Iterator<Item = &Change> {
        self.changes.iter()
    }

    /// Change recorded for `path`, if any.
    pub fn get(&self, path: &DataPath) -> Option<&Change> {
        self.index.get(path).map(|&i| &self.changes[i])
    }

    /// Returns `true` if `path` changed.
    pub fn contains(&self, path: &DataPath) -> bool {
        self.index.contains_key(path)
    }

    /// Returns `true` if `path` was deleted.
    pub fn is_deleted(&self, path: &DataPath) -> bool {
        matches!(self.get(path), Some(Change::Deleted { .. }))
    }

    /// Changes of one kind, in walk order.
    pub fn of_kind(&self, kind: ChangeKind) -> impl Iterator<Item = &Change> {
        self.changes.iter().filter(move |c| c.kind() == kind)
    }

    /// Added items, in walk order.
    pub fn added(&self) -> impl Iterator<Item = &Change> {
        self.of_kind(ChangeKind::Added)
    }

    /// Deleted items, in walk order.
    pub fn deleted(&self) -> impl Iterator<Item = &Change> {
        self.of_kind(ChangeKind::Deleted)
    }

    /// Modified items, in walk order.
    pub fn modified(&self) -> impl Iterator<Item = &Change> {
        self.of_kind(ChangeKind::Modified)
    }

    /// Tree edits that turn the old snapshot into the new one, parents
    /// before children.
    pub fn to_transforms(&self) -> Vec<Transform> {
        self.changes.iter().map(Change::to_transform).collect()
    }
}

impl<'a> IntoIterator for &'a ChangeCollection {
    type Item = &'a Change;
    type IntoIter = std::slice::Iter<'a, Change>;

    fn into_iter(self) -> Self::IntoIter {
        self.changes.iter()
    }
}

/// Content change of a resource as a single-property list.
pub(crate) fn resource_change(old: &Resource, new: &Resource) -> Option<PropertyChange> {
    (old.data != new.data).then(|| PropertyChange {
        name: RESOURCE_CONTENT.to_string(),
        old: content_value(&old.data),
        new: content_value(&new.data),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_model::Node;
    use arbor_types::UniqueId;
    use serde_json::json;

    fn table(raw: &str) -> Node {
        let id = UniqueId::parse(raw).unwrap();
        let path = DataPath::node(None, "Tables", &id).unwrap();
        Node::new(id, "Table", path)
    }

    #[test]
    fn push_keeps_paths_unique() {
        let t = table("aaaaaaaaaaaa");
        let mut set = ChangeCollection::new();
        set.push(Change::Added { item: t.clone().into() }).unwrap();
        assert!(matches!(
            set.push(Change::Deleted { item: t.into() }),
            Err(DiffError::DuplicatePath(_))
        ));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn modified_needs_properties() {
        let t = table("aaaaaaaaaaaa");
        let mut set = ChangeCollection::new();
        let path = t.path.clone();
        let err = set
            .push(Change::Modified {
                old: t.clone().into(),
                new: t.into(),
                properties: Vec::new(),
            })
            .unwrap_err();
        assert!(matches!(err, DiffError::EmptyModification(p) if p == path));
        assert!(set.is_empty());
    }

    #[test]
    fn kinds_are_filtered_in_insertion_order() {
        let a = table("aaaaaaaaaaaa");
        let b = table("bbbbbbbbbbbb");
        let c = table("cccccccccccc");
        let mut set = ChangeCollection::new();
        set.push(Change::Added { item: b.clone().into() }).unwrap();
        set.push(Change::Deleted { item: c.clone().into() }).unwrap();
        set.push(Change::Added { item: a.clone().into() }).unwrap();
        let added: Vec<&DataPath> = set.added().map(Change::path).collect();
        assert_eq!(added, vec![&b.path, &a.path]);
        assert_eq!(set.deleted().count(), 1);
        assert!(set.is_deleted(&c.path));
        assert_eq!(set.modified().count(), 0);
    }

    #[test]
    fn modified_node_becomes_patch() {
        let old = table("aaaaaaaaaaaa").with("Name", json!("a"));
        let new = old.clone().with("Name", json!("b"));
        let change = Change::Modified {
            old: old.into(),
            new: new.clone().into(),
            properties: vec![PropertyChange {
                name: "Name".into(),
                old: json!("a"),
                new: json!("b"),
            }],
        };
        assert_eq!(
            change.to_transform(),
            Transform::Patch {
                path: new.path,
                properties: vec![("Name".into(), json!("b"))],
            }
        );
    }

    #[test]
    fn resource_content_is_hex() {
        let owner = table("aaaaaaaaaaaa");
        let old = Resource::new(&owner.path, "a.bin", vec![0x01, 0xff]).unwrap();
        let new = Resource::new(&owner.path, "a.bin", vec![0x02]).unwrap();
        let change = resource_change(&old, &new).unwrap();
        assert_eq!(change.old, json!("01ff"));
        assert_eq!(content_bytes(&change.new), Some(vec![0x02]));
        assert!(resource_change(&old, &old).is_none());
    }
}
