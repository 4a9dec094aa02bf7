//! Merge outcomes: one [`MergeChange`] per path touched by either side.

use arbor_diff::{content_bytes, PropertyChange};
use arbor_model::{Resource, Transform, TreeItem};
use arbor_types::DataPath;
use serde_json::Value;
use tracing::debug;

use crate::error::{MergeError, MergeResult};

/// Classification of one path in a three-way merge.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ItemMergeStatus {
    Unchanged,
    Added,
    /// Property changes that do not collide.
    Edit,
    /// The same property was set to different values on both sides.
    EditConflict,
    Deleted,
    /// Add or edit under something the other side deleted, or two
    /// different items added at the same path.
    TreeConflict,
}

impl ItemMergeStatus {
    /// Returns `true` for the states that need a [`Resolution`].
    pub fn is_conflict(self) -> bool {
        matches!(self, ItemMergeStatus::EditConflict | ItemMergeStatus::TreeConflict)
    }
}

/// Which side's change set the entry came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Origin {
    Ours,
    Theirs,
    Both,
}

/// A property set to different values on both sides.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Conflict {
    pub property: String,
    pub ancestor_value: Value,
    pub our_value: Value,
    pub their_value: Value,
    pub resolved_value: Option<Value>,
}

impl Conflict {
    /// Returns `true` once a value was chosen.
    pub fn is_resolved(&self) -> bool {
        self.resolved_value.is_some()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MergeChange {
    pub path: DataPath,
    pub status: ItemMergeStatus,
    pub origin: Origin,
    pub ancestor: Option<TreeItem>,
    pub ours: Option<TreeItem>,
    pub theirs: Option<TreeItem>,
    /// Top of the subtree ours deleted above this path.
    pub our_root_deleted_parent: Option<DataPath>,
    /// Top of the subtree theirs deleted above this path.
    pub their_root_deleted_parent: Option<DataPath>,
    /// Merged property values relative to the ancestor.
    pub properties: Vec<PropertyChange>,
    pub conflicts: Vec<Conflict>,
}

impl MergeChange {
    pub(crate) fn new(path: DataPath, origin: Origin) -> Self {
        Self {
            path,
            status: ItemMergeStatus::Unchanged,
            origin,
            ancestor: None,
            ours: None,
            theirs: None,
            our_root_deleted_parent: None,
            their_root_deleted_parent: None,
            properties: Vec::new(),
            conflicts: Vec::new(),
        }
    }

    /// Returns `true` while the entry blocks committing.
    pub fn is_conflict(&self) -> bool {
        self.status.is_conflict()
    }

    /// Conflict on `property`, if there is one.
    pub fn conflict(&self, property: &str) -> Option<&Conflict> {
        self.conflicts.iter().find(|c| c.property == property)
    }

    /// Edit needed on a tree that already reflects ours, or `None` if
    /// that tree already holds the merged result.
    fn transform(&self) -> MergeResult<Option<Transform>> {
        use ItemMergeStatus::*;
        if self.is_conflict() {
            return Err(MergeError::UnresolvedConflicts { count: 1 });
        }
        Ok(match (self.origin, self.status) {
            (Origin::Ours, _) | (_, Unchanged) => None,
            (Origin::Both, Added | Deleted) => None,
            (Origin::Theirs, Added) => self.theirs.clone().map(Transform::Upsert),
            (Origin::Theirs, Deleted) => Some(Transform::Delete(self.path.clone())),
            (_, Edit) => self.edit_transform()?,
            (_, EditConflict | TreeConflict) => None,
        })
    }

    fn edit_transform(&self) -> MergeResult<Option<Transform>> {
        let current = match self.origin {
            Origin::Theirs => self.ancestor.as_ref(),
            _ => self.ours.as_ref(),
        };
        match current {
            Some(TreeItem::Resource(resource)) => {
                let Some(change) = self.properties.iter().find(|p| p.name == arbor_diff::RESOURCE_CONTENT) else {
                    return Ok(None);
                };
                let data = content_bytes(&change.new).ok_or_else(|| MergeError::InvalidResolution {
                    path: self.path.clone(),
                    reason: "resource content must be a hex string".into(),
                })?;
                Ok((data != resource.data).then(|| {
                    Transform::Upsert(TreeItem::Resource(Resource {
                        path: self.path.clone(),
                        data,
                    }))
                }))
            }
            Some(TreeItem::Node(node)) => {
                let properties: Vec<(String, Value)> = self
                    .properties
                    .iter()
                    .filter(|p| node.get(&p.name) != &p.new)
                    .map(|p| (p.name.clone(), p.new.clone()))
                    .collect();
                Ok((!properties.is_empty()).then(|| Transform::Patch {
                    path: self.path.clone(),
                    properties,
                }))
            }
            None => Ok(None),
        }
    }
}

/// A caller decision about a pending conflict.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resolution {
    /// Settle one conflicting property.
    Property {
        path: DataPath,
        property: String,
        value: Value,
    },
    /// Give up the add or edit side of a tree conflict. Whatever deletion
    /// caused the conflict stays; for two different adds ours is kept.
    Drop { path: DataPath },
}

impl Resolution {
    /// Settle `property` of the item at `path` to `value`.
    pub fn property(path: &DataPath, property: impl Into<String>, value: Value) -> Self {
        Resolution::Property {
            path: path.clone(),
            property: property.into(),
            value,
        }
    }

    /// Give up the add or edit side of the tree conflict at `path`.
    pub fn drop(path: &DataPath) -> Self {
        Resolution::Drop { path: path.clone() }
    }

    /// Path the resolution applies to.
    pub fn path(&self) -> &DataPath {
        match self {
            Resolution::Property { path, .. } | Resolution::Drop { path } => path,
        }
    }
}

/// Immutable result of one merge comparison.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MergeChangeSet {
    changes: Vec<MergeChange>,
}

impl MergeChangeSet {
    /// Wrap entries already in walk order.
    pub fn new(changes: Vec<MergeChange>) -> Self {
        Self { changes }
    }

    /// Returns `true` if neither side changed anything.
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// Entries in walk order.
    pub fn iter(&self) -> impl Iterator<Item = &MergeChange> {
        self.changes.iter()
    }

    /// Entry for `path`, if either side touched it.
    pub fn get(&self, path: &DataPath) -> Option<&MergeChange> {
        self.changes.iter().find(|c| &c.path == path)
    }

    /// Entries still in a conflict state.
    pub fn conflicts(&self) -> impl Iterator<Item = &MergeChange> {
        self.changes.iter().filter(|c| c.is_conflict())
    }

    /// Number of entries still in conflict.
    pub fn conflict_count(&self) -> usize {
        self.conflicts().count()
    }

    /// Returns `true` if any entry is still in conflict.
    pub fn has_conflicts(&self) -> bool {
        self.changes.iter().any(MergeChange::is_conflict)
    }

    /// Apply resolutions, returning a new set. Nothing is applied unless
    /// every resolution is valid.
    pub fn resolve(&self, resolutions: &[Resolution]) -> MergeResult<MergeChangeSet> {
        let mut next = self.clone();
        for resolution in resolutions {
            next.apply(resolution)?;
        }
        debug!(
            resolutions = resolutions.len(),
            remaining = next.conflict_count(),
            "applied resolutions"
        );
        Ok(next)
    }

    fn apply(&mut self, resolution: &Resolution) -> MergeResult<()> {
        let invalid = |reason: &str| MergeError::InvalidResolution {
            path: resolution.path().clone(),
            reason: reason.to_string(),
        };
        let index = self
            .changes
            .iter()
            .position(|c| &c.path == resolution.path())
            .ok_or_else(|| invalid("no merge change at this path"))?;

        match resolution {
            Resolution::Drop { .. } => {
                let change = &mut self.changes[index];
                if change.status != ItemMergeStatus::TreeConflict {
                    return Err(invalid("only tree conflicts can be dropped"));
                }
                // An edit against a deletion of this very path keeps the
                // deletion; other tree conflicts just lose the entry.
                let deleted_by = match change.origin {
                    Origin::Both if change.our_root_deleted_parent.is_some() => Some(Origin::Ours),
                    Origin::Both if change.their_root_deleted_parent.is_some() => Some(Origin::Theirs),
                    _ => None,
                };
                match deleted_by {
                    Some(side) => {
                        change.origin = side;
                        change.status = ItemMergeStatus::Deleted;
                        change.ours = None;
                        change.theirs = None;
                        change.properties.clear();
                    }
                    None => {
                        self.changes.remove(index);
                    }
                }
            }
            Resolution::Property { property, value, .. } => {
                let change = &mut self.changes[index];
                if change.status != ItemMergeStatus::EditConflict {
                    return Err(invalid("change has no pending edit conflict"));
                }
                let is_resource = change.path.is_resource();
                let conflict = change
                    .conflicts
                    .iter_mut()
                    .find(|c| &c.property == property)
                    .ok_or_else(|| invalid(&format!("no conflict on {property}")))?;
                if conflict.is_resolved() {
                    return Err(invalid(&format!("{property} is already resolved")));
                }
                if is_resource && content_bytes(value).is_none() {
                    return Err(invalid("resource content must be a hex string"));
                }
                conflict.resolved_value = Some(value.clone());

                if change.conflicts.iter().all(Conflict::is_resolved) {
                    let settled: Vec<PropertyChange> = change
                        .conflicts
                        .iter()
                        .filter_map(|c| {
                            c.resolved_value.clone().map(|new| PropertyChange {
                                name: c.property.clone(),
                                old: c.ancestor_value.clone(),
                                new,
                            })
                        })
                        .collect();
                    change.properties.extend(settled);
                    change.status = ItemMergeStatus::Edit;
                }
            }
        }
        Ok(())
    }

    /// Tree edits that bring a tree holding ours to the merged result.
    pub fn transforms(&self) -> MergeResult<Vec<Transform>> {
        let count = self.conflict_count();
        if count > 0 {
            return Err(MergeError::UnresolvedConflicts { count });
        }
        let mut out = Vec::new();
        for change in &self.changes {
            out.extend(change.transform()?);
        }
        Ok(out)
    }
}

impl<'a> IntoIterator for &'a MergeChangeSet {
    type Item = &'a MergeChange;
    type IntoIter = std::slice::Iter<'a, MergeChange>;

    fn into_iter(self) -> Self::IntoIter {
        self.changes.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_model::Node;
    use arbor_types::UniqueId;
    use serde_json::json;

    fn table() -> Node {
        let id = UniqueId::parse("tttttttttttt").unwrap();
        Node::new(id.clone(), "Table", DataPath::node(None, "Tables", &id).unwrap())
    }

    fn conflicted() -> MergeChangeSet {
        let base = table().with("Description", json!("a"));
        let mut change = MergeChange::new(base.path.clone(), Origin::Both);
        change.status = ItemMergeStatus::EditConflict;
        change.ancestor = Some(base.clone().into());
        change.ours = Some(base.clone().with("Description", json!("b")).into());
        change.theirs = Some(base.clone().with("Description", json!("c")).into());
        change.conflicts.push(Conflict {
            property: "Description".into(),
            ancestor_value: json!("a"),
            our_value: json!("b"),
            their_value: json!("c"),
            resolved_value: None,
        });
        MergeChangeSet::new(vec![change])
    }

    #[test]
    fn resolving_every_conflict_turns_into_edit() {
        let set = conflicted();
        let path = table().path;
        assert!(matches!(
            set.transforms(),
            Err(MergeError::UnresolvedConflicts { count: 1 })
        ));
        let resolved = set
            .resolve(&[Resolution::property(&path, "Description", json!("d"))])
            .unwrap();
        let change = resolved.get(&path).unwrap();
        assert_eq!(change.status, ItemMergeStatus::Edit);
        assert_eq!(change.conflict("Description").unwrap().resolved_value, Some(json!("d")));
        assert_eq!(
            resolved.transforms().unwrap(),
            vec![Transform::Patch {
                path,
                properties: vec![("Description".into(), json!("d"))],
            }]
        );
        assert!(set.has_conflicts());
    }

    #[test]
    fn resolution_misuse_is_rejected() {
        let set = conflicted();
        let path = table().path;
        let twice = [
            Resolution::property(&path, "Description", json!("d")),
            Resolution::property(&path, "Description", json!("e")),
        ];
        assert!(matches!(set.resolve(&twice), Err(MergeError::InvalidResolution { .. })));
        assert!(matches!(
            set.resolve(&[Resolution::property(&path, "Name", json!("x"))]),
            Err(MergeError::InvalidResolution { .. })
        ));
        assert!(matches!(
            set.resolve(&[Resolution::drop(&path)]),
            Err(MergeError::InvalidResolution { .. })
        ));
        let other = DataPath::parse("Tables/uuuuuuuuuuuu/uuuuuuuuuuuu.json").unwrap();
        assert!(matches!(
            set.resolve(&[Resolution::drop(&other)]),
            Err(MergeError::InvalidResolution { .. })
        ));
    }

    #[test]
    fn resolving_with_ours_needs_no_edit() {
        let set = conflicted();
        let path = table().path;
        let resolved = set
            .resolve(&[Resolution::property(&path, "Description", json!("b"))])
            .unwrap();
        assert!(resolved.transforms().unwrap().is_empty());
    }

    #[test]
    fn theirs_only_entries_become_edits() {
        let t = table();
        let mut added = MergeChange::new(t.path.clone(), Origin::Theirs);
        added.status = ItemMergeStatus::Added;
        added.theirs = Some(t.clone().into());
        let mut gone = MergeChange::new(t.path.clone(), Origin::Theirs);
        gone.status = ItemMergeStatus::Deleted;
        let mut ours = MergeChange::new(t.path.clone(), Origin::Ours);
        ours.status = ItemMergeStatus::Added;

        let set = MergeChangeSet::new(vec![added, gone, ours]);
        assert_eq!(
            set.transforms().unwrap(),
            vec![Transform::Upsert(t.clone().into()), Transform::Delete(t.path)]
        );
    }
}
