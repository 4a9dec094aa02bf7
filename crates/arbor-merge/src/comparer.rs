//! Three-way classification of two change sets taken against one ancestor.

use std::collections::HashSet;

use arbor_diff::{Change, ChangeCollection, ChangeKind, Comparer, PropertyChange};
use arbor_model::{ComparisonPolicy, PropertyKind, Schema};
use arbor_types::DataPath;
use tracing::{debug, warn};

use crate::change::{Conflict, ItemMergeStatus, MergeChange, MergeChangeSet, Origin};
use crate::error::MergeResult;

/// Combines "ours" and "theirs" change sets into a [`MergeChangeSet`].
///
/// Entries are listed in ours' walk order, followed by paths only theirs
/// touched, in theirs' walk order. Swapping the operands swaps the
/// ours/theirs fields but never changes which paths conflict.
#[derive(Clone, Copy, Debug)]
pub struct MergeComparer<'a> {
    schema: &'a Schema,
    policy: &'a ComparisonPolicy,
}

impl<'a> MergeComparer<'a> {
    /// Merge comparer for trees of `schema`, judged by `policy`.
    pub fn new(schema: &'a Schema, policy: &'a ComparisonPolicy) -> Self {
        Self { schema, policy }
    }

    /// Classify every path touched by `ours` or `theirs`.
    pub fn compare(&self, ours: &ChangeCollection, theirs: &ChangeCollection) -> MergeResult<MergeChangeSet> {
        let mut seen = HashSet::new();
        let mut out = Vec::with_capacity(ours.len() + theirs.len());
        for change in ours {
            let path = change.path();
            seen.insert(path.clone());
            out.push(match theirs.get(path) {
                Some(other) => self.both(change, other, ours, theirs)?,
                None => one_sided(change, theirs, Origin::Ours),
            });
        }
        for change in theirs.iter().filter(|c| !seen.contains(c.path())) {
            out.push(one_sided(change, ours, Origin::Theirs));
        }

        let set = MergeChangeSet::new(out);
        let conflicts = set.conflict_count();
        if conflicts > 0 {
            warn!(conflicts, entries = set.len(), "merge has conflicts");
        } else {
            debug!(entries = set.len(), "merge is clean");
        }
        Ok(set)
    }

    fn both(
        &self,
        o: &Change,
        t: &Change,
        ours: &ChangeCollection,
        theirs: &ChangeCollection,
    ) -> MergeResult<MergeChange> {
        let path = o.path();
        let mut change = MergeChange::new(path.clone(), Origin::Both);
        change.ancestor = o.old().or(t.old()).cloned();
        change.ours = o.new().cloned();
        change.theirs = t.new().cloned();

        change.status = match (o.kind(), t.kind()) {
            (ChangeKind::Deleted, ChangeKind::Deleted) => ItemMergeStatus::Deleted,
            (ChangeKind::Added, ChangeKind::Added) => {
                let same = match (o.new(), t.new()) {
                    (Some(a), Some(b)) => Comparer::new(self.schema, self.policy).items_equal(a, b)?,
                    _ => false,
                };
                if same {
                    ItemMergeStatus::Added
                } else {
                    ItemMergeStatus::TreeConflict
                }
            }
            (ChangeKind::Modified, ChangeKind::Modified) => {
                let (properties, conflicts) = self.merge_properties(o, t);
                change.properties = properties;
                change.conflicts = conflicts;
                if change.conflicts.is_empty() {
                    ItemMergeStatus::Edit
                } else {
                    ItemMergeStatus::EditConflict
                }
            }
            (ChangeKind::Deleted, _) => {
                change.our_root_deleted_parent = deletion_root(ours, path, true);
                change.properties = t.properties().to_vec();
                ItemMergeStatus::TreeConflict
            }
            (_, ChangeKind::Deleted) => {
                change.their_root_deleted_parent = deletion_root(theirs, path, true);
                change.properties = o.properties().to_vec();
                ItemMergeStatus::TreeConflict
            }
            _ => ItemMergeStatus::TreeConflict,
        };
        Ok(change)
    }

    /// Union of both sides' property changes; properties set to different
    /// values become conflicts.
    fn merge_properties(&self, o: &Change, t: &Change) -> (Vec<PropertyChange>, Vec<Conflict>) {
        let mut merged = Vec::new();
        let mut conflicts = Vec::new();
        let type_name = o.new().and_then(|item| item.as_node()).map(|n| n.type_name.as_str());

        for ours in o.properties() {
            match t.properties().iter().find(|p| p.name == ours.name) {
                Some(theirs) if !self.values_equal(type_name, &ours.name, &ours.new, &theirs.new) => {
                    conflicts.push(Conflict {
                        property: ours.name.clone(),
                        ancestor_value: ours.old.clone(),
                        our_value: ours.new.clone(),
                        their_value: theirs.new.clone(),
                        resolved_value: None,
                    });
                }
                _ => merged.push(ours.clone()),
            }
        }
        merged.extend(
            t.properties()
                .iter()
                .filter(|p| !o.properties().iter().any(|q| q.name == p.name))
                .cloned(),
        );
        (merged, conflicts)
    }

    fn values_equal(
        &self,
        type_name: Option<&str>,
        property: &str,
        a: &serde_json::Value,
        b: &serde_json::Value,
    ) -> bool {
        let kind = type_name
            .and_then(|t| self.schema.type_named(t))
            .and_then(|d| d.get_property(property))
            .map_or(PropertyKind::Json, |p| p.kind);
        self.policy.values_equal(kind, a, b)
    }
}

/// Entry for a path only one side changed. Adds and edits below something
/// the other side deleted are tree conflicts.
fn one_sided(change: &Change, other: &ChangeCollection, origin: Origin) -> MergeChange {
    let path = change.path();
    let mut out = MergeChange::new(path.clone(), origin);
    out.ancestor = change.old().cloned();
    let item = change.new().cloned();
    match origin {
        Origin::Theirs => out.theirs = item,
        _ => out.ours = item,
    }
    out.properties = change.properties().to_vec();
    out.status = match change.kind() {
        ChangeKind::Added => ItemMergeStatus::Added,
        ChangeKind::Modified => ItemMergeStatus::Edit,
        ChangeKind::Deleted => ItemMergeStatus::Deleted,
    };

    if change.kind() != ChangeKind::Deleted {
        if let Some(root) = deletion_root(other, path, false) {
            out.status = ItemMergeStatus::TreeConflict;
            match origin {
                Origin::Theirs => out.our_root_deleted_parent = Some(root),
                _ => out.their_root_deleted_parent = Some(root),
            }
        }
    }
    out
}

/// Topmost item of the deleted subtree containing `path` in `changes`.
///
/// The search starts at the nearest deleted ancestor (or `path` itself when
/// `include_self`) and climbs while the ancestors are deleted too.
fn deletion_root(changes: &ChangeCollection, path: &DataPath, include_self: bool) -> Option<DataPath> {
    let start = include_self.then(|| path.clone());
    let mut root = None;
    for candidate in start.into_iter().chain(path.ancestors()) {
        if changes.is_deleted(&candidate) {
            root = Some(candidate);
        } else if root.is_some() {
            break;
        }
    }
    root
}


#[cfg(test)]
mod laws {
    use super::*;
    use arbor_model::{Node, Snapshot, TypeDescriptor};
    use arbor_types::UniqueId;
    use proptest::prelude::*;
    use serde_json::json;

    #[derive(Clone, Debug)]
    enum Edit {
        TableName(u8),
        TableDescription(u8),
        FieldType(u8),
        DeleteField,
        DeleteTable,
    }

    fn edit() -> impl Strategy<Value = Edit> {
        prop_oneof![
            (0u8..3).prop_map(Edit::TableName),
            (0u8..3).prop_map(Edit::TableDescription),
            (0u8..3).prop_map(Edit::FieldType),
            Just(Edit::DeleteField),
            Just(Edit::DeleteTable),
        ]
    }

    struct Base {
        schema: Schema,
        snapshot: Snapshot,
        table: Node,
        field: Node,
    }

    fn base() -> Base {
        let schema = Schema::builder()
            .register(
                TypeDescriptor::new("Table", "Tables")
                    .property("Name", PropertyKind::String)
                    .property("Description", PropertyKind::String)
                    .child("Field"),
            )
            .register(TypeDescriptor::new("Field", "Fields").property("DataType", PropertyKind::String))
            .build()
            .unwrap();
        let tid = UniqueId::parse("tttttttttttt").unwrap();
        let table = Node::new(tid.clone(), "Table", DataPath::node(None, "Tables", &tid).unwrap())
            .with("Name", json!("n"));
        let fid = UniqueId::parse("ffffffffffff").unwrap();
        let field = Node::new(fid.clone(), "Field", DataPath::node(Some(&table.path), "Fields", &fid).unwrap());
        let mut snapshot = Snapshot::new();
        snapshot.insert_node(table.clone()).unwrap();
        snapshot.insert_node(field.clone()).unwrap();
        Base {
            schema,
            snapshot,
            table,
            field,
        }
    }

    fn set(s: &mut Snapshot, node: &Node, property: &str, value: u8) {
        if let Some(current) = s.node(&node.id).cloned() {
            s.insert_node(current.with(property, json!(format!("v{value}")))).unwrap();
        }
    }

    fn changes(b: &Base, policy: &ComparisonPolicy, edits: &[Edit]) -> ChangeCollection {
        let mut next = b.snapshot.clone();
        for e in edits {
            match e {
                Edit::TableName(v) => set(&mut next, &b.table, "Name", *v),
                Edit::TableDescription(v) => set(&mut next, &b.table, "Description", *v),
                Edit::FieldType(v) => set(&mut next, &b.field, "DataType", *v),
                Edit::DeleteField => {
                    next.remove(&b.field.path);
                }
                Edit::DeleteTable => {
                    next.remove(&b.table.path);
                }
            }
        }
        Comparer::new(&b.schema, policy).compare(&b.snapshot, &next).unwrap()
    }

    fn conflict_paths(set: &MergeChangeSet) -> Vec<DataPath> {
        let mut paths: Vec<DataPath> = set.conflicts().map(|c| c.path.clone()).collect();
        paths.sort();
        paths
    }

    proptest! {
        #[test]
        fn swapping_sides_keeps_the_conflicts(
            ours in prop::collection::vec(edit(), 0..4),
            theirs in prop::collection::vec(edit(), 0..4),
        ) {
            let b = base();
            let policy = ComparisonPolicy::default();
            let ours = changes(&b, &policy, &ours);
            let theirs = changes(&b, &policy, &theirs);
            let merger = MergeComparer::new(&b.schema, &policy);
            let forward = merger.compare(&ours, &theirs).unwrap();
            let backward = merger.compare(&theirs, &ours).unwrap();
            prop_assert_eq!(forward.len(), backward.len());
            prop_assert_eq!(conflict_paths(&forward), conflict_paths(&backward));
        }

        #[test]
        fn merging_a_change_set_with_itself_is_clean(
            edits in prop::collection::vec(edit(), 0..4),
        ) {
            let b = base();
            let policy = ComparisonPolicy::default();
            let side = changes(&b, &policy, &edits);
            let set = MergeComparer::new(&b.schema, &policy).compare(&side, &side).unwrap();
            prop_assert!(!set.has_conflicts());
            prop_assert!(set.transforms().unwrap().is_empty());
        }
    }
}
