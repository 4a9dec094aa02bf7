//! Structural comparison of two tree snapshots.
//!
//! Both snapshots are walked together, one sibling level at a time. Sibling
//! lists are sorted by [`SiblingKey`], so a merge-join pairs items present on
//! both sides, and everything left over is an addition or a deletion. Added
//! and deleted subtrees are expanded: each descendant gets its own entry,
//! which is what lets the merge comparer find edits under a deleted parent.

use std::cmp::Ordering;
use std::collections::HashMap;

use arbor_model::{ChildEntry, ComparisonPolicy, Node, Schema, TreeItem, TreeSource};
use arbor_types::{DataPath, UniqueId};
use tracing::{debug, trace};

use crate::change::{resource_change, Change, ChangeCollection, PropertyChange};
use crate::error::{DiffError, DiffResult};

/// Computes a [`ChangeCollection`] between two snapshots.
#[derive(Clone, Copy, Debug)]
pub struct Comparer<'a> {
    schema: &'a Schema,
    policy: &'a ComparisonPolicy,
}

#[derive(Clone, Copy)]
enum Side {
    Added,
    Deleted,
}

impl<'a> Comparer<'a> {
    /// Comparer for trees of `schema`, judged by `policy`.
    pub fn new(schema: &'a Schema, policy: &'a ComparisonPolicy) -> Self {
        Self { schema, policy }
    }

    /// Diff `old` against `new`. Deterministic for a given pair of snapshots.
    pub fn compare(&self, old: &dyn TreeSource, new: &dyn TreeSource) -> DiffResult<ChangeCollection> {
        let mut out = ChangeCollection::new();
        self.compare_children(old, new, None, &mut out)?;
        reject_moves(&out)?;
        debug!(
            added = out.added().count(),
            deleted = out.deleted().count(),
            modified = out.modified().count(),
            "compared snapshots"
        );
        Ok(out)
    }

    /// Differing comparable properties of two versions of a node, in
    /// declaration order.
    pub fn diff_node(&self, old: &Node, new: &Node) -> DiffResult<Vec<PropertyChange>> {
        if old.type_name != new.type_name {
            return Err(DiffError::UnsupportedChange {
                path: new.path.clone(),
                reason: format!("type changed from {} to {}", old.type_name, new.type_name),
            });
        }
        let descriptor = self.schema.require(&new.type_name)?;
        Ok(self
            .policy
            .comparable_properties(descriptor)
            .filter_map(|p| {
                let (a, b) = (old.get(&p.name), new.get(&p.name));
                (!self.policy.values_equal(p.kind, a, b)).then(|| PropertyChange {
                    name: p.name.clone(),
                    old: a.clone(),
                    new: b.clone(),
                })
            })
            .collect())
    }

    /// Whether two items are the same for comparison purposes.
    pub fn items_equal(&self, a: &TreeItem, b: &TreeItem) -> DiffResult<bool> {
        Ok(match (a, b) {
            (TreeItem::Node(x), TreeItem::Node(y)) => {
                x.path == y.path && x.type_name == y.type_name && self.diff_node(x, y)?.is_empty()
            }
            (TreeItem::Resource(x), TreeItem::Resource(y)) => x == y,
            _ => false,
        })
    }

    fn compare_children(
        &self,
        old: &dyn TreeSource,
        new: &dyn TreeSource,
        parent: Option<&DataPath>,
        out: &mut ChangeCollection,
    ) -> DiffResult<()> {
        let mut left = old.children(parent)?.into_iter().peekable();
        let mut right = new.children(parent)?.into_iter().peekable();
        loop {
            let order = match (left.peek(), right.peek()) {
                (Some(a), Some(b)) => a.key.cmp(&b.key),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => break,
            };
            match order {
                Ordering::Less => {
                    if let Some(a) = left.next() {
                        self.expand(old, a, Side::Deleted, out)?;
                    }
                }
                Ordering::Greater => {
                    if let Some(b) = right.next() {
                        self.expand(new, b, Side::Added, out)?;
                    }
                }
                Ordering::Equal => {
                    if let (Some(a), Some(b)) = (left.next(), right.next()) {
                        self.compare_pair(old, new, &a, &b, out)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn compare_pair(
        &self,
        old: &dyn TreeSource,
        new: &dyn TreeSource,
        a: &ChildEntry,
        b: &ChildEntry,
        out: &mut ChangeCollection,
    ) -> DiffResult<()> {
        if a.path != b.path {
            return Err(DiffError::UnsupportedChange {
                path: b.path.clone(),
                reason: format!("item was stored at {}", a.path),
            });
        }
        if self.policy.skip_unchanged_subtrees && a.object.is_some() && a.object == b.object {
            trace!(path = %a.path, "subtree unchanged");
            return Ok(());
        }

        let (before, after) = (old.load(a)?, new.load(b)?);
        let properties = match (&before, &after) {
            (TreeItem::Node(x), TreeItem::Node(y)) => self.diff_node(x, y)?,
            (TreeItem::Resource(x), TreeItem::Resource(y)) => resource_change(x, y).into_iter().collect(),
            _ => {
                return Err(DiffError::UnsupportedChange {
                    path: b.path.clone(),
                    reason: format!("{} replaced by {}", before.kind(), after.kind()),
                })
            }
        };
        if !properties.is_empty() {
            out.push(Change::Modified {
                old: before,
                new: after,
                properties,
            })?;
        }
        if b.is_node() {
            self.compare_children(old, new, Some(&b.path), out)?;
        }
        Ok(())
    }

    /// Record `entry` and every descendant as added or deleted, parents first.
    fn expand(
        &self,
        source: &dyn TreeSource,
        entry: ChildEntry,
        side: Side,
        out: &mut ChangeCollection,
    ) -> DiffResult<()> {
        let mut stack = vec![entry];
        while let Some(entry) = stack.pop() {
            if entry.is_node() {
                let mut children = source.children(Some(&entry.path))?;
                children.reverse();
                stack.extend(children);
            }
            let item = source.load(&entry)?;
            out.push(match side {
                Side::Added => Change::Added { item },
                Side::Deleted => Change::Deleted { item },
            })?;
        }
        Ok(())
    }
}

/// A node id that is both deleted and added was moved to another parent,
/// which a property-level diff cannot express.
fn reject_moves(changes: &ChangeCollection) -> DiffResult<()> {
    let deleted: HashMap<UniqueId, &DataPath> = changes
        .deleted()
        .filter_map(|c| c.path().unique_id().map(|id| (id, c.path())))
        .collect();
    for change in changes.added() {
        let Some(id) = change.path().unique_id() else {
            continue;
        };
        if let Some(from) = deleted.get(&id) {
            return Err(DiffError::UnsupportedChange {
                path: change.path().clone(),
                reason: format!("node moved from {from}"),
            });
        }
    }
    Ok(())
}


#[cfg(test)]
mod laws {
    use std::sync::Arc;

    use super::*;
    use arbor_model::{
        ApplyContext, JsonNodeSerializer, NodeSerializer, PropertyKind, Resource, Snapshot,
        StoreSnapshot, Transform, TreeDefinition, TypeDescriptor,
    };
    use arbor_store::{InMemoryObjectStore, ObjectStore};
    use proptest::prelude::*;
    use serde_json::{json, Value};

    type FieldShape = Option<(u8, Option<u8>)>;
    type TableShape = Option<(u8, Option<u8>, Vec<FieldShape>, Option<Vec<u8>>)>;

    fn schema() -> Arc<Schema> {
        Arc::new(
            Schema::builder()
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
                .unwrap(),
        )
    }

    fn tree_shape() -> impl Strategy<Value = Vec<TableShape>> {
        let field = prop::option::of((0u8..3, prop::option::of(0u8..2)));
        let table = prop::option::of((
            0u8..3,
            prop::option::of(0u8..3),
            prop::collection::vec(field, 3),
            prop::option::of(prop::collection::vec(any::<u8>(), 0..4)),
        ));
        prop::collection::vec(table, 4)
    }

    fn label(prefix: &str, value: Option<u8>) -> Value {
        value.map_or(Value::Null, |v| json!(format!("{prefix}{v}")))
    }

    fn build(shape: &[TableShape]) -> Snapshot {
        let mut snapshot = Snapshot::new();
        for (i, table) in shape.iter().enumerate() {
            let Some((name, description, fields, icon)) = table else {
                continue;
            };
            let id = UniqueId::parse(&format!("table{i:07}")).unwrap();
            let t = Node::new(id.clone(), "Table", DataPath::node(None, "Tables", &id).unwrap())
                .with("Name", label("T", Some(*name)))
                .with("Description", label("D", *description));
            let table_path = t.path.clone();
            snapshot.insert_node(t).unwrap();
            for (j, field) in fields.iter().enumerate() {
                let Some((name, data_type)) = field else {
                    continue;
                };
                let id = UniqueId::parse(&format!("field{i}{j:06}")).unwrap();
                let path = DataPath::node(Some(&table_path), "Fields", &id).unwrap();
                snapshot
                    .insert_node(
                        Node::new(id, "Field", path)
                            .with("Name", label("F", Some(*name)))
                            .with("DataType", label("K", *data_type)),
                    )
                    .unwrap();
            }
            if let Some(bytes) = icon {
                snapshot
                    .insert_resource(Resource::new(&table_path, "icon.bin", bytes.clone()).unwrap())
                    .unwrap();
            }
        }
        snapshot
    }

    struct Backend {
        schema: Arc<Schema>,
        store: Arc<dyn ObjectStore>,
        serializer: Arc<dyn NodeSerializer>,
    }

    impl Backend {
        fn new() -> Self {
            let schema = schema();
            Self {
                serializer: Arc::new(JsonNodeSerializer::new(schema.clone())),
                store: Arc::new(InMemoryObjectStore::new()),
                schema,
            }
        }

        fn apply(&self, base: Option<&StoreSnapshot>, transforms: &[Transform]) -> StoreSnapshot {
            let mut tree = match base {
                Some(b) => TreeDefinition::load(self.store.as_ref(), &b.root()).unwrap(),
                None => TreeDefinition::empty(),
            };
            let cx = ApplyContext {
                store: self.store.as_ref(),
                serializer: self.serializer.as_ref(),
                schema: &self.schema,
            };
            for t in transforms {
                tree.apply(&cx, t).unwrap();
            }
            let root = tree.write(self.store.as_ref()).unwrap();
            StoreSnapshot::new(self.store.clone(), self.serializer.clone(), root)
        }

        fn persist(&self, snapshot: &Snapshot) -> StoreSnapshot {
            let upserts: Vec<Transform> = snapshot
                .items()
                .unwrap()
                .into_iter()
                .map(Transform::Upsert)
                .collect();
            self.apply(None, &upserts)
        }
    }

    proptest! {
        #[test]
        fn comparing_a_snapshot_with_itself_is_empty(shape in tree_shape()) {
            let backend = Backend::new();
            let policy = ComparisonPolicy::default();
            let comparer = Comparer::new(&backend.schema, &policy);
            let memory = build(&shape);
            let stored = backend.persist(&memory);
            prop_assert!(comparer.compare(&memory, &memory).unwrap().is_empty());
            prop_assert!(comparer.compare(&stored, &stored).unwrap().is_empty());
            prop_assert!(comparer.compare(&stored, &memory).unwrap().is_empty());
        }

        #[test]
        fn applying_changes_reproduces_the_new_snapshot(old in tree_shape(), new in tree_shape()) {
            let backend = Backend::new();
            let policy = ComparisonPolicy::default();
            let comparer = Comparer::new(&backend.schema, &policy);
            let (old, new) = (build(&old), build(&new));
            let stored_old = backend.persist(&old);
            let changes = comparer.compare(&stored_old, &new).unwrap();
            let result = backend.apply(Some(&stored_old), &changes.to_transforms());
            prop_assert_eq!(Snapshot::from_source(&result).unwrap(), new);
        }
    }
}
