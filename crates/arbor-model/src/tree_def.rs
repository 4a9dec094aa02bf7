//! Mutable tree under construction.

use std::collections::BTreeMap;

use arbor_store::{EntryMode, ObjectStore, StoreResult, Tree, TreeEntry};
use arbor_types::{DataPath, ObjectId};
use tracing::trace;

use crate::error::{ModelError, ModelResult};
use crate::node::TreeItem;
use crate::schema::Schema;
use crate::serializer::NodeSerializer;
use crate::transform::Transform;

/// Flat map from full file path to blob id, loaded from a base tree,
/// edited with [`Transform`]s and written back as nested trees.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TreeDefinition {
    files: BTreeMap<String, ObjectId>,
}

/// Context a tree definition needs to apply transforms.
pub struct ApplyContext<'a> {
    pub store: &'a dyn ObjectStore,
    pub serializer: &'a dyn NodeSerializer,
    pub schema: &'a Schema,
}

impl TreeDefinition {
    /// Definition of an empty tree.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Flatten the stored tree `root`.
    pub fn load(store: &dyn ObjectStore, root: &ObjectId) -> ModelResult<Self> {
        let mut files = BTreeMap::new();
        let mut pending = vec![(String::new(), *root)];
        while let Some((prefix, tree_id)) = pending.pop() {
            for entry in store.read_tree(&tree_id)?.entries {
                let path = if prefix.is_empty() {
                    entry.name
                } else {
                    format!("{prefix}/{}", entry.name)
                };
                match entry.mode {
                    EntryMode::Blob => {
                        files.insert(path, entry.object_id);
                    }
                    EntryMode::Tree => pending.push((path, entry.object_id)),
                }
            }
        }
        Ok(Self { files })
    }

    /// Number of files.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Returns `true` if the tree has no files.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Blob stored for the item at `path`.
    pub fn get(&self, path: &DataPath) -> Option<ObjectId> {
        self.files.get(path.full_path()).copied()
    }

    /// Returns `true` if the item at `path` exists.
    pub fn contains(&self, path: &DataPath) -> bool {
        self.files.contains_key(path.full_path())
    }

    fn remove_folder(&mut self, folder: &str) -> usize {
        let prefix = format!("{folder}/");
        let doomed: Vec<String> = self
            .files
            .range(prefix.clone()..)
            .take_while(|(k, _)| k.starts_with(&prefix))
            .map(|(k, _)| k.clone())
            .collect();
        for key in &doomed {
            self.files.remove(key);
        }
        doomed.len()
    }

    fn require_parent(&self, path: &DataPath) -> ModelResult<Option<DataPath>> {
        match path.parent() {
            Some(parent) if !self.contains(&parent) => Err(ModelError::ParentMissing(path.clone())),
            parent => Ok(parent),
        }
    }

    /// Apply one edit. Blobs for new content are written to the store
    /// immediately; trees are only written by [`TreeDefinition::write`].
    pub fn apply(&mut self, cx: &ApplyContext<'_>, transform: &Transform) -> ModelResult<()> {
        trace!(path = %transform.path(), "applying transform");
        match transform {
            Transform::Upsert(TreeItem::Node(node)) => {
                if let Some(parent) = self.require_parent(&node.path)? {
                    let parent_type = parent
                        .type_folder()
                        .and_then(|f| cx.schema.type_for_folder(f))
                        .ok_or_else(|| ModelError::InvalidItem {
                            path: parent.clone(),
                            reason: "parent folder is not a registered type".into(),
                        })?;
                    cx.schema.check_child(&parent_type.name, &node.type_name)?;
                }
                let blob = cx.store.write_blob(&cx.serializer.serialize(node)?)?;
                self.files.insert(node.path.full_path().to_string(), blob);
            }
            Transform::Upsert(TreeItem::Resource(resource)) => {
                if self.require_parent(&resource.path)?.is_none() {
                    return Err(ModelError::ParentMissing(resource.path.clone()));
                }
                let blob = cx.store.write_blob(&resource.data)?;
                self.files.insert(resource.path.full_path().to_string(), blob);
            }
            Transform::Patch { path, properties } => {
                let blob = self.get(path).ok_or_else(|| ModelError::NotFound(path.clone()))?;
                let data = cx.store.read_blob(&blob)?.data;
                let mut node = cx.serializer.deserialize(&data, path)?;
                for (name, value) in properties {
                    node.set(name.clone(), value.clone());
                }
                let blob = cx.store.write_blob(&cx.serializer.serialize(&node)?)?;
                self.files.insert(path.full_path().to_string(), blob);
            }
            Transform::Delete(path) if path.is_node() => {
                self.remove_folder(path.folder_path());
            }
            Transform::Delete(path) => {
                self.files.remove(path.full_path());
            }
        }
        Ok(())
    }

    /// Write the nested trees and return the root tree id.
    pub fn write(&self, store: &dyn ObjectStore) -> ModelResult<ObjectId> {
        let mut root = Folder::default();
        for (path, blob) in &self.files {
            let segments: Vec<&str> = path.split('/').collect();
            root.insert(&segments, *blob);
        }
        Ok(root.write(store)?)
    }
}

#[derive(Default)]
struct Folder {
    blobs: BTreeMap<String, ObjectId>,
    folders: BTreeMap<String, Folder>,
}

impl Folder {
    fn insert(&mut self, segments: &[&str], blob: ObjectId) {
        match segments {
            [] => {}
            [file] => {
                self.blobs.insert(file.to_string(), blob);
            }
            [dir, rest @ ..] => self
                .folders
                .entry(dir.to_string())
                .or_default()
                .insert(rest, blob),
        }
    }

    fn write(&self, store: &dyn ObjectStore) -> StoreResult<ObjectId> {
        let mut entries: Vec<TreeEntry> = self
            .blobs
            .iter()
            .map(|(name, id)| TreeEntry::blob(name.clone(), *id))
            .collect();
        for (name, folder) in &self.folders {
            entries.push(TreeEntry::tree(name.clone(), folder.write(store)?));
        }
        store.write_tree(&Tree::new(entries))
    }
}
