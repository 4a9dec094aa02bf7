//! Snapshot read lazily from the object store.

use std::sync::Arc;

use arbor_store::{EntryMode, ObjectStore, StoreError, Tree};
use arbor_types::{DataPath, ObjectId, UniqueId, RESOURCES_FOLDER};

use crate::error::{ModelError, ModelResult};
use crate::node::{Resource, TreeItem};
use crate::serializer::NodeSerializer;
use crate::source::{ChildEntry, TreeSource};

/// The tree of one commit, loaded on demand.
///
/// Child entries carry the content id of the node folder (or resource
/// blob), so a walk can skip subtrees that are identical on both sides
/// without reading them.
#[derive(Clone)]
pub struct StoreSnapshot {
    store: Arc<dyn ObjectStore>,
    serializer: Arc<dyn NodeSerializer>,
    root: ObjectId,
}

impl StoreSnapshot {
    /// Snapshot of the tree `root` in `store`.
    pub fn new(
        store: Arc<dyn ObjectStore>,
        serializer: Arc<dyn NodeSerializer>,
        root: ObjectId,
    ) -> Self {
        Self {
            store,
            serializer,
            root,
        }
    }

    /// Id of the root tree.
    pub fn root(&self) -> ObjectId {
        self.root
    }

    fn corrupt(&self, id: ObjectId, reason: String) -> ModelError {
        ModelError::Store(StoreError::CorruptObject { id, reason })
    }

    /// Tree at `folder` (a `/`-separated path), or the root tree.
    fn folder(&self, folder: Option<&str>) -> ModelResult<Option<Tree>> {
        let mut tree = self.store.read_tree(&self.root)?;
        let Some(folder) = folder else {
            return Ok(Some(tree));
        };
        for segment in folder.split('/') {
            match tree.get(segment) {
                Some(entry) if entry.mode == EntryMode::Tree => {
                    tree = self.store.read_tree(&entry.object_id)?;
                }
                _ => return Ok(None),
            }
        }
        Ok(Some(tree))
    }

    fn collect_resources(
        &self,
        owner: &DataPath,
        tree: &Tree,
        prefix: &str,
        out: &mut Vec<ChildEntry>,
    ) -> ModelResult<()> {
        for entry in &tree.entries {
            let relative = if prefix.is_empty() {
                entry.name.clone()
            } else {
                format!("{prefix}/{}", entry.name)
            };
            match entry.mode {
                EntryMode::Blob => out.push(ChildEntry::for_path(
                    DataPath::resource(owner, &relative)?,
                    Some(entry.object_id),
                )?),
                EntryMode::Tree => {
                    let sub = self.store.read_tree(&entry.object_id)?;
                    self.collect_resources(owner, &sub, &relative, out)?;
                }
            }
        }
        Ok(())
    }

    fn read_node(&self, path: &DataPath, folder_tree: &Tree) -> ModelResult<TreeItem> {
        let blob = folder_tree
            .get(path.file_name())
            .filter(|e| e.mode == EntryMode::Blob)
            .ok_or_else(|| ModelError::NotFound(path.clone()))?;
        let data = self.store.read_blob(&blob.object_id)?.data;
        Ok(TreeItem::Node(self.serializer.deserialize(&data, path)?))
    }
}

impl TreeSource for StoreSnapshot {
    fn children(&self, parent: Option<&DataPath>) -> ModelResult<Vec<ChildEntry>> {
        if parent.is_some_and(|p| !p.is_node()) {
            return Ok(Vec::new());
        }
        let Some(tree) = self.folder(parent.map(|p| p.folder_path()))? else {
            return Ok(Vec::new());
        };

        let mut entries = Vec::new();
        let mut resources = Vec::new();
        for entry in &tree.entries {
            match (entry.mode, parent) {
                (EntryMode::Tree, Some(owner)) if entry.name == RESOURCES_FOLDER => {
                    let sub = self.store.read_tree(&entry.object_id)?;
                    self.collect_resources(owner, &sub, "", &mut resources)?;
                }
                (EntryMode::Tree, _) => {
                    let type_folder = self.store.read_tree(&entry.object_id)?;
                    for node_dir in &type_folder.entries {
                        if node_dir.mode != EntryMode::Tree {
                            return Err(self.corrupt(
                                entry.object_id,
                                format!("unexpected blob {} in type folder", node_dir.name),
                            ));
                        }
                        let id: UniqueId = node_dir.name.parse()?;
                        entries.push(ChildEntry::for_path(
                            DataPath::node(parent, &entry.name, &id)?,
                            Some(node_dir.object_id),
                        )?);
                    }
                }
                // The node's own blob.
                (EntryMode::Blob, Some(owner)) if entry.name == owner.file_name() => {}
                (EntryMode::Blob, _) => {
                    return Err(self.corrupt(
                        self.root,
                        format!("unexpected blob {} in node folder", entry.name),
                    ))
                }
            }
        }
        entries.sort_by(|a, b| a.key.cmp(&b.key));
        resources.sort_by(|a, b| a.key.cmp(&b.key));
        entries.extend(resources);
        Ok(entries)
    }

    fn load(&self, entry: &ChildEntry) -> ModelResult<TreeItem> {
        match (entry.is_node(), entry.object) {
            (true, Some(folder_id)) => {
                let folder = self.store.read_tree(&folder_id)?;
                self.read_node(&entry.path, &folder)
            }
            (false, Some(blob_id)) => Ok(TreeItem::Resource(Resource {
                path: entry.path.clone(),
                data: self.store.read_blob(&blob_id)?.data,
            })),
            (_, None) => self
                .get(&entry.path)?
                .ok_or_else(|| ModelError::NotFound(entry.path.clone())),
        }
    }

    fn get(&self, path: &DataPath) -> ModelResult<Option<TreeItem>> {
        let Some(folder) = self.folder(Some(path.folder_path()))? else {
            return Ok(None);
        };
        if path.is_node() {
            return match self.read_node(path, &folder) {
                Ok(item) => Ok(Some(item)),
                Err(ModelError::NotFound(_)) => Ok(None),
                Err(e) => Err(e),
            };
        }
        match folder.get(path.file_name()) {
            Some(entry) if entry.mode == EntryMode::Blob => Ok(Some(TreeItem::Resource(Resource {
                path: path.clone(),
                data: self.store.read_blob(&entry.object_id)?.data,
            }))),
            _ => Ok(None),
        }
    }
}

impl std::fmt::Debug for StoreSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreSnapshot")
            .field("root", &self.root)
            .finish()
    }
}
