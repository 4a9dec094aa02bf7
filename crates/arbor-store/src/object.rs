use std::fmt;

use arbor_crypto::{ContentHasher, HashDomain};
use arbor_types::{ObjectId, Signature};
use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// The kind of object stored.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectKind {
    Blob,
    Tree,
    Commit,
}

impl ObjectKind {
    fn domain(self) -> HashDomain {
        match self {
            Self::Blob => HashDomain::Blob,
            Self::Tree => HashDomain::Tree,
            Self::Commit => HashDomain::Commit,
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Blob => f.write_str("blob"),
            Self::Tree => f.write_str("tree"),
            Self::Commit => f.write_str("commit"),
        }
    }
}

/// Unit of storage: kind tag plus encoded bytes.
///
/// The store never looks inside `data`; the typed wrappers below own the
/// encodings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredObject {
    pub kind: ObjectKind,
    pub data: Vec<u8>,
}

impl StoredObject {
    /// Wrap raw bytes of `kind`.
    pub fn new(kind: ObjectKind, data: Vec<u8>) -> Self {
        Self { kind, data }
    }

    /// Payload size in bytes.
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Content-addressed id, separated by kind.
    pub fn compute_id(&self) -> ObjectId {
        ContentHasher::digest(self.kind.domain(), &self.data)
    }

    fn expect_kind(&self, id: &ObjectId, expected: ObjectKind) -> StoreResult<()> {
        if self.kind != expected {
            return Err(StoreError::WrongKind {
                id: *id,
                expected,
                actual: self.kind,
            });
        }
        Ok(())
    }
}

/// Raw content: a serialized node or a resource payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Blob {
    pub data: Vec<u8>,
}

impl Blob {
    /// Blob holding `data`.
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    /// Encode for the object store.
    pub fn to_stored_object(&self) -> StoredObject {
        StoredObject::new(ObjectKind::Blob, self.data.clone())
    }

    /// Decode a stored object, checking its kind.
    pub fn from_stored_object(id: &ObjectId, obj: StoredObject) -> StoreResult<Self> {
        obj.expect_kind(id, ObjectKind::Blob)?;
        Ok(Self { data: obj.data })
    }
}

/// What a tree entry points at.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryMode {
    Blob,
    Tree,
}

/// A named entry in a tree object.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeEntry {
    pub mode: EntryMode,
    pub name: String,
    pub object_id: ObjectId,
}

impl TreeEntry {
    /// Entry for a file.
    pub fn blob(name: impl Into<String>, object_id: ObjectId) -> Self {
        Self {
            mode: EntryMode::Blob,
            name: name.into(),
            object_id,
        }
    }

    /// Entry for a sub-folder.
    pub fn tree(name: impl Into<String>, object_id: ObjectId) -> Self {
        Self {
            mode: EntryMode::Tree,
            name: name.into(),
            object_id,
        }
    }

    /// Returns `true` for a sub-folder.
    pub fn is_tree(&self) -> bool {
        self.mode == EntryMode::Tree
    }
}

/// Folder listing. Entries are kept sorted by name so equal folders encode
/// to identical bytes.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tree {
    pub entries: Vec<TreeEntry>,
}

impl Tree {
    /// Tree of `entries`, sorted by name.
    pub fn new(mut entries: Vec<TreeEntry>) -> Self {
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        entries.dedup_by(|a, b| a.name == b.name);
        Self { entries }
    }

    /// Tree without entries.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Encode for the object store.
    pub fn to_stored_object(&self) -> StoreResult<StoredObject> {
        let data =
            serde_json::to_vec(self).map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(StoredObject::new(ObjectKind::Tree, data))
    }

    /// Decode a stored object, checking its kind.
    pub fn from_stored_object(id: &ObjectId, obj: StoredObject) -> StoreResult<Self> {
        obj.expect_kind(id, ObjectKind::Tree)?;
        serde_json::from_slice(&obj.data).map_err(|e| StoreError::CorruptObject {
            id: *id,
            reason: e.to_string(),
        })
    }

    /// Id this tree will have once written.
    pub fn id(&self) -> StoreResult<ObjectId> {
        Ok(self.to_stored_object()?.compute_id())
    }

    /// Entry called `name`.
    pub fn get(&self, name: &str) -> Option<&TreeEntry> {
        self.entries
            .binary_search_by(|e| e.name.as_str().cmp(name))
            .ok()
            .map(|i| &self.entries[i])
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if there are no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A commit: root tree, parent commits (first parent first), signatures and
/// message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitObject {
    pub tree: ObjectId,
    pub parents: Vec<ObjectId>,
    pub author: Signature,
    pub committer: Signature,
    pub message: String,
}

impl CommitObject {
    /// First parent, `None` for a root commit.
    pub fn first_parent(&self) -> Option<ObjectId> {
        self.parents.first().copied()
    }

    /// Returns `true` if the commit has more than one parent.
    pub fn is_merge(&self) -> bool {
        self.parents.len() > 1
    }

    /// Encode for the object store.
    pub fn to_stored_object(&self) -> StoreResult<StoredObject> {
        let data =
            serde_json::to_vec(self).map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(StoredObject::new(ObjectKind::Commit, data))
    }

    /// Decode a stored object, checking its kind.
    pub fn from_stored_object(id: &ObjectId, obj: StoredObject) -> StoreResult<Self> {
        obj.expect_kind(id, ObjectKind::Commit)?;
        serde_json::from_slice(&obj.data).map_err(|e| StoreError::CorruptObject {
            id: *id,
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn sig() -> Signature {
        Signature::new("Ada", "ada@example.com", Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap())
    }

    #[test]
    fn tree_entries_are_sorted_and_unique() {
        let id = ObjectId::from_bytes(b"x");
        let tree = Tree::new(vec![
            TreeEntry::blob("b.json", id),
            TreeEntry::tree("Tables", id),
            TreeEntry::blob("a.json", id),
            TreeEntry::blob("a.json", id),
        ]);
        let names: Vec<&str> = tree.entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Tables", "a.json", "b.json"]);
        assert!(tree.get("Tables").unwrap().is_tree());
        assert!(tree.get("missing").is_none());
    }

    #[test]
    fn equal_trees_share_an_id() {
        let id = ObjectId::from_bytes(b"x");
        let a = Tree::new(vec![TreeEntry::blob("a", id), TreeEntry::blob("b", id)]);
        let b = Tree::new(vec![TreeEntry::blob("b", id), TreeEntry::blob("a", id)]);
        assert_eq!(a.id().unwrap(), b.id().unwrap());
    }

    #[test]
    fn kinds_do_not_collide() {
        let blob = StoredObject::new(ObjectKind::Blob, b"{}".to_vec());
        let tree = StoredObject::new(ObjectKind::Tree, b"{}".to_vec());
        assert_ne!(blob.compute_id(), tree.compute_id());
    }

    #[test]
    fn commit_decodes_from_stored_form() {
        let commit = CommitObject {
            tree: Tree::empty().id().unwrap(),
            parents: vec![ObjectId::from_bytes(b"p1"), ObjectId::from_bytes(b"p2")],
            author: sig(),
            committer: sig(),
            message: "Merge".into(),
        };
        let stored = commit.to_stored_object().unwrap();
        let id = stored.compute_id();
        let decoded = CommitObject::from_stored_object(&id, stored).unwrap();
        assert_eq!(decoded, commit);
        assert!(decoded.is_merge());
        assert_eq!(decoded.first_parent(), Some(ObjectId::from_bytes(b"p1")));
    }

    #[test]
    fn reading_the_wrong_kind_fails() {
        let stored = Blob::new(b"data".to_vec()).to_stored_object();
        let id = stored.compute_id();
        let err = Tree::from_stored_object(&id, stored).unwrap_err();
        assert!(matches!(
            err,
            StoreError::WrongKind { expected: ObjectKind::Tree, actual: ObjectKind::Blob, .. }
        ));
    }
}
