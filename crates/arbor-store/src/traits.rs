use arbor_types::ObjectId;

use crate::error::{StoreError, StoreResult};
use crate::object::{Blob, CommitObject, StoredObject, Tree};

/// Content-addressed object store.
///
/// Objects are immutable once written and writing the same bytes twice
/// yields the same id. Implementations must be safe to share across threads.
pub trait ObjectStore: Send + Sync {
    /// Read an object by id. `Ok(None)` if it does not exist.
    fn read(&self, id: &ObjectId) -> StoreResult<Option<StoredObject>>;

    /// Write an object and return its id. Idempotent.
    fn write(&self, object: &StoredObject) -> StoreResult<ObjectId>;

    fn exists(&self, id: &ObjectId) -> StoreResult<bool>;

    /// Delete an object by id. Returns `true` if it existed.
    fn delete(&self, id: &ObjectId) -> StoreResult<bool>;

    fn read_batch(&self, ids: &[ObjectId]) -> StoreResult<Vec<Option<StoredObject>>> {
        ids.iter().map(|id| self.read(id)).collect()
    }

    fn write_batch(&self, objects: &[StoredObject]) -> StoreResult<Vec<ObjectId>> {
        objects.iter().map(|obj| self.write(obj)).collect()
    }

    /// Read an object that must exist.
    fn read_required(&self, id: &ObjectId) -> StoreResult<StoredObject> {
        self.read(id)?.ok_or(StoreError::NotFound(*id))
    }

    fn read_blob(&self, id: &ObjectId) -> StoreResult<Blob> {
        Blob::from_stored_object(id, self.read_required(id)?)
    }

    fn read_tree(&self, id: &ObjectId) -> StoreResult<Tree> {
        Tree::from_stored_object(id, self.read_required(id)?)
    }

    fn read_commit(&self, id: &ObjectId) -> StoreResult<CommitObject> {
        CommitObject::from_stored_object(id, self.read_required(id)?)
    }

    fn write_blob(&self, data: &[u8]) -> StoreResult<ObjectId> {
        self.write(&Blob::new(data.to_vec()).to_stored_object())
    }

    fn write_tree(&self, tree: &Tree) -> StoreResult<ObjectId> {
        self.write(&tree.to_stored_object()?)
    }

    fn write_commit(&self, commit: &CommitObject) -> StoreResult<ObjectId> {
        self.write(&commit.to_stored_object()?)
    }
}
