//! The [`RefStore`] trait.

use arbor_types::ObjectId;

use crate::error::RefResult;
use crate::types::{branch_ref_name, Head, Ref};

/// Storage backend for named references.
///
/// Names are canonical (`refs/heads/*`, `refs/tags/*`). Implementations must
/// make [`RefStore::compare_and_swap`] atomic with respect to every other
/// write on the same name.
pub trait RefStore: Send + Sync {
    /// Read a ref by canonical name. `Ok(None)` if it does not exist.
    fn read_ref(&self, name: &str) -> RefResult<Option<Ref>>;

    /// Create or overwrite a ref. Existing tags are never overwritten.
    fn write_ref(&self, name: &str, reference: &Ref) -> RefResult<()>;

    /// Replace a ref only if it currently points at `expected`
    /// (`None` meaning "must not exist yet").
    fn compare_and_swap(
        &self,
        name: &str,
        expected: Option<ObjectId>,
        reference: &Ref,
    ) -> RefResult<()>;

    /// Delete a ref. Returns `true` if it existed.
    fn delete_ref(&self, name: &str) -> RefResult<bool>;

    /// All refs whose canonical name starts with `prefix`, sorted by name.
    fn list_refs(&self, prefix: &str) -> RefResult<Vec<(String, Ref)>>;

    fn head(&self) -> RefResult<Option<Head>>;

    /// Point HEAD at a branch.
    fn set_head(&self, branch: &str) -> RefResult<()>;

    fn set_head_detached(&self, commit: ObjectId) -> RefResult<()>;

    fn branches(&self) -> RefResult<Vec<(String, Ref)>> {
        self.list_refs("refs/heads/")
    }

    fn tags(&self) -> RefResult<Vec<(String, Ref)>> {
        self.list_refs("refs/tags/")
    }

    /// Commit a branch currently points at.
    fn branch_target(&self, branch: &str) -> RefResult<Option<ObjectId>> {
        Ok(self.read_ref(&branch_ref_name(branch))?.map(|r| r.target()))
    }
}
