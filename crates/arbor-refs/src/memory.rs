//! In-memory reference store.

use std::collections::HashMap;
use std::sync::RwLock;

use arbor_types::ObjectId;
use tracing::debug;

use crate::error::{RefError, RefResult};
use crate::names::{validate_branch_name, validate_tag_name};
use crate::traits::RefStore;
use crate::types::{branch_ref_name, Head, Ref};

/// `HashMap`-backed [`RefStore`]. Data is lost when the store is dropped.
#[derive(Debug, Default)]
pub struct InMemoryRefStore {
    refs: RwLock<HashMap<String, Ref>>,
    head: RwLock<Option<Head>>,
}

impl InMemoryRefStore {
    /// Create an empty store with no HEAD.
    pub fn new() -> Self {
        Self::default()
    }

    fn validate(reference: &Ref) -> RefResult<()> {
        match reference {
            Ref::Branch { name, .. } => validate_branch_name(name),
            Ref::Tag { name, .. } => validate_tag_name(name),
        }
    }

    fn check_tag_overwrite(refs: &HashMap<String, Ref>, name: &str) -> RefResult<()> {
        if refs.get(name).is_some_and(Ref::is_tag) {
            return Err(RefError::TagImmutable {
                name: name.to_string(),
            });
        }
        Ok(())
    }
}

impl RefStore for InMemoryRefStore {
    fn read_ref(&self, name: &str) -> RefResult<Option<Ref>> {
        let refs = self.refs.read().expect("lock poisoned");
        Ok(refs.get(name).cloned())
    }

    fn write_ref(&self, name: &str, reference: &Ref) -> RefResult<()> {
        Self::validate(reference)?;
        let mut refs = self.refs.write().expect("lock poisoned");
        Self::check_tag_overwrite(&refs, name)?;
        refs.insert(name.to_string(), reference.clone());
        Ok(())
    }

    fn compare_and_swap(
        &self,
        name: &str,
        expected: Option<ObjectId>,
        reference: &Ref,
    ) -> RefResult<()> {
        Self::validate(reference)?;
        let mut refs = self.refs.write().expect("lock poisoned");
        let actual = refs.get(name).map(Ref::target);
        if actual != expected {
            return Err(RefError::ConcurrentUpdate {
                name: name.to_string(),
                expected,
                actual,
            });
        }
        Self::check_tag_overwrite(&refs, name)?;
        debug!(name, from = ?expected, to = %reference.target(), "ref updated");
        refs.insert(name.to_string(), reference.clone());
        Ok(())
    }

    fn delete_ref(&self, name: &str) -> RefResult<bool> {
        if let Some(Head::Symbolic(current)) = self.head.read().expect("lock poisoned").as_ref() {
            if name == branch_ref_name(current) {
                return Err(RefError::DeleteCurrentBranch {
                    name: current.clone(),
                });
            }
        }
        let mut refs = self.refs.write().expect("lock poisoned");
        Ok(refs.remove(name).is_some())
    }

    fn list_refs(&self, prefix: &str) -> RefResult<Vec<(String, Ref)>> {
        let refs = self.refs.read().expect("lock poisoned");
        let mut result: Vec<(String, Ref)> = refs
            .iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        result.sort_by(|(a, _), (b, _)| a.cmp(b));
        Ok(result)
    }

    fn head(&self) -> RefResult<Option<Head>> {
        Ok(self.head.read().expect("lock poisoned").clone())
    }

    fn set_head(&self, branch: &str) -> RefResult<()> {
        validate_branch_name(branch)?;
        *self.head.write().expect("lock poisoned") = Some(Head::Symbolic(branch.to_string()));
        Ok(())
    }

    fn set_head_detached(&self, commit: ObjectId) -> RefResult<()> {
        *self.head.write().expect("lock poisoned") = Some(Head::Detached(commit));
        Ok(())
    }
}
