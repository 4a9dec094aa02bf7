//! Core reference types.

use arbor_types::ObjectId;
use serde::{Deserialize, Serialize};

/// Canonical ref name of a branch, e.g. `refs/heads/main`.
pub fn branch_ref_name(branch: &str) -> String {
    format!("refs/heads/{branch}")
}

/// Canonical ref name of a tag, e.g. `refs/tags/v1`.
pub fn tag_ref_name(tag: &str) -> String {
    format!("refs/tags/{tag}")
}

/// A named pointer to a commit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Ref {
    /// Mutable pointer that advances as commits are made on the branch.
    Branch { name: String, target: ObjectId },

    /// Immutable pointer to a specific commit.
    Tag {
        name: String,
        target: ObjectId,
        message: String,
    },
}

impl Ref {
    /// Branch `name` at `target`.
    pub fn branch(name: impl Into<String>, target: ObjectId) -> Self {
        Ref::Branch {
            name: name.into(),
            target,
        }
    }

    /// Annotated tag `name` at `target`.
    pub fn tag(name: impl Into<String>, target: ObjectId, message: impl Into<String>) -> Self {
        Ref::Tag {
            name: name.into(),
            target,
            message: message.into(),
        }
    }

    /// Full ref name, e.g. `refs/heads/main`.
    pub fn canonical_name(&self) -> String {
        match self {
            Ref::Branch { name, .. } => branch_ref_name(name),
            Ref::Tag { name, .. } => tag_ref_name(name),
        }
    }

    /// Name without the `refs/...` prefix.
    pub fn short_name(&self) -> &str {
        match self {
            Ref::Branch { name, .. } | Ref::Tag { name, .. } => name,
        }
    }

    /// Commit the ref points at.
    pub fn target(&self) -> ObjectId {
        match self {
            Ref::Branch { target, .. } | Ref::Tag { target, .. } => *target,
        }
    }

    /// Returns `true` for a branch.
    pub fn is_branch(&self) -> bool {
        matches!(self, Ref::Branch { .. })
    }

    /// Returns `true` for a tag.
    pub fn is_tag(&self) -> bool {
        matches!(self, Ref::Tag { .. })
    }
}

/// The state of HEAD: either symbolic (naming a branch) or detached.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Head {
    Symbolic(String),
    Detached(ObjectId),
}
