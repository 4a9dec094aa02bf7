//! Abstract tree edits.

use arbor_types::DataPath;
use serde_json::Value;

use crate::node::TreeItem;

/// One edit to apply to a [`TreeDefinition`](crate::tree_def::TreeDefinition).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Transform {
    /// Write a node or resource at its path. The parent must exist. A node
    /// upsert replaces the node's own properties and leaves its children
    /// alone.
    Upsert(TreeItem),

    /// Set individual properties of an existing node (`null` clears).
    Patch {
        path: DataPath,
        properties: Vec<(String, Value)>,
    },

    /// Remove an item and everything below it. Removing a missing path is
    /// a no-op.
    Delete(DataPath),
}

impl Transform {
    /// Path the edit targets.
    pub fn path(&self) -> &DataPath {
        match self {
            Transform::Upsert(item) => item.path(),
            Transform::Patch { path, .. } | Transform::Delete(path) => path,
        }
    }
}
