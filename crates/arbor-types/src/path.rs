//! Canonical addressing of nodes and resources inside a tree snapshot.
//!
//! A node is stored as the blob `{id}.json` inside its own folder
//! `{parentFolder}/{TypeFolder}/{id}`. Resources attached to a node live below
//! `{nodeFolder}/Resources/`. Paths are compared by their full string form.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::unique_id::UniqueId;

/// Reserved folder name holding the resources of a node.
pub const RESOURCES_FOLDER: &str = "Resources";

const NODE_FILE_EXTENSION: &str = ".json";

/// Immutable address of a node or resource.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DataPath {
    full: String,
    /// Byte offset of the `/` separating folder path from file name.
    split: usize,
}

impl DataPath {
    /// Path of a node folder directly below `parent` (or at the tree root).
    pub fn node(
        parent: Option<&DataPath>,
        type_folder: &str,
        id: &UniqueId,
    ) -> Result<Self, TypeError> {
        validate_segment(type_folder)?;
        if type_folder == RESOURCES_FOLDER {
            return Err(TypeError::InvalidPath {
                path: type_folder.to_string(),
                reason: format!("'{RESOURCES_FOLDER}' is reserved and cannot be a type folder"),
            });
        }
        let folder = match parent {
            Some(p) if !p.is_node() => {
                return Err(TypeError::InvalidPath {
                    path: p.full.clone(),
                    reason: "only nodes can own child nodes".into(),
                })
            }
            Some(p) => format!("{}/{type_folder}/{id}", p.folder_path()),
            None => format!("{type_folder}/{id}"),
        };
        Ok(Self::from_parts(folder, &format!("{id}{NODE_FILE_EXTENSION}")))
    }

    /// Path of a resource attached to `owner`, e.g. `images/logo.png`.
    pub fn resource(owner: &DataPath, relative: &str) -> Result<Self, TypeError> {
        if !owner.is_node() {
            return Err(TypeError::InvalidPath {
                path: owner.full.clone(),
                reason: "only nodes can own resources".into(),
            });
        }
        let mut segments: Vec<&str> = relative.split('/').collect();
        for segment in &segments {
            validate_segment(segment)?;
        }
        let file = segments.pop().unwrap_or_default();
        let mut folder = format!("{}/{RESOURCES_FOLDER}", owner.folder_path());
        for segment in segments {
            folder.push('/');
            folder.push_str(segment);
        }
        Ok(Self::from_parts(folder, file))
    }

    /// Parse a full path produced by [`DataPath::full_path`].
    pub fn parse(full: &str) -> Result<Self, TypeError> {
        let invalid = |reason: &str| TypeError::InvalidPath {
            path: full.to_string(),
            reason: reason.to_string(),
        };
        let segments: Vec<&str> = full.split('/').collect();
        for segment in &segments {
            validate_segment(segment).map_err(|_| invalid("empty or malformed segment"))?;
        }
        if segments.len() < 3 {
            return Err(invalid("too few segments"));
        }

        let resources_at = segments
            .iter()
            .enumerate()
            .find(|(i, s)| i % 2 == 0 && **s == RESOURCES_FOLDER)
            .map(|(i, _)| i);
        let node_folders = match resources_at {
            Some(0) => return Err(invalid("resources must belong to a node")),
            Some(i) if segments.len() < i + 2 => {
                return Err(invalid("resource path needs a file name"))
            }
            Some(i) => &segments[..i],
            None => {
                if segments.len() % 2 == 0 {
                    return Err(invalid("expected {TypeFolder}/{id} pairs and a file name"));
                }
                let (file, folders) = segments
                    .split_last()
                    .ok_or_else(|| invalid("too few segments"))?;
                let last_id = folders[folders.len() - 1];
                if *file != format!("{last_id}{NODE_FILE_EXTENSION}") {
                    return Err(invalid("node file name must be '{id}.json'"));
                }
                folders
            }
        };
        for pair in node_folders.chunks(2) {
            if pair.len() != 2 {
                return Err(invalid("dangling type folder"));
            }
            UniqueId::parse(pair[1]).map_err(|_| invalid("bad node id"))?;
        }
        Ok(Self::split_last(full))
    }

    fn from_parts(folder: String, file: &str) -> Self {
        let split = folder.len();
        let mut full = folder;
        full.push('/');
        full.push_str(file);
        Self { full, split }
    }

    fn split_last(full: &str) -> Self {
        let split = full.rfind('/').unwrap_or(0);
        Self {
            full: full.to_string(),
            split,
        }
    }

    /// Folder containing the item (for a node, the node's own folder).
    pub fn folder_path(&self) -> &str {
        &self.full[..self.split]
    }

    /// Last segment of the path.
    pub fn file_name(&self) -> &str {
        &self.full[self.split + 1..]
    }

    /// The path as stored in trees.
    pub fn full_path(&self) -> &str {
        &self.full
    }

    /// Returns `true` if the path names a resource.
    pub fn is_resource(&self) -> bool {
        self.resource_index().is_some()
    }

    /// Returns `true` if the path names a node.
    pub fn is_node(&self) -> bool {
        !self.is_resource()
    }

    /// Position of the reserved folder among the folder segments, if any.
    fn resource_index(&self) -> Option<usize> {
        self.folder_path()
            .split('/')
            .enumerate()
            .find(|(i, s)| i % 2 == 0 && *s == RESOURCES_FOLDER)
            .map(|(i, _)| i)
    }

    /// The node id encoded in a node path.
    pub fn unique_id(&self) -> Option<UniqueId> {
        if !self.is_node() {
            return None;
        }
        self.folder_path()
            .rsplit('/')
            .next()
            .and_then(|s| UniqueId::parse(s).ok())
    }

    /// Type folder name of a node path.
    pub fn type_folder(&self) -> Option<&str> {
        if !self.is_node() {
            return None;
        }
        self.folder_path().rsplit('/').nth(1)
    }

    /// Path of the resource relative to its owner's `Resources` folder.
    pub fn resource_relative_path(&self) -> Option<String> {
        let index = self.resource_index()?;
        let folders: Vec<&str> = self.folder_path().split('/').skip(index + 1).collect();
        let mut relative = folders.join("/");
        if !relative.is_empty() {
            relative.push('/');
        }
        relative.push_str(self.file_name());
        Some(relative)
    }

    /// Owning node for a resource, parent node for a node, `None` at the root.
    pub fn parent(&self) -> Option<DataPath> {
        let segments: Vec<&str> = self.folder_path().split('/').collect();
        let owner_len = match self.resource_index() {
            Some(index) => index,
            None => segments.len().checked_sub(2)?,
        };
        if owner_len == 0 {
            return None;
        }
        let folder = segments[..owner_len].join("/");
        let file = format!("{}{NODE_FILE_EXTENSION}", segments[owner_len - 1]);
        Some(Self::from_parts(folder, &file))
    }

    /// Ancestor nodes, nearest first.
    pub fn ancestors(&self) -> Ancestors {
        Ancestors {
            next: self.parent(),
        }
    }

    /// Returns `true` if `self` lies strictly inside the folder of `ancestor`.
    pub fn is_descendant_of(&self, ancestor: &DataPath) -> bool {
        ancestor.is_node()
            && self.full.len() > ancestor.split + 1
            && self.full.starts_with(ancestor.folder_path())
            && self.full.as_bytes()[ancestor.split] == b'/'
            && self != ancestor
    }
}

/// Iterator over the ancestor nodes of a path.
pub struct Ancestors {
    next: Option<DataPath>,
}

impl Iterator for Ancestors {
    type Item = DataPath;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next.take()?;
        self.next = current.parent();
        Some(current)
    }
}

fn validate_segment(segment: &str) -> Result<(), TypeError> {
    if segment.is_empty() || segment == "." || segment == ".." || segment.contains('\\') {
        return Err(TypeError::InvalidPath {
            path: segment.to_string(),
            reason: "path segments must be non-empty names".into(),
        });
    }
    Ok(())
}

impl FromStr for DataPath {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for DataPath {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<DataPath> for String {
    fn from(path: DataPath) -> Self {
        path.full
    }
}

impl fmt::Debug for DataPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DataPath({})", self.full)
    }
}

impl fmt::Display for DataPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full)
    }
}
