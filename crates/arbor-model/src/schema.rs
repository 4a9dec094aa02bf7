//! Static type registry.
//!
//! Every node type is registered once, up front, with its tree folder name,
//! its ordered modifiable properties and the types it may contain. The
//! comparer walks properties in declaration order, so registration order is
//! also report order.

use std::collections::HashMap;

use arbor_types::RESOURCES_FOLDER;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ModelError, ModelResult};
use crate::node::{Link, Node};

/// Value shape a property accepts. `null` is accepted by every kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyKind {
    String,
    Integer,
    Float,
    Boolean,
    /// Reference to another item, stored as `{"$ref": "<full path>"}`.
    Link,
    /// Arbitrary JSON.
    Json,
}

impl PropertyKind {
    /// Returns `true` if `value` has this kind. `null` is always accepted.
    pub fn accepts(self, value: &Value) -> bool {
        if value.is_null() {
            return true;
        }
        match self {
            Self::String => value.is_string(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Float => value.is_number(),
            Self::Boolean => value.is_boolean(),
            Self::Link => Link::target(value).is_some(),
            Self::Json => true,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyDescriptor {
    pub name: String,
    pub kind: PropertyKind,
}

/// Registration record for one node type.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDescriptor {
    pub name: String,
    /// Folder name under which instances are stored in their parent.
    pub folder: String,
    pub properties: Vec<PropertyDescriptor>,
    /// Names of the types allowed as children.
    pub children: Vec<String>,
}

impl TypeDescriptor {
    /// Type stored under `folder`, with no properties yet.
    pub fn new(name: impl Into<String>, folder: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            folder: folder.into(),
            properties: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Declare a property. Declaration order is comparison order.
    pub fn property(mut self, name: impl Into<String>, kind: PropertyKind) -> Self {
        self.properties.push(PropertyDescriptor {
            name: name.into(),
            kind,
        });
        self
    }

    /// Allow nodes of `type_name` as children.
    pub fn child(mut self, type_name: impl Into<String>) -> Self {
        self.children.push(type_name.into());
        self
    }

    /// Descriptor of `name`, if declared.
    pub fn get_property(&self, name: &str) -> Option<&PropertyDescriptor> {
        self.properties.iter().find(|p| p.name == name)
    }
}

/// Immutable registry of all node types, built by [`SchemaBuilder`].
#[derive(Clone, Debug)]
pub struct Schema {
    types: Vec<TypeDescriptor>,
    by_name: HashMap<String, usize>,
    by_folder: HashMap<String, usize>,
}

impl Schema {
    /// Start registering types.
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::default()
    }

    /// Registered types, in registration order.
    pub fn types(&self) -> impl Iterator<Item = &TypeDescriptor> {
        self.types.iter()
    }

    /// Type called `name`, if registered.
    pub fn type_named(&self, name: &str) -> Option<&TypeDescriptor> {
        self.by_name.get(name).map(|&i| &self.types[i])
    }

    /// Type stored under `folder`, if any.
    pub fn type_for_folder(&self, folder: &str) -> Option<&TypeDescriptor> {
        self.by_folder.get(folder).map(|&i| &self.types[i])
    }

    /// Type called `name`, or an error naming it.
    pub fn require(&self, name: &str) -> ModelResult<&TypeDescriptor> {
        self.type_named(name)
            .ok_or_else(|| ModelError::UnknownType(name.to_string()))
    }

    /// Check that `node` is well-formed for its type: the path uses the
    /// registered folder and the node id, and every property is declared
    /// and holds a value of the declared kind.
    pub fn validate_node(&self, node: &Node) -> ModelResult<()> {
        let descriptor = self.require(&node.type_name)?;
        if node.path.type_folder() != Some(descriptor.folder.as_str()) {
            return Err(ModelError::InvalidItem {
                path: node.path.clone(),
                reason: format!("type {} is stored under '{}'", descriptor.name, descriptor.folder),
            });
        }
        if node.path.unique_id().as_ref() != Some(&node.id) {
            return Err(ModelError::InvalidItem {
                path: node.path.clone(),
                reason: format!("path does not end in node id {}", node.id),
            });
        }
        for (name, value) in &node.properties {
            let property =
                descriptor
                    .get_property(name)
                    .ok_or_else(|| ModelError::UnknownProperty {
                        type_name: descriptor.name.clone(),
                        property: name.clone(),
                    })?;
            if !property.kind.accepts(value) {
                return Err(ModelError::PropertyKindMismatch {
                    type_name: descriptor.name.clone(),
                    property: name.clone(),
                    expected: format!("{:?}", property.kind).to_lowercase(),
                    value: value.clone(),
                });
            }
        }
        Ok(())
    }

    /// Check that `child_type` may live directly under `parent_type`.
    pub fn check_child(&self, parent_type: &str, child_type: &str) -> ModelResult<()> {
        let parent = self.require(parent_type)?;
        if !parent.children.iter().any(|c| c == child_type) {
            return Err(ModelError::Schema(format!(
                "{child_type} cannot be a child of {parent_type}"
            )));
        }
        Ok(())
    }
}

/// Collects type registrations and validates them as a whole.
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    types: Vec<TypeDescriptor>,
}

impl SchemaBuilder {
    /// Add a type.
    pub fn register(mut self, descriptor: TypeDescriptor) -> Self {
        self.types.push(descriptor);
        self
    }

    /// Validate the registered types and freeze them.
    pub fn build(self) -> ModelResult<Schema> {
        let mut by_name = HashMap::new();
        let mut by_folder = HashMap::new();
        for (i, t) in self.types.iter().enumerate() {
            if t.name.is_empty() || t.folder.is_empty() || t.folder.contains('/') {
                return Err(ModelError::Schema(format!(
                    "type {:?} needs a name and a single-segment folder",
                    t.name
                )));
            }
            if t.folder == RESOURCES_FOLDER {
                return Err(ModelError::Schema(format!(
                    "type {} uses the reserved folder '{RESOURCES_FOLDER}'",
                    t.name
                )));
            }
            if by_name.insert(t.name.clone(), i).is_some() {
                return Err(ModelError::Schema(format!("duplicate type {}", t.name)));
            }
            if by_folder.insert(t.folder.clone(), i).is_some() {
                return Err(ModelError::Schema(format!("duplicate folder {}", t.folder)));
            }
            let mut seen = std::collections::HashSet::new();
            for p in &t.properties {
                if p.name.is_empty() || p.name.starts_with('$') {
                    return Err(ModelError::Schema(format!(
                        "{}.{:?} is not a valid property name",
                        t.name, p.name
                    )));
                }
                if !seen.insert(p.name.as_str()) {
                    return Err(ModelError::Schema(format!(
                        "duplicate property {}.{}",
                        t.name, p.name
                    )));
                }
            }
        }
        for t in &self.types {
            if let Some(missing) = t.children.iter().find(|c| !by_name.contains_key(*c)) {
                return Err(ModelError::Schema(format!(
                    "type {} lists unknown child type {missing}",
                    t.name
                )));
            }
        }
        Ok(Schema {
            types: self.types,
            by_name,
            by_folder,
        })
    }
}
