//! Items stored in a snapshot: typed nodes and opaque resources.

use std::collections::BTreeMap;

use arbor_types::{DataPath, UniqueId};
use serde_json::Value;

use crate::error::ModelResult;
use crate::schema::Schema;

static NULL: Value = Value::Null;

/// A typed node. Properties are kept sorted by name; a `null` value and an
/// absent property are the same thing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Node {
    pub id: UniqueId,
    pub type_name: String,
    pub path: DataPath,
    pub properties: BTreeMap<String, Value>,
}

impl Node {
    /// Node without properties.
    pub fn new(id: UniqueId, type_name: impl Into<String>, path: DataPath) -> Self {
        Self {
            id,
            type_name: type_name.into(),
            path,
            properties: BTreeMap::new(),
        }
    }

    /// A fresh node of `type_name` with a new id, placed under `parent`.
    pub fn create(schema: &Schema, type_name: &str, parent: Option<&DataPath>) -> ModelResult<Self> {
        let descriptor = schema.require(type_name)?;
        let id = UniqueId::create();
        let path = DataPath::node(parent, &descriptor.folder, &id)?;
        Ok(Self::new(id, type_name, path))
    }

    /// Value of `property`, `null` when unset.
    pub fn get(&self, property: &str) -> &Value {
        self.properties.get(property).unwrap_or(&NULL)
    }

    /// Set a property, returning the previous value. Setting `null` clears it.
    pub fn set(&mut self, property: impl Into<String>, value: Value) -> Value {
        let property = property.into();
        let previous = if value.is_null() {
            self.properties.remove(&property)
        } else {
            self.properties.insert(property, value)
        };
        previous.unwrap_or(Value::Null)
    }

    /// Set `property`, returning the node.
    pub fn with(mut self, property: impl Into<String>, value: Value) -> Self {
        self.set(property, value);
        self
    }
}

/// An opaque blob attached to a node under its `Resources` folder.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Resource {
    pub path: DataPath,
    pub data: Vec<u8>,
}

impl Resource {
    /// Resource attached to the node at `owner`.
    pub fn new(owner: &DataPath, relative: &str, data: impl Into<Vec<u8>>) -> ModelResult<Self> {
        Ok(Self {
            path: DataPath::resource(owner, relative)?,
            data: data.into(),
        })
    }
}

/// Anything addressable by a [`DataPath`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TreeItem {
    Node(Node),
    Resource(Resource),
}

impl TreeItem {
    /// Path of the node or resource.
    pub fn path(&self) -> &DataPath {
        match self {
            TreeItem::Node(n) => &n.path,
            TreeItem::Resource(r) => &r.path,
        }
    }

    /// Returns `true` for a node.
    pub fn is_node(&self) -> bool {
        matches!(self, TreeItem::Node(_))
    }

    /// The node, if this item is one.
    pub fn as_node(&self) -> Option<&Node> {
        match self {
            TreeItem::Node(n) => Some(n),
            TreeItem::Resource(_) => None,
        }
    }

    /// The resource, if this item is one.
    pub fn as_resource(&self) -> Option<&Resource> {
        match self {
            TreeItem::Resource(r) => Some(r),
            TreeItem::Node(_) => None,
        }
    }

    /// Short label for log lines and error messages.
    pub fn kind(&self) -> &str {
        match self {
            TreeItem::Node(n) => &n.type_name,
            TreeItem::Resource(_) => "resource",
        }
    }
}

impl From<Node> for TreeItem {
    fn from(node: Node) -> Self {
        TreeItem::Node(node)
    }
}

impl From<Resource> for TreeItem {
    fn from(resource: Resource) -> Self {
        TreeItem::Resource(resource)
    }
}

/// Encoding of link property values.
pub struct Link;

impl Link {
    const KEY: &'static str = "$ref";

    /// Link value pointing at `path`.
    pub fn to(path: &DataPath) -> Value {
        let mut object = serde_json::Map::new();
        object.insert(Self::KEY.to_string(), Value::String(path.full_path().to_string()));
        Value::Object(object)
    }

    /// Target path of a link value, if `value` is a well-formed link.
    pub fn target(value: &Value) -> Option<DataPath> {
        let object = value.as_object()?;
        if object.len() != 1 {
            return None;
        }
        DataPath::parse(object.get(Self::KEY)?.as_str()?).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use crate::schema::{PropertyKind, TypeDescriptor};

    #[test]
    fn null_and_absent_are_equivalent() {
        let id = UniqueId::create();
        let path = DataPath::node(None, "Tables", &id).unwrap();
        let mut node = Node::new(id.clone(), "Table", path.clone());
        assert_eq!(node.set("Name", json!("A")), Value::Null);
        assert_eq!(node.set("Name", Value::Null), json!("A"));
        assert!(node.properties.is_empty());
        assert_eq!(node.get("Name"), &Value::Null);
        assert_eq!(node, Node::new(id, "Table", path));
    }

    #[test]
    fn create_uses_registered_folder() {
        let schema = Schema::builder()
            .register(TypeDescriptor::new("Table", "Tables").property("Name", PropertyKind::String))
            .build()
            .unwrap();
        let node = Node::create(&schema, "Table", None).unwrap();
        assert_eq!(node.path.type_folder(), Some("Tables"));
        assert_eq!(node.path.unique_id(), Some(node.id.clone()));
        assert!(Node::create(&schema, "Ghost", None).is_err());
    }

    #[test]
    fn links_encode_full_paths() {
        let id = UniqueId::create();
        let path = DataPath::node(None, "Tables", &id).unwrap();
        let link = Link::to(&path);
        assert_eq!(Link::target(&link), Some(path));
        assert_eq!(Link::target(&json!({"$ref": 3})), None);
        assert_eq!(Link::target(&json!("plain")), None);
    }

    #[test]
    fn tree_item_accessors() {
        let id = UniqueId::create();
        let owner = DataPath::node(None, "Tables", &id).unwrap();
        let item: TreeItem = Resource::new(&owner, "icon.png", b"png".to_vec()).unwrap().into();
        assert!(!item.is_node());
        assert_eq!(item.kind(), "resource");
        assert_eq!(item.path().parent(), Some(owner));
        assert!(item.as_resource().is_some());
    }
}
