//! Node blob encoding.

use std::sync::Arc;

use arbor_types::DataPath;
use serde_json::{Map, Value};

use crate::error::{ModelError, ModelResult};
use crate::node::Node;
use crate::schema::Schema;

/// Turns nodes into blob bytes and back.
///
/// The node id and path are not part of the payload; they are implied by
/// where the blob sits in the tree and handed back in on decode.
pub trait NodeSerializer: Send + Sync {
    fn serialize(&self, node: &Node) -> ModelResult<Vec<u8>>;

    fn deserialize(&self, data: &[u8], path: &DataPath) -> ModelResult<Node>;
}

const TYPE_KEY: &str = "$type";

/// JSON encoding: a single object with a `$type` tag followed by the
/// properties in name order. Decoded nodes are validated against the schema.
pub struct JsonNodeSerializer {
    schema: Arc<Schema>,
}

impl JsonNodeSerializer {
    /// Serializer validating against `schema`.
    pub fn new(schema: Arc<Schema>) -> Self {
        Self { schema }
    }
}

impl NodeSerializer for JsonNodeSerializer {
    fn serialize(&self, node: &Node) -> ModelResult<Vec<u8>> {
        self.schema.validate_node(node)?;
        let mut object = Map::new();
        object.insert(TYPE_KEY.to_string(), Value::String(node.type_name.clone()));
        for (name, value) in &node.properties {
            object.insert(name.clone(), value.clone());
        }
        serde_json::to_vec(&Value::Object(object)).map_err(|e| ModelError::Serialization {
            path: node.path.clone(),
            reason: e.to_string(),
        })
    }

    fn deserialize(&self, data: &[u8], path: &DataPath) -> ModelResult<Node> {
        let corrupt = |reason: String| ModelError::Serialization {
            path: path.clone(),
            reason,
        };
        let id = path
            .unique_id()
            .ok_or_else(|| corrupt("not a node path".into()))?;
        let value: Value = serde_json::from_slice(data).map_err(|e| corrupt(e.to_string()))?;
        let Value::Object(mut object) = value else {
            return Err(corrupt("expected a JSON object".into()));
        };
        let type_name = match object.remove(TYPE_KEY) {
            Some(Value::String(t)) => t,
            _ => return Err(corrupt(format!("missing {TYPE_KEY} tag"))),
        };
        let mut node = Node::new(id, type_name, path.clone());
        for (name, value) in object {
            node.set(name, value);
        }
        self.schema.validate_node(&node)?;
        Ok(node)
    }
}
