use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::error::Result;

/// A raw record as delivered by the source: an open field → value map.
pub type Record = Map<String, Value>;

/// Field holding a record's qualified identifier.
pub const ID_FIELD: &str = "id";
/// Field holding the qualified identifier of a record's parent.
pub const PARENT_ID_FIELD: &str = "__parentId";
/// Reserved for node metadata (`NodeInput::internal`).
pub const INTERNAL_FIELD: &str = "internal";
/// Where a record's own `internal` field is kept on the node.
pub const REMOTE_INTERNAL_FIELD: &str = "remoteInternal";
/// Remote URL of an image-bearing record or nested image object.
pub const IMAGE_SOURCE_FIELD: &str = "originalSrc";
/// Local file node reference set after an image is materialized.
pub const LOCAL_FILE_FIELD: &str = "localFile";

/// Id of a registered file node. Substitutable for the asset in downstream records.
pub type FileNodeId = String;

// --- Node ---

/// A fully-formed node, ready to hand to the node store.
/// Unknown fields pass through untouched in `fields`, which must not hold
/// `id` or `internal`: both serialize alongside it at the top level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeInput {
    pub id: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
    pub internal: NodeInternal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeInternal {
    #[serde(rename = "type")]
    pub node_type: String,
    pub content_digest: String,
}

impl NodeInput {
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.fields.get(field).and_then(Value::as_str)
    }

    /// Nested object field, if present and actually an object.
    pub fn object_mut(&mut self, field: &str) -> Option<&mut Map<String, Value>> {
        self.fields.get_mut(field).and_then(Value::as_object_mut)
    }

    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(field.into(), value.into());
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.fields.remove(field)
    }
}

/// Hex SHA-256 of a value's JSON serialization.
pub fn content_digest<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    let bytes = serde_json::to_vec(value)?;
    Ok(bytes_digest(&bytes))
}

/// Hex SHA-256 of raw bytes.
pub fn bytes_digest(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn node_serializes_fields_inline() {
        let mut node = NodeInput {
            id: "1".into(),
            fields: Map::new(),
            internal: NodeInternal {
                node_type: "StorefrontProduct".into(),
                content_digest: "abc".into(),
            },
        };
        node.set("title", "T");

        let value = serde_json::to_value(&node).unwrap();
        assert_eq!(
            value,
            json!({
                "id": "1",
                "title": "T",
                "internal": { "type": "StorefrontProduct", "contentDigest": "abc" }
            })
        );

        let back: NodeInput = serde_json::from_value(value).unwrap();
        assert_eq!(back, node);
    }

    #[test]
    fn object_mut_ignores_non_objects() {
        let mut node = NodeInput {
            id: "1".into(),
            fields: Map::new(),
            internal: NodeInternal {
                node_type: "T".into(),
                content_digest: String::new(),
            },
        };
        node.set("featuredImage", "not-an-object");
        assert!(node.object_mut("featuredImage").is_none());
        assert!(node.object_mut("missing").is_none());
    }

    #[test]
    fn digest_is_stable_and_content_sensitive() {
        let a = content_digest(&json!({"title": "T"})).unwrap();
        let b = content_digest(&json!({"title": "T"})).unwrap();
        let c = content_digest(&json!({"title": "U"})).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
    }
}
