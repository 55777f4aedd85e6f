// Node factories: one per remote type, created lazily and kept for the run.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::Result;
use tracing::debug;

use storefront_common::{
    content_digest, NodeInput, NodeInternal, Record, ID_FIELD, INTERNAL_FIELD,
    REMOTE_INTERNAL_FIELD,
};

/// Turns a record (id already reduced to its local id) into a finished node.
pub trait NodeFactory: Send + Sync {
    fn create(&self, record: Record) -> Result<NodeInput>;
}

/// Constructs the factory for a remote type name.
pub trait FactoryProvider: Send + Sync {
    fn factory_for(&self, type_name: &str) -> Result<Arc<dyn NodeFactory>>;
}

/// Memoizes factories per type name.
///
/// The map lock is held across construction, so each type name is built
/// exactly once even when several records of a new type arrive together.
pub struct FactoryCache {
    provider: Arc<dyn FactoryProvider>,
    factories: Mutex<HashMap<String, Arc<dyn NodeFactory>>>,
}

impl FactoryCache {
    pub fn new(provider: Arc<dyn FactoryProvider>) -> Self {
        Self {
            provider,
            factories: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, type_name: &str) -> Result<Arc<dyn NodeFactory>> {
        let mut factories = self
            .factories
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if let Some(factory) = factories.get(type_name) {
            return Ok(factory.clone());
        }

        let factory = self.provider.factory_for(type_name)?;
        debug!(type_name, "Created node factory");
        factories.insert(type_name.to_string(), factory.clone());
        Ok(factory)
    }

    /// Number of distinct type names with a cached factory.
    pub fn len(&self) -> usize {
        self.factories
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ---------------------------------------------------------------------------
// Default provider
// ---------------------------------------------------------------------------

/// Builds `TypedNodeFactory`s whose node type is `<prefix><TypeName>`.
pub struct PrefixedFactories {
    type_prefix: String,
}

impl PrefixedFactories {
    pub fn new(type_prefix: impl Into<String>) -> Self {
        Self {
            type_prefix: type_prefix.into(),
        }
    }
}

impl FactoryProvider for PrefixedFactories {
    fn factory_for(&self, type_name: &str) -> Result<Arc<dyn NodeFactory>> {
        Ok(Arc::new(TypedNodeFactory {
            node_type: format!("{}{}", self.type_prefix, type_name),
        }))
    }
}

pub struct TypedNodeFactory {
    node_type: String,
}

impl NodeFactory for TypedNodeFactory {
    fn create(&self, mut record: Record) -> Result<NodeInput> {
        let content_digest = content_digest(&record)?;
        let id = match record.remove(ID_FIELD) {
            Some(serde_json::Value::String(id)) => id,
            Some(other) => anyhow::bail!("{} record has a non-string id: {other}", self.node_type),
            None => anyhow::bail!("{} record has no id", self.node_type),
        };
        // `internal` is the node's own metadata; a remote field of that name moves aside.
        if let Some(remote) = record.remove(INTERNAL_FIELD) {
            record.insert(REMOTE_INTERNAL_FIELD.to_string(), remote);
        }

        Ok(NodeInput {
            id,
            fields: record,
            internal: NodeInternal {
                node_type: self.node_type.clone(),
                content_digest,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::CountingProvider;
    use serde_json::json;

    #[test]
    fn same_type_returns_same_instance() {
        let provider = Arc::new(CountingProvider::new());
        let cache = FactoryCache::new(provider.clone());

        let a = cache.get("Product").unwrap();
        let b = cache.get("Product").unwrap();

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(provider.constructions("Product"), 1);
    }

    #[test]
    fn different_types_get_distinct_instances() {
        let provider = Arc::new(CountingProvider::new());
        let cache = FactoryCache::new(provider.clone());

        let product = cache.get("Product").unwrap();
        let order = cache.get("Order").unwrap();
        cache.get("Order").unwrap();

        assert!(!Arc::ptr_eq(&product, &order));
        assert_eq!(provider.constructions("Product"), 1);
        assert_eq!(provider.constructions("Order"), 1);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn concurrent_first_access_constructs_once() {
        let provider = Arc::new(CountingProvider::new());
        let cache = Arc::new(FactoryCache::new(provider.clone()));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                std::thread::spawn(move || cache.get("Collection").unwrap())
            })
            .collect();
        let factories: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert!(factories.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
        assert_eq!(provider.constructions("Collection"), 1);
    }

    #[test]
    fn provider_failure_is_not_cached() {
        let provider = Arc::new(CountingProvider::new().failing_on("Broken"));
        let cache = FactoryCache::new(provider.clone());

        assert!(cache.get("Broken").is_err());
        assert!(cache.get("Broken").is_err());
        assert!(cache.is_empty());
    }

    #[test]
    fn typed_factory_sets_internal_metadata() {
        let factory = PrefixedFactories::new("Storefront")
            .factory_for("Product")
            .unwrap();
        let record = json!({"id": "1", "title": "T"}).as_object().cloned().unwrap();
        let node = factory.create(record.clone()).unwrap();

        assert_eq!(node.id, "1");
        assert_eq!(node.get_str("title"), Some("T"));
        assert!(node.get("id").is_none());
        assert_eq!(node.internal.node_type, "StorefrontProduct");
        assert_eq!(node.internal.content_digest, content_digest(&record).unwrap());
    }

    #[test]
    fn typed_factory_requires_string_id() {
        let factory = TypedNodeFactory {
            node_type: "StorefrontProduct".into(),
        };
        let record = json!({"title": "T"}).as_object().cloned().unwrap();
        assert!(factory.create(record).is_err());
    }

    #[test]
    fn remote_internal_field_does_not_collide_with_metadata() {
        let factory = PrefixedFactories::new("Storefront")
            .factory_for("Metafield")
            .unwrap();
        let record = json!({"id": "1", "internal": {"type": "remote"}})
            .as_object()
            .cloned()
            .unwrap();
        let node = factory.create(record).unwrap();

        assert!(node.get("internal").is_none());
        assert_eq!(node.get("remoteInternal"), Some(&json!({"type": "remote"})));

        let value = serde_json::to_value(&node).unwrap();
        assert_eq!(value["internal"]["type"], "StorefrontMetafield");
        assert_eq!(value["remoteInternal"], json!({"type": "remote"}));
    }
}
