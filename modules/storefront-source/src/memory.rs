// In-memory collaborators: a process-lifetime cache and a node store that
// keeps everything it is handed. Used by the CLI and by tests.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use storefront_common::NodeInput;

use crate::traits::{NodeActions, NodeCache};

/// Cache backed by a HashMap. Entries live as long as the value does.
#[derive(Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, Value>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl NodeCache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        self.entries.write().await.insert(key.to_string(), value);
        Ok(())
    }
}

/// Node store that records created nodes and touched ids.
#[derive(Default)]
pub struct MemoryNodeStore {
    state: Mutex<StoreState>,
}

#[derive(Default)]
struct StoreState {
    nodes: HashMap<String, NodeInput>,
    touched: Vec<String>,
}

impl MemoryNodeStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn node(&self, id: &str) -> Option<NodeInput> {
        self.state().nodes.get(id).cloned()
    }

    pub fn created_count(&self) -> usize {
        self.state().nodes.len()
    }

    /// Touched ids in call order, duplicates included.
    pub fn touched(&self) -> Vec<String> {
        self.state().touched.clone()
    }

    /// Ids that were created or touched: the nodes still live in this run.
    pub fn live_ids(&self) -> HashSet<String> {
        let state = self.state();
        state
            .nodes
            .keys()
            .chain(state.touched.iter())
            .cloned()
            .collect()
    }
}

impl NodeActions for MemoryNodeStore {
    fn create_node(&self, node: NodeInput) -> Result<()> {
        self.state().nodes.insert(node.id.clone(), node);
        Ok(())
    }

    fn touch_node(&self, node_id: &str) {
        self.state().touched.push(node_id.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map};
    use storefront_common::NodeInternal;

    #[tokio::test]
    async fn cache_round_trips_values() {
        let cache = MemoryCache::new();
        assert!(cache.get("k").await.unwrap().is_none());

        cache.set("k", json!({"fileNodeId": "f1"})).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), Some(json!({"fileNodeId": "f1"})));
        assert_eq!(cache.len().await, 1);
    }

    #[test]
    fn store_tracks_created_and_touched() {
        let store = MemoryNodeStore::new();
        store
            .create_node(NodeInput {
                id: "a".into(),
                fields: Map::new(),
                internal: NodeInternal {
                    node_type: "File".into(),
                    content_digest: String::new(),
                },
            })
            .unwrap();
        store.touch_node("b");
        store.touch_node("b");

        assert_eq!(store.created_count(), 1);
        assert_eq!(store.touched(), vec!["b".to_string(), "b".to_string()]);
        assert_eq!(store.live_ids().len(), 2);
        assert!(store.node("a").is_some());
    }
}
