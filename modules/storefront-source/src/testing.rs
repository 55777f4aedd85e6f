// Test mocks for the node pipeline.
//
// - MockFileFetcher (RemoteFileFetcher): HashMap-based URL → file node id
// - CountingProvider (FactoryProvider): counts factory constructions per type
// - FailingCache (NodeCache): in-memory cache whose reads or writes can fail
//
// Plus helpers for constructing records and nodes from `json!` literals.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde_json::{Map, Value};

use storefront_common::{FileNodeId, NodeInput, NodeInternal, Record, ID_FIELD};

use crate::factory::{FactoryProvider, NodeFactory};
use crate::memory::MemoryCache;
use crate::traits::{NodeActions, NodeCache, RemoteFileFetcher, RemoteFileRequest};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Record from a `json!` object literal. Panics on non-objects.
pub fn record(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {other}"),
    }
}

/// Node with the given id and fields, typed `Test`.
pub fn node_with(id: &str, fields: Value) -> NodeInput {
    NodeInput {
        id: id.to_string(),
        fields: record(fields),
        internal: NodeInternal {
            node_type: "Test".to_string(),
            content_digest: String::new(),
        },
    }
}

// ---------------------------------------------------------------------------
// MockFileFetcher
// ---------------------------------------------------------------------------

/// Returns the registered file node id for known URLs and `None` otherwise.
/// Successful fetches register a `File` node through the given actions.
/// Builder pattern: `.on_url()`, `.failing_on()`.
pub struct MockFileFetcher {
    files: HashMap<String, FileNodeId>,
    failing: HashSet<String>,
    calls: Mutex<Vec<(String, String)>>,
}

impl MockFileFetcher {
    pub fn new() -> Self {
        Self {
            files: HashMap::new(),
            failing: HashSet::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn on_url(mut self, url: &str, file_node_id: &str) -> Self {
        self.files.insert(url.to_string(), file_node_id.to_string());
        self
    }

    /// Make fetches of `url` return `Err`.
    pub fn failing_on(mut self, url: &str) -> Self {
        self.failing.insert(url.to_string());
        self
    }

    pub fn call_count(&self, url: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|(u, _)| u == url).count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Parent node ids passed for `url`, in call order.
    pub fn parents_for(&self, url: &str) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(u, _)| u == url)
            .map(|(_, parent)| parent.clone())
            .collect()
    }
}

impl Default for MockFileFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteFileFetcher for MockFileFetcher {
    async fn fetch(
        &self,
        request: RemoteFileRequest<'_>,
        actions: &dyn NodeActions,
        _cache: &dyn NodeCache,
    ) -> Result<Option<FileNodeId>> {
        self.calls
            .lock()
            .unwrap()
            .push((request.url.to_string(), request.parent_node_id.to_string()));

        if self.failing.contains(request.url) {
            bail!("connection reset fetching {}", request.url);
        }

        let Some(id) = self.files.get(request.url) else {
            return Ok(None);
        };

        let mut fields = Map::new();
        fields.insert("url".into(), Value::String(request.url.to_string()));
        fields.insert("parent".into(), Value::String(request.parent_node_id.to_string()));
        actions.create_node(NodeInput {
            id: id.clone(),
            fields,
            internal: NodeInternal {
                node_type: "File".to_string(),
                content_digest: String::new(),
            },
        })?;
        Ok(Some(id.clone()))
    }
}

// ---------------------------------------------------------------------------
// CountingProvider
// ---------------------------------------------------------------------------

/// Factory provider that counts how often each type's factory is built.
/// Its factories type nodes with the bare remote type name.
pub struct CountingProvider {
    constructions: Mutex<HashMap<String, usize>>,
    failing: HashSet<String>,
}

impl CountingProvider {
    pub fn new() -> Self {
        Self {
            constructions: Mutex::new(HashMap::new()),
            failing: HashSet::new(),
        }
    }

    pub fn failing_on(mut self, type_name: &str) -> Self {
        self.failing.insert(type_name.to_string());
        self
    }

    pub fn constructions(&self, type_name: &str) -> usize {
        self.constructions
            .lock()
            .unwrap()
            .get(type_name)
            .copied()
            .unwrap_or(0)
    }

    pub fn total_constructions(&self) -> usize {
        self.constructions.lock().unwrap().values().sum()
    }
}

impl Default for CountingProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl FactoryProvider for CountingProvider {
    fn factory_for(&self, type_name: &str) -> Result<Arc<dyn NodeFactory>> {
        if self.failing.contains(type_name) {
            bail!("no factory for {type_name}");
        }
        *self
            .constructions
            .lock()
            .unwrap()
            .entry(type_name.to_string())
            .or_insert(0) += 1;
        Ok(Arc::new(PassthroughFactory {
            node_type: type_name.to_string(),
        }))
    }
}

struct PassthroughFactory {
    node_type: String,
}

impl NodeFactory for PassthroughFactory {
    fn create(&self, mut record: Record) -> Result<NodeInput> {
        let Some(Value::String(id)) = record.remove(ID_FIELD) else {
            bail!("record has no string id");
        };
        Ok(NodeInput {
            id,
            fields: record,
            internal: NodeInternal {
                node_type: self.node_type.clone(),
                content_digest: String::new(),
            },
        })
    }
}

// ---------------------------------------------------------------------------
// FailingCache
// ---------------------------------------------------------------------------

/// Wraps a MemoryCache. `.failing_reads()` / `.failing_writes()` make the
/// corresponding operation return `Err`.
#[derive(Default)]
pub struct FailingCache {
    inner: MemoryCache,
    fail_reads: bool,
    fail_writes: bool,
}

impl FailingCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_reads(mut self) -> Self {
        self.fail_reads = true;
        self
    }

    pub fn failing_writes(mut self) -> Self {
        self.fail_writes = true;
        self
    }

    pub async fn stored(&self, key: &str) -> Option<Value> {
        self.inner.get(key).await.ok().flatten()
    }
}

#[async_trait]
impl NodeCache for FailingCache {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        if self.fail_reads {
            bail!("cache unavailable reading {key}");
        }
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        if self.fail_writes {
            bail!("cache unavailable writing {key}");
        }
        self.inner.set(key, value).await
    }
}
