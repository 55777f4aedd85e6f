// Trait boundaries for the collaborators the node pipeline calls out to.
//
// NodeCache: persistent key/value cache shared across runs.
// NodeActions: the node store. Create new nodes, keep existing ones alive.
// RemoteFileFetcher: download a remote asset and register a file node for it.
//
// Production wires in the node store and HttpFileFetcher; tests use the
// in-memory implementations plus MockFileFetcher.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use storefront_common::{FileNodeId, NodeInput};

#[async_trait]
pub trait NodeCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>>;

    async fn set(&self, key: &str, value: Value) -> Result<()>;
}

pub trait NodeActions: Send + Sync {
    fn create_node(&self, node: NodeInput) -> Result<()>;

    /// Mark an existing node as still referenced in the current run.
    fn touch_node(&self, node_id: &str);
}

/// What to fetch, and which node owns the result.
#[derive(Debug, Clone, Copy)]
pub struct RemoteFileRequest<'a> {
    pub url: &'a str,
    pub parent_node_id: &'a str,
}

#[async_trait]
pub trait RemoteFileFetcher: Send + Sync {
    /// Fetch `request.url` and register a file node for it.
    /// `Ok(None)` means the asset could not be retrieved.
    async fn fetch(
        &self,
        request: RemoteFileRequest<'_>,
        actions: &dyn NodeActions,
        cache: &dyn NodeCache,
    ) -> Result<Option<FileNodeId>>;
}
