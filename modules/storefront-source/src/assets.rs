// Asset materialization: remote URL → local file node id, downloading at
// most once per URL for as long as the cache keeps the entry.
//
// Concurrent requests for the same URL may both miss and both download.
// There is no per-key lock; the last write wins and either id is usable.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use storefront_common::{FileNodeId, Result, SourceError};

use crate::traits::{NodeActions, NodeCache, RemoteFileFetcher, RemoteFileRequest};

const MEDIA_CACHE_PREFIX: &str = "storefront__media__";

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CachedMedia {
    file_node_id: FileNodeId,
}

/// Cache key for a media URL. Namespaced so it can share a cache with others.
pub fn media_cache_key(url: &str) -> String {
    format!("{MEDIA_CACHE_PREFIX}{url}")
}

#[derive(Clone)]
pub struct AssetMaterializer {
    cache: Arc<dyn NodeCache>,
    actions: Arc<dyn NodeActions>,
    fetcher: Arc<dyn RemoteFileFetcher>,
}

impl AssetMaterializer {
    pub fn new(
        cache: Arc<dyn NodeCache>,
        actions: Arc<dyn NodeActions>,
        fetcher: Arc<dyn RemoteFileFetcher>,
    ) -> Self {
        Self {
            cache,
            actions,
            fetcher,
        }
    }

    /// Resolve `url` to a file node id owned by `owner_id`.
    ///
    /// A cache hit touches the previously created file node and returns its id
    /// without any network traffic. A miss downloads through the fetcher.
    /// Download failures are not errors: they yield `Ok(None)`.
    pub async fn materialize(&self, url: &str, owner_id: &str) -> Result<Option<FileNodeId>> {
        let key = media_cache_key(url);

        if let Some(file_node_id) = self.cached(&key).await? {
            debug!(url, file_node_id = file_node_id.as_str(), "Media cache hit");
            self.actions.touch_node(&file_node_id);
            return Ok(Some(file_node_id));
        }

        let request = RemoteFileRequest {
            url,
            parent_node_id: owner_id,
        };
        let file_node_id = match self
            .fetcher
            .fetch(request, self.actions.as_ref(), self.cache.as_ref())
            .await
        {
            Ok(Some(id)) => id,
            Ok(None) => {
                warn!(url, owner_id, "Remote file could not be retrieved");
                return Ok(None);
            }
            Err(e) => {
                warn!(url, owner_id, error = %e, "Remote file download failed");
                return Ok(None);
            }
        };

        info!(url, file_node_id = file_node_id.as_str(), "Materialized remote file");

        let entry = serde_json::to_value(CachedMedia {
            file_node_id: file_node_id.clone(),
        })?;
        // A lost cache write only costs a re-download next run.
        if let Err(e) = self.cache.set(&key, entry).await {
            warn!(url, error = %e, "Failed to cache media entry");
        }

        Ok(Some(file_node_id))
    }

    async fn cached(&self, key: &str) -> Result<Option<FileNodeId>> {
        let Some(value) = self
            .cache
            .get(key)
            .await
            .map_err(|e| SourceError::Cache(e.to_string()))?
        else {
            return Ok(None);
        };

        match serde_json::from_value::<CachedMedia>(value) {
            Ok(entry) => Ok(Some(entry.file_node_id)),
            Err(e) => {
                warn!(key, error = %e, "Ignoring unreadable media cache entry");
                Ok(None)
            }
        }
    }
}
