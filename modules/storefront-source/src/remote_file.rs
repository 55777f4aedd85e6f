// HTTP-backed RemoteFileFetcher: download into a media directory and register
// a `File` node owned by the requesting node.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::{info, warn};

use storefront_common::{bytes_digest, FileNodeId, NodeInput, NodeInternal};

use crate::traits::{NodeActions, NodeCache, RemoteFileFetcher, RemoteFileRequest};

pub const FILE_NODE_TYPE: &str = "File";

pub struct HttpFileFetcher {
    http: reqwest::Client,
    media_dir: PathBuf,
}

impl HttpFileFetcher {
    pub fn new(media_dir: impl Into<PathBuf>) -> Self {
        Self {
            http: reqwest::Client::new(),
            media_dir: media_dir.into(),
        }
    }

    /// Where the bytes for `url` land: `<media_dir>/<sha256(url)>[.ext]`.
    pub fn target_path(&self, url: &str) -> PathBuf {
        let mut name = bytes_digest(url.as_bytes());
        if let Some(ext) = url_extension(url) {
            name.push('.');
            name.push_str(&ext);
        }
        self.media_dir.join(name)
    }
}

#[async_trait]
impl RemoteFileFetcher for HttpFileFetcher {
    async fn fetch(
        &self,
        request: RemoteFileRequest<'_>,
        actions: &dyn NodeActions,
        _cache: &dyn NodeCache,
    ) -> Result<Option<FileNodeId>> {
        let resp = self.http.get(request.url).send().await?;

        if !resp.status().is_success() {
            warn!(
                url = request.url,
                status = resp.status().as_u16(),
                "Remote file request failed"
            );
            return Ok(None);
        }

        let bytes = resp.bytes().await?;
        let path = self.target_path(request.url);
        tokio::fs::create_dir_all(&self.media_dir)
            .await
            .with_context(|| format!("creating {}", self.media_dir.display()))?;
        tokio::fs::write(&path, &bytes)
            .await
            .with_context(|| format!("writing {}", path.display()))?;

        let node = file_node(request, &path, bytes_digest(&bytes));
        let id = node.id.clone();
        actions.create_node(node)?;

        info!(
            url = request.url,
            path = %path.display(),
            size = bytes.len(),
            "Downloaded remote file"
        );
        Ok(Some(id))
    }
}

fn file_node(request: RemoteFileRequest<'_>, path: &Path, content_digest: String) -> NodeInput {
    let mut fields = Map::new();
    fields.insert("url".into(), Value::String(request.url.to_string()));
    fields.insert(
        "absolutePath".into(),
        Value::String(path.display().to_string()),
    );
    fields.insert(
        "parent".into(),
        Value::String(request.parent_node_id.to_string()),
    );

    NodeInput {
        id: format!("file-{}", bytes_digest(request.url.as_bytes())),
        fields,
        internal: NodeInternal {
            node_type: FILE_NODE_TYPE.to_string(),
            content_digest,
        },
    }
}

/// Lower-cased extension of the url's last path segment, if it has one.
fn url_extension(raw: &str) -> Option<String> {
    let parsed = url::Url::parse(raw).ok()?;
    let segment = parsed.path_segments()?.last()?;
    let (stem, ext) = segment.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}
