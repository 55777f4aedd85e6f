use std::env;

use serde::Deserialize;
use tracing::info;

use crate::error::{Result, SourceError};

/// Options recognized by the node pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PipelineOptions {
    /// Materialize remote images as local file nodes.
    pub download_images: bool,
    /// Prepended to remote type names to form the internal node type.
    pub type_prefix: String,
    /// Upper bound on records built at once by `build_nodes`.
    pub concurrency: usize,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            download_images: true,
            type_prefix: "Storefront".to_string(),
            concurrency: 8,
        }
    }
}

impl PipelineOptions {
    /// Load options from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let options = Self {
            download_images: optional_env("STOREFRONT_DOWNLOAD_IMAGES")
                .map(|v| parse_bool("STOREFRONT_DOWNLOAD_IMAGES", &v))
                .transpose()?
                .unwrap_or(defaults.download_images),
            type_prefix: optional_env("STOREFRONT_TYPE_PREFIX").unwrap_or(defaults.type_prefix),
            concurrency: optional_env("STOREFRONT_CONCURRENCY")
                .map(|v| {
                    v.parse::<usize>()
                        .ok()
                        .filter(|n| *n > 0)
                        .ok_or_else(|| {
                            SourceError::Config(format!(
                                "STOREFRONT_CONCURRENCY must be a positive number, got {v:?}"
                            ))
                        })
                })
                .transpose()?
                .unwrap_or(defaults.concurrency),
        };

        info!(
            download_images = options.download_images,
            type_prefix = options.type_prefix.as_str(),
            concurrency = options.concurrency,
            "Pipeline options loaded"
        );
        Ok(options)
    }
}

fn optional_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(SourceError::Config(format!(
            "{key} must be a boolean, got {value:?}"
        ))),
    }
}
