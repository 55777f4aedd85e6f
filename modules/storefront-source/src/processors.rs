// Per-type processing applied after a node is built.
//
// Each remote type may register a NodeProcessor; anything unregistered falls
// through to NoopProcessor. Processors mutate the node in place.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::warn;

use storefront_common::{
    foreign_key_field, NodeInput, PipelineOptions, Result, ID_FIELD, IMAGE_SOURCE_FIELD,
    LOCAL_FILE_FIELD,
};

use crate::assets::AssetMaterializer;

/// Shared state handed to every processor.
pub struct ProcessContext<'a> {
    pub materializer: &'a AssetMaterializer,
    pub options: &'a PipelineOptions,
}

#[async_trait]
pub trait NodeProcessor: Send + Sync {
    async fn process(&self, node: &mut NodeInput, ctx: &ProcessContext<'_>) -> Result<()>;
}

pub struct ProcessorRegistry {
    processors: HashMap<String, Arc<dyn NodeProcessor>>,
    fallback: Arc<dyn NodeProcessor>,
}

impl ProcessorRegistry {
    /// Registry with no type-specific processors.
    pub fn empty() -> Self {
        Self {
            processors: HashMap::new(),
            fallback: Arc::new(NoopProcessor),
        }
    }

    /// Registry with the storefront types that need post-processing.
    pub fn storefront() -> Self {
        Self::empty()
            .register("LineItem", LineItemProcessor)
            .register("ProductImage", ProductImageProcessor)
            .register("Product", ProductProcessor)
    }

    /// Add or replace the processor for a type name.
    pub fn register(
        mut self,
        type_name: impl Into<String>,
        processor: impl NodeProcessor + 'static,
    ) -> Self {
        self.processors.insert(type_name.into(), Arc::new(processor));
        self
    }

    pub fn get(&self, type_name: &str) -> Arc<dyn NodeProcessor> {
        self.processors
            .get(type_name)
            .unwrap_or(&self.fallback)
            .clone()
    }

    pub fn is_registered(&self, type_name: &str) -> bool {
        self.processors.contains_key(type_name)
    }
}

impl Default for ProcessorRegistry {
    fn default() -> Self {
        Self::storefront()
    }
}

pub struct NoopProcessor;

#[async_trait]
impl NodeProcessor for NoopProcessor {
    async fn process(&self, _node: &mut NodeInput, _ctx: &ProcessContext<'_>) -> Result<()> {
        Ok(())
    }
}

/// `product: {id}` → `productId: id`.
pub struct LineItemProcessor;

#[async_trait]
impl NodeProcessor for LineItemProcessor {
    async fn process(&self, node: &mut NodeInput, _ctx: &ProcessContext<'_>) -> Result<()> {
        flatten_reference(node, "product");
        Ok(())
    }
}

/// Downloads the image behind `originalSrc` into `localFile`.
pub struct ProductImageProcessor;

#[async_trait]
impl NodeProcessor for ProductImageProcessor {
    async fn process(&self, node: &mut NodeInput, ctx: &ProcessContext<'_>) -> Result<()> {
        if !ctx.options.download_images {
            return Ok(());
        }

        let Some(url) = node.get_str(IMAGE_SOURCE_FIELD).map(str::to_string) else {
            warn!(node_id = node.id.as_str(), "Image node has no source url");
            return Ok(());
        };

        match ctx.materializer.materialize(&url, &node.id).await? {
            Some(file_node_id) => node.set(LOCAL_FILE_FIELD, file_node_id),
            None => {
                node.remove(LOCAL_FILE_FIELD);
            }
        }
        Ok(())
    }
}

/// Downloads the featured image into `featuredImage.localFile`.
pub struct ProductProcessor;

#[async_trait]
impl NodeProcessor for ProductProcessor {
    async fn process(&self, node: &mut NodeInput, ctx: &ProcessContext<'_>) -> Result<()> {
        if !ctx.options.download_images {
            return Ok(());
        }

        let owner_id = node.id.clone();
        let Some(image) = node.object_mut("featuredImage") else {
            return Ok(());
        };
        let Some(url) = image
            .get(IMAGE_SOURCE_FIELD)
            .and_then(Value::as_str)
            .map(str::to_string)
        else {
            warn!(node_id = owner_id.as_str(), "Featured image has no source url");
            return Ok(());
        };

        let file_node_id = ctx.materializer.materialize(&url, &owner_id).await?;

        if let Some(image) = node.object_mut("featuredImage") {
            match file_node_id {
                Some(id) => {
                    image.insert(LOCAL_FILE_FIELD.to_string(), Value::String(id));
                }
                None => {
                    image.remove(LOCAL_FILE_FIELD);
                }
            }
        }
        Ok(())
    }
}

/// Replace a nested `{id}` object with a `<field>Id` foreign key holding that id.
/// Missing objects are left alone and null ones dropped; objects without a
/// string id are kept as-is.
fn flatten_reference(node: &mut NodeInput, field: &str) {
    let Some(reference) = node.get(field) else {
        return;
    };
    if reference.is_null() {
        node.remove(field);
        return;
    }

    let Some(id) = reference.get(ID_FIELD).and_then(Value::as_str).map(str::to_string) else {
        warn!(
            node_id = node.id.as_str(),
            field,
            "Nested reference has no id, leaving it in place"
        );
        return;
    };

    node.remove(field);
    node.set(foreign_key_field(field), id);
}
