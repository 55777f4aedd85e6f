// NodeBuilder: the public entry point for turning raw records into nodes.
//
// Per record: parse id → factory for the type → parent linkage → base node
// → type processor. Steps run strictly in order; records run independently.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use serde_json::Value;
use tracing::debug;

use storefront_common::{Gid, NodeInput, PipelineOptions, Record, Result, SourceError, ID_FIELD};

use crate::assets::AssetMaterializer;
use crate::factory::{FactoryCache, FactoryProvider};
use crate::parent::attach_parent;
use crate::processors::{ProcessContext, ProcessorRegistry};

pub struct NodeBuilder {
    factories: FactoryCache,
    processors: ProcessorRegistry,
    materializer: AssetMaterializer,
    options: PipelineOptions,
}

impl NodeBuilder {
    pub fn new(
        provider: Arc<dyn FactoryProvider>,
        processors: ProcessorRegistry,
        materializer: AssetMaterializer,
        options: PipelineOptions,
    ) -> Self {
        Self {
            factories: FactoryCache::new(provider),
            processors,
            materializer,
            options,
        }
    }

    pub fn factories(&self) -> &FactoryCache {
        &self.factories
    }

    /// Build one node. Any failure rejects the whole record.
    pub async fn build_node(&self, mut record: Record) -> Result<NodeInput> {
        let (local_id, type_name) = match record.get(ID_FIELD) {
            Some(Value::String(raw)) => {
                let gid = Gid::parse(raw)?;
                (gid.local_id().to_string(), gid.type_name().to_string())
            }
            None | Some(Value::Null) => return Err(SourceError::MissingTypeInformation),
            Some(other) => {
                return Err(SourceError::malformed(other.to_string(), "id is not a string"))
            }
        };

        let factory = self.factories.get(&type_name)?;
        let processor = self.processors.get(&type_name);

        attach_parent(&mut record)?;
        record.insert(ID_FIELD.to_string(), Value::String(local_id));
        let mut node = factory.create(record)?;

        let ctx = ProcessContext {
            materializer: &self.materializer,
            options: &self.options,
        };
        processor.process(&mut node, &ctx).await?;

        debug!(
            node_id = node.id.as_str(),
            node_type = node.internal.node_type.as_str(),
            "Built node"
        );
        Ok(node)
    }

    /// Build many records, up to `options.concurrency` at a time.
    /// Results come back in input order; one failure doesn't affect the rest.
    pub async fn build_nodes<I>(&self, records: I) -> Vec<Result<NodeInput>>
    where
        I: IntoIterator<Item = Record>,
    {
        stream::iter(records)
            .map(|record| self.build_node(record))
            .buffered(self.options.concurrency.max(1))
            .collect()
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryCache, MemoryNodeStore};
    use crate::testing::{record, CountingProvider, MockFileFetcher};
    use serde_json::json;

    fn builder(provider: Arc<CountingProvider>) -> NodeBuilder {
        let materializer = AssetMaterializer::new(
            Arc::new(MemoryCache::new()),
            Arc::new(MemoryNodeStore::new()),
            Arc::new(MockFileFetcher::new()),
        );
        NodeBuilder::new(
            provider,
            ProcessorRegistry::storefront(),
            materializer,
            PipelineOptions::default(),
        )
    }

    #[tokio::test]
    async fn strips_qualified_id() {
        let builder = builder(Arc::new(CountingProvider::new()));
        let node = builder
            .build_node(record(json!({"id": "gid://shop/Collection/4", "title": "Sale"})))
            .await
            .unwrap();

        assert_eq!(node.id, "4");
        assert_eq!(node.get_str("title"), Some("Sale"));
        assert_eq!(node.internal.node_type, "Collection");
    }

    #[tokio::test]
    async fn missing_id_is_rejected() {
        let builder = builder(Arc::new(CountingProvider::new()));
        let err = builder
            .build_node(record(json!({"title": "T"})))
            .await
            .unwrap_err();
        assert!(matches!(err, SourceError::MissingTypeInformation));
        assert!(builder.factories().is_empty());
    }

    #[tokio::test]
    async fn null_id_counts_as_missing() {
        let builder = builder(Arc::new(CountingProvider::new()));
        let err = builder
            .build_node(record(json!({"id": null, "title": "T"})))
            .await
            .unwrap_err();
        assert!(matches!(err, SourceError::MissingTypeInformation));
    }

    #[tokio::test]
    async fn null_parent_builds_without_foreign_key() {
        let builder = builder(Arc::new(CountingProvider::new()));
        let node = builder
            .build_node(record(json!({"id": "gid://shop/Product/1", "__parentId": null})))
            .await
            .unwrap();
        assert_eq!(node.id, "1");
        assert!(node.get("__parentId").is_none());
        assert!(node.fields.is_empty());
    }

    #[tokio::test]
    async fn malformed_id_never_reaches_a_factory() {
        let provider = Arc::new(CountingProvider::new());
        let builder = builder(provider.clone());

        for id in [json!("Product/1"), json!(42)] {
            let err = builder.build_node(record(json!({"id": id}))).await.unwrap_err();
            assert!(matches!(err, SourceError::MalformedId { .. }));
        }
        assert_eq!(provider.total_constructions(), 0);
    }

    #[tokio::test]
    async fn malformed_parent_rejects_record() {
        let builder = builder(Arc::new(CountingProvider::new()));
        let err = builder
            .build_node(record(json!({"id": "gid://shop/Metafield/1", "__parentId": "nope"})))
            .await
            .unwrap_err();
        assert!(matches!(err, SourceError::MalformedId { .. }));
    }

    #[tokio::test]
    async fn factory_failure_propagates() {
        let builder = builder(Arc::new(CountingProvider::new().failing_on("Broken")));
        let err = builder
            .build_node(record(json!({"id": "gid://shop/Broken/1"})))
            .await
            .unwrap_err();
        assert!(matches!(err, SourceError::Other(_)));
    }

    #[tokio::test]
    async fn factory_reused_across_records_of_a_type() {
        let provider = Arc::new(CountingProvider::new());
        let builder = builder(provider.clone());

        let results = builder
            .build_nodes(vec![
                record(json!({"id": "gid://shop/Order/1"})),
                record(json!({"id": "gid://shop/Order/2"})),
                record(json!({"title": "no id"})),
                record(json!({"id": "gid://shop/Customer/3"})),
            ])
            .await;

        assert_eq!(results.len(), 4);
        assert_eq!(results[0].as_ref().unwrap().id, "1");
        assert_eq!(results[1].as_ref().unwrap().id, "2");
        assert!(results[2].is_err());
        assert_eq!(results[3].as_ref().unwrap().id, "3");
        assert_eq!(provider.constructions("Order"), 1);
        assert_eq!(provider.constructions("Customer"), 1);
    }
}
