pub mod assets;
pub mod builder;
pub mod factory;
pub mod memory;
pub mod parent;
pub mod processors;
pub mod remote_file;
pub mod traits;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use assets::AssetMaterializer;
pub use builder::NodeBuilder;
pub use factory::{FactoryCache, FactoryProvider, NodeFactory, PrefixedFactories, TypedNodeFactory};
pub use memory::{MemoryCache, MemoryNodeStore};
pub use parent::attach_parent;
pub use processors::{NodeProcessor, ProcessContext, ProcessorRegistry};
pub use remote_file::HttpFileFetcher;
pub use traits::{NodeActions, NodeCache, RemoteFileFetcher, RemoteFileRequest};
