pub mod config;
pub mod error;
pub mod gid;
pub mod types;

pub use config::PipelineOptions;
pub use error::{Result, SourceError};
pub use gid::{foreign_key_field, Gid};
pub use types::*;
