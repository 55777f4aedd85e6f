use thiserror::Error;

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, SourceError>;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Cannot create a node without type information")]
    MissingTypeInformation,

    #[error("Malformed identifier {value:?}: {reason}")]
    MalformedId { value: String, reason: &'static str },

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SourceError {
    pub fn malformed(value: impl Into<String>, reason: &'static str) -> Self {
        Self::MalformedId {
            value: value.into(),
            reason,
        }
    }
}
