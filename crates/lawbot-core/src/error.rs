use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Failures of the indexing and answering pipeline.
///
/// Configuration errors are fatal at startup. Everything else is scoped to a
/// single request and ends up attached to its `QueryResult`.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Corpus file not found: {}", .0.display())]
    CorpusMissing(PathBuf),

    #[error("Could not decode {} with any of: {}", path.display(), tried.join(", "))]
    Decode { path: PathBuf, tried: Vec<&'static str> },

    #[error("No sections extracted from {}", .0.display())]
    EmptyCorpus(PathBuf),

    #[error("Embedding provider failed: {0}")]
    EmbeddingProvider(#[source] ProviderError),

    #[error("Completion provider failed: {0}")]
    CompletionProvider(#[source] ProviderError),

    #[error("Classifier returned an unknown topic label: {output:?}")]
    Classification { output: String },

    #[error("No corpus file is mapped to topic '{0}'")]
    UnmappedTopic(String),

    #[error("Collection not found: {0}")]
    CollectionNotFound(String),

    #[error("{operation} timed out after {}s", after.as_secs())]
    Timeout { operation: &'static str, after: Duration },

    #[error("Vector store operation failed: {0}")]
    Storage(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Errors caused by the input itself. Retrying them can never succeed.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Error::EmptyCorpus(_)
                | Error::Classification { .. }
                | Error::UnmappedTopic(_)
                | Error::Decode { .. }
                | Error::CorpusMissing(_)
        )
    }

    pub fn storage(err: impl std::fmt::Display) -> Self {
        Error::Storage(err.to_string())
    }
}

/// A single failed round trip to an embedding or completion provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Connection failed, reset, or timed out at the transport level
    #[error("Network error: {0}")]
    Network(String),

    /// Non-2xx response
    #[error("API error ({status}): {body}")]
    Api { status: u16, body: String },

    /// Response arrived but did not have the expected shape
    #[error("Parse error: {0}")]
    Parse(String),
}

impl ProviderError {
    pub fn is_transient(&self) -> bool {
        match self {
            ProviderError::Network(_) => true,
            ProviderError::Api { status, .. } => *status == 429 || *status >= 500,
            ProviderError::Parse(_) => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
