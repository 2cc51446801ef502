use thiserror::Error;

/// Errors produced by the collection engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("vector space '{0}' is declared more than once")]
    DuplicateVectorSpace(String),

    #[error("vector space '{0}' does not exist")]
    UnknownVectorSpace(String),

    #[error("wrong vector dimension for '{space}': expected {expected}, got {actual}")]
    DimensionMismatch {
        space: String,
        expected: u32,
        actual: usize,
    },

    #[error("invalid quantization parameters: {0}")]
    InvalidQuantizationParams(String),

    #[error("invalid hnsw parameters: {0}")]
    InvalidHnswParams(String),

    #[error("invalid vector space declaration: {0}")]
    InvalidSchema(String),

    #[error("invalid vector for '{space}': {reason}")]
    InvalidVector { space: String, reason: String },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("collection '{0}' already exists")]
    CollectionExists(String),

    #[error("collection '{0}' not found")]
    CollectionNotFound(String),

    #[error("index build failed: {0}")]
    BuildFailed(String),

    /// A build result raced with a configuration change and was discarded.
    #[error("configuration of '{0}' changed during the operation")]
    StaleConfigRace(String),

    #[error("vector storage error: {0}")]
    Storage(String),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Storage(err.to_string())
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
