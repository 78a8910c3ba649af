use thiserror::Error;

/// Main error type for Haystack operations
#[derive(Error, Debug)]
pub enum HaystackError {
    #[error("Document not found: {0}")]
    DocumentNotFound(u32),

    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Corrupt data: {0}")]
    Corrupt(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for Haystack operations
pub type Result<T> = std::result::Result<T, HaystackError>;

impl HaystackError {
    /// Shorthand for a validation failure at the engine boundary
    pub fn invalid(msg: impl Into<String>) -> Self {
        HaystackError::InvalidRequest(msg.into())
    }

    /// Check if this error indicates a transient failure that could be retried
    pub fn is_retriable(&self) -> bool {
        matches!(self, HaystackError::Io(_))
    }

    /// Validation errors are the caller's fault and are never retried
    pub fn is_validation(&self) -> bool {
        matches!(self, HaystackError::InvalidRequest(_))
    }
}

impl From<prometheus::Error> for HaystackError {
    fn from(err: prometheus::Error) -> Self {
        HaystackError::Internal(format!("metrics: {}", err))
    }
}
