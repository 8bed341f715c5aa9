use thiserror::Error;

/// Main error type for indexing, dictionary and query operations
#[derive(Error, Debug)]
pub enum IndexError {
    #[error("Index data format error: {0}")]
    DataFormat(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("Index is closed")]
    Closed,

    #[error("Term dictionary has been disposed")]
    Disposed,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Contract violation: {0}")]
    ContractViolation(String),

    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for index operations
pub type Result<T> = std::result::Result<T, IndexError>;

impl IndexError {
    pub fn data_format(msg: impl Into<String>) -> Self {
        IndexError::DataFormat(msg.into())
    }

    /// The persisted structures cannot be trusted; callers discard and rebuild the index.
    pub fn requires_rebuild(&self) -> bool {
        matches!(self, IndexError::DataFormat(_))
    }

    /// Check if this error is caused by using a handle after teardown
    pub fn is_terminal(&self) -> bool {
        matches!(self, IndexError::Closed | IndexError::Disposed)
    }
}
