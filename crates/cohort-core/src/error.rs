use thiserror::Error;

/// Core error type for cohort operations.
#[derive(Error, Debug)]
pub enum CohortError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Cluster error: {0}")]
    Cluster(String),

    #[error("Service not found: {0}")]
    ServiceNotFound(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CohortError {
    /// Whether this error is a failed service lookup rather than a provider fault.
    pub fn is_service_not_found(&self) -> bool {
        matches!(self, Self::ServiceNotFound(_))
    }
}

impl From<serde_json::Error> for CohortError {
    fn from(e: serde_json::Error) -> Self {
        CohortError::Serialization(e.to_string())
    }
}

/// Result type alias using CohortError.
pub type Result<T> = std::result::Result<T, CohortError>;
