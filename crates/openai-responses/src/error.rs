//! Error types for the mock.

use thiserror::Error;

/// Result type alias for mock operations.
pub type Result<T> = std::result::Result<T, MockError>;

/// Errors that can occur while building or serving mocked responses.
#[derive(Debug, Error)]
pub enum MockError {
    /// The request body or query could not be interpreted.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A resource of an unknown kind was handed to the store.
    #[error("Unsupported resource: {0}")]
    UnsupportedResource(String),

    /// A response object could not be built from the merged fields.
    #[error("Unable to build {kind}: {message}")]
    Unbuildable { kind: &'static str, message: String },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Token counting failed.
    #[error("Tokenizer error: {0}")]
    Tokenizer(String),

    /// The HTTP host failed to start or serve.
    #[error("Server error: {0}")]
    Server(String),
}

impl MockError {
    /// Whether the error describes a bad request rather than a broken mock.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            MockError::InvalidRequest(_)
                | MockError::Serialization(_)
                | MockError::Unbuildable { .. }
        )
    }
}

impl From<serde_json::Error> for MockError {
    fn from(e: serde_json::Error) -> Self {
        MockError::Serialization(e.to_string())
    }
}

impl From<std::io::Error> for MockError {
    fn from(e: std::io::Error) -> Self {
        MockError::Server(e.to_string())
    }
}

impl From<toml::de::Error> for MockError {
    fn from(e: toml::de::Error) -> Self {
        MockError::Config(e.to_string())
    }
}
