use thiserror::Error;

/// Errors surfaced by the command API boundary
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// The API refused the command outright
    #[error("Command rejected: {0}")]
    Rejected(String),

    /// The request never reached the API or no answer came back
    #[error("Network error: {0}")]
    Network(String),

    /// Credentials were missing or could not be renewed
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// A response body did not have the expected shape
    #[error("Decode error: {0}")]
    Decode(String),
}

impl ApiError {
    /// Message suitable for reporting back to a caller
    pub fn message(&self) -> String {
        match self {
            ApiError::Rejected(msg)
            | ApiError::Network(msg)
            | ApiError::Authentication(msg)
            | ApiError::Decode(msg) => msg.clone(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ApiError>;
