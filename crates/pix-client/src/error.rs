//! Client Error Types

use thiserror::Error;

use pix_core::CoreError;

/// Result type alias
pub type Result<T> = std::result::Result<T, ClientError>;

/// Client-side errors
#[derive(Error, Debug)]
pub enum ClientError {
    /// Form input rejected before any request
    #[error("Validation error: {0}")]
    Validation(#[from] CoreError),

    /// Request never got an answer
    #[error("Network error: {0}")]
    Network(String),

    /// Server answered with an error body
    #[error("Server error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Server answered with something we could not read
    #[error("Unexpected response: {0}")]
    Decode(String),

    /// Browser storage refused a write
    #[error("Storage error: {0}")]
    Storage(String),
}

impl ClientError {
    /// Polling and email dispatch keep going after these
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) | Self::Decode(_) => true,
            Self::Api { status, .. } => *status >= 500,
            Self::Validation(_) | Self::Storage(_) => false,
        }
    }

    /// Get user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(e) => e.user_message().into(),
            Self::Network(_) => "Could not reach the server. Check your connection.".into(),
            Self::Api { message, .. } => message.clone(),
            Self::Decode(_) => "The server sent an unexpected response.".into(),
            Self::Storage(_) => "Your browser could not save the payment.".into(),
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}
