//! Error Types

use thiserror::Error;

/// Result type alias for domain validation
pub type Result<T> = std::result::Result<T, CoreError>;

/// Domain validation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// No email was supplied
    #[error("Email is required")]
    MissingEmail,

    /// Email does not have the `local@domain.tld` shape
    #[error("Invalid email: {0}")]
    InvalidEmail(String),

    /// Confirmation email does not match the first entry
    #[error("Emails do not match")]
    EmailMismatch,
}

impl CoreError {
    /// Convert to a user-friendly message
    pub const fn user_message(&self) -> &'static str {
        match self {
            Self::MissingEmail => "Email is required.",
            Self::InvalidEmail(_) => "Please enter a valid email address.",
            Self::EmailMismatch => "The emails do not match. Please check them.",
        }
    }
}
