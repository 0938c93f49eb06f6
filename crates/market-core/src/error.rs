//! Error Types

use thiserror::Error;

/// Result type alias for marketplace operations
pub type Result<T> = std::result::Result<T, MarketError>;

/// Marketplace error taxonomy
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MarketError {
    /// Missing course, user, lecture, test or purchase
    #[error("Not found: {0}")]
    NotFound(String),

    /// Duplicate completed purchase or an unexpired pending purchase
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Any failure talking to the payment processor
    #[error("Payment gateway error: {0}")]
    Gateway(String),

    /// Access-control denial
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Missing or malformed input
    #[error("Validation error: {0}")]
    Validation(String),

    /// Missing or invalid session
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Persistence failure
    #[error("Storage error: {0}")]
    Storage(String),
}

impl MarketError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn conflict(what: impl Into<String>) -> Self {
        Self::Conflict(what.into())
    }

    pub fn forbidden(what: impl Into<String>) -> Self {
        Self::Forbidden(what.into())
    }

    pub fn validation(what: impl Into<String>) -> Self {
        Self::Validation(what.into())
    }

    /// Check if the caller may retry the same request later
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Gateway(_) | Self::Storage(_))
    }

    /// Human-readable message safe to show to end users
    pub fn user_message(&self) -> String {
        match self {
            Self::NotFound(what)
            | Self::Conflict(what)
            | Self::Forbidden(what)
            | Self::Validation(what)
            | Self::Unauthorized(what) => what.clone(),
            Self::Gateway(_) => "Payment processing failed. Please try again.".into(),
            Self::Storage(_) => "An unexpected error occurred.".into(),
        }
    }
}
