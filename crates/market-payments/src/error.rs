//! Payment Error Types

use market_core::MarketError;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, PaymentError>;

/// Payment-related errors
#[derive(Error, Debug)]
pub enum PaymentError {
    /// Network failure or timeout talking to the gateway
    #[error("Gateway request failed: {0}")]
    Gateway(String),

    /// Request rejected locally before it was sent
    #[error("Invalid payment request: {0}")]
    InvalidRequest(String),

    /// Gateway answered with a non-success HTTP status
    #[error("Gateway returned {status}: {message}")]
    UpstreamStatus { status: u16, message: String },

    /// Gateway answered 2xx but the body was not what we expect
    #[error("Malformed gateway response: {0}")]
    MalformedResponse(String),

    /// Webhook signature verification failed
    #[error("Webhook signature invalid: {0}")]
    WebhookSignature(String),

    /// Webhook payload parsing failed
    #[error("Webhook parse error: {0}")]
    WebhookParse(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl PaymentError {
    /// Check if this error is retryable
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Gateway(_) | Self::MalformedResponse(_) => true,
            Self::UpstreamStatus { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for PaymentError {
    fn from(err: reqwest::Error) -> Self {
        Self::Gateway(err.to_string())
    }
}

impl From<PaymentError> for MarketError {
    fn from(err: PaymentError) -> Self {
        match err {
            PaymentError::WebhookSignature(_) | PaymentError::WebhookParse(_) => {
                Self::Validation(err.to_string())
            }
            _ => Self::Gateway(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_failures_map_to_gateway_error() {
        let err: MarketError = PaymentError::UpstreamStatus {
            status: 502,
            message: "bad gateway".into(),
        }
        .into();
        assert!(matches!(err, MarketError::Gateway(_)));
    }

    #[test]
    fn test_webhook_problems_map_to_validation() {
        let err: MarketError = PaymentError::WebhookParse("missing tx_ref".into()).into();
        assert!(matches!(err, MarketError::Validation(_)));
    }

    #[test]
    fn test_retryable() {
        assert!(PaymentError::Gateway("timeout".into()).is_retryable());
        assert!(!PaymentError::UpstreamStatus {
            status: 400,
            message: "invalid currency".into()
        }
        .is_retryable());
    }
}
