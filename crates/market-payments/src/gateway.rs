//! Payment Gateway Contract
//!
//! Everything the reconciliation service needs from a payment processor.
//! Implement [`PaymentGateway`] once per processor.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use market_core::TransactionRef;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{PaymentError, Result};

/// Longest customization title the gateway accepts
pub const MAX_TITLE_LEN: usize = 16;

/// Longest customization description we send
pub const MAX_DESCRIPTION_LEN: usize = 50;

/// Text shown on the hosted checkout page
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customization {
    pub title: String,
    pub description: String,
}

impl Customization {
    /// Build customization text, reduced to what the gateway accepts:
    /// letters, digits, spaces, `-`, `_` and `.`, truncated to the limits.
    pub fn new(title: &str, description: &str) -> Self {
        Self {
            title: sanitize(title, MAX_TITLE_LEN),
            description: sanitize(description, MAX_DESCRIPTION_LEN),
        }
    }
}

fn sanitize(text: &str, max_len: usize) -> String {
    let kept: String = text
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                ' '
            }
        })
        .collect();
    let collapsed = kept.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.chars().take(max_len).collect::<String>().trim_end().to_string()
}

/// Format an amount with two decimal places, rejecting negatives
pub fn format_amount(amount: Decimal) -> Result<String> {
    if amount < Decimal::ZERO {
        return Err(PaymentError::InvalidRequest(format!(
            "amount must not be negative, got {amount}"
        )));
    }
    Ok(format!("{:.2}", amount.round_dp(2)))
}

/// Request to open a hosted checkout
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PaymentRequest {
    pub amount: Decimal,
    pub currency: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub tx_ref: TransactionRef,

    /// Where the gateway delivers the asynchronous webhook
    pub callback_url: String,

    /// Where the browser lands after paying
    pub return_url: String,

    pub customization: Customization,
}

/// Hosted checkout to redirect the payer to
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CheckoutLink {
    pub checkout_url: String,
}

/// Transaction state as reported by the gateway
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransactionStatus {
    Success,
    /// The payer has not finished yet
    Pending,
    /// Any other terminal status, with the gateway's wording
    Failed(String),
}

impl TransactionStatus {
    pub fn parse(status: &str) -> Self {
        match status.trim().to_ascii_lowercase().as_str() {
            "success" | "successful" => Self::Success,
            "pending" => Self::Pending,
            other => Self::Failed(other.to_string()),
        }
    }
}

/// Result of asking the gateway about a transaction
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Verification {
    pub tx_ref: TransactionRef,
    pub status: TransactionStatus,
}

/// Payment processor (Strategy pattern)
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Open a hosted checkout and return its URL
    async fn initialize_payment(&self, request: &PaymentRequest) -> Result<CheckoutLink>;

    /// Ask the gateway for the transaction's current status
    async fn verify_transaction(&self, tx_ref: &TransactionRef) -> Result<Verification>;

    /// Unique, URL-safe reference for a new checkout
    fn generate_transaction_ref(&self, now: DateTime<Utc>) -> TransactionRef {
        TransactionRef::generate(now)
    }

    /// Gateway name for logs
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_format_amount_two_decimals() {
        assert_eq!(format_amount(dec!(50)).unwrap(), "50.00");
        assert_eq!(format_amount(dec!(19.999)).unwrap(), "20.00");
        assert_eq!(format_amount(dec!(0)).unwrap(), "0.00");
    }

    #[test]
    fn test_negative_amount_rejected() {
        assert!(matches!(
            format_amount(dec!(-1)),
            Err(PaymentError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_customization_is_sanitized() {
        let c = Customization::new(
            "Course Purchase: Rust & Web!",
            "Purchase \"Intro to C++ (2nd ed.)\" • full access",
        );
        assert_eq!(c.title, "Course Purchase");
        assert!(c.title.len() <= MAX_TITLE_LEN);
        assert!(c.description.len() <= MAX_DESCRIPTION_LEN);
        assert!(c
            .description
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || " -_.".contains(ch)));
    }

    #[test]
    fn test_status_parsing() {
        assert_eq!(TransactionStatus::parse("success"), TransactionStatus::Success);
        assert_eq!(TransactionStatus::parse("Pending"), TransactionStatus::Pending);
        assert_eq!(
            TransactionStatus::parse("failed"),
            TransactionStatus::Failed("failed".into())
        );
    }
}
