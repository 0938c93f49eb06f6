//! Chapa Hosted Checkout
//!
//! REST client for the Chapa gateway: `POST /transaction/initialize` opens a
//! hosted checkout, `GET /transaction/verify/{tx_ref}` reports its status.

use std::time::Duration;

use async_trait::async_trait;
use market_core::TransactionRef;
use serde::{Deserialize, Serialize};

use crate::error::{PaymentError, Result};
use crate::gateway::{
    format_amount, CheckoutLink, PaymentGateway, PaymentRequest, TransactionStatus, Verification,
};

pub const DEFAULT_BASE_URL: &str = "https://api.chapa.co/v1";
const DEFAULT_TIMEOUT_SECS: u64 = 15;

/// Chapa connection settings
#[derive(Clone, Debug)]
pub struct ChapaConfig {
    pub base_url: String,
    pub secret_key: String,
    pub timeout: Duration,
}

impl ChapaConfig {
    pub fn new(secret_key: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            secret_key: secret_key.into(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        let secret_key = std::env::var("CHAPA_SECRET_KEY")
            .map_err(|_| PaymentError::Config("CHAPA_SECRET_KEY not set".into()))?;

        let mut config = Self::new(secret_key);
        if let Ok(url) = std::env::var("CHAPA_URL") {
            config.base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(secs) = std::env::var("CHAPA_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
        {
            config.timeout = Duration::from_secs(secs);
        }
        Ok(config)
    }
}

/// Chapa client wrapper
pub struct ChapaClient {
    http: reqwest::Client,
    config: ChapaConfig,
}

impl ChapaClient {
    pub fn new(config: ChapaConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| PaymentError::Config(format!("HTTP client: {e}")))?;
        Ok(Self { http, config })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(ChapaConfig::from_env()?)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url)
    }

    async fn read_body(response: reqwest::Response) -> Result<String> {
        let status = response.status();
        let body = response.text().await?;
        if status.is_success() {
            Ok(body)
        } else {
            Err(PaymentError::UpstreamStatus {
                status: status.as_u16(),
                message: upstream_message(&body),
            })
        }
    }
}

#[derive(Serialize)]
struct InitializeBody<'a> {
    amount: String,
    currency: &'a str,
    email: &'a str,
    first_name: &'a str,
    last_name: &'a str,
    tx_ref: &'a str,
    callback_url: &'a str,
    return_url: &'a str,
    customization: CustomizationBody<'a>,
}

#[derive(Serialize)]
struct CustomizationBody<'a> {
    title: &'a str,
    description: &'a str,
}

#[derive(Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    message: Option<serde_json::Value>,
    #[serde(default)]
    status: Option<String>,
    data: Option<T>,
}

#[derive(Deserialize)]
struct InitializeData {
    checkout_url: String,
}

#[derive(Deserialize)]
struct VerifyData {
    #[serde(default)]
    status: Option<String>,
}

/// Chapa puts either a string or an object of field errors in `message`
fn render_message(message: Option<&serde_json::Value>) -> String {
    match message {
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => "no message".to_string(),
    }
}

fn upstream_message(body: &str) -> String {
    serde_json::from_str::<Envelope<serde_json::Value>>(body).map_or_else(
        |_| body.chars().take(200).collect(),
        |envelope| render_message(envelope.message.as_ref()),
    )
}

fn parse_initialize_response(body: &str) -> Result<CheckoutLink> {
    let envelope: Envelope<InitializeData> = serde_json::from_str(body)
        .map_err(|e| PaymentError::MalformedResponse(e.to_string()))?;

    match envelope.data {
        Some(data) if !data.checkout_url.is_empty() => Ok(CheckoutLink {
            checkout_url: data.checkout_url,
        }),
        _ => Err(PaymentError::MalformedResponse(format!(
            "no checkout URL returned: {}",
            render_message(envelope.message.as_ref())
        ))),
    }
}

fn parse_verify_response(tx_ref: &TransactionRef, body: &str) -> Result<Verification> {
    let envelope: Envelope<VerifyData> = serde_json::from_str(body)
        .map_err(|e| PaymentError::MalformedResponse(e.to_string()))?;

    // The top-level status reports the API call, never the payment
    let status = match envelope.data.and_then(|d| d.status) {
        Some(status) => TransactionStatus::parse(&status),
        None if envelope.status.as_deref() == Some("success") => {
            return Err(PaymentError::MalformedResponse(
                "verification succeeded without a transaction status".into(),
            ));
        }
        None => TransactionStatus::Failed(
            envelope.status.unwrap_or_else(|| "unknown".to_string()),
        ),
    };

    Ok(Verification {
        tx_ref: tx_ref.clone(),
        status,
    })
}

#[async_trait]
impl PaymentGateway for ChapaClient {
    async fn initialize_payment(&self, request: &PaymentRequest) -> Result<CheckoutLink> {
        let body = InitializeBody {
            amount: format_amount(request.amount)?,
            currency: &request.currency,
            email: &request.email,
            first_name: &request.first_name,
            last_name: &request.last_name,
            tx_ref: request.tx_ref.as_str(),
            callback_url: &request.callback_url,
            return_url: &request.return_url,
            customization: CustomizationBody {
                title: &request.customization.title,
                description: &request.customization.description,
            },
        };

        tracing::debug!(
            tx_ref = %request.tx_ref,
            amount = %body.amount,
            "Initializing Chapa checkout"
        );

        let response = self
            .http
            .post(self.url("/transaction/initialize"))
            .bearer_auth(&self.config.secret_key)
            .json(&body)
            .send()
            .await?;

        parse_initialize_response(&Self::read_body(response).await?)
    }

    async fn verify_transaction(&self, tx_ref: &TransactionRef) -> Result<Verification> {
        let response = self
            .http
            .get(self.url(&format!("/transaction/verify/{tx_ref}")))
            .bearer_auth(&self.config.secret_key)
            .send()
            .await?;

        let verification = parse_verify_response(tx_ref, &Self::read_body(response).await?)?;
        tracing::debug!(tx_ref = %tx_ref, status = ?verification.status, "Chapa verification");
        Ok(verification)
    }

    fn name(&self) -> &str {
        "chapa"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_initialize_response() {
        let body = r#"{
            "message": "Hosted Link",
            "status": "success",
            "data": { "checkout_url": "https://checkout.chapa.co/checkout/payment/abc" }
        }"#;
        let link = parse_initialize_response(body).unwrap();
        assert_eq!(
            link.checkout_url,
            "https://checkout.chapa.co/checkout/payment/abc"
        );
    }

    #[test]
    fn test_initialize_without_url_is_malformed() {
        let body = r#"{ "message": "Something went wrong", "status": "failed", "data": null }"#;
        assert!(matches!(
            parse_initialize_response(body),
            Err(PaymentError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_parse_verify_uses_data_status() {
        let tx_ref = TransactionRef::from_string("LMS-TX-1-abc");
        let body = r#"{
            "message": "Payment details",
            "status": "success",
            "data": { "status": "success", "tx_ref": "LMS-TX-1-abc", "amount": 50 }
        }"#;
        let verification = parse_verify_response(&tx_ref, body).unwrap();
        assert_eq!(verification.status, TransactionStatus::Success);
        assert_eq!(verification.tx_ref, tx_ref);
    }

    #[test]
    fn test_parse_verify_failed_call_without_data_is_failed() {
        let tx_ref = TransactionRef::from_string("LMS-TX-1-abc");
        let body = r#"{ "message": "Payment not completed", "status": "failed", "data": null }"#;
        let verification = parse_verify_response(&tx_ref, body).unwrap();
        assert_eq!(
            verification.status,
            TransactionStatus::Failed("failed".into())
        );
    }

    #[test]
    fn test_verify_without_payment_status_is_malformed() {
        let tx_ref = TransactionRef::from_string("LMS-TX-1-abc");
        let body = r#"{ "status": "success", "data": { "tx_ref": "LMS-TX-1-abc" } }"#;
        assert!(matches!(
            parse_verify_response(&tx_ref, body),
            Err(PaymentError::MalformedResponse(_))
        ));

        let body = r#"{ "status": "success", "data": null }"#;
        assert!(matches!(
            parse_verify_response(&tx_ref, body),
            Err(PaymentError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_verify_envelopes_without_data_deserialize() {
        let tx_ref = TransactionRef::from_string("LMS-TX-1-abc");
        let verification =
            parse_verify_response(&tx_ref, r#"{ "message": "Invalid transaction" }"#).unwrap();
        assert_eq!(
            verification.status,
            TransactionStatus::Failed("unknown".into())
        );
        assert!(matches!(
            parse_initialize_response(r#"{ "status": "failed" }"#),
            Err(PaymentError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_upstream_message_handles_field_errors() {
        let body = r#"{ "message": { "email": ["The email must be valid."] }, "status": "failed" }"#;
        assert!(upstream_message(body).contains("email"));
        assert_eq!(upstream_message("<html>oops</html>"), "<html>oops</html>");
    }
}
