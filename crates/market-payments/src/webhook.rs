//! Gateway Webhook Handling
//!
//! The webhook only tells us which transaction to look at. Its status field
//! is logged and never trusted: the purchase is settled by verifying the
//! transaction with the gateway.

use hmac::{Hmac, Mac};
use market_core::TransactionRef;
use serde::Deserialize;
use sha2::Sha256;

use crate::error::{PaymentError, Result};

type HmacSha256 = Hmac<Sha256>;

/// Headers that may carry the hex HMAC-SHA256 of the raw body
pub const SIGNATURE_HEADERS: [&str; 2] = ["x-chapa-signature", "chapa-signature"];

/// Parsed webhook notification
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WebhookNotification {
    pub tx_ref: TransactionRef,

    /// Status the gateway claims; informational only
    pub reported_status: Option<String>,
}

#[derive(Deserialize)]
struct RawNotification {
    #[serde(default)]
    tx_ref: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

/// Verifies signatures and parses webhook bodies
#[derive(Clone, Debug, Default)]
pub struct WebhookVerifier {
    secret: Option<String>,
}

impl WebhookVerifier {
    /// With no secret, signatures are not checked
    pub fn new(secret: Option<String>) -> Self {
        Self {
            secret: secret.filter(|s| !s.is_empty()),
        }
    }

    pub fn from_env() -> Self {
        Self::new(std::env::var("CHAPA_WEBHOOK_SECRET").ok())
    }

    pub const fn requires_signature(&self) -> bool {
        self.secret.is_some()
    }

    /// Check the signature (when a secret is configured) and parse the body
    pub fn parse(&self, body: &[u8], signature: Option<&str>) -> Result<WebhookNotification> {
        if let Some(secret) = &self.secret {
            let signature = signature
                .ok_or_else(|| PaymentError::WebhookSignature("missing signature header".into()))?;
            verify_signature(body, signature, secret)?;
        }
        parse_notification(body)
    }
}

/// Hex HMAC-SHA256 of `body` under `secret`
pub fn sign(body: &[u8], secret: &str) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| PaymentError::Config(e.to_string()))?;
    mac.update(body);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Constant-time comparison of a hex signature against the body's HMAC
pub fn verify_signature(body: &[u8], signature_hex: &str, secret: &str) -> Result<()> {
    let expected = hex::decode(signature_hex.trim())
        .map_err(|_| PaymentError::WebhookSignature("signature is not hex".into()))?;
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| PaymentError::Config(e.to_string()))?;
    mac.update(body);
    mac.verify_slice(&expected)
        .map_err(|_| PaymentError::WebhookSignature("signature mismatch".into()))
}

fn parse_notification(body: &[u8]) -> Result<WebhookNotification> {
    let raw: RawNotification =
        serde_json::from_slice(body).map_err(|e| PaymentError::WebhookParse(e.to_string()))?;

    let tx_ref = raw
        .tx_ref
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .map(TransactionRef::from_string)
        .ok_or_else(|| PaymentError::WebhookParse("missing tx_ref".into()))?;
    if !tx_ref.is_url_safe() {
        return Err(PaymentError::WebhookParse(format!(
            "tx_ref contains unsupported characters: {tx_ref:?}"
        )));
    }

    Ok(WebhookNotification {
        tx_ref,
        reported_status: raw.status,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test";
    const BODY: &[u8] = br#"{"tx_ref":"LMS-TX-1700000000000-abcd1234","status":"success"}"#;

    #[test]
    fn test_valid_signature_accepted() {
        let verifier = WebhookVerifier::new(Some(SECRET.into()));
        let signature = sign(BODY, SECRET).unwrap();
        let notification = verifier.parse(BODY, Some(&signature)).unwrap();
        assert_eq!(
            notification.tx_ref.as_str(),
            "LMS-TX-1700000000000-abcd1234"
        );
        assert_eq!(notification.reported_status.as_deref(), Some("success"));
    }

    #[test]
    fn test_tampered_body_rejected() {
        let verifier = WebhookVerifier::new(Some(SECRET.into()));
        let signature = sign(BODY, SECRET).unwrap();
        let tampered = br#"{"tx_ref":"LMS-TX-other","status":"success"}"#;
        assert!(matches!(
            verifier.parse(tampered, Some(&signature)),
            Err(PaymentError::WebhookSignature(_))
        ));
    }

    #[test]
    fn test_missing_signature_rejected_when_secret_set() {
        let verifier = WebhookVerifier::new(Some(SECRET.into()));
        assert!(matches!(
            verifier.parse(BODY, None),
            Err(PaymentError::WebhookSignature(_))
        ));
        assert!(matches!(
            verifier.parse(BODY, Some("not-hex")),
            Err(PaymentError::WebhookSignature(_))
        ));
    }

    #[test]
    fn test_unsigned_accepted_without_secret() {
        let verifier = WebhookVerifier::new(None);
        assert!(!verifier.requires_signature());
        assert!(verifier.parse(BODY, None).is_ok());
    }

    #[test]
    fn test_missing_tx_ref_is_parse_error() {
        let verifier = WebhookVerifier::new(None);
        assert!(matches!(
            verifier.parse(br#"{"status":"success"}"#, None),
            Err(PaymentError::WebhookParse(_))
        ));
        assert!(matches!(
            verifier.parse(br#"{"tx_ref":"  "}"#, None),
            Err(PaymentError::WebhookParse(_))
        ));
        assert!(matches!(
            verifier.parse(b"not json", None),
            Err(PaymentError::WebhookParse(_))
        ));
    }

    #[test]
    fn test_tx_ref_with_path_characters_is_parse_error() {
        let verifier = WebhookVerifier::new(None);
        for body in [
            br#"{"tx_ref":"LMS-TX-1/../admin"}"#.as_slice(),
            br#"{"tx_ref":"LMS TX 1"}"#.as_slice(),
            br#"{"tx_ref":"LMS-TX-1?x=y"}"#.as_slice(),
        ] {
            assert!(matches!(
                verifier.parse(body, None),
                Err(PaymentError::WebhookParse(_))
            ));
        }
    }
}
