//! # market-payments
//!
//! Course checkout through a hosted payment gateway (Chapa), settlement of
//! purchases and access control for purchased content.
//!
//! ## Flow
//!
//! ```text
//! ┌──────────┐ checkout ┌────────────────┐  pay   ┌─────────────────┐
//! │ Student  │─────────▶│ PurchaseService│───────▶│ Gateway hosted  │
//! │          │          │  (pending rec) │        │ checkout page   │
//! └──────────┘          └────────────────┘        └─────────────────┘
//!      ▲  return_url: verify        ▲   webhook: tx_ref      │
//!      └────────────────────────────┴────────────────────────┘
//!                         reconcile ──▶ verify_transaction
//!                                   ──▶ completed + enrollment | failed
//! ```
//!
//! Both the browser return and the webhook end in the same reconcile step,
//! which only trusts the gateway's verification endpoint.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use market_payments::{ChapaClient, CheckoutConfig, PurchaseService};
//!
//! let gateway = Arc::new(ChapaClient::from_env()?);
//! let service = PurchaseService::new(gateway, store.clone(), store, clock, CheckoutConfig::default());
//!
//! let session = service.start_checkout(user_id, course_id).await?;
//! // Redirect the student to: session.checkout_url
//! ```

mod access;
mod chapa;
mod error;
mod gateway;
mod mock;
mod reconcile;
mod sweeper;
mod webhook;

pub use access::{AccessGuard, PurchaseState};
pub use chapa::{ChapaClient, ChapaConfig};
pub use error::{PaymentError, Result};
pub use gateway::{
    format_amount, CheckoutLink, Customization, PaymentGateway, PaymentRequest, TransactionStatus,
    Verification,
};
pub use mock::MockGateway;
pub use reconcile::{
    CheckoutConfig, CheckoutSession, PurchaseService, ReconcileOutcome,
    Reconciliation,
};
pub use sweeper::{ExpirySweeper, DEFAULT_SWEEP_INTERVAL};
pub use webhook::{sign, verify_signature, WebhookNotification, WebhookVerifier, SIGNATURE_HEADERS};
