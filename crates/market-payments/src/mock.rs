//! In-process gateway for development and tests

use std::collections::HashMap;

use async_trait::async_trait;
use market_core::TransactionRef;
use tokio::sync::RwLock;

use crate::error::{PaymentError, Result};
use crate::gateway::{CheckoutLink, PaymentGateway, PaymentRequest, TransactionStatus, Verification};

#[derive(Default)]
struct MockState {
    default_status: Option<TransactionStatus>,
    statuses: HashMap<TransactionRef, TransactionStatus>,
    fail_initialize: bool,
    fail_verify: bool,
    initialized: Vec<PaymentRequest>,
    verify_calls: usize,
}

/// Gateway that answers from scripted state
///
/// Transactions report `pending` until told otherwise.
#[derive(Default)]
pub struct MockGateway {
    state: RwLock<MockState>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Status reported for every transaction without its own override
    pub async fn set_default_status(&self, status: TransactionStatus) {
        self.state.write().await.default_status = Some(status);
    }

    pub async fn set_status(&self, tx_ref: &TransactionRef, status: TransactionStatus) {
        self.state.write().await.statuses.insert(tx_ref.clone(), status);
    }

    pub async fn fail_initialize(&self, fail: bool) {
        self.state.write().await.fail_initialize = fail;
    }

    pub async fn fail_verify(&self, fail: bool) {
        self.state.write().await.fail_verify = fail;
    }

    /// Every request passed to `initialize_payment`, in order
    pub async fn initialized(&self) -> Vec<PaymentRequest> {
        self.state.read().await.initialized.clone()
    }

    pub async fn verify_calls(&self) -> usize {
        self.state.read().await.verify_calls
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn initialize_payment(&self, request: &PaymentRequest) -> Result<CheckoutLink> {
        let mut state = self.state.write().await;
        if state.fail_initialize {
            return Err(PaymentError::UpstreamStatus {
                status: 503,
                message: "mock gateway unavailable".into(),
            });
        }
        state.initialized.push(request.clone());
        Ok(CheckoutLink {
            checkout_url: format!("https://checkout.mock/pay/{}", request.tx_ref),
        })
    }

    async fn verify_transaction(&self, tx_ref: &TransactionRef) -> Result<Verification> {
        let mut state = self.state.write().await;
        state.verify_calls += 1;
        if state.fail_verify {
            return Err(PaymentError::Gateway("mock verify timed out".into()));
        }
        let status = state
            .statuses
            .get(tx_ref)
            .or(state.default_status.as_ref())
            .cloned()
            .unwrap_or(TransactionStatus::Pending);
        Ok(Verification {
            tx_ref: tx_ref.clone(),
            status,
        })
    }

    fn name(&self) -> &str {
        "mock"
    }
}
