//! Application State

use std::sync::Arc;

use market_core::{AssessmentStore, CatalogStore, Clock, ProgressStore, PurchaseStore};
use market_payments::{
    AccessGuard, CheckoutConfig, PaymentGateway, PurchaseService, WebhookVerifier,
};

use crate::auth::SessionKeys;
use crate::error::ApiError;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Courses, lectures, users and enrollment
    pub catalog: Arc<dyn CatalogStore>,

    pub purchases: Arc<dyn PurchaseStore>,
    pub assessments: Arc<dyn AssessmentStore>,
    pub progress: Arc<dyn ProgressStore>,
    pub clock: Arc<dyn Clock>,

    /// Purchase-based access checks for gated content
    pub access: AccessGuard,

    /// Checkout and reconciliation (None if no gateway is configured)
    pub payments: Option<Arc<PurchaseService>>,

    pub webhooks: WebhookVerifier,
    pub sessions: SessionKeys,
}

impl AppState {
    /// Wire every store role to one backing store
    pub fn new<S>(
        store: Arc<S>,
        clock: Arc<dyn Clock>,
        gateway: Option<Arc<dyn PaymentGateway>>,
        checkout: CheckoutConfig,
        webhooks: WebhookVerifier,
        sessions: SessionKeys,
    ) -> Self
    where
        S: CatalogStore + PurchaseStore + AssessmentStore + ProgressStore + 'static,
    {
        let payments = gateway.map(|gateway| {
            Arc::new(PurchaseService::new(
                gateway,
                store.clone(),
                store.clone(),
                clock.clone(),
                checkout,
            ))
        });

        Self {
            catalog: store.clone(),
            purchases: store.clone(),
            assessments: store.clone(),
            progress: store.clone(),
            access: AccessGuard::new(store, clock.clone()),
            clock,
            payments,
            webhooks,
            sessions,
        }
    }

    pub fn payments(&self) -> Result<&PurchaseService, ApiError> {
        self.payments.as_deref().ok_or(ApiError::PaymentsDisabled)
    }
}
