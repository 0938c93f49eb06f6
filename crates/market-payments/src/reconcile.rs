//! Purchase Reconciliation
//!
//! Drives a purchase from checkout to a terminal state:
//!
//! 1. `start_checkout` records a pending purchase at the current price and
//!    opens a hosted checkout. A gateway failure removes the record again.
//! 2. `verify_payment` (browser return) and `handle_webhook` (gateway
//!    callback) both end in [`PurchaseService::reconcile`], which asks the
//!    gateway for the transaction status and settles the purchase with a
//!    compare-and-swap, so concurrent callers settle it exactly once.
//! 3. `expire_stale` fails pending purchases older than the staleness window.
//!
//! Enrollment is a projection of a completed purchase. It is applied on every
//! reconcile of a completed purchase, so a redelivered webhook repairs an
//! enrollment write that failed after the status flip.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use market_core::purchase::staleness_window;
use market_core::{
    CatalogStore, Clock, CourseId, MarketError, Purchase, PurchaseStatus, PurchaseStore, Result,
    TransactionRef, Transition, UserId,
};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::gateway::{Customization, PaymentGateway, PaymentRequest, TransactionStatus};
use crate::webhook::WebhookNotification;

const CHECKOUT_TITLE: &str = "Course Purchase";

/// Where the gateway calls back and sends the browser
#[derive(Clone, Debug)]
pub struct CheckoutConfig {
    pub currency: String,

    /// Absolute URL of the webhook endpoint
    pub callback_url: String,

    /// Client origin; the browser returns to `{base}/verify-payment/{tx_ref}`
    pub return_url_base: String,

    /// Pending purchases older than this are abandoned
    pub staleness_window: Duration,
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            currency: "ETB".to_string(),
            callback_url: "http://localhost:3000/api/v1/purchase/webhook".to_string(),
            return_url_base: "http://localhost:5173".to_string(),
            staleness_window: staleness_window(),
        }
    }
}

impl CheckoutConfig {
    pub fn return_url(&self, tx_ref: &TransactionRef) -> String {
        format!(
            "{}/verify-payment/{tx_ref}",
            self.return_url_base.trim_end_matches('/')
        )
    }
}

/// A checkout the buyer can be redirected to
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutSession {
    pub tx_ref: TransactionRef,
    pub checkout_url: String,
    pub course_id: CourseId,
    pub amount: Decimal,
}

/// How a reconcile call left the purchase
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// This call moved it to completed
    Completed,
    /// This call moved it to failed
    Failed,
    AlreadyCompleted,
    AlreadyFailed,
    /// The gateway has no final answer yet
    StillPending,
}

impl ReconcileOutcome {
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Completed | Self::AlreadyCompleted)
    }

    const fn settled(status: PurchaseStatus, applied: bool) -> Self {
        match (status, applied) {
            (PurchaseStatus::Completed, true) => Self::Completed,
            (PurchaseStatus::Completed, false) => Self::AlreadyCompleted,
            (PurchaseStatus::Failed, true) => Self::Failed,
            (PurchaseStatus::Failed, false) => Self::AlreadyFailed,
            (PurchaseStatus::Pending, _) => Self::StillPending,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reconciliation {
    pub purchase: Purchase,
    pub outcome: ReconcileOutcome,
}

/// Checkout and settlement of course purchases
pub struct PurchaseService {
    gateway: Arc<dyn PaymentGateway>,
    purchases: Arc<dyn PurchaseStore>,
    catalog: Arc<dyn CatalogStore>,
    clock: Arc<dyn Clock>,
    config: CheckoutConfig,
}

impl PurchaseService {
    pub fn new(
        gateway: Arc<dyn PaymentGateway>,
        purchases: Arc<dyn PurchaseStore>,
        catalog: Arc<dyn CatalogStore>,
        clock: Arc<dyn Clock>,
        config: CheckoutConfig,
    ) -> Self {
        Self {
            gateway,
            purchases,
            catalog,
            clock,
            config,
        }
    }

    fn stale_before(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - self.config.staleness_window
    }

    /// Record a pending purchase and open a hosted checkout for it
    pub async fn start_checkout(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<CheckoutSession> {
        let course = self
            .catalog
            .get_course(course_id)
            .await?
            .ok_or_else(|| MarketError::not_found("Course not found"))?;
        let user = self
            .catalog
            .get_user(user_id)
            .await?
            .ok_or_else(|| MarketError::not_found("User not found"))?;

        let now = self.clock.now();
        let tx_ref = self.gateway.generate_transaction_ref(now);
        let purchase = Purchase::pending(user.id, course.id, tx_ref.clone(), course.price, now);

        let expired = self
            .purchases
            .insert_pending(purchase.clone(), self.stale_before(now))
            .await?;
        for old in &expired {
            tracing::info!(tx_ref = %old.tx_ref, "Abandoned checkout marked failed");
        }

        tracing::info!(
            tx_ref = %tx_ref,
            user_id = %user.id,
            course_id = %course.id,
            amount = %purchase.amount,
            "Pending purchase recorded"
        );

        let (first_name, last_name) = user.name_parts();
        let request = PaymentRequest {
            amount: purchase.amount,
            currency: self.config.currency.clone(),
            email: user.email.clone(),
            first_name,
            last_name,
            tx_ref: tx_ref.clone(),
            callback_url: self.config.callback_url.clone(),
            return_url: self.config.return_url(&tx_ref),
            customization: Customization::new(
                CHECKOUT_TITLE,
                &format!("Purchase {}", course.title),
            ),
        };

        match self.gateway.initialize_payment(&request).await {
            Ok(link) => Ok(CheckoutSession {
                tx_ref,
                checkout_url: link.checkout_url,
                course_id: course.id,
                amount: purchase.amount,
            }),
            Err(err) => {
                tracing::warn!(
                    tx_ref = %tx_ref,
                    gateway = self.gateway.name(),
                    error = %err,
                    "Checkout initialization failed, rolling back"
                );
                self.rollback(&tx_ref).await;
                Err(err.into())
            }
        }
    }

    async fn rollback(&self, tx_ref: &TransactionRef) {
        match self.purchases.remove(tx_ref).await {
            Ok(_) => tracing::info!(tx_ref = %tx_ref, "Pending purchase rolled back"),
            Err(err) => {
                tracing::error!(
                    tx_ref = %tx_ref,
                    error = %err,
                    "Rollback failed, marking purchase failed"
                );
                if let Err(err) = self
                    .purchases
                    .transition(tx_ref, PurchaseStatus::Failed, self.clock.now())
                    .await
                {
                    tracing::error!(
                        tx_ref = %tx_ref,
                        error = %err,
                        "Could not fail orphaned purchase"
                    );
                }
            }
        }
    }

    /// Settle a purchase from the gateway's view of its transaction
    pub async fn reconcile(&self, tx_ref: &TransactionRef) -> Result<Reconciliation> {
        let purchase = self
            .purchases
            .get_by_ref(tx_ref)
            .await?
            .ok_or_else(|| MarketError::not_found("Purchase record not found"))?;

        match purchase.status {
            PurchaseStatus::Completed => {
                self.project_enrollment(&purchase).await?;
                return Ok(Reconciliation {
                    purchase,
                    outcome: ReconcileOutcome::AlreadyCompleted,
                });
            }
            PurchaseStatus::Failed => {
                return Ok(Reconciliation {
                    purchase,
                    outcome: ReconcileOutcome::AlreadyFailed,
                });
            }
            PurchaseStatus::Pending => {}
        }

        let verification = self.gateway.verify_transaction(tx_ref).await.map_err(|err| {
            tracing::warn!(
                tx_ref = %tx_ref,
                error = %err,
                retryable = err.is_retryable(),
                "Transaction verification failed"
            );
            MarketError::from(err)
        })?;

        let target = match verification.status {
            TransactionStatus::Success => PurchaseStatus::Completed,
            TransactionStatus::Pending => {
                tracing::debug!(tx_ref = %tx_ref, "Transaction still pending at gateway");
                return Ok(Reconciliation {
                    purchase,
                    outcome: ReconcileOutcome::StillPending,
                });
            }
            TransactionStatus::Failed(reason) => {
                tracing::info!(
                    tx_ref = %tx_ref,
                    reason = %reason,
                    "Gateway reports payment failed"
                );
                PurchaseStatus::Failed
            }
        };

        let transition = self
            .purchases
            .transition(tx_ref, target, self.clock.now())
            .await?;
        let applied = matches!(transition, Transition::Applied(_));
        let purchase = transition.into_purchase();

        if purchase.status == PurchaseStatus::Completed {
            self.project_enrollment(&purchase).await?;
            if applied {
                tracing::info!(
                    tx_ref = %tx_ref,
                    user_id = %purchase.user_id,
                    course_id = %purchase.course_id,
                    "Purchase completed"
                );
            }
        } else if target == PurchaseStatus::Completed {
            tracing::error!(
                tx_ref = %tx_ref,
                "Gateway reports success for a purchase that already failed; needs manual review"
            );
        }

        Ok(Reconciliation {
            outcome: ReconcileOutcome::settled(purchase.status, applied),
            purchase,
        })
    }

    async fn project_enrollment(&self, purchase: &Purchase) -> Result<()> {
        self.catalog
            .add_enrollment(purchase.user_id, purchase.course_id)
            .await
            .inspect_err(|err| {
                tracing::error!(
                    tx_ref = %purchase.tx_ref,
                    error = %err,
                    "Enrollment update failed for completed purchase"
                );
            })
    }

    /// Browser return: reconcile a purchase owned by `user_id`
    pub async fn verify_payment(
        &self,
        user_id: UserId,
        tx_ref: &TransactionRef,
    ) -> Result<Reconciliation> {
        if !tx_ref.is_url_safe() {
            return Err(MarketError::validation("Invalid transaction reference"));
        }
        let purchase = self
            .purchases
            .get_by_ref(tx_ref)
            .await?
            .ok_or_else(|| MarketError::not_found("Purchase record not found"))?;
        if purchase.user_id != user_id {
            return Err(MarketError::forbidden("This payment belongs to another account"));
        }
        self.reconcile(tx_ref).await
    }

    /// Gateway callback: reconcile the referenced purchase
    pub async fn handle_webhook(
        &self,
        notification: &WebhookNotification,
    ) -> Result<Reconciliation> {
        tracing::info!(
            tx_ref = %notification.tx_ref,
            reported_status = notification.reported_status.as_deref().unwrap_or("none"),
            "Processing payment webhook"
        );
        self.reconcile(&notification.tx_ref).await
    }

    /// Fail every pending purchase past the staleness window
    pub async fn expire_stale(&self) -> Result<Vec<Purchase>> {
        let now = self.clock.now();
        let expired = self
            .purchases
            .expire_pending(self.stale_before(now), now)
            .await?;
        for purchase in &expired {
            tracing::info!(
                tx_ref = %purchase.tx_ref,
                user_id = %purchase.user_id,
                course_id = %purchase.course_id,
                "Pending purchase expired"
            );
        }
        Ok(expired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockGateway;
    use market_core::course::NewCourse;
    use market_core::{Course, ManualClock, MemoryStore, Role, User};
    use rust_decimal_macros::dec;

    struct Harness {
        service: PurchaseService,
        store: Arc<MemoryStore>,
        gateway: Arc<MockGateway>,
        clock: Arc<ManualClock>,
        user: User,
        course: Course,
    }

    async fn harness() -> Harness {
        let store = Arc::new(MemoryStore::new());
        let gateway = Arc::new(MockGateway::new());
        let clock = Arc::new(ManualClock::default());
        let user = User::new("Abebe Kebede", "abebe@example.com", Role::Student);
        let course = Course::create(
            UserId::new(),
            NewCourse {
                title: "Async Rust".into(),
                category: "Programming".into(),
                price: Some(dec!(50)),
                ..Default::default()
            },
        )
        .unwrap();
        store.insert_user(user.clone()).await.unwrap();
        store.insert_course(course.clone()).await.unwrap();

        let service = PurchaseService::new(
            gateway.clone(),
            store.clone(),
            store.clone(),
            clock.clone(),
            CheckoutConfig::default(),
        );
        Harness {
            service,
            store,
            gateway,
            clock,
            user,
            course,
        }
    }

    #[tokio::test]
    async fn test_checkout_records_pending_and_calls_gateway() {
        let h = harness().await;
        let session = h.service.start_checkout(h.user.id, h.course.id).await.unwrap();

        assert!(session.tx_ref.as_str().starts_with("LMS-TX-"));
        assert!(session.checkout_url.contains(session.tx_ref.as_str()));

        let stored = h.store.get_by_ref(&session.tx_ref).await.unwrap().unwrap();
        assert_eq!(stored.status, PurchaseStatus::Pending);
        assert_eq!(stored.amount, dec!(50));

        let requests = h.gateway.initialized().await;
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].first_name, "Abebe");
        assert_eq!(requests[0].last_name, "Kebede");
        assert_eq!(requests[0].currency, "ETB");
        assert_eq!(
            requests[0].return_url,
            format!("http://localhost:5173/verify-payment/{}", session.tx_ref)
        );
    }

    #[tokio::test]
    async fn test_double_checkout_conflicts() {
        let h = harness().await;
        h.service.start_checkout(h.user.id, h.course.id).await.unwrap();
        let err = h
            .service
            .start_checkout(h.user.id, h.course.id)
            .await
            .unwrap_err();
        assert!(matches!(err, MarketError::Conflict(_)));
        assert_eq!(h.gateway.initialized().await.len(), 1);
    }

    #[tokio::test]
    async fn test_checkout_allowed_after_staleness_window() {
        let h = harness().await;
        let first = h.service.start_checkout(h.user.id, h.course.id).await.unwrap();

        h.clock.advance(Duration::minutes(31));
        let second = h.service.start_checkout(h.user.id, h.course.id).await.unwrap();

        assert_ne!(first.tx_ref, second.tx_ref);
        let old = h.store.get_by_ref(&first.tx_ref).await.unwrap().unwrap();
        assert_eq!(old.status, PurchaseStatus::Failed);
    }

    #[tokio::test]
    async fn test_gateway_failure_rolls_back() {
        let h = harness().await;
        h.gateway.fail_initialize(true).await;

        let err = h
            .service
            .start_checkout(h.user.id, h.course.id)
            .await
            .unwrap_err();
        assert!(matches!(err, MarketError::Gateway(_)));
        assert!(h
            .store
            .purchases_for(h.user.id, h.course.id)
            .await
            .unwrap()
            .is_empty());

        h.gateway.fail_initialize(false).await;
        assert!(h.service.start_checkout(h.user.id, h.course.id).await.is_ok());
    }

    #[tokio::test]
    async fn test_checkout_unknown_course() {
        let h = harness().await;
        let err = h
            .service
            .start_checkout(h.user.id, CourseId::new())
            .await
            .unwrap_err();
        assert!(matches!(err, MarketError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_price_is_snapshotted_at_checkout() {
        let h = harness().await;
        let session = h.service.start_checkout(h.user.id, h.course.id).await.unwrap();

        let mut course = h.store.get_course(h.course.id).await.unwrap().unwrap();
        course.price = dec!(75);
        h.store.save_course(&course).await.unwrap();

        h.gateway
            .set_status(&session.tx_ref, TransactionStatus::Success)
            .await;
        let result = h.service.reconcile(&session.tx_ref).await.unwrap();
        assert_eq!(result.purchase.amount, dec!(50));
        assert_eq!(result.purchase.amount.to_string(), "50");
    }

    #[tokio::test]
    async fn test_successful_reconcile_enrolls_once() {
        let h = harness().await;
        let session = h.service.start_checkout(h.user.id, h.course.id).await.unwrap();
        h.gateway
            .set_status(&session.tx_ref, TransactionStatus::Success)
            .await;

        let first = h.service.reconcile(&session.tx_ref).await.unwrap();
        let second = h.service.reconcile(&session.tx_ref).await.unwrap();
        assert_eq!(first.outcome, ReconcileOutcome::Completed);
        assert_eq!(second.outcome, ReconcileOutcome::AlreadyCompleted);
        assert_eq!(h.gateway.verify_calls().await, 1);

        let course = h.store.get_course(h.course.id).await.unwrap().unwrap();
        let user = h.store.get_user(h.user.id).await.unwrap().unwrap();
        assert_eq!(course.enrolled_students.len(), 1);
        assert!(user.enrolled_courses.contains(&h.course.id));
    }

    #[tokio::test]
    async fn test_failed_reconcile_does_not_enroll() {
        let h = harness().await;
        let session = h.service.start_checkout(h.user.id, h.course.id).await.unwrap();
        h.gateway
            .set_status(&session.tx_ref, TransactionStatus::Failed("failed".into()))
            .await;

        let result = h.service.reconcile(&session.tx_ref).await.unwrap();
        assert_eq!(result.outcome, ReconcileOutcome::Failed);
        assert_eq!(result.purchase.status, PurchaseStatus::Failed);

        let course = h.store.get_course(h.course.id).await.unwrap().unwrap();
        assert!(course.enrolled_students.is_empty());

        let again = h.service.reconcile(&session.tx_ref).await.unwrap();
        assert_eq!(again.outcome, ReconcileOutcome::AlreadyFailed);
        assert_eq!(h.gateway.verify_calls().await, 1);
    }

    #[tokio::test]
    async fn test_pending_at_gateway_leaves_purchase_pending() {
        let h = harness().await;
        let session = h.service.start_checkout(h.user.id, h.course.id).await.unwrap();

        let result = h.service.reconcile(&session.tx_ref).await.unwrap();
        assert_eq!(result.outcome, ReconcileOutcome::StillPending);
        assert_eq!(result.purchase.status, PurchaseStatus::Pending);
    }

    #[tokio::test]
    async fn test_verify_error_leaves_purchase_pending() {
        let h = harness().await;
        let session = h.service.start_checkout(h.user.id, h.course.id).await.unwrap();
        h.gateway.fail_verify(true).await;

        let err = h.service.reconcile(&session.tx_ref).await.unwrap_err();
        assert!(matches!(err, MarketError::Gateway(_)));
        let stored = h.store.get_by_ref(&session.tx_ref).await.unwrap().unwrap();
        assert_eq!(stored.status, PurchaseStatus::Pending);
    }

    #[tokio::test]
    async fn test_reconcile_unknown_reference() {
        let h = harness().await;
        let err = h
            .service
            .reconcile(&TransactionRef::from_string("LMS-TX-0-deadbeef"))
            .await
            .unwrap_err();
        assert!(matches!(err, MarketError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_verify_payment_checks_owner() {
        let h = harness().await;
        let session = h.service.start_checkout(h.user.id, h.course.id).await.unwrap();

        let err = h
            .service
            .verify_payment(UserId::new(), &session.tx_ref)
            .await
            .unwrap_err();
        assert!(matches!(err, MarketError::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_verify_payment_rejects_malformed_reference() {
        let h = harness().await;
        let err = h
            .service
            .verify_payment(h.user.id, &TransactionRef::from_string("LMS-TX-1/../x"))
            .await
            .unwrap_err();
        assert!(matches!(err, MarketError::Validation(_)));
        assert_eq!(h.gateway.verify_calls().await, 0);
    }

    #[tokio::test]
    async fn test_concurrent_reconciles_settle_once() {
        let h = Arc::new(harness().await);
        let session = h.service.start_checkout(h.user.id, h.course.id).await.unwrap();
        h.gateway
            .set_status(&session.tx_ref, TransactionStatus::Success)
            .await;

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let h = h.clone();
                let tx_ref = session.tx_ref.clone();
                tokio::spawn(async move { h.service.reconcile(&tx_ref).await.unwrap().outcome })
            })
            .collect();

        let mut completed = 0;
        for handle in handles {
            let outcome = handle.await.unwrap();
            assert!(outcome.is_success());
            if outcome == ReconcileOutcome::Completed {
                completed += 1;
            }
        }
        assert_eq!(completed, 1);
    }

    #[tokio::test]
    async fn test_expire_stale_fails_old_pending() {
        let h = harness().await;
        let session = h.service.start_checkout(h.user.id, h.course.id).await.unwrap();

        h.clock.advance(Duration::minutes(29));
        assert!(h.service.expire_stale().await.unwrap().is_empty());

        h.clock.advance(Duration::minutes(1));
        let expired = h.service.expire_stale().await.unwrap();
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].tx_ref, session.tx_ref);
        assert_eq!(expired[0].status, PurchaseStatus::Failed);
    }
}
