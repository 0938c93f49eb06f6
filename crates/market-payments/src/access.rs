//! Course access control
//!
//! Access comes from a completed purchase record, never from the
//! enrollment sets, which are a projection and may lag behind.

use std::sync::Arc;

use market_core::purchase::staleness_window;
use market_core::{
    Clock, ContentAccess, Course, CourseId, MarketError, Purchase, PurchaseStatus, PurchaseStore,
    Result, UserId,
};
use serde::Serialize;

const ACCESS_DENIED: &str = "Access denied. You have not purchased this course.";

/// A user's standing with respect to one course
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseState {
    pub is_purchased: bool,
    pub has_pending_purchase: bool,
}

#[derive(Clone)]
pub struct AccessGuard {
    purchases: Arc<dyn PurchaseStore>,
    clock: Arc<dyn Clock>,
}

impl AccessGuard {
    pub fn new(purchases: Arc<dyn PurchaseStore>, clock: Arc<dyn Clock>) -> Self {
        Self { purchases, clock }
    }

    /// The user's completed purchase of the course, if any
    pub async fn completed_purchase(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<Option<Purchase>> {
        Ok(self
            .purchases
            .purchases_for(user_id, course_id)
            .await?
            .into_iter()
            .find(|p| p.status == PurchaseStatus::Completed))
    }

    /// Admit only users holding a completed purchase of the course
    pub async fn authorize(&self, user_id: UserId, course_id: CourseId) -> Result<Purchase> {
        self.completed_purchase(user_id, course_id)
            .await?
            .ok_or_else(|| MarketError::forbidden(ACCESS_DENIED))
    }

    /// Whether the user owns the course or has a checkout in flight
    pub async fn purchase_state(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<PurchaseState> {
        let stale_before = self.clock.now() - staleness_window();
        let attempts = self.purchases.purchases_for(user_id, course_id).await?;
        Ok(PurchaseState {
            is_purchased: attempts
                .iter()
                .any(|p| p.status == PurchaseStatus::Completed),
            has_pending_purchase: attempts.iter().any(|p| p.is_live_pending(stale_before)),
        })
    }

    /// How much of the course's lecture content the viewer may see
    pub async fn content_access(
        &self,
        viewer: Option<UserId>,
        course: &Course,
    ) -> Result<ContentAccess> {
        let Some(viewer) = viewer else {
            return Ok(ContentAccess::PreviewOnly);
        };
        if course.is_creator(viewer) {
            return Ok(ContentAccess::Full);
        }
        let purchased = self.completed_purchase(viewer, course.id).await?.is_some();
        Ok(ContentAccess::from_entitlement(false, purchased))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use market_core::course::NewCourse;
    use market_core::{ManualClock, MemoryStore, TransactionRef};
    use rust_decimal_macros::dec;

    fn guard(store: &Arc<MemoryStore>) -> (AccessGuard, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        (AccessGuard::new(store.clone(), clock.clone()), clock)
    }

    async fn purchase_with(
        store: &MemoryStore,
        user: UserId,
        course: CourseId,
        status: PurchaseStatus,
    ) {
        let now = Utc::now();
        let purchase =
            Purchase::pending(user, course, TransactionRef::generate(now), dec!(50), now);
        let tx_ref = purchase.tx_ref.clone();
        store
            .insert_pending(purchase, now - staleness_window())
            .await
            .unwrap();
        if status != PurchaseStatus::Pending {
            store.transition(&tx_ref, status, now).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_authorize_requires_completed_purchase() {
        let store = Arc::new(MemoryStore::new());
        let (guard, _) = guard(&store);
        let course = CourseId::new();

        let (none, pending, failed, completed) =
            (UserId::new(), UserId::new(), UserId::new(), UserId::new());
        purchase_with(&store, pending, course, PurchaseStatus::Pending).await;
        purchase_with(&store, failed, course, PurchaseStatus::Failed).await;
        purchase_with(&store, completed, course, PurchaseStatus::Completed).await;

        for denied in [none, pending, failed] {
            let err = guard.authorize(denied, course).await.unwrap_err();
            assert_eq!(err, MarketError::forbidden(ACCESS_DENIED));
        }
        assert!(guard.authorize(completed, course).await.is_ok());
        assert!(guard.authorize(completed, CourseId::new()).await.is_err());
    }

    #[tokio::test]
    async fn test_content_access() {
        let store = Arc::new(MemoryStore::new());
        let (guard, _) = guard(&store);
        let creator = UserId::new();
        let course = Course::create(
            creator,
            NewCourse {
                title: "Ownership".into(),
                category: "Rust".into(),
                ..Default::default()
            },
        )
        .unwrap();
        let buyer = UserId::new();
        purchase_with(&store, buyer, course.id, PurchaseStatus::Completed).await;

        assert_eq!(
            guard.content_access(Some(creator), &course).await.unwrap(),
            ContentAccess::Full
        );
        assert_eq!(
            guard.content_access(Some(buyer), &course).await.unwrap(),
            ContentAccess::Full
        );
        assert_eq!(
            guard.content_access(Some(UserId::new()), &course).await.unwrap(),
            ContentAccess::PreviewOnly
        );
        assert_eq!(
            guard.content_access(None, &course).await.unwrap(),
            ContentAccess::PreviewOnly
        );
    }

    #[tokio::test]
    async fn test_purchase_state() {
        let store = Arc::new(MemoryStore::new());
        let (guard, clock) = guard(&store);
        let (user, course) = (UserId::new(), CourseId::new());

        assert_eq!(
            guard.purchase_state(user, course).await.unwrap(),
            PurchaseState::default()
        );

        purchase_with(&store, user, course, PurchaseStatus::Pending).await;
        let state = guard.purchase_state(user, course).await.unwrap();
        assert!(state.has_pending_purchase);
        assert!(!state.is_purchased);

        clock.advance(Duration::minutes(31));
        assert!(!guard.purchase_state(user, course).await.unwrap().has_pending_purchase);

        purchase_with(&store, UserId::new(), course, PurchaseStatus::Completed).await;
        assert!(!guard.purchase_state(user, course).await.unwrap().is_purchased);
    }
}
