//! Background expiry of abandoned checkouts

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::reconcile::PurchaseService;

pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Periodically fails pending purchases past the staleness window
pub struct ExpirySweeper {
    service: Arc<PurchaseService>,
    interval: Duration,
}

impl ExpirySweeper {
    pub const fn new(service: Arc<PurchaseService>, interval: Duration) -> Self {
        Self { service, interval }
    }

    /// One pass; returns how many purchases expired
    pub async fn run_once(&self) -> usize {
        match self.service.expire_stale().await {
            Ok(expired) => expired.len(),
            Err(err) => {
                tracing::warn!(error = %err, "Expiry sweep failed");
                0
            }
        }
    }

    /// Run forever on the current runtime
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            tracing::info!(interval_secs = self.interval.as_secs(), "Expiry sweeper started");
            loop {
                ticker.tick().await;
                let expired = self.run_once().await;
                if expired > 0 {
                    tracing::info!(expired, "Expired abandoned checkouts");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockGateway;
    use crate::reconcile::CheckoutConfig;
    use chrono::Duration as ChronoDuration;
    use market_core::course::NewCourse;
    use market_core::{
        CatalogStore, Course, ManualClock, MemoryStore, PurchaseStatus, PurchaseStore, Role, User,
        UserId,
    };

    #[tokio::test]
    async fn test_run_once_expires_only_stale() {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::default());
        let service = Arc::new(PurchaseService::new(
            Arc::new(MockGateway::new()),
            store.clone(),
            store.clone(),
            clock.clone(),
            CheckoutConfig::default(),
        ));

        let user = User::new("Hana", "hana@example.com", Role::Student);
        store.insert_user(user.clone()).await.unwrap();
        let mut courses = Vec::new();
        for title in ["First", "Second"] {
            let course = Course::create(
                UserId::new(),
                NewCourse {
                    title: title.into(),
                    category: "General".into(),
                    ..Default::default()
                },
            )
            .unwrap();
            store.insert_course(course.clone()).await.unwrap();
            courses.push(course);
        }

        let old = service.start_checkout(user.id, courses[0].id).await.unwrap();
        clock.advance(ChronoDuration::minutes(20));
        let fresh = service.start_checkout(user.id, courses[1].id).await.unwrap();
        clock.advance(ChronoDuration::minutes(15));

        let sweeper = ExpirySweeper::new(service, DEFAULT_SWEEP_INTERVAL);
        assert_eq!(sweeper.run_once().await, 1);
        assert_eq!(sweeper.run_once().await, 0);

        let old = store.get_by_ref(&old.tx_ref).await.unwrap().unwrap();
        let fresh = store.get_by_ref(&fresh.tx_ref).await.unwrap().unwrap();
        assert_eq!(old.status, PurchaseStatus::Failed);
        assert_eq!(fresh.status, PurchaseStatus::Pending);
    }
}
