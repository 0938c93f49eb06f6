//! Purchases
//!
//! One record per checkout attempt. The lifecycle is
//!
//! ```text
//!            ┌────────────▶ completed
//!  pending ──┤
//!            └────────────▶ failed      (gateway failure, timeout, cleanup)
//! ```
//!
//! Both terminal states are final.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::ids::{CourseId, PurchaseId, UserId};

/// How long a pending purchase may block new checkouts for the same pair
pub const STALENESS_WINDOW_MINUTES: i64 = 30;

pub fn staleness_window() -> Duration {
    Duration::minutes(STALENESS_WINDOW_MINUTES)
}

/// Externally visible transaction reference (`LMS-TX-<millis>-<hex>`)
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionRef(String);

impl TransactionRef {
    const PREFIX: &'static str = "LMS-TX-";

    /// Generate a new reference from the current time and a random suffix.
    ///
    /// Only ASCII alphanumerics and `-` are used so the value can be embedded
    /// in a URL path segment as-is.
    pub fn generate(now: DateTime<Utc>) -> Self {
        let random = uuid::Uuid::new_v4().simple().to_string();
        Self(format!(
            "{}{}-{}",
            Self::PREFIX,
            now.timestamp_millis(),
            &random[..8]
        ))
    }

    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this value could have been produced by [`TransactionRef::generate`]
    /// or is at least safe to place in a URL path.
    pub fn is_url_safe(&self) -> bool {
        !self.0.is_empty()
            && self
                .0
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    }
}

impl std::fmt::Display for TransactionRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Purchase lifecycle state
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PurchaseStatus {
    Pending,
    Completed,
    Failed,
}

impl PurchaseStatus {
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for PurchaseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A purchase record
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Purchase {
    pub id: PurchaseId,
    pub user_id: UserId,
    pub course_id: CourseId,

    /// Unique, externally visible reference shared with the gateway
    pub tx_ref: TransactionRef,

    /// Course price at checkout time
    pub amount: Decimal,

    pub status: PurchaseStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Purchase {
    /// New pending purchase
    pub fn pending(
        user_id: UserId,
        course_id: CourseId,
        tx_ref: TransactionRef,
        amount: Decimal,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: PurchaseId::new(),
            user_id,
            course_id,
            tx_ref,
            amount,
            status: PurchaseStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    /// Pending and created at or before `stale_before`
    pub fn is_abandoned(&self, stale_before: DateTime<Utc>) -> bool {
        self.status == PurchaseStatus::Pending && self.created_at <= stale_before
    }

    /// Pending and still inside the staleness window
    pub fn is_live_pending(&self, stale_before: DateTime<Utc>) -> bool {
        self.status == PurchaseStatus::Pending && self.created_at > stale_before
    }

    pub fn is_for(&self, user_id: UserId, course_id: CourseId) -> bool {
        self.user_id == user_id && self.course_id == course_id
    }
}

/// Result of a compare-and-swap on a purchase's status
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Transition {
    /// The purchase was pending and now carries the requested status
    Applied(Purchase),
    /// The purchase had already settled; it is returned unchanged
    AlreadySettled(Purchase),
}

impl Transition {
    pub fn into_purchase(self) -> Purchase {
        match self {
            Self::Applied(p) | Self::AlreadySettled(p) => p,
        }
    }
}
