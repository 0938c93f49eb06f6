//! # market-core
//!
//! Domain model for the course marketplace: courses and lectures, users,
//! purchase records, knowledge tests and lecture progress, plus the storage
//! traits the payment and HTTP layers are written against.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        market-core                            │
//! │  ┌────────────┐  ┌────────────┐  ┌─────────────────────────┐  │
//! │  │  Course /  │  │  Purchase  │  │  Stores (traits)        │  │
//! │  │  Lecture   │  │  lifecycle │──│  CatalogStore           │  │
//! │  │  User      │  │            │  │  PurchaseStore          │  │
//! │  └────────────┘  └────────────┘  │  AssessmentStore        │  │
//! │  ┌────────────┐  ┌────────────┐  │  ProgressStore          │  │
//! │  │ Knowledge  │  │  Progress  │  │  └─ MemoryStore          │  │
//! │  │ tests      │  │            │  └─────────────────────────┘  │
//! │  └────────────┘  └────────────┘                               │
//! └──────────────────────────────────────────────────────────────┘
//! ```

pub mod assessment;
pub mod clock;
pub mod course;
pub mod error;
pub mod ids;
pub mod progress;
pub mod purchase;
pub mod store;
pub mod user;

pub use clock::{Clock, ManualClock, SystemClock};
pub use course::{ContentAccess, Course, CourseDetail, CourseQuery, Lecture};
pub use error::{MarketError, Result};
pub use ids::{CourseId, LectureId, PurchaseId, QuestionId, TestId, UserId};
pub use purchase::{Purchase, PurchaseStatus, TransactionRef, Transition};
pub use store::{AssessmentStore, CatalogStore, MemoryStore, ProgressStore, PurchaseStore};
pub use user::{Role, User};
