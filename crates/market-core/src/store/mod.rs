//! Persistence
//!
//! Storage is expressed as traits so the reconciliation logic does not care
//! whether documents live in memory or in a database. Every method is a
//! single atomic step against the backing store.

mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::assessment::{KnowledgeTest, Question};
use crate::course::{Course, Lecture};
use crate::error::Result;
use crate::ids::{CourseId, LectureId, QuestionId, TestId, UserId};
use crate::progress::CourseProgress;
use crate::purchase::{Purchase, PurchaseStatus, TransactionRef, Transition};
use crate::user::User;

/// Courses, lectures, users and the enrollment sets that link them
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn insert_user(&self, user: User) -> Result<()>;

    async fn get_user(&self, id: UserId) -> Result<Option<User>>;

    async fn insert_course(&self, course: Course) -> Result<()>;

    async fn get_course(&self, id: CourseId) -> Result<Option<Course>>;

    /// Persist edits to a course's own fields.
    ///
    /// The lecture list and the enrolled-student set are owned by
    /// [`CatalogStore::add_lecture`], [`CatalogStore::remove_lecture`] and
    /// [`CatalogStore::add_enrollment`]; the stored values are kept.
    async fn save_course(&self, course: &Course) -> Result<Course>;

    /// Delete a course together with its lectures
    async fn delete_course(&self, id: CourseId) -> Result<Option<Course>>;

    async fn list_courses(&self) -> Result<Vec<Course>>;

    async fn courses_by_creator(&self, creator: UserId) -> Result<Vec<Course>>;

    /// Store a lecture and append it to the course's lecture list
    async fn add_lecture(&self, course: CourseId, lecture: Lecture) -> Result<Course>;

    async fn get_lecture(&self, id: LectureId) -> Result<Option<Lecture>>;

    async fn save_lecture(&self, lecture: &Lecture) -> Result<()>;

    /// Delete a lecture and pull it from whichever course lists it
    async fn remove_lecture(&self, id: LectureId) -> Result<Option<Lecture>>;

    /// Lectures of a course in course order
    async fn lectures_of(&self, course: &Course) -> Result<Vec<Lecture>>;

    /// Course whose lecture list contains the lecture
    async fn course_of_lecture(&self, id: LectureId) -> Result<Option<Course>>;

    /// Add the course to the user's enrolled courses and the user to the
    /// course's enrolled students. Set semantics: repeating it is a no-op.
    async fn add_enrollment(&self, user: UserId, course: CourseId) -> Result<()>;
}

/// Purchase records keyed by transaction reference
#[async_trait]
pub trait PurchaseStore: Send + Sync {
    /// Insert a pending purchase for its (user, course) pair.
    ///
    /// Fails with `Conflict` when the pair already has a completed purchase
    /// or a pending one created after `stale_before`. Pending purchases of
    /// the pair created at or before `stale_before` are marked failed in the
    /// same step and returned.
    async fn insert_pending(
        &self,
        purchase: Purchase,
        stale_before: DateTime<Utc>,
    ) -> Result<Vec<Purchase>>;

    async fn get_by_ref(&self, tx_ref: &TransactionRef) -> Result<Option<Purchase>>;

    /// Move a purchase out of `pending`. Compare-and-swap: a purchase that
    /// has already settled is returned untouched as `AlreadySettled`.
    async fn transition(
        &self,
        tx_ref: &TransactionRef,
        to: PurchaseStatus,
        now: DateTime<Utc>,
    ) -> Result<Transition>;

    /// Remove a purchase record (checkout rollback)
    async fn remove(&self, tx_ref: &TransactionRef) -> Result<Option<Purchase>>;

    /// Every attempt for the pair, newest first
    async fn purchases_for(&self, user: UserId, course: CourseId) -> Result<Vec<Purchase>>;

    async fn completed_for_user(&self, user: UserId) -> Result<Vec<Purchase>>;

    async fn count_completed_for_course(&self, course: CourseId) -> Result<usize>;

    /// Fail every pending purchase created at or before `stale_before`
    async fn expire_pending(
        &self,
        stale_before: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Vec<Purchase>>;
}

/// Knowledge tests, one per course
#[async_trait]
pub trait AssessmentStore: Send + Sync {
    /// Append questions to the course's test, creating it on first use.
    /// Returns the test and whether it was created.
    async fn add_questions(
        &self,
        course: CourseId,
        author: UserId,
        questions: Vec<Question>,
    ) -> Result<(KnowledgeTest, bool)>;

    async fn get_test(&self, id: TestId) -> Result<Option<KnowledgeTest>>;

    async fn tests_for_course(&self, course: CourseId) -> Result<Vec<KnowledgeTest>>;

    async fn remove_question(&self, test: TestId, question: QuestionId) -> Result<KnowledgeTest>;

    async fn remove_tests_for_course(&self, course: CourseId) -> Result<usize>;
}

/// Per-student lecture progress
#[async_trait]
pub trait ProgressStore: Send + Sync {
    async fn mark_viewed(
        &self,
        user: UserId,
        course: CourseId,
        lecture: LectureId,
    ) -> Result<CourseProgress>;

    async fn get_progress(&self, user: UserId, course: CourseId) -> Result<Option<CourseProgress>>;
}
