//! In-memory store (for development and tests)
//!
//! Each collection sits behind its own lock. Operations touching two
//! collections always lock in the order users → courses → lectures.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::{AssessmentStore, CatalogStore, ProgressStore, PurchaseStore};
use crate::assessment::{KnowledgeTest, Question};
use crate::course::{Course, Lecture};
use crate::error::{MarketError, Result};
use crate::ids::{CourseId, LectureId, QuestionId, TestId, UserId};
use crate::progress::CourseProgress;
use crate::purchase::{Purchase, PurchaseStatus, TransactionRef, Transition};
use crate::user::User;

#[derive(Default)]
pub struct MemoryStore {
    users: RwLock<HashMap<UserId, User>>,
    courses: RwLock<HashMap<CourseId, Course>>,
    lectures: RwLock<HashMap<LectureId, Lecture>>,
    purchases: RwLock<HashMap<TransactionRef, Purchase>>,
    tests: RwLock<HashMap<TestId, KnowledgeTest>>,
    progress: RwLock<HashMap<(UserId, CourseId), CourseProgress>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn insert_user(&self, user: User) -> Result<()> {
        let mut users = self.users.write().await;
        if users.values().any(|u| u.email.eq_ignore_ascii_case(&user.email)) {
            return Err(MarketError::conflict("User already exists with this email"));
        }
        users.insert(user.id, user);
        Ok(())
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn insert_course(&self, course: Course) -> Result<()> {
        self.courses.write().await.insert(course.id, course);
        Ok(())
    }

    async fn get_course(&self, id: CourseId) -> Result<Option<Course>> {
        Ok(self.courses.read().await.get(&id).cloned())
    }

    async fn save_course(&self, course: &Course) -> Result<Course> {
        let mut courses = self.courses.write().await;
        let stored = courses
            .get_mut(&course.id)
            .ok_or_else(|| MarketError::not_found("Course not found"))?;

        let lectures = std::mem::take(&mut stored.lectures);
        let enrolled = std::mem::take(&mut stored.enrolled_students);
        *stored = course.clone();
        stored.lectures = lectures;
        stored.enrolled_students = enrolled;
        Ok(stored.clone())
    }

    async fn delete_course(&self, id: CourseId) -> Result<Option<Course>> {
        let mut courses = self.courses.write().await;
        let mut lectures = self.lectures.write().await;
        let removed = courses.remove(&id);
        if let Some(course) = &removed {
            for lecture in &course.lectures {
                lectures.remove(lecture);
            }
        }
        Ok(removed)
    }

    async fn list_courses(&self) -> Result<Vec<Course>> {
        Ok(self.courses.read().await.values().cloned().collect())
    }

    async fn courses_by_creator(&self, creator: UserId) -> Result<Vec<Course>> {
        let mut found: Vec<Course> = self
            .courses
            .read()
            .await
            .values()
            .filter(|c| c.creator == creator)
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(found)
    }

    async fn add_lecture(&self, course: CourseId, lecture: Lecture) -> Result<Course> {
        let mut courses = self.courses.write().await;
        let mut lectures = self.lectures.write().await;
        let stored = courses
            .get_mut(&course)
            .ok_or_else(|| MarketError::not_found("Course not found"))?;
        if !stored.lectures.contains(&lecture.id) {
            stored.lectures.push(lecture.id);
        }
        stored.updated_at = Utc::now();
        lectures.insert(lecture.id, lecture);
        Ok(stored.clone())
    }

    async fn get_lecture(&self, id: LectureId) -> Result<Option<Lecture>> {
        Ok(self.lectures.read().await.get(&id).cloned())
    }

    async fn save_lecture(&self, lecture: &Lecture) -> Result<()> {
        let mut lectures = self.lectures.write().await;
        let stored = lectures
            .get_mut(&lecture.id)
            .ok_or_else(|| MarketError::not_found("Lecture not found!"))?;
        *stored = lecture.clone();
        Ok(())
    }

    async fn remove_lecture(&self, id: LectureId) -> Result<Option<Lecture>> {
        let mut courses = self.courses.write().await;
        let mut lectures = self.lectures.write().await;
        let removed = lectures.remove(&id);
        if removed.is_some() {
            for course in courses.values_mut() {
                course.lectures.retain(|l| *l != id);
            }
        }
        Ok(removed)
    }

    async fn lectures_of(&self, course: &Course) -> Result<Vec<Lecture>> {
        let lectures = self.lectures.read().await;
        Ok(course
            .lectures
            .iter()
            .filter_map(|id| lectures.get(id).cloned())
            .collect())
    }

    async fn course_of_lecture(&self, id: LectureId) -> Result<Option<Course>> {
        Ok(self
            .courses
            .read()
            .await
            .values()
            .find(|c| c.lectures.contains(&id))
            .cloned())
    }

    async fn add_enrollment(&self, user: UserId, course: CourseId) -> Result<()> {
        let mut users = self.users.write().await;
        let mut courses = self.courses.write().await;

        let stored_user = users
            .get_mut(&user)
            .ok_or_else(|| MarketError::not_found("User not found"))?;
        let stored_course = courses
            .get_mut(&course)
            .ok_or_else(|| MarketError::not_found("Course not found"))?;

        stored_user.enrolled_courses.insert(course);
        stored_course.enrolled_students.insert(user);
        Ok(())
    }
}

#[async_trait]
impl PurchaseStore for MemoryStore {
    async fn insert_pending(
        &self,
        purchase: Purchase,
        stale_before: DateTime<Utc>,
    ) -> Result<Vec<Purchase>> {
        let mut purchases = self.purchases.write().await;

        if purchases.contains_key(&purchase.tx_ref) {
            return Err(MarketError::conflict("Transaction reference already in use"));
        }

        let pair: Vec<&Purchase> = purchases
            .values()
            .filter(|p| p.is_for(purchase.user_id, purchase.course_id))
            .collect();
        if pair.iter().any(|p| p.status == PurchaseStatus::Completed) {
            return Err(MarketError::conflict("Course already purchased"));
        }
        if pair.iter().any(|p| p.is_live_pending(stale_before)) {
            return Err(MarketError::conflict(
                "You have a pending payment for this course",
            ));
        }

        let abandoned: Vec<TransactionRef> = pair
            .iter()
            .filter(|p| p.is_abandoned(stale_before))
            .map(|p| p.tx_ref.clone())
            .collect();
        let mut expired = Vec::with_capacity(abandoned.len());
        for tx_ref in abandoned {
            if let Some(old) = purchases.get_mut(&tx_ref) {
                old.status = PurchaseStatus::Failed;
                old.updated_at = purchase.created_at;
                expired.push(old.clone());
            }
        }

        purchases.insert(purchase.tx_ref.clone(), purchase);
        Ok(expired)
    }

    async fn get_by_ref(&self, tx_ref: &TransactionRef) -> Result<Option<Purchase>> {
        Ok(self.purchases.read().await.get(tx_ref).cloned())
    }

    async fn transition(
        &self,
        tx_ref: &TransactionRef,
        to: PurchaseStatus,
        now: DateTime<Utc>,
    ) -> Result<Transition> {
        if !to.is_terminal() {
            return Err(MarketError::validation(
                "A purchase can only move to completed or failed",
            ));
        }

        let mut purchases = self.purchases.write().await;
        let purchase = purchases
            .get_mut(tx_ref)
            .ok_or_else(|| MarketError::not_found("Purchase record not found"))?;

        if purchase.status.is_terminal() {
            return Ok(Transition::AlreadySettled(purchase.clone()));
        }
        purchase.status = to;
        purchase.updated_at = now;
        Ok(Transition::Applied(purchase.clone()))
    }

    async fn remove(&self, tx_ref: &TransactionRef) -> Result<Option<Purchase>> {
        Ok(self.purchases.write().await.remove(tx_ref))
    }

    async fn purchases_for(&self, user: UserId, course: CourseId) -> Result<Vec<Purchase>> {
        let mut found: Vec<Purchase> = self
            .purchases
            .read()
            .await
            .values()
            .filter(|p| p.is_for(user, course))
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(found)
    }

    async fn completed_for_user(&self, user: UserId) -> Result<Vec<Purchase>> {
        let mut found: Vec<Purchase> = self
            .purchases
            .read()
            .await
            .values()
            .filter(|p| p.user_id == user && p.status == PurchaseStatus::Completed)
            .cloned()
            .collect();
        found.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(found)
    }

    async fn count_completed_for_course(&self, course: CourseId) -> Result<usize> {
        Ok(self
            .purchases
            .read()
            .await
            .values()
            .filter(|p| p.course_id == course && p.status == PurchaseStatus::Completed)
            .count())
    }

    async fn expire_pending(
        &self,
        stale_before: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Vec<Purchase>> {
        let mut purchases = self.purchases.write().await;
        let mut expired = Vec::new();
        for purchase in purchases.values_mut() {
            if purchase.is_abandoned(stale_before) {
                purchase.status = PurchaseStatus::Failed;
                purchase.updated_at = now;
                expired.push(purchase.clone());
            }
        }
        Ok(expired)
    }
}

#[async_trait]
impl AssessmentStore for MemoryStore {
    async fn add_questions(
        &self,
        course: CourseId,
        author: UserId,
        questions: Vec<Question>,
    ) -> Result<(KnowledgeTest, bool)> {
        let mut tests = self.tests.write().await;
        if let Some(existing) = tests.values_mut().find(|t| t.course_id == course) {
            existing.questions.extend(questions);
            existing.updated_at = Utc::now();
            return Ok((existing.clone(), false));
        }

        let test = KnowledgeTest::new(course, author, questions);
        tests.insert(test.id, test.clone());
        Ok((test, true))
    }

    async fn get_test(&self, id: TestId) -> Result<Option<KnowledgeTest>> {
        Ok(self.tests.read().await.get(&id).cloned())
    }

    async fn tests_for_course(&self, course: CourseId) -> Result<Vec<KnowledgeTest>> {
        let mut found: Vec<KnowledgeTest> = self
            .tests
            .read()
            .await
            .values()
            .filter(|t| t.course_id == course)
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(found)
    }

    async fn remove_question(&self, test: TestId, question: QuestionId) -> Result<KnowledgeTest> {
        let mut tests = self.tests.write().await;
        let stored = tests
            .get_mut(&test)
            .ok_or_else(|| MarketError::not_found("Test not found"))?;
        let before = stored.questions.len();
        stored.questions.retain(|q| q.id != question);
        if stored.questions.len() == before {
            return Err(MarketError::not_found("Question not found"));
        }
        stored.updated_at = Utc::now();
        Ok(stored.clone())
    }

    async fn remove_tests_for_course(&self, course: CourseId) -> Result<usize> {
        let mut tests = self.tests.write().await;
        let before = tests.len();
        tests.retain(|_, t| t.course_id != course);
        Ok(before - tests.len())
    }
}

#[async_trait]
impl ProgressStore for MemoryStore {
    async fn mark_viewed(
        &self,
        user: UserId,
        course: CourseId,
        lecture: LectureId,
    ) -> Result<CourseProgress> {
        let mut progress = self.progress.write().await;
        let entry = progress
            .entry((user, course))
            .or_insert_with(|| CourseProgress::new(user, course));
        entry.mark_viewed(lecture);
        Ok(entry.clone())
    }

    async fn get_progress(&self, user: UserId, course: CourseId) -> Result<Option<CourseProgress>> {
        Ok(self.progress.read().await.get(&(user, course)).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::course::{NewCourse, NewLecture};
    use crate::purchase::staleness_window;
    use crate::user::Role;
    use chrono::Duration;
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    async fn seeded() -> (MemoryStore, User, Course) {
        let store = MemoryStore::new();
        let user = User::new("Student One", "one@example.com", Role::Student);
        let course = Course::create(
            UserId::new(),
            NewCourse {
                title: "Rust".into(),
                category: "Systems".into(),
                price: Some(dec!(50.00)),
                ..Default::default()
            },
        )
        .unwrap();
        store.insert_user(user.clone()).await.unwrap();
        store.insert_course(course.clone()).await.unwrap();
        (store, user, course)
    }

    fn pending(user: &User, course: &Course, at: DateTime<Utc>) -> Purchase {
        Purchase::pending(
            user.id,
            course.id,
            TransactionRef::generate(at),
            course.price,
            at,
        )
    }

    #[tokio::test]
    async fn test_enrollment_is_idempotent() {
        let (store, user, course) = seeded().await;
        store.add_enrollment(user.id, course.id).await.unwrap();
        store.add_enrollment(user.id, course.id).await.unwrap();

        let user = store.get_user(user.id).await.unwrap().unwrap();
        let course = store.get_course(course.id).await.unwrap().unwrap();
        assert_eq!(user.enrolled_courses.len(), 1);
        assert_eq!(course.enrolled_students.len(), 1);
    }

    #[tokio::test]
    async fn test_enrollment_requires_both_documents() {
        let (store, user, _) = seeded().await;
        let err = store.add_enrollment(user.id, CourseId::new()).await.unwrap_err();
        assert!(matches!(err, MarketError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_insert_pending_conflicts_with_live_pending() {
        let (store, user, course) = seeded().await;
        let now = Utc::now();
        let stale_before = now - staleness_window();

        store.insert_pending(pending(&user, &course, now), stale_before).await.unwrap();
        let err = store
            .insert_pending(pending(&user, &course, now), stale_before)
            .await
            .unwrap_err();
        assert!(matches!(err, MarketError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_insert_pending_expires_abandoned_attempts() {
        let (store, user, course) = seeded().await;
        let now = Utc::now();
        let old = pending(&user, &course, now - Duration::minutes(45));
        store
            .insert_pending(old.clone(), now - Duration::hours(2))
            .await
            .unwrap();

        let expired = store
            .insert_pending(pending(&user, &course, now), now - staleness_window())
            .await
            .unwrap();
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].tx_ref, old.tx_ref);
        assert_eq!(
            store.get_by_ref(&old.tx_ref).await.unwrap().unwrap().status,
            PurchaseStatus::Failed
        );
    }

    #[tokio::test]
    async fn test_insert_pending_rejects_after_completion() {
        let (store, user, course) = seeded().await;
        let now = Utc::now();
        let first = pending(&user, &course, now);
        store.insert_pending(first.clone(), now - staleness_window()).await.unwrap();
        store
            .transition(&first.tx_ref, PurchaseStatus::Completed, now)
            .await
            .unwrap();

        let later = now + Duration::hours(3);
        let err = store
            .insert_pending(pending(&user, &course, later), later - staleness_window())
            .await
            .unwrap_err();
        assert_eq!(err, MarketError::conflict("Course already purchased"));
    }

    #[tokio::test]
    async fn test_concurrent_inserts_admit_one() {
        let (store, user, course) = seeded().await;
        let store = Arc::new(store);
        let now = Utc::now();
        let stale_before = now - staleness_window();

        let a = {
            let store = store.clone();
            let p = pending(&user, &course, now);
            tokio::spawn(async move { store.insert_pending(p, stale_before).await })
        };
        let b = {
            let store = store.clone();
            let p = pending(&user, &course, now);
            tokio::spawn(async move { store.insert_pending(p, stale_before).await })
        };
        let results = [a.await.unwrap(), b.await.unwrap()];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert_eq!(store.purchases_for(user.id, course.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_transition_is_compare_and_swap() {
        let (store, user, course) = seeded().await;
        let now = Utc::now();
        let p = pending(&user, &course, now);
        store.insert_pending(p.clone(), now - staleness_window()).await.unwrap();

        let first = store
            .transition(&p.tx_ref, PurchaseStatus::Completed, now)
            .await
            .unwrap();
        assert!(matches!(first, Transition::Applied(_)));

        let second = store
            .transition(&p.tx_ref, PurchaseStatus::Failed, now)
            .await
            .unwrap();
        match second {
            Transition::AlreadySettled(p) => assert_eq!(p.status, PurchaseStatus::Completed),
            other => panic!("expected already settled, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_save_course_keeps_enrollment_and_lectures() {
        let (store, user, course) = seeded().await;
        let lecture = Lecture::create(NewLecture {
            title: "Intro".into(),
            ..Default::default()
        })
        .unwrap();
        store.add_lecture(course.id, lecture.clone()).await.unwrap();
        store.add_enrollment(user.id, course.id).await.unwrap();

        // stale copy taken before the lecture and enrollment were added
        let mut edited = course.clone();
        edited.price = dec!(75.00);
        let saved = store.save_course(&edited).await.unwrap();

        assert_eq!(saved.price, dec!(75.00));
        assert_eq!(saved.lectures, vec![lecture.id]);
        assert!(saved.enrolled_students.contains(&user.id));
    }

    #[tokio::test]
    async fn test_remove_lecture_pulls_from_course() {
        let (store, _, course) = seeded().await;
        let lecture = Lecture::create(NewLecture {
            title: "Intro".into(),
            ..Default::default()
        })
        .unwrap();
        store.add_lecture(course.id, lecture.clone()).await.unwrap();
        assert!(store.remove_lecture(lecture.id).await.unwrap().is_some());

        let course = store.get_course(course.id).await.unwrap().unwrap();
        assert!(course.lectures.is_empty());
        assert!(store.course_of_lecture(lecture.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_questions_append_to_existing_test() {
        let store = MemoryStore::new();
        let course = CourseId::new();
        let author = UserId::new();
        let (first, created) = store.add_questions(course, author, vec![]).await.unwrap();
        assert!(created);
        let (second, created) = store.add_questions(course, author, vec![]).await.unwrap();
        assert!(!created);
        assert_eq!(first.id, second.id);
    }
}
