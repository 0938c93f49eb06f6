//! Demo data for local development

use chrono::{DateTime, Utc};
use market_core::course::{CourseLevel, NewCourse, NewLecture};
use market_core::{CatalogStore, Course, Lecture, MarketError, Role, User};
use rust_decimal::Decimal;

use crate::auth::SessionKeys;

pub struct DemoSeed {
    pub instructor: User,
    pub student: User,
    pub course: Course,
    pub instructor_token: String,
    pub student_token: String,
}

/// One instructor, one student and a published course with a free preview
pub async fn seed_demo_data(
    catalog: &dyn CatalogStore,
    sessions: &SessionKeys,
    now: DateTime<Utc>,
) -> Result<DemoSeed, MarketError> {
    let instructor = User::new("Demo Instructor", "instructor@example.com", Role::Instructor);
    let student = User::new("Demo Student", "student@example.com", Role::Student);
    catalog.insert_user(instructor.clone()).await?;
    catalog.insert_user(student.clone()).await?;

    let course = Course::create(
        instructor.id,
        NewCourse {
            title: "Rust for Web Developers".into(),
            category: "Programming".into(),
            subtitle: Some("From ownership to async services".into()),
            level: Some(CourseLevel::Beginner),
            price: Some(Decimal::new(5000, 2)),
            ..Default::default()
        },
    )?;
    catalog.insert_course(course.clone()).await?;

    for (title, preview) in [("Welcome", true), ("Ownership in depth", false)] {
        let lecture = Lecture::create(NewLecture {
            title: title.into(),
            video_url: Some(format!(
                "https://media.example.com/{}.mp4",
                title.to_lowercase().replace(' ', "-")
            )),
            public_id: None,
            is_preview_free: preview,
        })?;
        catalog.add_lecture(course.id, lecture).await?;
    }

    let mut course = catalog
        .get_course(course.id)
        .await?
        .ok_or_else(|| MarketError::not_found("Course not found"))?;
    course.set_published(true)?;
    let course = catalog.save_course(&course).await?;

    Ok(DemoSeed {
        instructor_token: sessions.issue(instructor.id, now)?,
        student_token: sessions.issue(student.id, now)?,
        instructor,
        student,
        course,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use market_core::MemoryStore;

    #[tokio::test]
    async fn test_seed_publishes_course() {
        let store = MemoryStore::new();
        let sessions = SessionKeys::new(b"seed-secret");
        let seed = seed_demo_data(&store, &sessions, Utc::now()).await.unwrap();

        assert!(seed.course.is_published);
        assert_eq!(seed.course.lectures.len(), 2);
        assert_eq!(sessions.verify(&seed.student_token).unwrap(), seed.student.id);
    }
}
