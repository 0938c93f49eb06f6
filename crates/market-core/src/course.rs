//! Courses and Lectures
//!
//! Course documents, lecture documents, catalog search and the public views
//! that withhold paid video references from viewers who are not entitled.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::error::{MarketError, Result};
use crate::ids::{CourseId, LectureId, UserId};
use crate::user::UserSummary;

/// Difficulty advertised on the course card
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CourseLevel {
    #[default]
    Beginner,
    Medium,
    Advance,
}

/// A course document
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: CourseId,
    pub title: String,
    pub subtitle: Option<String>,
    pub description: Option<String>,
    pub category: String,
    pub level: CourseLevel,

    /// Current list price. Purchases snapshot it at checkout time.
    pub price: Decimal,

    pub thumbnail: Option<String>,
    pub creator: UserId,

    /// Ordered lecture references
    pub lectures: Vec<LectureId>,

    /// Students unlocked by completed purchases (additive only)
    pub enrolled_students: BTreeSet<UserId>,

    pub is_published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Course {
    /// Build a course from an authoring request
    pub fn create(creator: UserId, draft: NewCourse) -> Result<Self> {
        let title = draft.title.trim();
        let category = draft.category.trim();
        if title.is_empty() || category.is_empty() {
            return Err(MarketError::validation(
                "Course title and category are required.",
            ));
        }

        let price = draft.price.unwrap_or(Decimal::ZERO);
        validate_price(price)?;

        let now = Utc::now();
        Ok(Self {
            id: CourseId::new(),
            title: title.to_string(),
            subtitle: draft.subtitle,
            description: draft.description,
            category: category.to_string(),
            level: draft.level.unwrap_or_default(),
            price,
            thumbnail: draft.thumbnail,
            creator,
            lectures: Vec::new(),
            enrolled_students: BTreeSet::new(),
            is_published: false,
            created_at: now,
            updated_at: now,
        })
    }

    /// Apply an edit. Absent fields keep their value.
    pub fn apply(&mut self, update: CourseUpdate) -> Result<()> {
        if let Some(price) = update.price {
            validate_price(price)?;
            self.price = price;
        }
        if let Some(title) = update.title {
            if title.trim().is_empty() {
                return Err(MarketError::validation("Course title cannot be empty"));
            }
            self.title = title.trim().to_string();
        }
        if let Some(category) = update.category {
            if category.trim().is_empty() {
                return Err(MarketError::validation("Course category cannot be empty"));
            }
            self.category = category.trim().to_string();
        }
        if update.subtitle.is_some() {
            self.subtitle = update.subtitle;
        }
        if update.description.is_some() {
            self.description = update.description;
        }
        if let Some(level) = update.level {
            self.level = level;
        }
        if update.thumbnail.is_some() {
            self.thumbnail = update.thumbnail;
        }
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Publish or unpublish. A course without lectures cannot be published.
    pub fn set_published(&mut self, publish: bool) -> Result<()> {
        if publish && self.lectures.is_empty() {
            return Err(MarketError::validation(
                "Cannot publish a course without lectures",
            ));
        }
        self.is_published = publish;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn is_creator(&self, user: UserId) -> bool {
        self.creator == user
    }

    pub fn summary(&self) -> CourseSummary {
        CourseSummary {
            id: self.id,
            title: self.title.clone(),
            category: self.category.clone(),
            price: self.price,
            thumbnail: self.thumbnail.clone(),
        }
    }
}

fn validate_price(price: Decimal) -> Result<()> {
    if price < Decimal::ZERO {
        return Err(MarketError::validation("Course price cannot be negative"));
    }
    Ok(())
}

/// Authoring request for a new course
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCourse {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub category: String,
    pub subtitle: Option<String>,
    pub description: Option<String>,
    pub level: Option<CourseLevel>,
    pub price: Option<Decimal>,
    pub thumbnail: Option<String>,
}

/// Partial course edit
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseUpdate {
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub level: Option<CourseLevel>,
    pub price: Option<Decimal>,
    pub thumbnail: Option<String>,
}

/// Compact course card
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseSummary {
    pub id: CourseId,
    pub title: String,
    pub category: String,
    pub price: Decimal,
    pub thumbnail: Option<String>,
}

/// A lecture document
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lecture {
    pub id: LectureId,
    pub title: String,

    /// Locator of the video on the external media host
    pub video_url: Option<String>,
    pub public_id: Option<String>,

    /// Preview lectures are visible without purchase
    pub is_preview_free: bool,
}

impl Lecture {
    pub fn create(draft: NewLecture) -> Result<Self> {
        let title = draft.title.trim();
        if title.is_empty() {
            return Err(MarketError::validation("Lecture title is required"));
        }
        Ok(Self {
            id: LectureId::new(),
            title: title.to_string(),
            video_url: draft.video_url,
            public_id: draft.public_id,
            is_preview_free: draft.is_preview_free,
        })
    }

    pub fn apply(&mut self, update: LectureUpdate) {
        if let Some(title) = update.title.filter(|t| !t.trim().is_empty()) {
            self.title = title.trim().to_string();
        }
        if update.video_url.is_some() {
            self.video_url = update.video_url;
        }
        if update.public_id.is_some() {
            self.public_id = update.public_id;
        }
        if let Some(preview) = update.is_preview_free {
            self.is_preview_free = preview;
        }
    }

    /// Copy of the lecture with the video withheld unless it is a preview
    /// or the viewer is entitled to the full course.
    pub fn redacted_for(&self, access: ContentAccess) -> Self {
        let mut lecture = self.clone();
        if !self.is_preview_free && access == ContentAccess::PreviewOnly {
            lecture.video_url = None;
            lecture.public_id = None;
        }
        lecture
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewLecture {
    #[serde(default)]
    pub title: String,
    pub video_url: Option<String>,
    pub public_id: Option<String>,
    #[serde(default)]
    pub is_preview_free: bool,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LectureUpdate {
    pub title: Option<String>,
    pub video_url: Option<String>,
    pub public_id: Option<String>,
    pub is_preview_free: Option<bool>,
}

/// What a viewer may see of a course's lectures
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContentAccess {
    /// Course creator or a student with a completed purchase
    Full,
    /// Everyone else: only preview lectures keep their video
    PreviewOnly,
}

impl ContentAccess {
    pub const fn from_entitlement(is_creator: bool, has_purchased: bool) -> Self {
        if is_creator || has_purchased {
            Self::Full
        } else {
            Self::PreviewOnly
        }
    }
}

/// Course as returned to clients: creator and lectures populated,
/// enrolled student list omitted.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseDetail {
    pub id: CourseId,
    pub title: String,
    pub subtitle: Option<String>,
    pub description: Option<String>,
    pub category: String,
    pub level: CourseLevel,
    pub price: Decimal,
    pub thumbnail: Option<String>,
    pub creator: Option<UserSummary>,
    pub lectures: Vec<Lecture>,
    pub is_published: bool,
    pub total_enrolled: usize,
    pub created_at: DateTime<Utc>,
}

impl CourseDetail {
    pub fn build(
        course: &Course,
        creator: Option<UserSummary>,
        lectures: &[Lecture],
        total_enrolled: usize,
        access: ContentAccess,
    ) -> Self {
        Self {
            id: course.id,
            title: course.title.clone(),
            subtitle: course.subtitle.clone(),
            description: course.description.clone(),
            category: course.category.clone(),
            level: course.level,
            price: course.price,
            thumbnail: course.thumbnail.clone(),
            creator,
            lectures: lectures.iter().map(|l| l.redacted_for(access)).collect(),
            is_published: course.is_published,
            total_enrolled,
            created_at: course.created_at,
        }
    }
}

/// Price ordering for catalog search
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PriceSort {
    LowToHigh,
    HighToLow,
}

impl PriceSort {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "low" => Some(Self::LowToHigh),
            "high" => Some(Self::HighToLow),
            _ => None,
        }
    }
}

/// Catalog search over published courses
#[derive(Clone, Debug, Default)]
pub struct CourseQuery {
    /// Case-insensitive substring of title, subtitle or category
    pub text: String,
    /// Restrict to these categories (exact match) when non-empty
    pub categories: Vec<String>,
    pub sort: Option<PriceSort>,
}

impl CourseQuery {
    pub fn matches(&self, course: &Course) -> bool {
        if !course.is_published {
            return false;
        }
        if !self.categories.is_empty() && !self.categories.iter().any(|c| c == &course.category)
        {
            return false;
        }

        let needle = self.text.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }
        course.title.to_lowercase().contains(&needle)
            || course
                .subtitle
                .as_deref()
                .is_some_and(|s| s.to_lowercase().contains(&needle))
            || course.category.to_lowercase().contains(&needle)
    }

    /// Filter and order a set of courses
    pub fn apply(&self, courses: Vec<Course>) -> Vec<Course> {
        let mut found: Vec<Course> = courses.into_iter().filter(|c| self.matches(c)).collect();
        match self.sort {
            Some(PriceSort::LowToHigh) => found.sort_by(|a, b| a.price.cmp(&b.price)),
            Some(PriceSort::HighToLow) => found.sort_by(|a, b| b.price.cmp(&a.price)),
            None => found.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
        }
        found
    }
}
