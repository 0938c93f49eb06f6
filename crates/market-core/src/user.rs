//! Users
//!
//! Only the slice of the account that purchases and course ownership need.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::ids::{CourseId, UserId};

/// Account role
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Student,
    Instructor,
    Admin,
}

impl Role {
    /// Instructors and admins may author courses
    pub const fn can_author(self) -> bool {
        matches!(self, Self::Instructor | Self::Admin)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub photo_url: Option<String>,

    /// Courses unlocked by completed purchases (additive only)
    pub enrolled_courses: BTreeSet<CourseId>,

    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(name: impl Into<String>, email: impl Into<String>, role: Role) -> Self {
        Self {
            id: UserId::new(),
            name: name.into(),
            email: email.into(),
            role,
            photo_url: None,
            enrolled_courses: BTreeSet::new(),
            created_at: Utc::now(),
        }
    }

    /// Split the display name into first and last name for the payment form.
    ///
    /// A single-word name gets the placeholder last name `Student`.
    pub fn name_parts(&self) -> (String, String) {
        let mut words = self.name.split_whitespace();
        let first = words.next().unwrap_or("Customer").to_string();
        let rest: Vec<&str> = words.collect();
        let last = if rest.is_empty() {
            "Student".to_string()
        } else {
            rest.join(" ")
        };
        (first, last)
    }

    pub fn summary(&self) -> UserSummary {
        UserSummary {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
            photo_url: self.photo_url.clone(),
        }
    }
}

/// Public projection used when a user is embedded in another document
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub photo_url: Option<String>,
}
