//! Course Progress
//!
//! Tracks which lectures of a purchased course a student has viewed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::ids::{CourseId, LectureId, UserId};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseProgress {
    pub user_id: UserId,
    pub course_id: CourseId,
    pub viewed_lectures: BTreeSet<LectureId>,
    pub updated_at: DateTime<Utc>,
}

impl CourseProgress {
    pub fn new(user_id: UserId, course_id: CourseId) -> Self {
        Self {
            user_id,
            course_id,
            viewed_lectures: BTreeSet::new(),
            updated_at: Utc::now(),
        }
    }

    /// Returns false if the lecture was already marked
    pub fn mark_viewed(&mut self, lecture: LectureId) -> bool {
        let added = self.viewed_lectures.insert(lecture);
        if added {
            self.updated_at = Utc::now();
        }
        added
    }

    /// Progress against the course's current lecture list. Lectures removed
    /// from the course since they were viewed no longer count.
    pub fn report(&self, course_lectures: &[LectureId]) -> ProgressReport {
        let viewed: Vec<LectureId> = course_lectures
            .iter()
            .filter(|l| self.viewed_lectures.contains(l))
            .copied()
            .collect();
        let total = course_lectures.len();
        ProgressReport {
            course_id: self.course_id,
            completed: total > 0 && viewed.len() == total,
            viewed_count: viewed.len(),
            total_lectures: total,
            viewed_lectures: viewed,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressReport {
    pub course_id: CourseId,
    pub viewed_lectures: Vec<LectureId>,
    pub viewed_count: usize,
    pub total_lectures: usize,
    pub completed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completion_requires_every_lecture() {
        let lectures = vec![LectureId::new(), LectureId::new()];
        let mut progress = CourseProgress::new(UserId::new(), CourseId::new());

        assert!(progress.mark_viewed(lectures[0]));
        assert!(!progress.mark_viewed(lectures[0]));
        assert!(!progress.report(&lectures).completed);

        progress.mark_viewed(lectures[1]);
        let report = progress.report(&lectures);
        assert!(report.completed);
        assert_eq!(report.viewed_count, 2);
    }

    #[test]
    fn test_removed_lectures_do_not_count() {
        let kept = LectureId::new();
        let mut progress = CourseProgress::new(UserId::new(), CourseId::new());
        progress.mark_viewed(LectureId::new());
        let report = progress.report(&[kept]);
        assert_eq!(report.viewed_count, 0);
        assert!(!report.completed);
    }
}
