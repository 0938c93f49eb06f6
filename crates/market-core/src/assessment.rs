//! Knowledge Tests
//!
//! Multiple-choice tests attached to a course, graded on the server.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{MarketError, Result};
use crate::ids::{CourseId, QuestionId, TestId, UserId};

/// Minimum score (percent) to pass a test
pub const PASSING_PERCENTAGE: u32 = 80;

/// Answer option label
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Choice {
    A,
    B,
    C,
    D,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerOptions {
    pub a: String,
    pub b: String,
    pub c: String,
    pub d: String,
}

impl AnswerOptions {
    fn is_complete(&self) -> bool {
        [&self.a, &self.b, &self.c, &self.d]
            .iter()
            .all(|o| !o.trim().is_empty())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: QuestionId,
    pub question: String,
    pub options: AnswerOptions,
    pub correct_answer: Choice,
}

/// Question as submitted by the author
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewQuestion {
    pub question: String,
    pub options: AnswerOptions,
    pub correct_answer: Choice,
}

impl NewQuestion {
    pub fn into_question(self) -> Result<Question> {
        if self.question.trim().is_empty() {
            return Err(MarketError::validation("Question text is required"));
        }
        if !self.options.is_complete() {
            return Err(MarketError::validation(
                "Every question needs four non-empty options",
            ));
        }
        Ok(Question {
            id: QuestionId::new(),
            question: self.question.trim().to_string(),
            options: self.options,
            correct_answer: self.correct_answer,
        })
    }
}

/// A course's knowledge test
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgeTest {
    pub id: TestId,
    pub course_id: CourseId,
    pub questions: Vec<Question>,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl KnowledgeTest {
    pub fn new(course_id: CourseId, created_by: UserId, questions: Vec<Question>) -> Self {
        let now = Utc::now();
        Self {
            id: TestId::new(),
            course_id,
            questions,
            created_by,
            created_at: now,
            updated_at: now,
        }
    }

    /// Grade a submission. Unanswered questions count as wrong; answers to
    /// unknown question ids are ignored.
    pub fn grade(&self, answers: &HashMap<QuestionId, Choice>) -> Result<Grade> {
        if self.questions.is_empty() {
            return Err(MarketError::validation("This test has no questions"));
        }

        let correct = self
            .questions
            .iter()
            .filter(|q| answers.get(&q.id) == Some(&q.correct_answer))
            .count();
        let total = self.questions.len();

        let percentage =
            (Decimal::from(correct) * Decimal::ONE_HUNDRED / Decimal::from(total)).round_dp(2);

        Ok(Grade {
            correct,
            total,
            percentage,
            passed: percentage >= Decimal::from(PASSING_PERCENTAGE),
        })
    }

    /// Client view. The answer key is only included for the author.
    pub fn view(&self, include_answers: bool) -> TestView {
        TestView {
            id: self.id,
            course_id: self.course_id,
            created_by: self.created_by,
            questions: self
                .questions
                .iter()
                .map(|q| QuestionView {
                    id: q.id,
                    question: q.question.clone(),
                    options: q.options.clone(),
                    correct_answer: include_answers.then_some(q.correct_answer),
                })
                .collect(),
            created_at: self.created_at,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestView {
    pub id: TestId,
    pub course_id: CourseId,
    pub created_by: UserId,
    pub questions: Vec<QuestionView>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionView {
    pub id: QuestionId,
    pub question: String,
    pub options: AnswerOptions,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correct_answer: Option<Choice>,
}

/// Outcome of grading a submission
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Grade {
    pub correct: usize,
    pub total: usize,
    pub percentage: Decimal,
    pub passed: bool,
}
