//! Knowledge test endpoints

use std::collections::HashMap;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use market_core::assessment::{Choice, Grade, KnowledgeTest, NewQuestion, TestView};
use market_core::{CourseId, MarketError, QuestionId, TestId};
use serde::{Deserialize, Serialize};

use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::handlers::{json_body, load_course};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTestRequest {
    pub course_id: CourseId,
    #[serde(default)]
    pub questions: Vec<NewQuestion>,
}

#[derive(Debug, Deserialize)]
pub struct SubmitTestRequest {
    #[serde(default)]
    pub answers: HashMap<QuestionId, Choice>,
}

#[derive(Debug, Serialize)]
pub struct TestResponse {
    pub success: bool,
    pub test: TestView,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TestListResponse {
    pub success: bool,
    pub tests: Vec<TestView>,
}

#[derive(Debug, Serialize)]
pub struct GradeResponse {
    pub success: bool,
    pub result: Grade,
}

async fn load_test(state: &AppState, id: TestId) -> ApiResult<KnowledgeTest> {
    state
        .assessments
        .get_test(id)
        .await?
        .ok_or_else(|| MarketError::not_found("Test not found").into())
}

/// Add questions to the course's test; only the course creator may
pub async fn create_test(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    payload: Result<Json<CreateTestRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<TestResponse>)> {
    let request = json_body(payload)?;
    let course = load_course(&state, request.course_id).await?;
    if !course.is_creator(user.id) {
        return Err(MarketError::forbidden("Only the course creator can add tests").into());
    }
    if request.questions.is_empty() {
        return Err(MarketError::validation("At least one question is required").into());
    }

    let questions = request
        .questions
        .into_iter()
        .map(NewQuestion::into_question)
        .collect::<Result<Vec<_>, _>>()?;
    let added = questions.len();

    let (test, created) = state
        .assessments
        .add_questions(course.id, user.id, questions)
        .await?;

    tracing::info!(test_id = %test.id, course_id = %course.id, added, created, "Questions added");

    let (status, message) = if created {
        (StatusCode::CREATED, "Test created successfully")
    } else {
        (StatusCode::OK, "Questions added to existing test")
    };
    Ok((
        status,
        Json(TestResponse {
            success: true,
            test: test.view(true),
            message: Some(message.into()),
        }),
    ))
}

/// Tests of a course; answer keys only for the creator
pub async fn tests_for_course(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(course_id): Path<CourseId>,
) -> ApiResult<Json<TestListResponse>> {
    let course = load_course(&state, course_id).await?;
    let include_answers = course.is_creator(user.id);
    let tests = state.assessments.tests_for_course(course.id).await?;

    Ok(Json(TestListResponse {
        success: true,
        tests: tests.iter().map(|t| t.view(include_answers)).collect(),
    }))
}

pub async fn get_test(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(test_id): Path<TestId>,
) -> ApiResult<Json<TestResponse>> {
    let test = load_test(&state, test_id).await?;
    Ok(Json(TestResponse {
        success: true,
        test: test.view(test.created_by == user.id),
        message: None,
    }))
}

pub async fn delete_question(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path((test_id, question_id)): Path<(TestId, QuestionId)>,
) -> ApiResult<Json<TestResponse>> {
    let test = load_test(&state, test_id).await?;
    if test.created_by != user.id {
        return Err(MarketError::forbidden("Only the test creator can delete questions").into());
    }

    let test = state.assessments.remove_question(test.id, question_id).await?;
    Ok(Json(TestResponse {
        success: true,
        test: test.view(true),
        message: Some("Question deleted successfully".into()),
    }))
}

/// Grade a submission; requires a completed purchase of the course
pub async fn submit_test(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(test_id): Path<TestId>,
    payload: Result<Json<SubmitTestRequest>, JsonRejection>,
) -> ApiResult<Json<GradeResponse>> {
    let test = load_test(&state, test_id).await?;
    state.access.authorize(user.id, test.course_id).await?;

    let grade = test.grade(&json_body(payload)?.answers)?;
    tracing::info!(
        test_id = %test.id,
        user_id = %user.id,
        percentage = %grade.percentage,
        passed = grade.passed,
        "Test graded"
    );

    Ok(Json(GradeResponse {
        success: true,
        result: grade,
    }))
}
