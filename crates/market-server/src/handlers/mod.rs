//! HTTP Handlers

pub mod assessment;
pub mod course;
pub mod health;
pub mod progress;
pub mod purchase;

use axum::{extract::rejection::JsonRejection, Json};
use market_core::{ContentAccess, Course, CourseDetail, CourseId, MarketError, Role, User};
use serde::Serialize;

use crate::error::ApiResult;
use crate::state::AppState;

/// Plain acknowledgement
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

impl MessageResponse {
    pub fn ok(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            success: true,
            message: message.into(),
        })
    }
}

/// Unwrap a JSON body, turning extractor rejections into validation errors
pub(crate) fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> ApiResult<T> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| MarketError::validation(rejection.body_text()).into())
}

pub(crate) async fn load_course(state: &AppState, id: CourseId) -> ApiResult<Course> {
    state
        .catalog
        .get_course(id)
        .await?
        .ok_or_else(|| MarketError::not_found("Course not found").into())
}

/// Load a course the viewer may see. Unpublished courses are reported
/// missing to everyone but their creator and admins.
pub(crate) async fn load_visible_course(
    state: &AppState,
    id: CourseId,
    viewer: Option<&User>,
) -> ApiResult<Course> {
    let course = load_course(state, id).await?;
    let can_edit =
        viewer.is_some_and(|v| course.is_creator(v.id) || v.role == Role::Admin);
    if !course.is_published && !can_edit {
        return Err(MarketError::not_found("Course not found").into());
    }
    Ok(course)
}

/// Course with creator and lectures populated, lectures redacted to `access`
pub(crate) async fn course_detail(
    state: &AppState,
    course: &Course,
    access: ContentAccess,
) -> ApiResult<CourseDetail> {
    let creator = state
        .catalog
        .get_user(course.creator)
        .await?
        .map(|user| user.summary());
    let lectures = state.catalog.lectures_of(course).await?;
    let total_enrolled = state.purchases.count_completed_for_course(course.id).await?;
    Ok(CourseDetail::build(
        course,
        creator,
        &lectures,
        total_enrolled,
        access,
    ))
}
