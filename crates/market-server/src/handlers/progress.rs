//! Lecture progress of purchased courses

use axum::{
    extract::{Path, State},
    Json,
};
use market_core::progress::{CourseProgress, ProgressReport};
use market_core::{CourseId, LectureId, MarketError};
use serde::Serialize;

use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::handlers::load_course;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ProgressResponse {
    pub success: bool,
    pub progress: ProgressReport,
}

pub async fn get_progress(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(course_id): Path<CourseId>,
) -> ApiResult<Json<ProgressResponse>> {
    state.access.authorize(user.id, course_id).await?;
    let course = load_course(&state, course_id).await?;

    let progress = state
        .progress
        .get_progress(user.id, course.id)
        .await?
        .unwrap_or_else(|| CourseProgress::new(user.id, course.id));

    Ok(Json(ProgressResponse {
        success: true,
        progress: progress.report(&course.lectures),
    }))
}

pub async fn mark_lecture_viewed(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path((course_id, lecture_id)): Path<(CourseId, LectureId)>,
) -> ApiResult<Json<ProgressResponse>> {
    state.access.authorize(user.id, course_id).await?;
    let course = load_course(&state, course_id).await?;
    if !course.lectures.contains(&lecture_id) {
        return Err(MarketError::not_found("Lecture not found").into());
    }

    let progress = state
        .progress
        .mark_viewed(user.id, course.id, lecture_id)
        .await?;
    let report = progress.report(&course.lectures);

    tracing::debug!(
        user_id = %user.id,
        course_id = %course.id,
        viewed = report.viewed_count,
        total = report.total_lectures,
        "Lecture viewed"
    );

    Ok(Json(ProgressResponse {
        success: true,
        progress: report,
    }))
}
