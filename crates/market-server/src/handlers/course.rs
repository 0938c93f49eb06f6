//! Course and lecture endpoints

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    Json,
};
use market_core::course::{
    CourseLevel, CourseSummary, CourseUpdate, LectureUpdate, NewCourse, NewLecture, PriceSort,
};
use market_core::user::UserSummary;
use market_core::{Course, CourseDetail, CourseId, CourseQuery, Lecture, LectureId, MarketError};
use serde::{Deserialize, Serialize};

use crate::auth::{AuthUser, MaybeUser};
use crate::error::ApiResult;
use crate::handlers::{
    course_detail, json_body, load_course, load_visible_course, MessageResponse,
};
use crate::state::AppState;

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct CourseResponse {
    pub success: bool,
    pub course: Course,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CourseDetailResponse {
    pub success: bool,
    pub course: CourseDetail,
}

/// Catalog card
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseListing {
    #[serde(flatten)]
    pub summary: CourseSummary,
    pub subtitle: Option<String>,
    pub level: CourseLevel,
    pub creator: Option<UserSummary>,
    pub lecture_count: usize,
}

#[derive(Debug, Serialize)]
pub struct CourseListResponse<T> {
    pub success: bool,
    pub courses: Vec<T>,
}

#[derive(Debug, Serialize)]
pub struct LectureResponse {
    pub success: bool,
    pub lecture: Lecture,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LectureListResponse {
    pub success: bool,
    pub lectures: Vec<Lecture>,
}

#[derive(Debug, Deserialize)]
pub struct PublishParams {
    pub publish: Option<String>,
}

// ============================================================================
// Helpers
// ============================================================================

async fn listings(state: &AppState, courses: Vec<Course>) -> ApiResult<Vec<CourseListing>> {
    let mut out = Vec::with_capacity(courses.len());
    for course in courses {
        let creator = state
            .catalog
            .get_user(course.creator)
            .await?
            .map(|u| u.summary());
        out.push(CourseListing {
            summary: course.summary(),
            subtitle: course.subtitle.clone(),
            level: course.level,
            creator,
            lecture_count: course.lectures.len(),
        });
    }
    Ok(out)
}

/// Load a course the caller may edit
async fn owned_course(state: &AppState, user: &AuthUser, id: CourseId) -> ApiResult<Course> {
    let course = load_course(state, id).await?;
    user.require_owner(&course)?;
    Ok(course)
}

/// Load a lecture and check it belongs to the course
async fn course_lecture(state: &AppState, course: &Course, id: LectureId) -> ApiResult<Lecture> {
    if !course.lectures.contains(&id) {
        return Err(MarketError::not_found("Lecture not found").into());
    }
    state
        .catalog
        .get_lecture(id)
        .await?
        .ok_or_else(|| MarketError::not_found("Lecture not found").into())
}

fn parse_search(pairs: Vec<(String, String)>) -> CourseQuery {
    let mut query = CourseQuery::default();
    for (key, value) in pairs {
        match key.as_str() {
            "query" => query.text = value,
            "categories" | "categories[]" => query.categories.extend(
                value
                    .split(',')
                    .map(str::trim)
                    .filter(|c| !c.is_empty())
                    .map(str::to_string),
            ),
            "sortByPrice" => query.sort = PriceSort::parse(&value),
            _ => {}
        }
    }
    query
}

// ============================================================================
// Course Handlers
// ============================================================================

pub async fn create_course(
    State(state): State<AppState>,
    user: AuthUser,
    payload: Result<Json<NewCourse>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<CourseResponse>)> {
    user.require_instructor()?;
    let course = Course::create(user.0.id, json_body(payload)?)?;
    state.catalog.insert_course(course.clone()).await?;

    tracing::info!(course_id = %course.id, creator = %user.0.id, "Course created");

    Ok((
        StatusCode::CREATED,
        Json(CourseResponse {
            success: true,
            course,
            message: Some("Course created.".into()),
        }),
    ))
}

pub async fn published_courses(
    State(state): State<AppState>,
) -> ApiResult<Json<CourseListResponse<CourseListing>>> {
    let courses = CourseQuery::default().apply(state.catalog.list_courses().await?);
    Ok(Json(CourseListResponse {
        success: true,
        courses: listings(&state, courses).await?,
    }))
}

/// `?query=&categories=a,b&sortByPrice=low|high`
pub async fn search_courses(
    State(state): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> ApiResult<Json<CourseListResponse<CourseListing>>> {
    let query = parse_search(pairs);
    let courses = query.apply(state.catalog.list_courses().await?);
    Ok(Json(CourseListResponse {
        success: true,
        courses: listings(&state, courses).await?,
    }))
}

pub async fn creator_courses(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> ApiResult<Json<CourseListResponse<Course>>> {
    Ok(Json(CourseListResponse {
        success: true,
        courses: state.catalog.courses_by_creator(user.id).await?,
    }))
}

/// Course detail; unpublished courses are only visible to their owner
pub async fn get_course(
    State(state): State<AppState>,
    MaybeUser(viewer): MaybeUser,
    Path(course_id): Path<CourseId>,
) -> ApiResult<Json<CourseDetailResponse>> {
    let course = load_visible_course(&state, course_id, viewer.as_ref()).await?;

    let access = state
        .access
        .content_access(viewer.map(|v| v.id), &course)
        .await?;

    Ok(Json(CourseDetailResponse {
        success: true,
        course: course_detail(&state, &course, access).await?,
    }))
}

pub async fn update_course(
    State(state): State<AppState>,
    user: AuthUser,
    Path(course_id): Path<CourseId>,
    payload: Result<Json<CourseUpdate>, JsonRejection>,
) -> ApiResult<Json<CourseResponse>> {
    let mut course = owned_course(&state, &user, course_id).await?;
    course.apply(json_body(payload)?)?;
    let course = state.catalog.save_course(&course).await?;

    tracing::info!(course_id = %course.id, price = %course.price, "Course updated");

    Ok(Json(CourseResponse {
        success: true,
        course,
        message: Some("Course updated successfully.".into()),
    }))
}

pub async fn delete_course(
    State(state): State<AppState>,
    user: AuthUser,
    Path(course_id): Path<CourseId>,
) -> ApiResult<Json<MessageResponse>> {
    let course = owned_course(&state, &user, course_id).await?;
    state.catalog.delete_course(course.id).await?;
    let tests = state.assessments.remove_tests_for_course(course.id).await?;

    tracing::info!(course_id = %course.id, tests, "Course removed");
    Ok(MessageResponse::ok("Course removed successfully."))
}

/// `?publish=true|false`
pub async fn toggle_publish(
    State(state): State<AppState>,
    user: AuthUser,
    Path(course_id): Path<CourseId>,
    Query(params): Query<PublishParams>,
) -> ApiResult<Json<MessageResponse>> {
    let publish = match params.publish.as_deref() {
        Some("true") => true,
        Some("false") => false,
        _ => return Err(MarketError::validation("publish must be true or false").into()),
    };

    let mut course = owned_course(&state, &user, course_id).await?;
    course.set_published(publish)?;
    state.catalog.save_course(&course).await?;

    tracing::info!(course_id = %course.id, publish, "Course publish state changed");
    Ok(MessageResponse::ok(if publish {
        "Course is Published"
    } else {
        "Course is Unpublished"
    }))
}

// ============================================================================
// Lecture Handlers
// ============================================================================

pub async fn create_lecture(
    State(state): State<AppState>,
    user: AuthUser,
    Path(course_id): Path<CourseId>,
    payload: Result<Json<NewLecture>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<LectureResponse>)> {
    let course = owned_course(&state, &user, course_id).await?;
    let lecture = Lecture::create(json_body(payload)?)?;
    state.catalog.add_lecture(course.id, lecture.clone()).await?;

    tracing::info!(course_id = %course.id, lecture_id = %lecture.id, "Lecture created");

    Ok((
        StatusCode::CREATED,
        Json(LectureResponse {
            success: true,
            lecture,
            message: Some("Lecture created successfully.".into()),
        }),
    ))
}

pub async fn course_lectures(
    State(state): State<AppState>,
    user: AuthUser,
    Path(course_id): Path<CourseId>,
) -> ApiResult<Json<LectureListResponse>> {
    let course = owned_course(&state, &user, course_id).await?;
    Ok(Json(LectureListResponse {
        success: true,
        lectures: state.catalog.lectures_of(&course).await?,
    }))
}

pub async fn update_lecture(
    State(state): State<AppState>,
    user: AuthUser,
    Path((course_id, lecture_id)): Path<(CourseId, LectureId)>,
    payload: Result<Json<LectureUpdate>, JsonRejection>,
) -> ApiResult<Json<LectureResponse>> {
    let course = owned_course(&state, &user, course_id).await?;
    let mut lecture = course_lecture(&state, &course, lecture_id).await?;
    lecture.apply(json_body(payload)?);
    state.catalog.save_lecture(&lecture).await?;

    Ok(Json(LectureResponse {
        success: true,
        lecture,
        message: Some("Lecture updated successfully.".into()),
    }))
}

pub async fn remove_lecture(
    State(state): State<AppState>,
    user: AuthUser,
    Path((course_id, lecture_id)): Path<(CourseId, LectureId)>,
) -> ApiResult<Json<MessageResponse>> {
    let course = owned_course(&state, &user, course_id).await?;
    course_lecture(&state, &course, lecture_id).await?;
    state.catalog.remove_lecture(lecture_id).await?;

    tracing::info!(course_id = %course.id, lecture_id = %lecture_id, "Lecture removed");
    Ok(MessageResponse::ok("Lecture removed successfully."))
}

/// Single lecture, video withheld unless preview or entitled
pub async fn get_lecture(
    State(state): State<AppState>,
    MaybeUser(viewer): MaybeUser,
    Path(lecture_id): Path<LectureId>,
) -> ApiResult<Json<LectureResponse>> {
    let lecture = state
        .catalog
        .get_lecture(lecture_id)
        .await?
        .ok_or_else(|| MarketError::not_found("Lecture not found"))?;
    let course = state
        .catalog
        .course_of_lecture(lecture_id)
        .await?
        .ok_or_else(|| MarketError::not_found("Lecture not found"))?;

    let access = state
        .access
        .content_access(viewer.map(|v| v.id), &course)
        .await?;

    Ok(Json(LectureResponse {
        success: true,
        lecture: lecture.redacted_for(access),
        message: None,
    }))
}
