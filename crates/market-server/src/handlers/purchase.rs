//! Purchase endpoints: checkout, verification, webhook and gated content

use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use market_core::course::CourseSummary;
use market_core::{ContentAccess, CourseDetail, CourseId, MarketError, Purchase, TransactionRef};
use market_payments::{PurchaseState, ReconcileOutcome, SIGNATURE_HEADERS};
use serde::{Deserialize, Serialize};

use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::handlers::{course_detail, json_body, load_course, load_visible_course};
use crate::state::AppState;

// ============================================================================
// Request / Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    pub course_id: Option<CourseId>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutResponse {
    pub success: bool,
    pub url: String,
    pub tx_ref: TransactionRef,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    /// `success`, `error` or `pending`
    pub status: &'static str,
    pub course_id: CourseId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseWithStatus {
    pub course: CourseDetail,
    #[serde(flatten)]
    pub state: PurchaseState,
}

#[derive(Debug, Serialize)]
pub struct ContentResponse {
    pub success: bool,
    pub course: CourseDetail,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookResponse {
    pub success: bool,
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchasedCourse {
    #[serde(flatten)]
    pub purchase: Purchase,
    pub course: Option<CourseSummary>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchasedCoursesResponse {
    pub success: bool,
    pub purchased_courses: Vec<PurchasedCourse>,
}

// ============================================================================
// Handlers
// ============================================================================

/// Create a pending purchase and a hosted checkout session
pub async fn create_checkout(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    payload: Result<Json<CheckoutRequest>, JsonRejection>,
) -> ApiResult<Json<CheckoutResponse>> {
    let payments = state.payments()?;
    let course_id = json_body(payload)?
        .course_id
        .ok_or_else(|| MarketError::validation("Course ID is required"))?;

    let session = payments.start_checkout(user.id, course_id).await?;

    Ok(Json(CheckoutResponse {
        success: true,
        url: session.checkout_url,
        tx_ref: session.tx_ref,
    }))
}

/// Browser return from the gateway: settle the caller's purchase
pub async fn verify_payment(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(tx_ref): Path<String>,
) -> ApiResult<(StatusCode, Json<VerifyResponse>)> {
    let payments = state.payments()?;
    let tx_ref = TransactionRef::from_string(tx_ref);

    let result = payments.verify_payment(user.id, &tx_ref).await?;
    let course_id = result.purchase.course_id;

    let (code, status, message) = match result.outcome {
        ReconcileOutcome::Completed | ReconcileOutcome::AlreadyCompleted => (
            StatusCode::OK,
            "success",
            "Payment verified successfully",
        ),
        ReconcileOutcome::Failed | ReconcileOutcome::AlreadyFailed => (
            StatusCode::BAD_REQUEST,
            "error",
            "Payment verification failed",
        ),
        ReconcileOutcome::StillPending => (
            StatusCode::ACCEPTED,
            "pending",
            "Payment is still being processed",
        ),
    };

    Ok((
        code,
        Json(VerifyResponse {
            status,
            course_id,
            message: Some(message.to_string()),
        }),
    ))
}

/// Gateway callback. Safe to deliver any number of times.
pub async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<WebhookResponse>> {
    let payments = state.payments()?;

    let signature = SIGNATURE_HEADERS
        .iter()
        .find_map(|name| headers.get(*name))
        .and_then(|value| value.to_str().ok());

    let notification = state.webhooks.parse(&body, signature).inspect_err(|err| {
        tracing::warn!(error = %err, "Rejected payment webhook");
    })?;

    let result = payments
        .handle_webhook(&notification)
        .await
        .inspect_err(|err| {
            tracing::warn!(
                tx_ref = %notification.tx_ref,
                error = %err,
                redelivery_expected = err.is_retryable(),
                "Payment webhook not settled"
            );
        })?;

    Ok(Json(WebhookResponse {
        success: true,
        status: result.purchase.status.as_str(),
    }))
}

/// Course detail with the caller's purchase state
pub async fn course_detail_with_status(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(course_id): Path<CourseId>,
) -> ApiResult<Json<CourseWithStatus>> {
    let course = load_visible_course(&state, course_id, Some(&user)).await?;
    let purchase_state = state.access.purchase_state(user.id, course.id).await?;
    let access = ContentAccess::from_entitlement(
        course.is_creator(user.id),
        purchase_state.is_purchased,
    );

    Ok(Json(CourseWithStatus {
        course: course_detail(&state, &course, access).await?,
        state: purchase_state,
    }))
}

/// Full lecture content, only for buyers
pub async fn course_content(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(course_id): Path<CourseId>,
) -> ApiResult<Json<ContentResponse>> {
    let course = load_course(&state, course_id).await?;
    state.access.authorize(user.id, course.id).await?;

    Ok(Json(ContentResponse {
        success: true,
        course: course_detail(&state, &course, ContentAccess::Full).await?,
    }))
}

/// The caller's completed purchases
pub async fn purchased_courses(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> ApiResult<Json<PurchasedCoursesResponse>> {
    let purchases = state.purchases.completed_for_user(user.id).await?;

    let mut purchased = Vec::with_capacity(purchases.len());
    for purchase in purchases {
        let course = state
            .catalog
            .get_course(purchase.course_id)
            .await?
            .map(|c| c.summary());
        purchased.push(PurchasedCourse { purchase, course });
    }

    Ok(Json(PurchasedCoursesResponse {
        success: true,
        purchased_courses: purchased,
    }))
}
