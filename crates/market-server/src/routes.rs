//! Router

use axum::{
    routing::{delete, get, patch, post, put},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::handlers::{assessment, course, health, progress, purchase};
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let courses = Router::new()
        .route("/", post(course::create_course))
        .route("/published", get(course::published_courses))
        .route("/search", get(course::search_courses))
        .route("/creator", get(course::creator_courses))
        .route("/lecture/{lecture_id}", get(course::get_lecture))
        .route(
            "/{course_id}",
            get(course::get_course)
                .put(course::update_course)
                .delete(course::delete_course),
        )
        .route("/{course_id}/publish", patch(course::toggle_publish))
        .route(
            "/{course_id}/lecture",
            post(course::create_lecture).get(course::course_lectures),
        )
        .route(
            "/{course_id}/lecture/{lecture_id}",
            put(course::update_lecture).delete(course::remove_lecture),
        );

    let purchases = Router::new()
        .route("/", get(purchase::purchased_courses))
        .route(
            "/checkout/create-checkout-session",
            post(purchase::create_checkout),
        )
        .route("/verify/{tx_ref}", get(purchase::verify_payment))
        .route(
            "/course/{course_id}/detail-with-status",
            get(purchase::course_detail_with_status),
        )
        .route("/course/{course_id}/content", get(purchase::course_content))
        .route("/webhook", post(purchase::payment_webhook));

    let tests = Router::new()
        .route("/create", post(assessment::create_test))
        .route("/course/{course_id}", get(assessment::tests_for_course))
        .route("/{test_id}", get(assessment::get_test))
        .route("/{test_id}/submit", post(assessment::submit_test))
        .route(
            "/{test_id}/question/{question_id}",
            delete(assessment::delete_question),
        );

    let progress = Router::new()
        .route("/{course_id}", get(progress::get_progress))
        .route(
            "/{course_id}/lecture/{lecture_id}/view",
            post(progress::mark_lecture_viewed),
        );

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health_check))
        .nest("/api/v1/course", courses)
        .nest("/api/v1/purchase", purchases)
        .nest("/api/v1/test", tests)
        .nest("/api/v1/progress", progress)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}
