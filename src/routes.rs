// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method},
    middleware,
    routing::{get, post},
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{exams, ingestion, results},
    state::AppState,
    utils::jwt::{auth_middleware, student_middleware, teacher_middleware},
};

/// Assembles the main application router.
///
/// * Every `/api` route requires a bearer token.
/// * Teacher and student routes carry an extra role check.
/// * Applies global middleware (Trace, CORS).
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin([
            HeaderValue::from_static("http://localhost:3000"),
            HeaderValue::from_static("http://127.0.0.1:3000"),
        ])
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
        ]);

    let teacher_routes = Router::new()
        .route("/lessons/{lesson_id}/exams", post(exams::create))
        .route(
            "/lessons/{lesson_id}/exams/{exam_id}/questions",
            post(exams::select_exam_questions),
        )
        .route("/exams/{exam_id}", get(exams::get_by_id))
        .route("/ingestion/tasks/{task_id}", get(ingestion::task_status))
        .layer(middleware::from_fn(teacher_middleware));

    let student_routes = Router::new()
        .route("/exams/{exam_id}/start", post(exams::start))
        .route("/exams/{exam_id}/finish", post(exams::finish))
        .route("/exams/{exam_id}/result", get(results::result))
        .route("/results", get(results::all_results))
        .layer(middleware::from_fn(student_middleware));

    // Auth runs before the role checks above
    let api_routes = Router::new()
        .route("/exams", get(exams::get_all))
        .merge(teacher_routes)
        .merge(student_routes)
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .nest("/api", api_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}
