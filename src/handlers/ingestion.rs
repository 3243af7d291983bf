// src/handlers/ingestion.rs

use axum::{
    extract::State,
    response::IntoResponse,
};
use uuid::Uuid;

use crate::{
    error::AppError, extractors::AppPath, response::ApiResponse, services::exams::ExamService,
};

/// Reports how a queued answer submission fared.
/// Teacher only.
pub async fn task_status(
    State(exams): State<ExamService>,
    AppPath(task_id): AppPath<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let status = exams
        .queue()
        .status(task_id)
        .await
        .ok_or_else(|| AppError::NotFound("Ingestion task not found".to_string()))?;

    Ok(ApiResponse::ok(status))
}
