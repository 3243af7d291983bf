// src/handlers/results.rs

use axum::{
    Extension,
    extract::State,
    response::IntoResponse,
};
use serde::Deserialize;

use crate::{
    error::AppError,
    extractors::{AppPath, AppQuery},
    response::ApiResponse,
    services::exams::ExamService,
    utils::jwt::Claims,
};

#[derive(Debug, Default, Deserialize)]
pub struct ResultListParams {
    pub page: Option<i64>,
}

/// The caller's graded result for one exam.
pub async fn result(
    State(exams): State<ExamService>,
    Extension(claims): Extension<Claims>,
    AppPath(exam_id): AppPath<i64>,
) -> Result<impl IntoResponse, AppError> {
    let caller = claims.identity()?;
    let result = exams.result(&caller, exam_id).await?;
    Ok(ApiResponse::ok(result))
}

/// All of the caller's results, newest first.
pub async fn all_results(
    State(exams): State<ExamService>,
    Extension(claims): Extension<Claims>,
    AppQuery(params): AppQuery<ResultListParams>,
) -> Result<impl IntoResponse, AppError> {
    let caller = claims.identity()?;
    let page = exams.all_results(&caller, params.page).await?;
    Ok(ApiResponse::ok(page))
}
