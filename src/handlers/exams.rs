// src/handlers/exams.rs

use axum::{
    Extension,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};

use crate::{
    error::AppError,
    extractors::{AppJson, AppPath, AppQuery},
    models::{
        exam::{CreateExamRequest, ExamListParams, SelectQuestionsRequest},
        exam_session::FinishExamRequest,
    },
    response::ApiResponse,
    services::exams::ExamService,
    utils::jwt::Claims,
};

/// Creates an exam for one of the caller's lessons.
/// Teacher only.
pub async fn create(
    State(exams): State<ExamService>,
    Extension(claims): Extension<Claims>,
    AppPath(lesson_id): AppPath<i64>,
    AppJson(payload): AppJson<CreateExamRequest>,
) -> Result<impl IntoResponse, AppError> {
    let caller = claims.identity()?;
    exams.create(&caller, lesson_id, payload).await?;

    Ok((StatusCode::CREATED, ApiResponse::done("Exam created")))
}

/// Attaches accepted questions to an exam without detaching existing ones.
/// Teacher only.
pub async fn select_exam_questions(
    State(exams): State<ExamService>,
    Extension(claims): Extension<Claims>,
    AppPath((lesson_id, exam_id)): AppPath<(i64, i64)>,
    AppJson(payload): AppJson<SelectQuestionsRequest>,
) -> Result<impl IntoResponse, AppError> {
    let caller = claims.identity()?;
    exams
        .select_exam_questions(&caller, lesson_id, exam_id, payload)
        .await?;

    Ok(ApiResponse::done("Exam questions saved"))
}

/// Lists exams, newest first unless `order=asc`.
pub async fn get_all(
    State(exams): State<ExamService>,
    AppQuery(params): AppQuery<ExamListParams>,
) -> Result<impl IntoResponse, AppError> {
    let page = exams.get_all(params).await?;
    Ok(ApiResponse::ok(page))
}

/// Teacher only.
pub async fn get_by_id(
    State(exams): State<ExamService>,
    Extension(claims): Extension<Claims>,
    AppPath(exam_id): AppPath<i64>,
) -> Result<impl IntoResponse, AppError> {
    let caller = claims.identity()?;
    let quiz = exams.get_by_id(&caller, exam_id).await?;
    Ok(ApiResponse::ok(quiz))
}

/// Starts the caller's session and returns the questions without answer keys.
pub async fn start(
    State(exams): State<ExamService>,
    Extension(claims): Extension<Claims>,
    AppPath(exam_id): AppPath<i64>,
) -> Result<impl IntoResponse, AppError> {
    let caller = claims.identity()?;
    let quiz = exams.start(&caller, exam_id).await?;
    Ok(ApiResponse::ok(quiz))
}

/// Closes the caller's session. Grading happens in the background.
pub async fn finish(
    State(exams): State<ExamService>,
    Extension(claims): Extension<Claims>,
    AppPath(exam_id): AppPath<i64>,
    AppJson(payload): AppJson<FinishExamRequest>,
) -> Result<impl IntoResponse, AppError> {
    let caller = claims.identity()?;
    exams.finish(&caller, exam_id, payload).await?;

    Ok(ApiResponse::done("Your exam has been submitted successfully"))
}
