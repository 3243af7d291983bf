// src/repositories/mod.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    error::AppError,
    models::{
        exam::{Exam, ExamDetail, ExamListItem, NewExam, SortOrder},
        exam_session::ExamSession,
        lesson::Lesson,
        student_result::{ResultRow, StudentResult},
    },
    response::{Page, PageRequest},
    services::ingestion::IngestAnswers,
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Filter for the exam listing.
#[derive(Debug, Clone)]
pub struct ExamFilter {
    /// Case-insensitive substring of the title.
    pub title: Option<String>,
    pub order: SortOrder,
    pub page: PageRequest,
}

/// Persistence seam of the service.
///
/// Implementations own uniqueness: one session per (student, exam), one link
/// per (exam, question), one result per (student, exam).
#[async_trait]
pub trait ExamStore: Send + Sync {
    async fn find_lesson(&self, lesson_id: i64) -> Result<Option<Lesson>, AppError>;

    async fn insert_exam(&self, exam: NewExam) -> Result<Exam, AppError>;

    async fn find_exam(&self, exam_id: i64) -> Result<Option<Exam>, AppError>;

    /// Exam with its lesson, questions and answer options.
    async fn find_exam_detail(&self, exam_id: i64) -> Result<Option<ExamDetail>, AppError>;

    /// Links the accepted subset of `question_ids` to the exam, keeping existing links.
    /// Returns the accepted ids.
    async fn attach_accepted_questions(
        &self,
        exam_id: i64,
        question_ids: &[i64],
    ) -> Result<Vec<i64>, AppError>;

    async fn list_exams(&self, filter: &ExamFilter) -> Result<Page<ExamListItem>, AppError>;

    async fn find_session(
        &self,
        exam_id: i64,
        student_id: i64,
    ) -> Result<Option<ExamSession>, AppError>;

    /// Fails with `AppError::Conflict` when the student already holds a session for the exam.
    async fn create_session(
        &self,
        exam_id: i64,
        student_id: i64,
        started_at: DateTime<Utc>,
    ) -> Result<ExamSession, AppError>;

    /// Stamps `finished_at` if it is still empty. Returns whether this call did it.
    async fn finish_session(
        &self,
        session_id: i64,
        finished_at: DateTime<Utc>,
    ) -> Result<bool, AppError>;

    /// Clears `finished_at` again. Used when a finished session's answers could not be queued.
    async fn reopen_session(&self, session_id: i64) -> Result<(), AppError>;

    async fn find_result(
        &self,
        student_id: i64,
        exam_id: i64,
    ) -> Result<Option<ResultRow>, AppError>;

    async fn list_results(
        &self,
        student_id: i64,
        page: PageRequest,
    ) -> Result<Page<ResultRow>, AppError>;

    /// Grades and stores a submission, then writes the student's result.
    async fn ingest_answers(
        &self,
        task: &IngestAnswers,
        graded_at: DateTime<Utc>,
    ) -> Result<StudentResult, AppError>;
}

/// Escapes LIKE wildcards so user input is matched literally.
pub(crate) fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
