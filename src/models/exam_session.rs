// src/models/exam_session.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Represents the 'exam_sessions' table: one student's attempt at one exam.
/// At most one row per (student_id, exam_id).
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ExamSession {
    pub id: i64,
    pub student_id: i64,
    pub exam_id: i64,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    NotStarted,
    InProgress,
    Finished,
}

impl SessionState {
    pub fn of(session: Option<&ExamSession>) -> Self {
        match session {
            None => SessionState::NotStarted,
            Some(s) if s.finished_at.is_none() => SessionState::InProgress,
            Some(_) => SessionState::Finished,
        }
    }
}

/// One submitted answer. `answer_id` is the chosen option, `None` when skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmittedAnswer {
    pub question_id: i64,
    #[serde(default)]
    pub answer_id: Option<i64>,
}

/// DTO for finishing an exam.
#[derive(Debug, Deserialize, Validate)]
pub struct FinishExamRequest {
    #[validate(length(min = 1, message = "At least one answer is required."))]
    pub answers: Vec<SubmittedAnswer>,
}
