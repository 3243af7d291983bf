// src/models/exam.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::models::{
    lesson::{Lesson, LessonSummary},
    question::{QuestionWithAnswers, QuizQuestion},
    user::TeacherSummary,
};

/// Represents the 'exams' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Exam {
    pub id: i64,
    pub lesson_id: i64,
    pub teacher_id: i64,
    pub title: String,
    pub description: Option<String>,

    /// Length of the exam window in minutes.
    pub duration: i32,

    pub started_at: DateTime<Utc>,

    /// Always `started_at + duration`.
    pub finished_at: DateTime<Utc>,

    pub created_at: DateTime<Utc>,
}

/// Values needed to insert an exam; ids are assigned by the store.
#[derive(Debug, Clone)]
pub struct NewExam {
    pub lesson_id: i64,
    pub teacher_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub duration: i32,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Row for the exam listing: the exam plus its teacher's name.
#[derive(Debug, Clone, FromRow)]
pub struct ExamListRow {
    #[sqlx(flatten)]
    pub exam: Exam,
    pub teacher_name: String,
}

/// Listing item sent to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExamListItem {
    #[serde(flatten)]
    pub exam: Exam,
    pub teacher: TeacherSummary,
}

impl From<ExamListRow> for ExamListItem {
    fn from(row: ExamListRow) -> Self {
        let teacher = TeacherSummary {
            id: row.exam.teacher_id,
            name: row.teacher_name,
        };
        Self {
            exam: row.exam,
            teacher,
        }
    }
}

/// An exam loaded together with its lesson and question set.
#[derive(Debug, Clone)]
pub struct ExamDetail {
    pub exam: Exam,
    pub lesson: Lesson,
    pub questions: Vec<QuestionWithAnswers>,
}

/// Exam shaped for a student taking it.
/// Built from `ExamDetail` but carries no answer keys.
#[derive(Debug, Serialize, Deserialize)]
pub struct QuizResource {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub duration: i32,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub lesson: LessonSummary,
    pub questions: Vec<QuizQuestion>,
}

impl From<&ExamDetail> for QuizResource {
    fn from(detail: &ExamDetail) -> Self {
        Self {
            id: detail.exam.id,
            title: detail.exam.title.clone(),
            description: detail.exam.description.clone(),
            duration: detail.exam.duration,
            started_at: detail.exam.started_at,
            finished_at: detail.exam.finished_at,
            lesson: LessonSummary::from(&detail.lesson),
            questions: detail.questions.iter().map(QuizQuestion::from).collect(),
        }
    }
}

/// DTO for creating an exam.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateExamRequest {
    #[validate(range(min = 1, max = 1440, message = "Duration must be between 1 and 1440 minutes."))]
    pub duration: i32,

    #[validate(length(min = 1, max = 255, message = "Title length must be between 1 and 255 characters."))]
    pub title: String,

    /// Unix timestamp (seconds) at which the exam window opens.
    #[validate(range(min = 0i64, max = 253_402_300_799i64, message = "startedAt must be between 1970 and 9999."))]
    pub started_at: i64,

    #[validate(length(max = 2000))]
    pub description: Option<String>,
}

/// DTO for attaching question-bank entries to an exam.
#[derive(Debug, Deserialize, Validate)]
pub struct SelectQuestionsRequest {
    #[validate(length(min = 1, message = "At least one question id is required."))]
    pub questions: Vec<i64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// Query string of the exam listing.
#[derive(Debug, Default, Deserialize)]
pub struct ExamListParams {
    pub title: Option<String>,
    pub order: Option<SortOrder>,
    #[serde(rename = "perPage")]
    pub per_page: Option<i64>,
    pub page: Option<i64>,
}
