// src/models/student_result.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::models::user::TeacherSummary;

/// Represents the 'student_results' table: the graded outcome of a finished session.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct StudentResult {
    pub id: i64,
    pub student_id: i64,
    pub exam_id: i64,
    pub score: i32,
    pub total_questions: i32,
    pub created_at: DateTime<Utc>,
}

/// A result joined with its exam title and the exam's teacher.
#[derive(Debug, Clone, FromRow)]
pub struct ResultRow {
    #[sqlx(flatten)]
    pub result: StudentResult,
    pub exam_title: String,
    pub teacher_id: i64,
    pub teacher_name: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ResultExam {
    pub id: i64,
    pub title: String,
    pub teacher: TeacherSummary,
}

/// DTO for returning a result to the student.
#[derive(Debug, Serialize, Deserialize)]
pub struct ResultResource {
    pub id: i64,
    pub score: i32,
    pub total_questions: i32,
    pub percentage: f64,
    pub created_at: DateTime<Utc>,
    pub exam: ResultExam,
}

impl From<ResultRow> for ResultResource {
    fn from(row: ResultRow) -> Self {
        let percentage = if row.result.total_questions > 0 {
            f64::from(row.result.score) * 100.0 / f64::from(row.result.total_questions)
        } else {
            0.0
        };

        Self {
            id: row.result.id,
            score: row.result.score,
            total_questions: row.result.total_questions,
            percentage,
            created_at: row.result.created_at,
            exam: ResultExam {
                id: row.result.exam_id,
                title: row.exam_title,
                teacher: TeacherSummary {
                    id: row.teacher_id,
                    name: row.teacher_name,
                },
            },
        }
    }
}
