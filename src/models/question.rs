// src/models/question.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Represents the 'questions' table (the question bank).
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,

    /// The text content of the question.
    pub body: String,

    /// Only accepted questions may be attached to an exam.
    pub is_accepted: bool,

    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Represents the 'question_answers' table: the options of a question and the key.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct QuestionAnswer {
    pub id: i64,
    pub question_id: i64,
    pub body: String,
    pub is_correct: bool,
}

#[derive(Debug, Clone)]
pub struct QuestionWithAnswers {
    pub question: Question,
    pub answers: Vec<QuestionAnswer>,
}

/// DTO for sending a question to a student (excludes the answer key).
#[derive(Debug, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub id: i64,
    pub body: String,
    pub answers: Vec<QuizAnswerOption>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct QuizAnswerOption {
    pub id: i64,
    pub body: String,
}

impl From<&QuestionWithAnswers> for QuizQuestion {
    fn from(q: &QuestionWithAnswers) -> Self {
        Self {
            id: q.question.id,
            body: q.question.body.clone(),
            answers: q
                .answers
                .iter()
                .map(|a| QuizAnswerOption {
                    id: a.id,
                    body: a.body.clone(),
                })
                .collect(),
        }
    }
}
