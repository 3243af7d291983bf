// src/models/lesson.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Represents the 'lessons' table. A lesson belongs to exactly one teacher.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Lesson {
    pub id: i64,
    pub teacher_id: i64,
    pub title: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LessonSummary {
    pub id: i64,
    pub title: String,
}

impl From<&Lesson> for LessonSummary {
    fn from(lesson: &Lesson) -> Self {
        Self {
            id: lesson.id,
            title: lesson.title.clone(),
        }
    }
}
