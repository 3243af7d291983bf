// src/models/user.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Role carried in the JWT and stored on the 'users' table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Teacher,
    Student,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Teacher => "teacher",
            Role::Student => "student",
            Role::Admin => "admin",
        }
    }
}

/// The authenticated caller, resolved from the bearer token and passed into every operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    pub user_id: i64,
    pub role: Role,
}

impl Identity {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Teacher info attached to exams and results.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
pub struct TeacherSummary {
    pub id: i64,
    pub name: String,
}
