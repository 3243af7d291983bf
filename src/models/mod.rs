// src/models/mod.rs

pub mod exam;
pub mod exam_session;
pub mod lesson;
pub mod question;
pub mod student_result;
pub mod user;
