// src/handlers/mod.rs

pub mod exams;
pub mod ingestion;
pub mod results;
