// src/services/mod.rs

pub mod eligibility;
pub mod exams;
pub mod ingestion;
