// src/config.rs

use std::env;
use std::str::FromStr;

use dotenvy::dotenv;

/// Runtime configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    /// Token lifetime in seconds.
    pub jwt_expiration: u64,
    pub rust_log: String,
    pub app_addr: String,

    /// Default page size for the exam listing.
    pub exams_per_page: i64,
    /// Fixed page size for a student's results.
    pub results_per_page: i64,
    /// Seconds after an exam closes during which a submission is still accepted.
    pub finish_grace_seconds: i64,
    pub ingestion_queue_capacity: usize,
    /// How long a settled ingestion task's status stays queryable.
    pub ingestion_status_retention_seconds: u64,
}

/// Upper bound for a caller-supplied `perPage`.
pub const MAX_PER_PAGE: i64 = 100;

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");

        let jwt_secret = env::var("JWT_SECRET").expect("JWT_SECRET must be set");

        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let app_addr = env::var("APP_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());

        Self {
            database_url,
            jwt_secret,
            jwt_expiration: parse_or("JWT_EXPIRATION", 600),
            rust_log,
            app_addr,
            exams_per_page: parse_or("EXAMS_PER_PAGE", 20),
            results_per_page: parse_or("RESULTS_PER_PAGE", 10),
            finish_grace_seconds: parse_or("FINISH_GRACE_SECONDS", 0),
            ingestion_queue_capacity: parse_or("INGESTION_QUEUE_CAPACITY", 256),
            ingestion_status_retention_seconds: parse_or("INGESTION_STATUS_RETENTION_SECONDS", 3600),
        }
    }
}

fn parse_or<T: FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("Ignoring invalid value for {}: {:?}", key, raw);
            default
        }),
        Err(_) => default,
    }
}
