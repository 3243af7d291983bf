// src/state.rs

use std::{sync::Arc, time::Duration};

use axum::extract::FromRef;

use crate::{
    config::Config,
    repositories::ExamStore,
    services::{
        eligibility::ExamWindowPolicy,
        exams::ExamService,
        ingestion::IngestionQueue,
    },
    utils::clock::Clock,
};

#[derive(Clone)]
pub struct AppState {
    pub exams: ExamService,
    pub config: Config,
}

impl AppState {
    /// Wires the service graph over `store`, spawning the ingestion worker.
    pub fn new(store: Arc<dyn ExamStore>, clock: Arc<dyn Clock>, config: Config) -> Self {
        let queue = IngestionQueue::spawn(
            store.clone(),
            clock.clone(),
            config.ingestion_queue_capacity,
            Duration::from_secs(config.ingestion_status_retention_seconds),
        );
        let policy = ExamWindowPolicy::new(config.finish_grace_seconds);
        let exams = ExamService::new(store, Arc::new(policy), Arc::new(queue), clock, &config);

        Self { exams, config }
    }
}

impl FromRef<AppState> for ExamService {
    fn from_ref(state: &AppState) -> Self {
        state.exams.clone()
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}
