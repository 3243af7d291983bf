// src/services/ingestion.rs

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{RwLock, mpsc};
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{exam_session::SubmittedAnswer, question::QuestionWithAnswers},
    repositories::ExamStore,
    utils::clock::Clock,
};

pub type TaskId = Uuid;

/// A finished exam's raw answers, waiting to be stored and graded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestAnswers {
    pub student_id: i64,
    pub exam_id: i64,
    pub answers: Vec<SubmittedAnswer>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TaskStatus {
    Queued,
    Running,
    Completed { result_id: i64, score: i32 },
    Failed { error: String },
}

/// Work-queue seam between `finish` and answer ingestion.
#[async_trait]
pub trait AnswerQueue: Send + Sync {
    async fn enqueue(&self, task: IngestAnswers) -> Result<TaskId, AppError>;

    async fn status(&self, task_id: TaskId) -> Option<TaskStatus>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GradedAnswer {
    pub question_id: i64,
    pub answer_id: Option<i64>,
    pub is_correct: bool,
}

/// Grades a submission against the exam's questions.
///
/// Answers to questions outside the exam are dropped, and only the first answer
/// per question counts. A chosen option that does not belong to the question
/// is recorded as skipped. An answer is correct when its option is flagged `is_correct`.
pub fn grade(submitted: &[SubmittedAnswer], questions: &[QuestionWithAnswers]) -> Vec<GradedAnswer> {
    let by_id: HashMap<i64, &QuestionWithAnswers> =
        questions.iter().map(|q| (q.question.id, q)).collect();
    let mut seen = HashSet::new();

    submitted
        .iter()
        .filter_map(|answer| {
            let question = by_id.get(&answer.question_id)?;
            if !seen.insert(answer.question_id) {
                return None;
            }
            let chosen = answer
                .answer_id
                .and_then(|id| question.answers.iter().find(|option| option.id == id));
            Some(GradedAnswer {
                question_id: answer.question_id,
                answer_id: chosen.map(|option| option.id),
                is_correct: chosen.is_some_and(|option| option.is_correct),
            })
        })
        .collect()
}

struct Job {
    id: TaskId,
    task: IngestAnswers,
}

/// Status plus the moment it became terminal.
#[derive(Debug, Clone)]
struct TaskEntry {
    status: TaskStatus,
    settled_at: Option<Instant>,
}

impl TaskEntry {
    fn open(status: TaskStatus) -> Self {
        Self {
            status,
            settled_at: None,
        }
    }

    fn settled(status: TaskStatus, at: Instant) -> Self {
        Self {
            status,
            settled_at: Some(at),
        }
    }
}

type StatusMap = Arc<RwLock<HashMap<TaskId, TaskEntry>>>;

/// Drops terminal statuses that settled at least `retention` before `now`.
fn evict_settled(entries: &mut HashMap<TaskId, TaskEntry>, now: Instant, retention: Duration) {
    entries.retain(|_, entry| {
        entry
            .settled_at
            .is_none_or(|at| now.saturating_duration_since(at) < retention)
    });
}

/// Bounded in-process queue drained by a single worker task.
///
/// Completed and failed statuses stay queryable for `retention`, then the
/// worker forgets them.
#[derive(Clone)]
pub struct IngestionQueue {
    sender: mpsc::Sender<Job>,
    statuses: StatusMap,
}

impl IngestionQueue {
    /// Starts the worker on the current tokio runtime.
    pub fn spawn(
        store: Arc<dyn ExamStore>,
        clock: Arc<dyn Clock>,
        capacity: usize,
        retention: Duration,
    ) -> Self {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let statuses: StatusMap = Arc::default();

        tokio::spawn(run_worker(receiver, store, clock, statuses.clone(), retention));

        Self { sender, statuses }
    }
}

#[async_trait]
impl AnswerQueue for IngestionQueue {
    async fn enqueue(&self, task: IngestAnswers) -> Result<TaskId, AppError> {
        let id = Uuid::new_v4();
        self.statuses
            .write()
            .await
            .insert(id, TaskEntry::open(TaskStatus::Queued));

        if self.sender.send(Job { id, task }).await.is_err() {
            self.statuses.write().await.remove(&id);
            return Err(AppError::InternalServerError(
                "Answer ingestion worker is not running".to_string(),
            ));
        }

        Ok(id)
    }

    async fn status(&self, task_id: TaskId) -> Option<TaskStatus> {
        self.statuses
            .read()
            .await
            .get(&task_id)
            .map(|entry| entry.status.clone())
    }
}

async fn run_worker(
    mut receiver: mpsc::Receiver<Job>,
    store: Arc<dyn ExamStore>,
    clock: Arc<dyn Clock>,
    statuses: StatusMap,
    retention: Duration,
) {
    tracing::info!("Answer ingestion worker started");

    while let Some(Job { id, task }) = receiver.recv().await {
        statuses
            .write()
            .await
            .insert(id, TaskEntry::open(TaskStatus::Running));

        let status = match store.ingest_answers(&task, clock.now()).await {
            Ok(result) => {
                tracing::info!(
                    task_id = %id,
                    student_id = task.student_id,
                    exam_id = task.exam_id,
                    score = result.score,
                    total = result.total_questions,
                    "Answers ingested"
                );
                TaskStatus::Completed {
                    result_id: result.id,
                    score: result.score,
                }
            }
            Err(e) => {
                tracing::error!(
                    task_id = %id,
                    student_id = task.student_id,
                    exam_id = task.exam_id,
                    "Answer ingestion failed: {}",
                    e
                );
                TaskStatus::Failed {
                    error: e.to_string(),
                }
            }
        };

        let now = Instant::now();
        let mut entries = statuses.write().await;
        entries.insert(id, TaskEntry::settled(status, now));
        let before = entries.len();
        evict_settled(&mut entries, now, retention);
        if entries.len() < before {
            tracing::debug!(evicted = before - entries.len(), "Evicted settled task statuses");
        }
    }

    tracing::info!("Answer ingestion worker stopped");
}
