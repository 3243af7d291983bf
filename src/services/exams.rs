// src/services/exams.rs

use std::sync::Arc;

use chrono::{DateTime, Duration};
use validator::Validate;

use crate::{
    config::{Config, MAX_PER_PAGE},
    error::AppError,
    models::{
        exam::{
            CreateExamRequest, Exam, ExamListItem, ExamListParams, NewExam, QuizResource,
            SelectQuestionsRequest,
        },
        exam_session::FinishExamRequest,
        lesson::Lesson,
        student_result::ResultResource,
        user::Identity,
    },
    repositories::{ExamFilter, ExamStore},
    response::{Page, PageRequest},
    services::{
        eligibility::{EligibilityError, EligibilityPolicy},
        ingestion::{AnswerQueue, IngestAnswers, TaskId},
    },
    utils::{clock::Clock, html::clean_html},
};

/// Sequences the store, the eligibility rules and the ingestion queue for
/// every exam operation. Handlers only translate HTTP to these calls.
#[derive(Clone)]
pub struct ExamService {
    store: Arc<dyn ExamStore>,
    policy: Arc<dyn EligibilityPolicy>,
    queue: Arc<dyn AnswerQueue>,
    clock: Arc<dyn Clock>,
    exams_per_page: i64,
    results_per_page: i64,
}

impl ExamService {
    pub fn new(
        store: Arc<dyn ExamStore>,
        policy: Arc<dyn EligibilityPolicy>,
        queue: Arc<dyn AnswerQueue>,
        clock: Arc<dyn Clock>,
        config: &Config,
    ) -> Self {
        Self {
            store,
            policy,
            queue,
            clock,
            exams_per_page: config.exams_per_page,
            results_per_page: config.results_per_page,
        }
    }

    pub fn queue(&self) -> &Arc<dyn AnswerQueue> {
        &self.queue
    }

    /// Loads a lesson and checks that `caller` teaches it.
    async fn owned_lesson(&self, caller: &Identity, lesson_id: i64) -> Result<Lesson, AppError> {
        let lesson = self
            .store
            .find_lesson(lesson_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Lesson not found".to_string()))?;

        if lesson.teacher_id != caller.user_id && !caller.is_admin() {
            return Err(AppError::Forbidden(
                "You do not teach this lesson".to_string(),
            ));
        }

        Ok(lesson)
    }

    /// Schedules a new exam for a lesson the caller owns.
    pub async fn create(
        &self,
        caller: &Identity,
        lesson_id: i64,
        req: CreateExamRequest,
    ) -> Result<Exam, AppError> {
        req.validate()?;

        let title = req.title.trim().to_string();
        if title.is_empty() {
            return Err(AppError::BadRequest("Title must not be blank".to_string()));
        }

        let lesson = self.owned_lesson(caller, lesson_id).await?;

        let started_at = DateTime::from_timestamp(req.started_at, 0)
            .ok_or_else(|| AppError::BadRequest("startedAt is out of range".to_string()))?;
        let finished_at = started_at
            .checked_add_signed(Duration::minutes(i64::from(req.duration)))
            .ok_or_else(|| AppError::BadRequest("Exam would end out of range".to_string()))?;

        let description = req
            .description
            .map(|d| clean_html(d.trim()))
            .filter(|d| !d.is_empty());

        let exam = self
            .store
            .insert_exam(NewExam {
                lesson_id: lesson.id,
                teacher_id: lesson.teacher_id,
                title,
                description,
                duration: req.duration,
                started_at,
                finished_at,
            })
            .await?;

        tracing::info!(
            exam_id = exam.id,
            lesson_id = lesson.id,
            teacher_id = caller.user_id,
            "Exam created"
        );
        Ok(exam)
    }

    /// Adds accepted questions to an exam, keeping the ones already attached.
    pub async fn select_exam_questions(
        &self,
        caller: &Identity,
        lesson_id: i64,
        exam_id: i64,
        req: SelectQuestionsRequest,
    ) -> Result<Vec<i64>, AppError> {
        req.validate()?;

        let exam = self
            .store
            .find_exam(exam_id)
            .await?
            .filter(|exam| exam.lesson_id == lesson_id)
            .ok_or_else(|| AppError::NotFound("Exam not found".to_string()))?;

        self.owned_lesson(caller, exam.lesson_id).await?;

        let attached = self
            .store
            .attach_accepted_questions(exam.id, &req.questions)
            .await?;

        tracing::info!(
            exam_id = exam.id,
            requested = req.questions.len(),
            accepted = attached.len(),
            "Exam questions selected"
        );
        Ok(attached)
    }

    pub async fn get_all(&self, params: ExamListParams) -> Result<Page<ExamListItem>, AppError> {
        let per_page = params
            .per_page
            .unwrap_or(self.exams_per_page)
            .clamp(1, MAX_PER_PAGE);

        let filter = ExamFilter {
            title: params
                .title
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty()),
            order: params.order.unwrap_or_default(),
            page: PageRequest::new(params.page, per_page),
        };

        self.store.list_exams(&filter).await
    }

    /// Quiz view of one exam for its teacher.
    pub async fn get_by_id(&self, caller: &Identity, exam_id: i64) -> Result<QuizResource, AppError> {
        let detail = self
            .store
            .find_exam_detail(exam_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Exam not found".to_string()))?;

        if detail.exam.teacher_id != caller.user_id && !caller.is_admin() {
            return Err(AppError::Forbidden(
                "You do not teach this exam".to_string(),
            ));
        }

        Ok(QuizResource::from(&detail))
    }

    /// Opens a session for the caller and hands out the questions.
    pub async fn start(&self, caller: &Identity, exam_id: i64) -> Result<QuizResource, AppError> {
        let detail = self
            .store
            .find_exam_detail(exam_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Exam not found".to_string()))?;

        let existing = self.store.find_session(exam_id, caller.user_id).await?;
        let now = self.clock.now();
        self.policy
            .check_exam_availability(&detail, existing.as_ref(), now)?;

        let session = match self.store.create_session(exam_id, caller.user_id, now).await {
            Ok(session) => session,
            Err(AppError::Conflict(_)) => {
                return Err(AppError::Conflict(
                    EligibilityError::AlreadyStarted.to_string(),
                ));
            }
            Err(e) => return Err(e),
        };

        tracing::info!(
            session_id = session.id,
            exam_id,
            student_id = caller.user_id,
            "Exam session started"
        );
        Ok(QuizResource::from(&detail))
    }

    /// Closes the caller's session and queues the answers for grading.
    pub async fn finish(
        &self,
        caller: &Identity,
        exam_id: i64,
        req: FinishExamRequest,
    ) -> Result<TaskId, AppError> {
        req.validate()?;

        let exam = self
            .store
            .find_exam(exam_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Exam not found".to_string()))?;

        let session = self
            .store
            .find_session(exam_id, caller.user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Exam session not found".to_string()))?;

        let now = self.clock.now();
        self.policy.can_user_finish_exam(&exam, &session, now)?;

        if !self.store.finish_session(session.id, now).await? {
            return Err(EligibilityError::AlreadyFinished.into());
        }

        let queued = self
            .queue
            .enqueue(IngestAnswers {
                student_id: caller.user_id,
                exam_id,
                answers: req.answers,
            })
            .await;

        // A session stays finished only once its answers are queued.
        let task_id = match queued {
            Ok(task_id) => task_id,
            Err(e) => {
                tracing::error!(
                    session_id = session.id,
                    exam_id,
                    student_id = caller.user_id,
                    "Could not queue answers, reopening session: {}",
                    e
                );
                self.store.reopen_session(session.id).await?;
                return Err(e);
            }
        };

        tracing::info!(
            session_id = session.id,
            exam_id,
            student_id = caller.user_id,
            task_id = %task_id,
            "Exam finished, answers queued"
        );
        Ok(task_id)
    }

    pub async fn result(&self, caller: &Identity, exam_id: i64) -> Result<ResultResource, AppError> {
        self.store
            .find_result(caller.user_id, exam_id)
            .await?
            .map(ResultResource::from)
            .ok_or_else(|| AppError::NotFound("Result not found".to_string()))
    }

    pub async fn all_results(
        &self,
        caller: &Identity,
        page: Option<i64>,
    ) -> Result<Page<ResultResource>, AppError> {
        let page = PageRequest::new(page, self.results_per_page);
        let rows = self.store.list_results(caller.user_id, page).await?;
        Ok(rows.map(ResultResource::from))
    }
}
