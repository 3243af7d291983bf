// src/repositories/postgres.rs

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::{
    error::AppError,
    models::{
        exam::{Exam, ExamDetail, ExamListItem, ExamListRow, NewExam},
        exam_session::ExamSession,
        lesson::Lesson,
        question::{Question, QuestionAnswer, QuestionWithAnswers},
        student_result::{ResultRow, StudentResult},
    },
    repositories::{ExamFilter, ExamStore, escape_like},
    response::{Page, PageRequest},
    services::ingestion::{IngestAnswers, grade},
};

const EXAM_COLUMNS: &str = "\
    e.id, e.lesson_id, e.teacher_id, e.title, e.description, e.duration, \
    e.started_at, e.finished_at, e.created_at";

const RESULT_COLUMNS: &str = "\
    r.id, r.student_id, r.exam_id, r.score, r.total_questions, r.created_at, \
    e.title AS exam_title, e.teacher_id, u.name AS teacher_name";

/// `ExamStore` backed by PostgreSQL.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn questions_with_answers(
        &self,
        exam_id: i64,
    ) -> Result<Vec<QuestionWithAnswers>, sqlx::Error> {
        let questions = sqlx::query_as::<_, Question>(
            r#"
            SELECT q.id, q.body, q.is_accepted, q.created_at
            FROM questions q
            JOIN exam_questions eq ON eq.question_id = q.id
            WHERE eq.exam_id = $1
            ORDER BY q.id
            "#,
        )
        .bind(exam_id)
        .fetch_all(&self.pool)
        .await?;

        let ids: Vec<i64> = questions.iter().map(|q| q.id).collect();
        let answers = sqlx::query_as::<_, QuestionAnswer>(
            r#"
            SELECT id, question_id, body, is_correct
            FROM question_answers
            WHERE question_id = ANY($1)
            ORDER BY id
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut grouped: HashMap<i64, Vec<QuestionAnswer>> = HashMap::new();
        for answer in answers {
            grouped.entry(answer.question_id).or_default().push(answer);
        }

        Ok(questions
            .into_iter()
            .map(|question| QuestionWithAnswers {
                answers: grouped.remove(&question.id).unwrap_or_default(),
                question,
            })
            .collect())
    }
}

#[async_trait]
impl ExamStore for PgStore {
    async fn find_lesson(&self, lesson_id: i64) -> Result<Option<Lesson>, AppError> {
        let lesson = sqlx::query_as::<_, Lesson>(
            "SELECT id, teacher_id, title FROM lessons WHERE id = $1",
        )
        .bind(lesson_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(lesson)
    }

    async fn insert_exam(&self, exam: NewExam) -> Result<Exam, AppError> {
        let created = sqlx::query_as::<_, Exam>(
            r#"
            INSERT INTO exams
            (lesson_id, teacher_id, title, description, duration, started_at, finished_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, lesson_id, teacher_id, title, description, duration,
                      started_at, finished_at, created_at
            "#,
        )
        .bind(exam.lesson_id)
        .bind(exam.teacher_id)
        .bind(&exam.title)
        .bind(&exam.description)
        .bind(exam.duration)
        .bind(exam.started_at)
        .bind(exam.finished_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to insert exam: {:?}", e);
            AppError::from(e)
        })?;

        Ok(created)
    }

    async fn find_exam(&self, exam_id: i64) -> Result<Option<Exam>, AppError> {
        let exam = sqlx::query_as::<_, Exam>(&format!(
            "SELECT {EXAM_COLUMNS} FROM exams e WHERE e.id = $1"
        ))
        .bind(exam_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(exam)
    }

    async fn find_exam_detail(&self, exam_id: i64) -> Result<Option<ExamDetail>, AppError> {
        let Some(exam) = self.find_exam(exam_id).await? else {
            return Ok(None);
        };

        let lesson = self
            .find_lesson(exam.lesson_id)
            .await?
            .ok_or_else(|| {
                AppError::InternalServerError(format!("Exam {} has no lesson", exam.id))
            })?;

        let questions = self.questions_with_answers(exam.id).await.map_err(|e| {
            tracing::error!("Failed to fetch exam questions: {:?}", e);
            AppError::from(e)
        })?;

        Ok(Some(ExamDetail {
            exam,
            lesson,
            questions,
        }))
    }

    async fn attach_accepted_questions(
        &self,
        exam_id: i64,
        question_ids: &[i64],
    ) -> Result<Vec<i64>, AppError> {
        let mut tx = self.pool.begin().await?;

        let accepted: Vec<i64> = sqlx::query_scalar(
            "SELECT id FROM questions WHERE id = ANY($1) AND is_accepted ORDER BY id",
        )
        .bind(question_ids)
        .fetch_all(&mut *tx)
        .await?;

        if !accepted.is_empty() {
            sqlx::query(
                r#"
                INSERT INTO exam_questions (exam_id, question_id)
                SELECT $1, UNNEST($2::BIGINT[])
                ON CONFLICT (exam_id, question_id) DO NOTHING
                "#,
            )
            .bind(exam_id)
            .bind(&accepted)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                tracing::error!("Failed to attach exam questions: {:?}", e);
                AppError::from(e)
            })?;
        }

        tx.commit().await?;
        Ok(accepted)
    }

    async fn list_exams(&self, filter: &ExamFilter) -> Result<Page<ExamListItem>, AppError> {
        let pattern = filter
            .title
            .as_deref()
            .map(|title| format!("%{}%", escape_like(title)));

        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM exams e");
        if let Some(pattern) = &pattern {
            count.push(" WHERE e.title ILIKE ").push_bind(pattern);
        }
        let total = count.build_query_scalar::<i64>().fetch_one(&self.pool).await?;

        let mut query = QueryBuilder::<Postgres>::new(format!(
            "SELECT {EXAM_COLUMNS}, u.name AS teacher_name \
             FROM exams e JOIN users u ON u.id = e.teacher_id"
        ));
        if let Some(pattern) = &pattern {
            query.push(" WHERE e.title ILIKE ").push_bind(pattern);
        }
        let direction = filter.order.as_sql();
        query.push(format!(
            " ORDER BY e.created_at {direction}, e.id {direction} LIMIT "
        ));
        query.push_bind(filter.page.per_page);
        query.push(" OFFSET ");
        query.push_bind(filter.page.offset());

        let rows: Vec<ExamListRow> = query
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to list exams: {:?}", e);
                AppError::from(e)
            })?;

        Ok(Page::new(rows, filter.page, total).map(ExamListItem::from))
    }

    async fn find_session(
        &self,
        exam_id: i64,
        student_id: i64,
    ) -> Result<Option<ExamSession>, AppError> {
        let session = sqlx::query_as::<_, ExamSession>(
            r#"
            SELECT id, student_id, exam_id, started_at, finished_at
            FROM exam_sessions
            WHERE exam_id = $1 AND student_id = $2
            "#,
        )
        .bind(exam_id)
        .bind(student_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(session)
    }

    async fn create_session(
        &self,
        exam_id: i64,
        student_id: i64,
        started_at: DateTime<Utc>,
    ) -> Result<ExamSession, AppError> {
        let session = sqlx::query_as::<_, ExamSession>(
            r#"
            INSERT INTO exam_sessions (student_id, exam_id, started_at)
            VALUES ($1, $2, $3)
            RETURNING id, student_id, exam_id, started_at, finished_at
            "#,
        )
        .bind(student_id)
        .bind(exam_id)
        .bind(started_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(session)
    }

    async fn finish_session(
        &self,
        session_id: i64,
        finished_at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE exam_sessions SET finished_at = $1 WHERE id = $2 AND finished_at IS NULL",
        )
        .bind(finished_at)
        .bind(session_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn reopen_session(&self, session_id: i64) -> Result<(), AppError> {
        sqlx::query("UPDATE exam_sessions SET finished_at = NULL WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn find_result(
        &self,
        student_id: i64,
        exam_id: i64,
    ) -> Result<Option<ResultRow>, AppError> {
        let row = sqlx::query_as::<_, ResultRow>(&format!(
            "SELECT {RESULT_COLUMNS} FROM student_results r \
             JOIN exams e ON e.id = r.exam_id \
             JOIN users u ON u.id = e.teacher_id \
             WHERE r.student_id = $1 AND r.exam_id = $2"
        ))
        .bind(student_id)
        .bind(exam_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    async fn list_results(
        &self,
        student_id: i64,
        page: PageRequest,
    ) -> Result<Page<ResultRow>, AppError> {
        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM student_results WHERE student_id = $1")
                .bind(student_id)
                .fetch_one(&self.pool)
                .await?;

        let rows = sqlx::query_as::<_, ResultRow>(&format!(
            "SELECT {RESULT_COLUMNS} FROM student_results r \
             JOIN exams e ON e.id = r.exam_id \
             JOIN users u ON u.id = e.teacher_id \
             WHERE r.student_id = $1 \
             ORDER BY r.created_at DESC, r.id DESC \
             LIMIT $2 OFFSET $3"
        ))
        .bind(student_id)
        .bind(page.per_page)
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok(Page::new(rows, page, total))
    }

    async fn ingest_answers(
        &self,
        task: &IngestAnswers,
        graded_at: DateTime<Utc>,
    ) -> Result<StudentResult, AppError> {
        let questions = self.questions_with_answers(task.exam_id).await?;
        let graded = grade(&task.answers, &questions);
        let score = graded.iter().filter(|a| a.is_correct).count() as i32;

        let mut tx = self.pool.begin().await?;

        for answer in &graded {
            sqlx::query(
                r#"
                INSERT INTO student_answers (student_id, exam_id, question_id, answer_id, is_correct)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (student_id, exam_id, question_id) DO UPDATE SET
                    answer_id = EXCLUDED.answer_id,
                    is_correct = EXCLUDED.is_correct
                "#,
            )
            .bind(task.student_id)
            .bind(task.exam_id)
            .bind(answer.question_id)
            .bind(answer.answer_id)
            .bind(answer.is_correct)
            .execute(&mut *tx)
            .await?;
        }

        let result = sqlx::query_as::<_, StudentResult>(
            r#"
            INSERT INTO student_results (student_id, exam_id, score, total_questions, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (student_id, exam_id) DO UPDATE SET
                score = EXCLUDED.score,
                total_questions = EXCLUDED.total_questions,
                created_at = EXCLUDED.created_at
            RETURNING id, student_id, exam_id, score, total_questions, created_at
            "#,
        )
        .bind(task.student_id)
        .bind(task.exam_id)
        .bind(score)
        .bind(questions.len() as i32)
        .bind(graded_at)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(result)
    }
}
