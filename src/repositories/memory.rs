// src/repositories/memory.rs

use std::collections::{BTreeMap, BTreeSet, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::{
    error::AppError,
    models::{
        exam::{Exam, ExamDetail, ExamListItem, NewExam, SortOrder},
        exam_session::ExamSession,
        lesson::Lesson,
        question::{Question, QuestionAnswer, QuestionWithAnswers},
        student_result::{ResultRow, StudentResult},
        user::{Role, TeacherSummary},
    },
    repositories::{ExamFilter, ExamStore},
    response::{Page, PageRequest},
    services::ingestion::{GradedAnswer, IngestAnswers, grade},
};

#[derive(Default)]
struct Tables {
    next_id: i64,
    users: HashMap<i64, (String, Role)>,
    lessons: HashMap<i64, Lesson>,
    exams: BTreeMap<i64, Exam>,
    questions: BTreeMap<i64, Question>,
    question_answers: BTreeMap<i64, QuestionAnswer>,
    exam_questions: BTreeSet<(i64, i64)>,
    sessions: BTreeMap<i64, ExamSession>,
    student_answers: BTreeMap<(i64, i64, i64), GradedAnswer>,
    results: BTreeMap<i64, StudentResult>,
}

impl Tables {
    fn id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn teacher(&self, id: i64) -> Result<TeacherSummary, AppError> {
        self.users
            .get(&id)
            .map(|(name, _)| TeacherSummary {
                id,
                name: name.clone(),
            })
            .ok_or_else(|| AppError::InternalServerError(format!("User {} is missing", id)))
    }

    fn questions_of(&self, exam_id: i64) -> Vec<QuestionWithAnswers> {
        self.exam_questions
            .range((exam_id, i64::MIN)..=(exam_id, i64::MAX))
            .filter_map(|&(_, question_id)| self.questions.get(&question_id))
            .map(|question| QuestionWithAnswers {
                question: question.clone(),
                answers: self
                    .question_answers
                    .values()
                    .filter(|a| a.question_id == question.id)
                    .cloned()
                    .collect(),
            })
            .collect()
    }

    fn result_row(&self, result: &StudentResult) -> Result<ResultRow, AppError> {
        let exam = self.exams.get(&result.exam_id).ok_or_else(|| {
            AppError::InternalServerError(format!("Exam {} is missing", result.exam_id))
        })?;
        let teacher = self.teacher(exam.teacher_id)?;

        Ok(ResultRow {
            result: result.clone(),
            exam_title: exam.title.clone(),
            teacher_id: teacher.id,
            teacher_name: teacher.name,
        })
    }
}

/// `ExamStore` kept in process memory. Seeding helpers stand in for the
/// user, lesson and question-bank tables managed outside this service.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_user(&self, name: &str, role: Role) -> i64 {
        let mut t = self.tables.lock().await;
        let id = t.id();
        t.users.insert(id, (name.to_string(), role));
        id
    }

    pub async fn add_lesson(&self, teacher_id: i64, title: &str) -> Lesson {
        let mut t = self.tables.lock().await;
        let lesson = Lesson {
            id: t.id(),
            teacher_id,
            title: title.to_string(),
        };
        t.lessons.insert(lesson.id, lesson.clone());
        lesson
    }

    /// Adds a question with its options; each option is `(body, is_correct)`.
    pub async fn add_question(
        &self,
        body: &str,
        is_accepted: bool,
        options: &[(&str, bool)],
    ) -> QuestionWithAnswers {
        let mut t = self.tables.lock().await;
        let question = Question {
            id: t.id(),
            body: body.to_string(),
            is_accepted,
            created_at: Some(Utc::now()),
        };

        let mut answers = Vec::with_capacity(options.len());
        for &(option, is_correct) in options {
            let answer = QuestionAnswer {
                id: t.id(),
                question_id: question.id,
                body: option.to_string(),
                is_correct,
            };
            t.question_answers.insert(answer.id, answer.clone());
            answers.push(answer);
        }

        t.questions.insert(question.id, question.clone());
        QuestionWithAnswers { question, answers }
    }

    pub async fn attached_question_ids(&self, exam_id: i64) -> Vec<i64> {
        let t = self.tables.lock().await;
        t.exam_questions
            .range((exam_id, i64::MIN)..=(exam_id, i64::MAX))
            .map(|&(_, question_id)| question_id)
            .collect()
    }

    pub async fn student_answers(&self, student_id: i64, exam_id: i64) -> Vec<GradedAnswer> {
        let t = self.tables.lock().await;
        t.student_answers
            .range((student_id, exam_id, i64::MIN)..=(student_id, exam_id, i64::MAX))
            .map(|(_, answer)| answer.clone())
            .collect()
    }
}

#[async_trait]
impl ExamStore for MemoryStore {
    async fn find_lesson(&self, lesson_id: i64) -> Result<Option<Lesson>, AppError> {
        Ok(self.tables.lock().await.lessons.get(&lesson_id).cloned())
    }

    async fn insert_exam(&self, exam: NewExam) -> Result<Exam, AppError> {
        let mut t = self.tables.lock().await;
        if !t.lessons.contains_key(&exam.lesson_id) {
            return Err(AppError::InternalServerError(format!(
                "Lesson {} does not exist",
                exam.lesson_id
            )));
        }

        let created = Exam {
            id: t.id(),
            lesson_id: exam.lesson_id,
            teacher_id: exam.teacher_id,
            title: exam.title,
            description: exam.description,
            duration: exam.duration,
            started_at: exam.started_at,
            finished_at: exam.finished_at,
            created_at: Utc::now(),
        };
        t.exams.insert(created.id, created.clone());
        Ok(created)
    }

    async fn find_exam(&self, exam_id: i64) -> Result<Option<Exam>, AppError> {
        Ok(self.tables.lock().await.exams.get(&exam_id).cloned())
    }

    async fn find_exam_detail(&self, exam_id: i64) -> Result<Option<ExamDetail>, AppError> {
        let t = self.tables.lock().await;
        let Some(exam) = t.exams.get(&exam_id).cloned() else {
            return Ok(None);
        };
        let lesson = t.lessons.get(&exam.lesson_id).cloned().ok_or_else(|| {
            AppError::InternalServerError(format!("Exam {} has no lesson", exam.id))
        })?;
        let questions = t.questions_of(exam.id);

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
        let mut t = self.tables.lock().await;
        let accepted: BTreeSet<i64> = question_ids
            .iter()
            .copied()
            .filter(|id| t.questions.get(id).is_some_and(|q| q.is_accepted))
            .collect();

        for &question_id in &accepted {
            t.exam_questions.insert((exam_id, question_id));
        }

        Ok(accepted.into_iter().collect())
    }

    async fn list_exams(&self, filter: &ExamFilter) -> Result<Page<ExamListItem>, AppError> {
        let t = self.tables.lock().await;
        let needle = filter.title.as_deref().map(str::to_lowercase);

        let mut matching: Vec<&Exam> = t
            .exams
            .values()
            .filter(|exam| match &needle {
                Some(needle) => exam.title.to_lowercase().contains(needle.as_str()),
                None => true,
            })
            .collect();

        matching.sort_by_key(|exam| (exam.created_at, exam.id));
        if filter.order == SortOrder::Desc {
            matching.reverse();
        }

        let total = matching.len() as i64;
        let mut items = Vec::new();
        for exam in matching
            .into_iter()
            .skip(usize::try_from(filter.page.offset()).unwrap_or(usize::MAX))
            .take(filter.page.per_page as usize)
        {
            items.push(ExamListItem {
                exam: exam.clone(),
                teacher: t.teacher(exam.teacher_id)?,
            });
        }

        Ok(Page::new(items, filter.page, total))
    }

    async fn find_session(
        &self,
        exam_id: i64,
        student_id: i64,
    ) -> Result<Option<ExamSession>, AppError> {
        let t = self.tables.lock().await;
        Ok(t
            .sessions
            .values()
            .find(|s| s.exam_id == exam_id && s.student_id == student_id)
            .cloned())
    }

    async fn create_session(
        &self,
        exam_id: i64,
        student_id: i64,
        started_at: DateTime<Utc>,
    ) -> Result<ExamSession, AppError> {
        let mut t = self.tables.lock().await;
        if t
            .sessions
            .values()
            .any(|s| s.exam_id == exam_id && s.student_id == student_id)
        {
            return Err(AppError::Conflict(
                "Session already exists for this student and exam".to_string(),
            ));
        }

        let session = ExamSession {
            id: t.id(),
            student_id,
            exam_id,
            started_at,
            finished_at: None,
        };
        t.sessions.insert(session.id, session.clone());
        Ok(session)
    }

    async fn finish_session(
        &self,
        session_id: i64,
        finished_at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let mut t = self.tables.lock().await;
        match t.sessions.get_mut(&session_id) {
            Some(session) if session.finished_at.is_none() => {
                session.finished_at = Some(finished_at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn reopen_session(&self, session_id: i64) -> Result<(), AppError> {
        let mut t = self.tables.lock().await;
        if let Some(session) = t.sessions.get_mut(&session_id) {
            session.finished_at = None;
        }
        Ok(())
    }

    async fn find_result(
        &self,
        student_id: i64,
        exam_id: i64,
    ) -> Result<Option<ResultRow>, AppError> {
        let t = self.tables.lock().await;
        t.results
            .values()
            .find(|r| r.student_id == student_id && r.exam_id == exam_id)
            .map(|r| t.result_row(r))
            .transpose()
    }

    async fn list_results(
        &self,
        student_id: i64,
        page: PageRequest,
    ) -> Result<Page<ResultRow>, AppError> {
        let t = self.tables.lock().await;
        let mut mine: Vec<&StudentResult> = t
            .results
            .values()
            .filter(|r| r.student_id == student_id)
            .collect();
        mine.sort_by_key(|r| std::cmp::Reverse((r.created_at, r.id)));

        let total = mine.len() as i64;
        let rows = mine
            .into_iter()
            .skip(usize::try_from(page.offset()).unwrap_or(usize::MAX))
            .take(page.per_page as usize)
            .map(|r| t.result_row(r))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Page::new(rows, page, total))
    }

    async fn ingest_answers(
        &self,
        task: &IngestAnswers,
        graded_at: DateTime<Utc>,
    ) -> Result<StudentResult, AppError> {
        let mut t = self.tables.lock().await;
        if !t.exams.contains_key(&task.exam_id) {
            return Err(AppError::NotFound(format!("Exam {} not found", task.exam_id)));
        }

        let questions = t.questions_of(task.exam_id);
        let graded = grade(&task.answers, &questions);
        let score = graded.iter().filter(|a| a.is_correct).count() as i32;

        for answer in graded {
            t.student_answers
                .insert((task.student_id, task.exam_id, answer.question_id), answer);
        }

        let existing = t
            .results
            .values()
            .find(|r| r.student_id == task.student_id && r.exam_id == task.exam_id)
            .map(|r| r.id);
        let id = match existing {
            Some(id) => id,
            None => t.id(),
        };

        let result = StudentResult {
            id,
            student_id: task.student_id,
            exam_id: task.exam_id,
            score,
            total_questions: questions.len() as i32,
            created_at: graded_at,
        };
        t.results.insert(id, result.clone());
        Ok(result)
    }
}
