// src/services/eligibility.rs

use chrono::{DateTime, Duration, Utc};
use std::fmt;

use crate::models::{
    exam::{Exam, ExamDetail},
    exam_session::{ExamSession, SessionState},
};

/// Why a student may not start or finish an exam right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EligibilityError {
    ExamNotStarted,
    ExamClosed,
    AlreadyStarted,
    AlreadyFinished,
    NoQuestions,
}

impl fmt::Display for EligibilityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            EligibilityError::ExamNotStarted => "The exam has not started yet",
            EligibilityError::ExamClosed => "The exam time is over",
            EligibilityError::AlreadyStarted => "You have already started this exam",
            EligibilityError::AlreadyFinished => "You have already finished this exam",
            EligibilityError::NoQuestions => "This exam has no questions",
        };
        f.write_str(msg)
    }
}

impl std::error::Error for EligibilityError {}

/// Timing and entitlement rules gating the session lifecycle.
pub trait EligibilityPolicy: Send + Sync {
    /// Decides whether a student holding `session` (if any) may start `exam` at `now`.
    fn check_exam_availability(
        &self,
        exam: &ExamDetail,
        session: Option<&ExamSession>,
        now: DateTime<Utc>,
    ) -> Result<(), EligibilityError>;

    /// Decides whether `session` may be closed at `now`.
    fn can_user_finish_exam(
        &self,
        exam: &Exam,
        session: &ExamSession,
        now: DateTime<Utc>,
    ) -> Result<(), EligibilityError>;
}

/// Window rule: an exam can be started inside `[started_at, finished_at]`, once,
/// and finished until `finished_at + grace`.
#[derive(Debug, Clone, Copy)]
pub struct ExamWindowPolicy {
    finish_grace: Duration,
}

impl ExamWindowPolicy {
    pub fn new(finish_grace_seconds: i64) -> Self {
        Self {
            finish_grace: Duration::seconds(finish_grace_seconds.max(0)),
        }
    }
}

impl Default for ExamWindowPolicy {
    fn default() -> Self {
        Self::new(0)
    }
}

impl EligibilityPolicy for ExamWindowPolicy {
    fn check_exam_availability(
        &self,
        exam: &ExamDetail,
        session: Option<&ExamSession>,
        now: DateTime<Utc>,
    ) -> Result<(), EligibilityError> {
        match SessionState::of(session) {
            SessionState::NotStarted => {}
            SessionState::InProgress => return Err(EligibilityError::AlreadyStarted),
            SessionState::Finished => return Err(EligibilityError::AlreadyFinished),
        }

        if now < exam.exam.started_at {
            return Err(EligibilityError::ExamNotStarted);
        }
        if now > exam.exam.finished_at {
            return Err(EligibilityError::ExamClosed);
        }
        if exam.questions.is_empty() {
            return Err(EligibilityError::NoQuestions);
        }

        Ok(())
    }

    fn can_user_finish_exam(
        &self,
        exam: &Exam,
        session: &ExamSession,
        now: DateTime<Utc>,
    ) -> Result<(), EligibilityError> {
        if session.finished_at.is_some() {
            return Err(EligibilityError::AlreadyFinished);
        }
        if now > exam.finished_at + self.finish_grace {
            return Err(EligibilityError::ExamClosed);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        lesson::Lesson,
        question::{Question, QuestionWithAnswers},
    };

    fn at(minutes: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap() + Duration::minutes(minutes)
    }

    fn detail(with_questions: bool) -> ExamDetail {
        let questions = if with_questions {
            vec![QuestionWithAnswers {
                question: Question {
                    id: 1,
                    body: "2 + 2?".into(),
                    is_accepted: true,
                    created_at: None,
                },
                answers: vec![],
            }]
        } else {
            vec![]
        };

        ExamDetail {
            exam: Exam {
                id: 1,
                lesson_id: 1,
                teacher_id: 1,
                title: "Algebra".into(),
                description: None,
                duration: 60,
                started_at: at(0),
                finished_at: at(60),
                created_at: at(-10),
            },
            lesson: Lesson {
                id: 1,
                teacher_id: 1,
                title: "Math".into(),
            },
            questions,
        }
    }

    fn session(finished_at: Option<DateTime<Utc>>) -> ExamSession {
        ExamSession {
            id: 1,
            student_id: 9,
            exam_id: 1,
            started_at: at(1),
            finished_at,
        }
    }

    #[test]
    fn start_window_is_inclusive_on_both_ends() {
        let policy = ExamWindowPolicy::default();
        let exam = detail(true);
        assert_eq!(policy.check_exam_availability(&exam, None, at(0)), Ok(()));
        assert_eq!(policy.check_exam_availability(&exam, None, at(60)), Ok(()));
        assert_eq!(
            policy.check_exam_availability(&exam, None, at(-1)),
            Err(EligibilityError::ExamNotStarted)
        );
        assert_eq!(
            policy.check_exam_availability(&exam, None, at(61)),
            Err(EligibilityError::ExamClosed)
        );
    }

    #[test]
    fn start_refuses_existing_session() {
        let policy = ExamWindowPolicy::default();
        let exam = detail(true);
        assert_eq!(
            policy.check_exam_availability(&exam, Some(&session(None)), at(5)),
            Err(EligibilityError::AlreadyStarted)
        );
        assert_eq!(
            policy.check_exam_availability(&exam, Some(&session(Some(at(6)))), at(7)),
            Err(EligibilityError::AlreadyFinished)
        );
    }

    #[test]
    fn start_refuses_empty_exam() {
        let policy = ExamWindowPolicy::default();
        assert_eq!(
            policy.check_exam_availability(&detail(false), None, at(5)),
            Err(EligibilityError::NoQuestions)
        );
    }

    #[test]
    fn finish_respects_grace_period() {
        let exam = detail(true).exam;
        let strict = ExamWindowPolicy::default();
        let lenient = ExamWindowPolicy::new(120);

        assert_eq!(strict.can_user_finish_exam(&exam, &session(None), at(60)), Ok(()));
        assert_eq!(
            strict.can_user_finish_exam(&exam, &session(None), at(61)),
            Err(EligibilityError::ExamClosed)
        );
        assert_eq!(lenient.can_user_finish_exam(&exam, &session(None), at(61)), Ok(()));
    }

    #[test]
    fn finish_is_single_shot() {
        let policy = ExamWindowPolicy::default();
        let exam = detail(true).exam;
        assert_eq!(
            policy.can_user_finish_exam(&exam, &session(Some(at(10))), at(11)),
            Err(EligibilityError::AlreadyFinished)
        );
    }
}
