// tests/pg_store_tests.rs
//
// These run against a live Postgres: `DATABASE_URL=... cargo test -- --ignored`.

use chrono::{DateTime, Duration, Utc};
use exam_service::{
    error::AppError,
    models::{exam::NewExam, exam::SortOrder, exam_session::SubmittedAnswer},
    repositories::{ExamFilter, ExamStore, PgStore},
    response::PageRequest,
    services::ingestion::IngestAnswers,
};
use sqlx::{PgPool, postgres::PgPoolOptions};

async fn connect() -> PgPool {
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&database_url)
        .await
        .expect("Failed to connect to Postgres for testing.");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to migrate database");

    pool
}

async fn insert_user(pool: &PgPool, name: &str, role: &str) -> i64 {
    sqlx::query_scalar("INSERT INTO users (name, role) VALUES ($1, $2) RETURNING id")
        .bind(name)
        .bind(role)
        .fetch_one(pool)
        .await
        .unwrap()
}

async fn insert_question(pool: &PgPool, accepted: bool) -> (i64, i64, i64) {
    let question: i64 =
        sqlx::query_scalar("INSERT INTO questions (body, is_accepted) VALUES ('Q', $1) RETURNING id")
            .bind(accepted)
            .fetch_one(pool)
            .await
            .unwrap();

    let mut options = Vec::new();
    for correct in [true, false] {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO question_answers (question_id, body, is_correct) VALUES ($1, 'opt', $2) RETURNING id",
        )
        .bind(question)
        .bind(correct)
        .fetch_one(pool)
        .await
        .unwrap();
        options.push(id);
    }

    (question, options[0], options[1])
}

fn now() -> DateTime<Utc> {
    DateTime::from_timestamp(Utc::now().timestamp(), 0).unwrap()
}

async fn seed_exam(pool: &PgPool, store: &PgStore, title: &str) -> (i64, i64) {
    let teacher = insert_user(pool, "Teacher", "teacher").await;
    let lesson: i64 =
        sqlx::query_scalar("INSERT INTO lessons (teacher_id, title) VALUES ($1, 'Math') RETURNING id")
            .bind(teacher)
            .fetch_one(pool)
            .await
            .unwrap();

    let exam = store
        .insert_exam(NewExam {
            lesson_id: lesson,
            teacher_id: teacher,
            title: title.to_string(),
            description: None,
            duration: 60,
            started_at: now(),
            finished_at: now() + Duration::minutes(60),
        })
        .await
        .unwrap();

    (teacher, exam.id)
}

#[tokio::test]
#[ignore]
async fn attach_is_a_union_of_accepted_questions() {
    let pool = connect().await;
    let store = PgStore::new(pool.clone());
    let (_, exam_id) = seed_exam(&pool, &store, "Union").await;

    let (accepted, _, _) = insert_question(&pool, true).await;
    let (rejected, _, _) = insert_question(&pool, false).await;
    let (later, _, _) = insert_question(&pool, true).await;

    store
        .attach_accepted_questions(exam_id, &[accepted, rejected])
        .await
        .unwrap();
    store
        .attach_accepted_questions(exam_id, &[accepted, later])
        .await
        .unwrap();

    let detail = store.find_exam_detail(exam_id).await.unwrap().unwrap();
    let ids: Vec<i64> = detail.questions.iter().map(|q| q.question.id).collect();
    assert_eq!(ids, vec![accepted, later]);
    assert_eq!(detail.questions[0].answers.len(), 2);
}

#[tokio::test]
#[ignore]
async fn duplicate_session_is_a_conflict() {
    let pool = connect().await;
    let store = PgStore::new(pool.clone());
    let (_, exam_id) = seed_exam(&pool, &store, "Sessions").await;
    let student = insert_user(&pool, "Student", "student").await;

    let session = store.create_session(exam_id, student, now()).await.unwrap();
    let err = store
        .create_session(exam_id, student, now())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    assert!(store.finish_session(session.id, now()).await.unwrap());
    assert!(!store.finish_session(session.id, now()).await.unwrap());
}

#[tokio::test]
#[ignore]
async fn ingestion_grades_and_lists_results() {
    let pool = connect().await;
    let store = PgStore::new(pool.clone());
    let (teacher, exam_id) = seed_exam(&pool, &store, "Graded").await;
    let student = insert_user(&pool, "Student", "student").await;
    let (q1, q1_right, _) = insert_question(&pool, true).await;
    let (q2, _, q2_wrong) = insert_question(&pool, true).await;
    store
        .attach_accepted_questions(exam_id, &[q1, q2])
        .await
        .unwrap();

    let result = store
        .ingest_answers(
            &IngestAnswers {
                student_id: student,
                exam_id,
                answers: vec![
                    SubmittedAnswer {
                        question_id: q1,
                        answer_id: Some(q1_right),
                    },
                    SubmittedAnswer {
                        question_id: q2,
                        answer_id: Some(q2_wrong),
                    },
                ],
            },
            now(),
        )
        .await
        .unwrap();
    assert_eq!(result.score, 1);
    assert_eq!(result.total_questions, 2);

    let row = store.find_result(student, exam_id).await.unwrap().unwrap();
    assert_eq!(row.teacher_id, teacher);
    assert_eq!(row.exam_title, "Graded");

    let page = store
        .list_results(student, PageRequest::new(None, 10))
        .await
        .unwrap();
    assert_eq!(page.total, 1);
}

#[tokio::test]
#[ignore]
async fn title_filter_treats_wildcards_literally() {
    let pool = connect().await;
    let store = PgStore::new(pool.clone());
    let marker = format!("pct_{}", Utc::now().timestamp_nanos_opt().unwrap_or_default());
    seed_exam(&pool, &store, &format!("{marker} 100% Done")).await;
    seed_exam(&pool, &store, &format!("{marker} 100 Done")).await;

    let page = store
        .list_exams(&ExamFilter {
            title: Some(format!("{} 100%", marker.to_uppercase())),
            order: SortOrder::Desc,
            page: PageRequest::new(None, 20),
        })
        .await
        .unwrap();
    assert_eq!(page.total, 1);
}
