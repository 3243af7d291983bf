// tests/session_tests.rs

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use exam_service::{
    config::Config,
    models::{exam::NewExam, user::Role},
    repositories::{ExamStore, MemoryStore},
    routes,
    state::AppState,
    utils::{clock::FixedClock, jwt::sign_jwt},
};
use serde_json::{Value, json};

const SECRET: &str = "session_test_secret";
const T0: i64 = 1_700_000_000;

struct TestApp {
    address: String,
    store: Arc<MemoryStore>,
    clock: Arc<FixedClock>,
    client: reqwest::Client,
}

/// A seeded exam: 60 minutes from T0 with two questions.
struct Seed {
    teacher: i64,
    student: i64,
    exam_id: i64,
    /// (question id, correct option id, wrong option id)
    questions: Vec<(i64, i64, i64)>,
}

impl TestApp {
    fn token(&self, user_id: i64, role: Role) -> String {
        format!("Bearer {}", sign_jwt(user_id, role, SECRET, 600).unwrap())
    }

    async fn get(&self, path: &str, user_id: i64, role: Role) -> reqwest::Response {
        self.client
            .get(format!("{}{}", self.address, path))
            .header("Authorization", self.token(user_id, role))
            .send()
            .await
            .expect("Failed to execute request")
    }

    async fn post(&self, path: &str, user_id: i64, role: Role, body: Value) -> reqwest::Response {
        self.client
            .post(format!("{}{}", self.address, path))
            .header("Authorization", self.token(user_id, role))
            .json(&body)
            .send()
            .await
            .expect("Failed to execute request")
    }

    fn at_minute(&self, minutes: i64) {
        self.clock.set(t0() + Duration::minutes(minutes));
    }

    async fn start(&self, seed: &Seed, student: i64) -> reqwest::Response {
        self.post(
            &format!("/api/exams/{}/start", seed.exam_id),
            student,
            Role::Student,
            json!({}),
        )
        .await
    }

    async fn finish(&self, seed: &Seed, student: i64, answers: Value) -> reqwest::Response {
        self.post(
            &format!("/api/exams/{}/finish", seed.exam_id),
            student,
            Role::Student,
            json!({ "answers": answers }),
        )
        .await
    }

    /// Polls the result endpoint until the ingestion worker has written it.
    async fn wait_for_result(&self, seed: &Seed, student: i64) -> Value {
        for _ in 0..100 {
            let response = self
                .get(
                    &format!("/api/exams/{}/result", seed.exam_id),
                    student,
                    Role::Student,
                )
                .await;
            if response.status().as_u16() == 200 {
                return response.json().await.unwrap();
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        panic!("Result was never produced");
    }
}

fn t0() -> DateTime<Utc> {
    DateTime::from_timestamp(T0, 0).unwrap()
}

async fn spawn_app() -> TestApp {
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(FixedClock::new(t0()));

    let config = Config {
        database_url: String::new(),
        jwt_secret: SECRET.to_string(),
        jwt_expiration: 600,
        rust_log: "error".to_string(),
        app_addr: "127.0.0.1:0".to_string(),
        exams_per_page: 20,
        results_per_page: 10,
        finish_grace_seconds: 0,
        ingestion_queue_capacity: 16,
        ingestion_status_retention_seconds: 3600,
    };

    let state = AppState::new(store.clone(), clock.clone(), config);
    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestApp {
        address: format!("http://127.0.0.1:{}", port),
        store,
        clock,
        client: reqwest::Client::new(),
    }
}

async fn seed_exam(app: &TestApp) -> Seed {
    let teacher = app.store.add_user("Mr. Karimi", Role::Teacher).await;
    let student = app.store.add_user("Sara", Role::Student).await;
    let lesson = app.store.add_lesson(teacher, "Mathematics").await;

    let exam = app
        .store
        .insert_exam(NewExam {
            lesson_id: lesson.id,
            teacher_id: teacher,
            title: "Final".to_string(),
            description: None,
            duration: 60,
            started_at: t0(),
            finished_at: t0() + Duration::minutes(60),
        })
        .await
        .unwrap();

    let mut questions = Vec::new();
    let mut ids = Vec::new();
    for body in ["2 + 2", "3 * 3"] {
        let q = app
            .store
            .add_question(body, true, &[("right", true), ("wrong", false)])
            .await;
        ids.push(q.question.id);
        questions.push((q.question.id, q.answers[0].id, q.answers[1].id));
    }
    app.store
        .attach_accepted_questions(exam.id, &ids)
        .await
        .unwrap();

    Seed {
        teacher,
        student,
        exam_id: exam.id,
        questions,
    }
}

#[tokio::test]
async fn full_exam_lifecycle_produces_a_graded_result() {
    let app = spawn_app().await;
    let seed = seed_exam(&app).await;
    app.at_minute(10);

    let start = app.start(&seed, seed.student).await;
    assert_eq!(start.status().as_u16(), 200);
    let quiz: Value = start.json().await.unwrap();
    assert_eq!(quiz["success"], true);
    let questions = quiz["data"]["questions"].as_array().unwrap();
    assert_eq!(questions.len(), 2);
    for question in questions {
        for option in question["answers"].as_array().unwrap() {
            assert!(option.get("is_correct").is_none(), "answer key leaked");
        }
    }

    app.at_minute(40);
    let (q1, q1_right, _) = seed.questions[0];
    let (q2, _, q2_wrong) = seed.questions[1];
    let finish = app
        .finish(
            &seed,
            seed.student,
            json!([
                {"question_id": q1, "answer_id": q1_right},
                {"question_id": q2, "answer_id": q2_wrong}
            ]),
        )
        .await;
    assert_eq!(finish.status().as_u16(), 200);
    let body: Value = finish.json().await.unwrap();
    assert_eq!(body["message"], "Your exam has been submitted successfully");
    assert_eq!(body["data"], json!([]));

    let result = app.wait_for_result(&seed, seed.student).await;
    assert_eq!(result["data"]["score"], 1);
    assert_eq!(result["data"]["total_questions"], 2);
    assert_eq!(result["data"]["percentage"], 50.0);
    assert_eq!(result["data"]["exam"]["title"], "Final");
    assert_eq!(result["data"]["exam"]["teacher"]["id"], seed.teacher);
    assert_eq!(result["data"]["exam"]["teacher"]["name"], "Mr. Karimi");

    let all: Value = app
        .get("/api/results", seed.student, Role::Student)
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(all["data"]["per_page"], 10);
    assert_eq!(all["data"]["total"], 1);

    let stored = app.store.student_answers(seed.student, seed.exam_id).await;
    assert_eq!(stored.len(), 2);
}

#[tokio::test]
async fn start_is_gated_by_the_exam_window() {
    let app = spawn_app().await;
    let seed = seed_exam(&app).await;

    app.at_minute(-1);
    let early = app.start(&seed, seed.student).await;
    assert_eq!(early.status().as_u16(), 422);
    let body: Value = early.json().await.unwrap();
    assert_eq!(body["message"], "The exam has not started yet");

    app.at_minute(61);
    let late = app.start(&seed, seed.student).await;
    assert_eq!(late.status().as_u16(), 422);
    let body: Value = late.json().await.unwrap();
    assert_eq!(body["message"], "The exam time is over");

    app.at_minute(60);
    let last_moment = app.start(&seed, seed.student).await;
    assert_eq!(last_moment.status().as_u16(), 200);
}

#[tokio::test]
async fn second_start_is_rejected() {
    let app = spawn_app().await;
    let seed = seed_exam(&app).await;
    app.at_minute(5);

    assert_eq!(app.start(&seed, seed.student).await.status().as_u16(), 200);

    let again = app.start(&seed, seed.student).await;
    assert_eq!(again.status().as_u16(), 422);
    let body: Value = again.json().await.unwrap();
    assert_eq!(body["message"], "You have already started this exam");
}

#[tokio::test]
async fn concurrent_starts_open_exactly_one_session() {
    let app = Arc::new(spawn_app().await);
    let seed = Arc::new(seed_exam(&app).await);
    app.at_minute(5);

    let mut handles = Vec::new();
    for _ in 0..8 {
        let app = app.clone();
        let seed = seed.clone();
        handles.push(tokio::spawn(async move {
            app.start(&seed, seed.student).await.status().as_u16()
        }));
    }

    let mut ok = 0;
    for handle in handles {
        match handle.await.unwrap() {
            200 => ok += 1,
            409 | 422 => {}
            other => panic!("unexpected status {}", other),
        }
    }
    assert_eq!(ok, 1);
}

#[tokio::test]
async fn finish_without_start_is_not_found() {
    let app = spawn_app().await;
    let seed = seed_exam(&app).await;
    app.at_minute(5);

    let (q1, right, _) = seed.questions[0];
    let response = app
        .finish(&seed, seed.student, json!([{"question_id": q1, "answer_id": right}]))
        .await;
    assert_eq!(response.status().as_u16(), 404);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn second_finish_is_rejected() {
    let app = spawn_app().await;
    let seed = seed_exam(&app).await;
    app.at_minute(5);
    app.start(&seed, seed.student).await;

    let (q1, right, _) = seed.questions[0];
    let answers = json!([{"question_id": q1, "answer_id": right}]);

    app.at_minute(20);
    assert_eq!(
        app.finish(&seed, seed.student, answers.clone()).await.status().as_u16(),
        200
    );

    app.at_minute(25);
    let again = app.finish(&seed, seed.student, answers).await;
    assert_eq!(again.status().as_u16(), 422);
    let body: Value = again.json().await.unwrap();
    assert_eq!(body["message"], "You have already finished this exam");
}

#[tokio::test]
async fn finish_after_close_is_rejected() {
    let app = spawn_app().await;
    let seed = seed_exam(&app).await;
    app.at_minute(50);
    app.start(&seed, seed.student).await;

    app.at_minute(61);
    let (q1, right, _) = seed.questions[0];
    let response = app
        .finish(&seed, seed.student, json!([{"question_id": q1, "answer_id": right}]))
        .await;
    assert_eq!(response.status().as_u16(), 422);
}

#[tokio::test]
async fn finish_requires_answers() {
    let app = spawn_app().await;
    let seed = seed_exam(&app).await;
    app.at_minute(5);
    app.start(&seed, seed.student).await;

    let response = app.finish(&seed, seed.student, json!([])).await;
    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn result_is_not_found_before_grading() {
    let app = spawn_app().await;
    let seed = seed_exam(&app).await;
    app.at_minute(5);
    app.start(&seed, seed.student).await;

    let response = app
        .get(
            &format!("/api/exams/{}/result", seed.exam_id),
            seed.student,
            Role::Student,
        )
        .await;
    assert_eq!(response.status().as_u16(), 404);

    let all: Value = app
        .get("/api/results", seed.student, Role::Student)
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(all["data"]["total"], 0);
    assert_eq!(all["data"]["data"], json!([]));
}

#[tokio::test]
async fn teachers_cannot_take_exams() {
    let app = spawn_app().await;
    let seed = seed_exam(&app).await;
    app.at_minute(5);

    let response = app
        .post(
            &format!("/api/exams/{}/start", seed.exam_id),
            seed.teacher,
            Role::Teacher,
            json!({}),
        )
        .await;
    assert_eq!(response.status().as_u16(), 403);
}

#[tokio::test]
async fn unknown_exam_cannot_be_started() {
    let app = spawn_app().await;
    let seed = seed_exam(&app).await;

    let response = app
        .post("/api/exams/999999/start", seed.student, Role::Student, json!({}))
        .await;
    assert_eq!(response.status().as_u16(), 404);
}
