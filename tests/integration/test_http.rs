//! Integration tests for the HTTP API over a real socket.
//!
//! Each test spawns the server on a free port with a deterministic content
//! generator and drives it with an HTTP client, including concurrent
//! requests against one session.

use std::collections::HashSet;
use std::net::TcpListener;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use codementor_orchestrator::{
    create_router, AppState, ChallengeText, CodeFeedback, Config, ContentGenerator, Language,
    LessonContent, Quiz, QuizQuestion, Result, SessionContext, Topic, SESSION_HEADER,
};
use futures::future::join_all;
use reqwest::StatusCode;
use serde_json::{json, Value};

/// Generator whose quizzes are always answered by choosing option 1.
#[derive(Default)]
struct StaticGenerator {
    delay: Option<Duration>,
}

impl StaticGenerator {
    const fn slow(delay: Duration) -> Self {
        Self { delay: Some(delay) }
    }

    async fn enter(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl ContentGenerator for StaticGenerator {
    async fn generate_lesson(&self, topic: &Topic, language: Language) -> Result<LessonContent> {
        self.enter().await;
        Ok(LessonContent {
            introduction: format!("Welcome to {}", topic.title),
            detailed_explanation: format!("{} explained for {language}", topic.title),
            code_examples: Vec::new(),
            tips: Vec::new(),
            summary: String::new(),
        })
    }

    async fn generate_quiz(&self, topic: &Topic, _language: Language, count: usize) -> Result<Quiz> {
        self.enter().await;
        Ok(Quiz {
            lesson_id: topic.id,
            questions: (0..count)
                .map(|i| QuizQuestion {
                    prompt: format!("Q{i}"),
                    choices: vec!["no".into(), "yes".into(), "maybe".into()],
                    correct_index: 1,
                    explanation: None,
                })
                .collect(),
        })
    }

    async fn generate_challenge(&self, topic: &Topic, language: Language) -> Result<ChallengeText> {
        self.enter().await;
        Ok(ChallengeText {
            title: format!("{} drill", topic.title),
            description: format!("Solve it in {language}"),
            requirements: Vec::new(),
            example_input: String::new(),
            example_output: String::new(),
            hints: Vec::new(),
        })
    }

    async fn answer_question(&self, question: &str, context: &SessionContext) -> Result<String> {
        self.enter().await;
        let lesson = context
            .lesson
            .as_ref()
            .map_or_else(|| "none".to_string(), |t| t.title.clone());
        Ok(format!("{question} (lesson: {lesson})"))
    }

    async fn evaluate_code(
        &self,
        code: &str,
        _challenge: &ChallengeText,
        _language: Language,
    ) -> Result<CodeFeedback> {
        self.enter().await;
        Ok(CodeFeedback {
            is_correct: code.contains("return"),
            score: 70,
            feedback: "Reviewed".into(),
            errors: Vec::new(),
            hints: Vec::new(),
            suggestions: Vec::new(),
        })
    }

    fn model_name(&self) -> &str {
        "static"
    }
}

/// Helper to find an available port for testing.
fn find_available_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .expect("Failed to bind to port")
        .local_addr()
        .expect("Failed to get local addr")
        .port()
}

/// Spawns the test server and returns its base URL.
async fn spawn_test_server(generator: StaticGenerator) -> (String, tokio::task::JoinHandle<()>) {
    let port = find_available_port();
    let addr = format!("127.0.0.1:{port}");

    let router = create_router(AppState::new(Config::default(), Arc::new(generator)));
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind");

    let handle = tokio::spawn(async move {
        axum::serve(listener, router).await.expect("Server failed");
    });

    // Give the server a moment to start
    tokio::time::sleep(Duration::from_millis(50)).await;

    (format!("http://{addr}"), handle)
}

/// Thin client that carries the session header.
#[derive(Clone)]
struct Learner {
    http: reqwest::Client,
    base: String,
    session: String,
}

impl Learner {
    async fn start(base: &str, language: &str) -> Self {
        let http = reqwest::Client::new();
        let response = http
            .post(format!("{base}/select-language"))
            .json(&json!({ "language": language }))
            .send()
            .await
            .expect("select-language request failed");
        assert_eq!(response.status(), StatusCode::OK);

        let header = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .expect("session header missing");
        let body: Value = response.json().await.expect("invalid JSON");
        assert_eq!(body["session_id"], header.as_str());

        Self {
            http,
            base: base.to_string(),
            session: header,
        }
    }

    async fn get(&self, path: &str) -> (StatusCode, Value) {
        let response = self
            .http
            .get(format!("{}{path}", self.base))
            .header(SESSION_HEADER, &self.session)
            .send()
            .await
            .expect("request failed");
        let status = response.status();
        (status, response.json().await.unwrap_or(Value::Null))
    }

    async fn post(&self, path: &str, body: Value) -> (StatusCode, Value) {
        let response = self
            .http
            .post(format!("{}{path}", self.base))
            .header(SESSION_HEADER, &self.session)
            .json(&body)
            .send()
            .await
            .expect("request failed");
        let status = response.status();
        (status, response.json().await.unwrap_or(Value::Null))
    }
}

// ----------------------------------------------------------------------------
// Full learner journey
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_learner_journey() {
    let (base, server) = spawn_test_server(StaticGenerator::default()).await;
    let learner = Learner::start(&base, "python").await;

    let (status, lesson) = learner.get("/lesson/1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(lesson["language"], "Python");

    let (status, quiz) = learner.get("/generate-quiz/1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(quiz["questions"].as_array().map(Vec::len), Some(5));

    // 3 of 5 correct meets the default 0.6 threshold
    let (status, grade) = learner
        .post("/submit-quiz", json!({"lesson_id": 1, "answers": [1, 1, 1, 0, 0]}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(grade["correct_answers"], 3);
    assert_eq!(grade["passed"], true);

    let (status, challenge) = learner.get("/generate-coding-challenge").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(challenge["topic_id"], 4);
    let challenge_id = challenge["challenge_id"].as_str().unwrap().to_string();

    let (status, review) = learner
        .post(
            "/submit-code",
            json!({"code": "def f():\n    return 1", "challenge_id": challenge_id}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(review["submission"], 1);
    assert_eq!(review["feedback"]["is_correct"], true);

    let (status, answer) = learner
        .post("/ask-tutor", json!({"question": "Why indent?"}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(answer["answer"], "Why indent? (lesson: Computer and operating system basics)");

    let (status, report) = learner.get("/session-status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["completed_lessons"], json!([1]));
    assert_eq!(report["total_lessons"], 14);
    assert_eq!(report["issued_challenges"][0]["submissions"], 1);
    assert_eq!(report["current_lesson"], 1);

    server.abort();
}

#[tokio::test]
async fn test_reselecting_language_resets_progress() {
    let (base, server) = spawn_test_server(StaticGenerator::default()).await;
    let learner = Learner::start(&base, "Go").await;

    learner.get("/generate-quiz/2").await;
    learner
        .post("/submit-quiz", json!({"lesson_id": 2, "answers": [1, 1, 1, 1, 1]}))
        .await;

    let (status, selection) = learner
        .post("/select-language", json!({"language": "Rust"}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(selection["session_id"], learner.session.as_str());

    let (_, report) = learner.get("/session-status").await;
    assert_eq!(report["language"], "Rust");
    assert_eq!(report["completed_lessons"], json!([]));
    assert_eq!(report["progress_percentage"], 0.0);

    server.abort();
}

#[tokio::test]
async fn test_sessions_are_isolated() {
    let (base, server) = spawn_test_server(StaticGenerator::default()).await;
    let alice = Learner::start(&base, "Java").await;
    let bob = Learner::start(&base, "PHP").await;
    assert_ne!(alice.session, bob.session);

    alice.get("/generate-quiz/3").await;
    let (status, _) = bob
        .post("/submit-quiz", json!({"lesson_id": 3, "answers": [1, 1, 1, 1, 1]}))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, challenge) = alice.get("/generate-coding-challenge?topic_id=8").await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = bob
        .post(
            "/submit-code",
            json!({"code": "return 0", "challenge_id": challenge["challenge_id"]}),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    server.abort();
}

// ----------------------------------------------------------------------------
// Concurrency on one session
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_concurrent_quiz_submissions_grade_once() {
    let (base, server) = spawn_test_server(StaticGenerator::default()).await;
    let learner = Learner::start(&base, "Rust").await;
    let (status, _) = learner.get("/generate-quiz/6").await;
    assert_eq!(status, StatusCode::OK);

    let submissions = (0..5).map(|_| {
        let learner = learner.clone();
        async move {
            learner
                .post("/submit-quiz", json!({"lesson_id": 6, "answers": [1, 1, 1, 1, 1]}))
                .await
                .0
        }
    });
    let statuses = join_all(submissions).await;

    let accepted = statuses.iter().filter(|s| **s == StatusCode::OK).count();
    let conflicts = statuses.iter().filter(|s| **s == StatusCode::CONFLICT).count();
    assert_eq!(accepted, 1);
    assert_eq!(conflicts, 4);

    server.abort();
}

#[tokio::test]
async fn test_concurrent_challenges_get_distinct_topics() {
    let (base, server) =
        spawn_test_server(StaticGenerator::slow(Duration::from_millis(20))).await;
    let learner = Learner::start(&base, "C#").await;

    let requests = (0..4).map(|_| {
        let learner = learner.clone();
        async move { learner.get("/generate-coding-challenge").await }
    });
    let responses = join_all(requests).await;

    let topics: HashSet<u64> = responses
        .iter()
        .filter(|(status, _)| *status == StatusCode::OK)
        .filter_map(|(_, body)| body["topic_id"].as_u64())
        .collect();
    assert_eq!(topics, HashSet::from([4, 8, 12]));

    let exhausted = responses
        .iter()
        .filter(|(status, _)| *status == StatusCode::CONFLICT)
        .count();
    assert_eq!(exhausted, 1);

    server.abort();
}

// ----------------------------------------------------------------------------
// Errors
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_unknown_session_is_rejected() {
    let (base, server) = spawn_test_server(StaticGenerator::default()).await;
    let response = reqwest::Client::new()
        .get(format!("{base}/lesson/1"))
        .header(SESSION_HEADER, "session_0")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["kind"], "state");

    server.abort();
}

#[tokio::test]
async fn test_answer_count_mismatch_keeps_quiz() {
    let (base, server) = spawn_test_server(StaticGenerator::default()).await;
    let learner = Learner::start(&base, "JavaScript").await;
    learner.get("/generate-quiz/7").await;

    let (status, body) = learner
        .post("/submit-quiz", json!({"lesson_id": 7, "answers": [1, 1]}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("Expected 5 answers"));

    let (status, _) = learner
        .post("/submit-quiz", json!({"lesson_id": 7, "answers": [1, 1, 1, 1, 1]}))
        .await;
    assert_eq!(status, StatusCode::OK);

    server.abort();
}
