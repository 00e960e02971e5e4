//! Integration tests for the orchestrator driving the real generation adapter.
//!
//! A scripted completion backend stands in for the remote model, so these
//! tests cover prompt-to-session behavior end to end: reply cleanup, schema
//! validation, the single retry, and that failed generations leave the
//! session untouched.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use codementor_llm::{CompletionBackend, LlmError, LlmErrorKind};
use codementor_orchestrator::{
    Config, ErrorKind, LlmContentGenerator, Orchestrator, SessionPhase, TutorError,
};

/// Completion backend that replays canned replies in order.
#[derive(Clone, Default)]
struct ScriptedBackend {
    replies: Arc<Mutex<VecDeque<codementor_llm::Result<String>>>>,
    prompts: Arc<Mutex<Vec<String>>>,
    calls: Arc<AtomicUsize>,
    delay: Arc<Mutex<Option<Duration>>>,
}

impl ScriptedBackend {
    fn push(&self, reply: codementor_llm::Result<String>) {
        self.replies.lock().unwrap().push_back(reply);
    }

    fn push_ok(&self, reply: impl Into<String>) {
        self.push(Ok(reply.into()));
    }

    fn stall(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn last_prompt(&self) -> String {
        self.prompts.lock().unwrap().last().cloned().unwrap_or_default()
    }
}

#[async_trait]
impl CompletionBackend for ScriptedBackend {
    async fn complete(&self, prompt: &str) -> codementor_llm::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::malformed("no scripted reply left")))
    }

    fn model(&self) -> &str {
        "scripted-model"
    }
}

fn setup() -> (Orchestrator, ScriptedBackend) {
    let backend = ScriptedBackend::default();
    let config = Config::default();
    let generator = LlmContentGenerator::from_config(backend.clone(), &config);
    (Orchestrator::new(config, Arc::new(generator)), backend)
}

fn setup_with_timeout(timeout: Duration) -> (Orchestrator, ScriptedBackend) {
    let backend = ScriptedBackend::default();
    let config = Config::default();
    let generator =
        LlmContentGenerator::from_config(backend.clone(), &config).with_request_timeout(timeout);
    (Orchestrator::new(config, Arc::new(generator)), backend)
}

async fn start(orchestrator: &Orchestrator, language: &str) -> String {
    orchestrator
        .select_language(None, language)
        .await
        .expect("language selection should succeed")
        .session_id
}

fn quiz_reply(count: usize) -> String {
    let questions: Vec<_> = (0..count)
        .map(|i| {
            serde_json::json!({
                "question": format!("Question {}", i + 1),
                "options": ["w", "x", "y", "z"],
                "correct_answer": i % 4,
                "explanation": "Because."
            })
        })
        .collect();
    serde_json::json!({ "questions": questions }).to_string()
}

const LESSON_REPLY: &str = r#"```json
{
  "introduction": "Variables hold values.",
  "detailed_explanation": "A variable is a name bound to a value.",
  "code_examples": [
    {"title": "Assignment", "code": "x = 1", "explanation": "Binds x to 1"}
  ],
  "tips": ["Use descriptive names"],
  "summary": "Variables name values."
}
```"#;

const CHALLENGE_REPLY: &str = r#"Here is your challenge:
{"title": "Sum two numbers", "description": "Read two integers and print their sum.",
 "requirements": ["Read from stdin"], "example_input": "2 3", "example_output": "5",
 "hints": ["Split the line"]}"#;

const FEEDBACK_REPLY: &str = r#"{"is_correct": true, "score": 92, "feedback": "Works well.",
 "errors": [], "hints": [], "suggestions": ["Handle bad input"]}"#;

// ----------------------------------------------------------------------------
// Lessons
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_fenced_lesson_reply_is_parsed() {
    let (orchestrator, backend) = setup();
    let session = start(&orchestrator, "Python").await;
    backend.push_ok(LESSON_REPLY);

    let lesson = orchestrator.get_lesson(&session, 2).await.unwrap();

    assert_eq!(lesson.topic.id, 2);
    assert_eq!(lesson.content.introduction, "Variables hold values.");
    assert_eq!(lesson.content.code_examples.len(), 1);
    assert_eq!(backend.calls(), 1);

    let prompt = backend.last_prompt();
    assert!(prompt.contains("Python"));
    assert!(prompt.contains("Arabic"));
}

#[tokio::test]
async fn test_transient_failure_is_retried_once() {
    let (orchestrator, backend) = setup();
    let session = start(&orchestrator, "Go").await;
    backend.push(Err(LlmError::api(
        LlmErrorKind::RateLimit,
        Some(429),
        "slow down",
    )));
    backend.push_ok(LESSON_REPLY);

    let lesson = orchestrator.get_lesson(&session, 1).await.unwrap();
    assert_eq!(lesson.topic.id, 1);
    assert_eq!(backend.calls(), 2);
}

#[tokio::test]
async fn test_authentication_failure_is_not_retried() {
    let (orchestrator, backend) = setup();
    let session = start(&orchestrator, "Go").await;
    backend.push(Err(LlmError::api(
        LlmErrorKind::Authentication,
        Some(401),
        "bad key",
    )));

    let err = orchestrator.get_lesson(&session, 1).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Generation);
    assert!(!err.is_transient());
    assert_eq!(backend.calls(), 1);

    let status = orchestrator.session_status(&session).await.unwrap();
    assert_eq!(status.current_lesson, None);
    assert_eq!(status.phase, SessionPhase::LanguageSelected);
}

#[tokio::test]
async fn test_timed_out_lesson_keeps_previous_lesson() {
    let (orchestrator, backend) = setup_with_timeout(Duration::from_millis(50));
    let session = start(&orchestrator, "Python").await;
    backend.push_ok(LESSON_REPLY);
    orchestrator.get_lesson(&session, 2).await.unwrap();

    backend.stall(Duration::from_millis(300));
    backend.push_ok(LESSON_REPLY);
    backend.push_ok(LESSON_REPLY);
    let err = orchestrator.get_lesson(&session, 3).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Generation);

    let status = orchestrator.session_status(&session).await.unwrap();
    assert_eq!(status.current_lesson, Some(2));
    assert_eq!(status.phase, SessionPhase::LessonInProgress { lesson_id: 2 });
}

#[tokio::test]
async fn test_timed_out_quiz_is_not_cached() {
    let (orchestrator, backend) = setup_with_timeout(Duration::from_millis(50));
    let session = start(&orchestrator, "Rust").await;
    backend.stall(Duration::from_millis(300));
    backend.push_ok(quiz_reply(5));
    backend.push_ok(quiz_reply(5));

    let err = orchestrator.generate_quiz(&session, 3).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Generation);

    let status = orchestrator.session_status(&session).await.unwrap();
    assert!(status.outstanding_quizzes.is_empty());
}

// ----------------------------------------------------------------------------
// Quizzes
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_malformed_quiz_then_valid_quiz() {
    let (orchestrator, backend) = setup();
    let session = start(&orchestrator, "Rust").await;
    backend.push_ok("I'm sorry, I cannot produce JSON today.");
    backend.push_ok(quiz_reply(5));

    let quiz = orchestrator.generate_quiz(&session, 3).await.unwrap();
    assert_eq!(quiz.questions.len(), 5);
    assert_eq!(backend.calls(), 2);

    let grade = orchestrator
        .submit_quiz(&session, 3, &[0, 1, 2, 3, 0])
        .await
        .unwrap();
    assert!((grade.score - 1.0).abs() < f64::EPSILON);
    assert!(grade.passed);
}

#[tokio::test]
async fn test_wrong_question_count_is_never_cached() {
    let (orchestrator, backend) = setup();
    let session = start(&orchestrator, "Rust").await;
    backend.push_ok(quiz_reply(3));
    backend.push_ok(quiz_reply(7));

    let err = orchestrator.generate_quiz(&session, 3).await.unwrap_err();
    assert!(matches!(err, TutorError::GenerationUnavailable { what: "quiz", .. }));
    assert_eq!(backend.calls(), 2);

    let status = orchestrator.session_status(&session).await.unwrap();
    assert!(status.outstanding_quizzes.is_empty());

    let err = orchestrator
        .submit_quiz(&session, 3, &[0, 0, 0])
        .await
        .unwrap_err();
    assert!(matches!(err, TutorError::NoSuchQuiz { lesson_id: 3 }));
}

#[tokio::test]
async fn test_out_of_range_correct_answer_is_rejected() {
    let (orchestrator, backend) = setup();
    let session = start(&orchestrator, "Java").await;
    let mut bad: serde_json::Value = serde_json::from_str(&quiz_reply(5)).unwrap();
    bad["questions"][2]["correct_answer"] = serde_json::json!(9);
    backend.push_ok(bad.to_string());
    backend.push_ok(bad.to_string());

    let err = orchestrator.generate_quiz(&session, 1).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Generation);
}

// ----------------------------------------------------------------------------
// Challenges, code review, tutor
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_challenge_and_code_review() {
    let (orchestrator, backend) = setup();
    let session = start(&orchestrator, "C++").await;
    backend.push_ok(CHALLENGE_REPLY);

    let challenge = orchestrator.generate_challenge(&session, None).await.unwrap();
    assert_eq!(challenge.topic_id, 4);
    assert!(challenge.challenge_id.starts_with("challenge_4_"));
    assert!(challenge.prompt.contains("### Requirements"));
    assert!(challenge.prompt.contains("Input: 2 3"));

    backend.push_ok(FEEDBACK_REPLY);
    let review = orchestrator
        .submit_code(&session, "print(sum(map(int, input().split())))", &challenge.challenge_id)
        .await
        .unwrap();
    assert_eq!(review.submission, 1);
    assert_eq!(review.feedback.score, 92);
    assert!(backend.last_prompt().contains("Sum two numbers"));
}

#[tokio::test]
async fn test_feedback_score_over_100_is_rejected() {
    let (orchestrator, backend) = setup();
    let session = start(&orchestrator, "C++").await;
    backend.push_ok(CHALLENGE_REPLY);
    let challenge = orchestrator.generate_challenge(&session, Some(8)).await.unwrap();

    let bad = FEEDBACK_REPLY.replace("92", "250");
    backend.push_ok(bad.clone());
    backend.push_ok(bad);

    let err = orchestrator
        .submit_code(&session, "int main() {}", &challenge.challenge_id)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Generation);

    let status = orchestrator.session_status(&session).await.unwrap();
    assert_eq!(status.issued_challenges[0].submissions, 0);
}

#[tokio::test]
async fn test_tutor_prompt_includes_current_lesson() {
    let (orchestrator, backend) = setup();
    let session = start(&orchestrator, "JavaScript").await;
    backend.push_ok(LESSON_REPLY);
    orchestrator.get_lesson(&session, 5).await.unwrap();

    backend.push_ok("  A loop repeats code.  ");
    let answer = orchestrator
        .ask_tutor(&session, "What does a loop do?")
        .await
        .unwrap();

    assert_eq!(answer.answer, "A loop repeats code.");
    assert_eq!(answer.lesson_id, Some(5));
    let prompt = backend.last_prompt();
    assert!(prompt.contains("What does a loop do?"));
    assert!(prompt.contains("JavaScript"));
}

#[tokio::test]
async fn test_model_name_comes_from_backend() {
    let (orchestrator, _) = setup();
    assert_eq!(orchestrator.model_name(), "scripted-model");
}
