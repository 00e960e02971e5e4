//! Scripted content generator for unit tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use codementor_llm::{LlmError, LlmErrorKind};

use crate::content::{ChallengeText, CodeFeedback, CodeExample, LessonContent, Quiz, QuizQuestion};
use crate::curriculum::Topic;
use crate::error::{Result, TutorError};
use crate::generator::ContentGenerator;
use crate::language::Language;
use crate::session::SessionContext;

/// Correct answer indices the fake uses for every quiz.
pub const CORRECT: [usize; 5] = [0, 2, 1, 0, 3];

/// Deterministic generator with a failure switch.
#[derive(Debug, Default)]
pub struct FakeGenerator {
    failing: AtomicBool,
    quiz_size_override: Mutex<Option<usize>>,
    delay: Mutex<Option<Duration>>,
    calls: AtomicUsize,
    last_context: Mutex<Option<SessionContext>>,
}

impl FakeGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent call fail with a transient service error.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Forces quizzes to have `size` questions regardless of the request.
    pub fn set_quiz_size(&self, size: Option<usize>) {
        *self.quiz_size_override.lock().unwrap_or_else(std::sync::PoisonError::into_inner) = size;
    }

    /// Delays every call, to widen race windows.
    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.lock().unwrap_or_else(std::sync::PoisonError::into_inner) = delay;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_context(&self) -> Option<SessionContext> {
        self.last_context
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    async fn enter(&self, what: &'static str) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(TutorError::generation(
                what,
                LlmError::api(LlmErrorKind::Server, Some(503), "service unavailable"),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl ContentGenerator for FakeGenerator {
    async fn generate_lesson(&self, topic: &Topic, language: Language) -> Result<LessonContent> {
        self.enter("lesson").await?;
        Ok(LessonContent {
            introduction: format!("{} in {language}", topic.title),
            detailed_explanation: topic.description.clone(),
            code_examples: vec![CodeExample {
                title: "Example".into(),
                code: "print(1)".into(),
                explanation: "Prints one".into(),
            }],
            tips: vec!["Practice daily".into()],
            summary: "Summary".into(),
        })
    }

    async fn generate_quiz(
        &self,
        topic: &Topic,
        _language: Language,
        count: usize,
    ) -> Result<Quiz> {
        self.enter("quiz").await?;
        let size = self
            .quiz_size_override
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .unwrap_or(count);
        Ok(Quiz {
            lesson_id: topic.id,
            questions: (0..size)
                .map(|i| QuizQuestion {
                    prompt: format!("Question {} on {}", i + 1, topic.title),
                    choices: vec!["a".into(), "b".into(), "c".into(), "d".into()],
                    correct_index: CORRECT[i % CORRECT.len()],
                    explanation: Some("Explained".into()),
                })
                .collect(),
        })
    }

    async fn generate_challenge(&self, topic: &Topic, language: Language) -> Result<ChallengeText> {
        self.enter("challenge").await?;
        Ok(ChallengeText {
            title: format!("Challenge on {}", topic.title),
            description: format!("Write a {language} program"),
            requirements: vec!["Read input".into()],
            example_input: "1".into(),
            example_output: "2".into(),
            hints: vec!["Think small".into()],
        })
    }

    async fn answer_question(&self, question: &str, context: &SessionContext) -> Result<String> {
        self.enter("tutor answer").await?;
        *self
            .last_context
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = Some(context.clone());
        Ok(format!("Answer to: {question}"))
    }

    async fn evaluate_code(
        &self,
        code: &str,
        challenge: &ChallengeText,
        _language: Language,
    ) -> Result<CodeFeedback> {
        self.enter("code feedback").await?;
        Ok(CodeFeedback {
            is_correct: !code.trim().is_empty(),
            score: 80,
            feedback: format!("Reviewed against {}", challenge.title),
            errors: Vec::new(),
            hints: Vec::new(),
            suggestions: vec!["Add comments".into()],
        })
    }

    fn model_name(&self) -> &str {
        "fake"
    }
}
