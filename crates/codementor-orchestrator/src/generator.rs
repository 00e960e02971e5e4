//! Content generation adapter.
//!
//! [`ContentGenerator`] is the narrow, typed contract the orchestrator uses to
//! obtain lessons, quizzes, challenges, tutor answers, and code feedback.
//! [`LlmContentGenerator`] implements it on top of any
//! [`CompletionBackend`]: it builds the prompt, bounds the call with a
//! timeout, parses the reply into a strict schema, and retries once on
//! transient or malformed output. Anything it cannot parse and validate is
//! reported as `GenerationUnavailable`; it never returns placeholder content.

use std::time::Duration;

use async_trait::async_trait;
use codementor_llm::{parse_json_object, CompletionBackend, LlmError};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::Config;
use crate::content::{ChallengeText, CodeFeedback, LessonContent, Quiz, QuizQuestion};
use crate::curriculum::Topic;
use crate::error::{Result, TutorError};
use crate::language::Language;
use crate::session::SessionContext;

/// Typed access to the external generation service.
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    /// Produces explanatory content for `topic` in `language`.
    async fn generate_lesson(&self, topic: &Topic, language: Language) -> Result<LessonContent>;

    /// Produces exactly `count` multiple-choice questions on `topic`.
    async fn generate_quiz(&self, topic: &Topic, language: Language, count: usize)
        -> Result<Quiz>;

    /// Produces a coding exercise on `topic` for `language`.
    async fn generate_challenge(&self, topic: &Topic, language: Language) -> Result<ChallengeText>;

    /// Answers a learner's question using the session context.
    async fn answer_question(&self, question: &str, context: &SessionContext) -> Result<String>;

    /// Reviews submitted code against a challenge. Advisory only; nothing is executed.
    async fn evaluate_code(
        &self,
        code: &str,
        challenge: &ChallengeText,
        language: Language,
    ) -> Result<CodeFeedback>;

    /// Name of the model behind this generator.
    fn model_name(&self) -> &str;
}

// ============================================================================
// Wire shapes
// ============================================================================

#[derive(Debug, Deserialize)]
struct WireQuiz {
    questions: Vec<WireQuestion>,
}

#[derive(Debug, Deserialize)]
struct WireQuestion {
    question: String,
    options: Vec<String>,
    correct_answer: usize,
    #[serde(default)]
    explanation: Option<String>,
}

impl WireQuiz {
    fn into_quiz(self, lesson_id: u32) -> Quiz {
        Quiz {
            lesson_id,
            questions: self
                .questions
                .into_iter()
                .map(|q| QuizQuestion {
                    prompt: q.question,
                    choices: q.options,
                    correct_index: q.correct_answer,
                    explanation: q.explanation.filter(|e| !e.trim().is_empty()),
                })
                .collect(),
        }
    }
}

fn parse_lesson(text: &str) -> codementor_llm::Result<LessonContent> {
    let lesson: LessonContent = parse_json_object(text)?;
    lesson.validate().map_err(LlmError::malformed)?;
    Ok(lesson)
}

fn parse_quiz(text: &str, lesson_id: u32, count: usize) -> codementor_llm::Result<Quiz> {
    let wire: WireQuiz = parse_json_object(text)?;
    let quiz = wire.into_quiz(lesson_id);
    quiz.validate(count).map_err(LlmError::malformed)?;
    Ok(quiz)
}

fn parse_challenge(text: &str) -> codementor_llm::Result<ChallengeText> {
    let challenge: ChallengeText = parse_json_object(text)?;
    challenge.validate().map_err(LlmError::malformed)?;
    Ok(challenge)
}

fn parse_feedback(text: &str) -> codementor_llm::Result<CodeFeedback> {
    let feedback: CodeFeedback = parse_json_object(text)?;
    feedback.validate().map_err(LlmError::malformed)?;
    Ok(feedback)
}

fn parse_answer(text: &str) -> codementor_llm::Result<String> {
    let answer = text.trim();
    if answer.is_empty() {
        return Err(LlmError::malformed("tutor answer is empty"));
    }
    Ok(answer.to_string())
}

// ============================================================================
// LlmContentGenerator
// ============================================================================

/// [`ContentGenerator`] backed by a text completion service.
#[derive(Debug)]
pub struct LlmContentGenerator<B> {
    backend: B,
    content_language: String,
    request_timeout: Duration,
    retry_on_transient: bool,
}

impl<B: CompletionBackend> LlmContentGenerator<B> {
    /// Creates a generator writing prose in `content_language`.
    ///
    /// Calls time out after 60 seconds and are retried once on transient
    /// failure.
    #[must_use]
    pub fn new(backend: B, content_language: impl Into<String>) -> Self {
        Self {
            backend,
            content_language: content_language.into(),
            request_timeout: Duration::from_secs(60),
            retry_on_transient: true,
        }
    }

    /// Creates a generator tuned by `config`.
    #[must_use]
    pub fn from_config(backend: B, config: &Config) -> Self {
        Self::new(backend, config.content_language.clone())
            .with_request_timeout(Duration::from_secs(config.generator.request_timeout_secs))
            .with_retry(config.generator.retry_on_transient)
    }

    /// Sets the upper bound on a single generation call.
    #[must_use]
    pub const fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Enables or disables the single retry.
    #[must_use]
    pub const fn with_retry(mut self, retry_on_transient: bool) -> Self {
        self.retry_on_transient = retry_on_transient;
        self
    }

    /// The wrapped backend.
    #[must_use]
    pub const fn backend(&self) -> &B {
        &self.backend
    }

    async fn complete_once(&self, prompt: &str) -> codementor_llm::Result<String> {
        tokio::time::timeout(self.request_timeout, self.backend.complete(prompt))
            .await
            .map_err(|_| LlmError::Timeout {
                timeout_secs: self.request_timeout.as_secs(),
            })?
    }

    /// Runs `prompt` and parses the reply, retrying once if allowed.
    async fn request<T, F>(&self, what: &'static str, prompt: &str, parse: F) -> Result<T>
    where
        T: Send,
        F: Fn(&str) -> codementor_llm::Result<T> + Send + Sync,
    {
        let max_attempts = if self.retry_on_transient { 2 } else { 1 };
        let mut attempt = 1;

        loop {
            let result = match self.complete_once(prompt).await {
                Ok(text) => {
                    debug!(what, attempt, response_len = text.len(), "Generation response received");
                    parse(&text)
                }
                Err(e) => Err(e),
            };

            match result {
                Ok(value) => return Ok(value),
                Err(e) if attempt < max_attempts && (e.is_transient() || e.is_malformed()) => {
                    warn!(what, attempt, error = %e, "Generation failed, retrying");
                    attempt += 1;
                }
                Err(e) => {
                    warn!(what, attempt, error = %e, "Generation unavailable");
                    return Err(TutorError::generation(what, e));
                }
            }
        }
    }

    fn lesson_prompt(&self, topic: &Topic, language: Language) -> String {
        format!(
            r#"You are an expert programming teacher for complete beginners.
Write lesson {id} of a {language} course: "{title}".
The lesson covers: {description}

Write all prose in {content_language}. Keep code, identifiers, and code comments in {language}.
Use simple language and practical examples.

Respond with a single JSON object and nothing else:
{{
  "introduction": "short introduction to the topic",
  "detailed_explanation": "detailed explanation",
  "code_examples": [
    {{"title": "example title", "code": "example code", "explanation": "what the code does"}}
  ],
  "tips": ["practical tip"],
  "summary": "lesson summary"
}}"#,
            id = topic.id,
            title = topic.title,
            description = topic.description,
            content_language = self.content_language,
        )
    }

    fn quiz_prompt(&self, topic: &Topic, language: Language, count: usize) -> String {
        format!(
            r#"Write a multiple-choice quiz with exactly {count} questions about "{title}" in {language}.
The lesson covered: {description}

Write all prose in {content_language}. Every question has four options and exactly one correct option.
"correct_answer" is the zero-based index of the correct option.

Respond with a single JSON object and nothing else:
{{
  "questions": [
    {{
      "question": "question text",
      "options": ["option 1", "option 2", "option 3", "option 4"],
      "correct_answer": 0,
      "explanation": "why this answer is correct"
    }}
  ]
}}"#,
            title = topic.title,
            description = topic.description,
            content_language = self.content_language,
        )
    }

    fn challenge_prompt(&self, topic: &Topic, language: Language) -> String {
        format!(
            r#"Write a beginner-level {language} coding challenge for a learner who has just finished
lesson {id}, "{title}", and every lesson before it.
The challenge should be practical, solvable in a single file, and exercise what the lessons taught.

Write all prose in {content_language}.

Respond with a single JSON object and nothing else:
{{
  "title": "challenge title",
  "description": "detailed description of the problem",
  "requirements": ["requirement"],
  "example_input": "sample input",
  "example_output": "expected output",
  "hints": ["hint"]
}}"#,
            id = topic.id,
            title = topic.title,
            content_language = self.content_language,
        )
    }

    fn feedback_prompt(&self, code: &str, challenge: &ChallengeText, language: Language) -> String {
        format!(
            r#"You are reviewing a beginner's {language} solution to this challenge:

{challenge}
Submitted code:
```
{code}
```

Judge whether the code solves the challenge, point out mistakes, and give hints without writing the full solution.
Write all prose in {content_language}. "score" is an integer from 0 to 100.

Respond with a single JSON object and nothing else:
{{
  "is_correct": true,
  "score": 85,
  "feedback": "overall feedback",
  "errors": ["mistake"],
  "hints": ["hint"],
  "suggestions": ["improvement"]
}}"#,
            challenge = challenge.prompt_text(),
            content_language = self.content_language,
        )
    }

    fn tutor_prompt(&self, question: &str, context: &SessionContext) -> String {
        let lesson = context.lesson.as_ref().map_or_else(
            || "The learner has not opened a lesson yet.".to_string(),
            |topic| {
                format!(
                    "The learner is currently on lesson {}: \"{}\" ({}).",
                    topic.id, topic.title, topic.description
                )
            },
        );

        format!(
            r"You are a patient {language} tutor for beginners.
{lesson}
The learner has completed {completed} lessons.

Answer the learner's question clearly and simply, with a short code example when it helps.
Stay within what a beginner at this stage can follow. Write the answer in {content_language}.

Question: {question}",
            language = context.language,
            completed = context.completed_lesson_ids.len(),
            content_language = self.content_language,
        )
    }
}

#[async_trait]
impl<B: CompletionBackend> ContentGenerator for LlmContentGenerator<B> {
    async fn generate_lesson(&self, topic: &Topic, language: Language) -> Result<LessonContent> {
        let prompt = self.lesson_prompt(topic, language);
        self.request("lesson", &prompt, parse_lesson).await
    }

    async fn generate_quiz(
        &self,
        topic: &Topic,
        language: Language,
        count: usize,
    ) -> Result<Quiz> {
        let prompt = self.quiz_prompt(topic, language, count);
        let lesson_id = topic.id;
        self.request("quiz", &prompt, |text| parse_quiz(text, lesson_id, count))
            .await
    }

    async fn generate_challenge(&self, topic: &Topic, language: Language) -> Result<ChallengeText> {
        let prompt = self.challenge_prompt(topic, language);
        self.request("challenge", &prompt, parse_challenge).await
    }

    async fn answer_question(&self, question: &str, context: &SessionContext) -> Result<String> {
        let prompt = self.tutor_prompt(question, context);
        self.request("tutor answer", &prompt, parse_answer).await
    }

    async fn evaluate_code(
        &self,
        code: &str,
        challenge: &ChallengeText,
        language: Language,
    ) -> Result<CodeFeedback> {
        let prompt = self.feedback_prompt(code, challenge, language);
        self.request("code feedback", &prompt, parse_feedback).await
    }

    fn model_name(&self) -> &str {
        self.backend.model()
    }
}
