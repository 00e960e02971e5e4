//! The session orchestrator.
//!
//! [`Orchestrator`] composes the curriculum, the content generator, and the
//! session store into the learner-facing operations. Every operation that
//! touches a session holds that session's lock for its whole duration,
//! including the generation call, and commits changes only after generation
//! succeeds. A failed or timed-out call therefore leaves the session exactly
//! as it was.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use codementor_llm::LlmError;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::{Config, MissingSessionPolicy};
use crate::content::{ChallengeText, CodeFeedback, LessonContent, QuestionResult, QuestionView};
use crate::curriculum::{Curriculum, Topic};
use crate::error::{Result, TutorError};
use crate::generator::ContentGenerator;
use crate::language::{Language, LanguageInfo};
use crate::session::{
    mint_challenge_id, parse_challenge_id, IssuedChallenge, Session, SessionPhase,
};
use crate::store::{InMemorySessionStore, SessionHandle, SessionLookup, SessionStore};

/// Number of topics previewed after a language is selected.
const OVERVIEW_LEN: usize = 3;

// ============================================================================
// Response views
// ============================================================================

/// Topic metadata as shown to learners.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopicSummary {
    /// Topic id.
    pub id: u32,
    /// Title.
    pub title: String,
    /// Description.
    pub description: String,
    /// Whether the topic carries a coding challenge.
    pub challenge_eligible: bool,
}

impl From<&Topic> for TopicSummary {
    fn from(topic: &Topic) -> Self {
        Self {
            id: topic.id,
            title: topic.title.clone(),
            description: topic.description.clone(),
            challenge_eligible: topic.is_challenge_eligible(),
        }
    }
}

/// Confirmation of a language selection.
#[derive(Debug, Clone, Serialize)]
pub struct LanguageSelection {
    /// Session the selection applies to.
    pub session_id: String,
    /// The selected language.
    pub language: Language,
    /// Human-readable confirmation.
    pub message: String,
    /// Number of lessons in the course.
    pub total_lessons: usize,
    /// The first few topics of the course.
    pub curriculum_overview: Vec<TopicSummary>,
}

/// A generated lesson.
#[derive(Debug, Clone, Serialize)]
pub struct LessonView {
    /// Topic metadata.
    pub topic: TopicSummary,
    /// The learner's language.
    pub language: Language,
    /// Generated content.
    pub content: LessonContent,
}

/// A quiz as issued to the learner, without answers.
#[derive(Debug, Clone, Serialize)]
pub struct QuizView {
    /// Lesson the quiz covers.
    pub lesson_id: u32,
    /// Lesson title.
    pub lesson_title: String,
    /// Questions and choices.
    pub questions: Vec<QuestionView>,
}

/// Result of grading a quiz.
#[derive(Debug, Clone, Serialize)]
pub struct QuizGrade {
    /// Lesson the quiz covered.
    pub lesson_id: u32,
    /// Fraction of correct answers.
    pub score: f64,
    /// Whether the lesson is now complete.
    pub passed: bool,
    /// Threshold the score was compared against.
    pub pass_threshold: f64,
    /// Number of correct answers.
    pub correct_answers: usize,
    /// Number of questions.
    pub total_questions: usize,
    /// Per-question outcomes.
    pub results: Vec<QuestionResult>,
}

/// A newly issued coding challenge.
#[derive(Debug, Clone, Serialize)]
pub struct ChallengeView {
    /// Id to quote when submitting code.
    pub challenge_id: String,
    /// Topic the challenge belongs to.
    pub topic_id: u32,
    /// Title of that topic.
    pub topic_title: String,
    /// The challenge rendered as Markdown.
    pub prompt: String,
    /// The structured challenge.
    pub challenge: ChallengeText,
}

/// Feedback on submitted code.
#[derive(Debug, Clone, Serialize)]
pub struct CodeReview {
    /// Challenge the code was submitted for.
    pub challenge_id: String,
    /// Title of the challenge.
    pub challenge_title: String,
    /// 1 for the first submission, 2 for the first resubmission, and so on.
    pub submission: u32,
    /// Generated feedback.
    pub feedback: CodeFeedback,
}

/// A tutor's answer.
#[derive(Debug, Clone, Serialize)]
pub struct TutorAnswer {
    /// The answer text.
    pub answer: String,
    /// The learner's language.
    pub language: Language,
    /// Lesson the answer was scoped to, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lesson_id: Option<u32>,
}

/// Summary of an issued challenge.
#[derive(Debug, Clone, Serialize)]
pub struct ChallengeSummary {
    /// Challenge id.
    pub challenge_id: String,
    /// Topic id.
    pub topic_id: u32,
    /// Challenge title.
    pub title: String,
    /// When it was issued.
    pub issued_at: DateTime<Utc>,
    /// Number of code submissions so far.
    pub submissions: u32,
    /// Whether code has been submitted at least once.
    pub consumed: bool,
}

impl From<&IssuedChallenge> for ChallengeSummary {
    fn from(issued: &IssuedChallenge) -> Self {
        Self {
            challenge_id: issued.challenge_id.clone(),
            topic_id: issued.topic_id,
            title: issued.challenge.title.clone(),
            issued_at: issued.issued_at,
            submissions: issued.submissions,
            consumed: issued.is_consumed(),
        }
    }
}

/// Snapshot of a session's progress.
#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    /// Session id.
    pub session_id: String,
    /// Selected language, if any.
    pub language: Option<Language>,
    /// Current phase.
    pub phase: SessionPhase,
    /// Most recently accessed lesson.
    pub current_lesson: Option<u32>,
    /// Lessons passed.
    pub completed_lessons: Vec<u32>,
    /// Latest quiz score per lesson.
    pub quiz_scores: BTreeMap<u32, f64>,
    /// Lessons in the course.
    pub total_lessons: usize,
    /// `completed / total * 100`.
    pub progress_percentage: f64,
    /// Lessons with a quiz awaiting answers.
    pub outstanding_quizzes: Vec<u32>,
    /// Challenges issued so far, oldest first.
    pub issued_challenges: Vec<ChallengeSummary>,
    /// When the session was created.
    pub created_at: DateTime<Utc>,
    /// When the session last changed.
    pub updated_at: DateTime<Utc>,
}

// ============================================================================
// MonotonicClock
// ============================================================================

/// Millisecond stamps that strictly increase across calls.
#[derive(Debug, Default)]
struct MonotonicClock {
    last: AtomicI64,
}

impl MonotonicClock {
    fn next(&self) -> i64 {
        let now = Utc::now().timestamp_millis();
        let previous = self
            .last
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(now.max(last + 1))
            })
            .unwrap_or_else(|last| last);
        now.max(previous + 1)
    }
}

// ============================================================================
// Orchestrator
// ============================================================================

/// Drives learners through the curriculum.
pub struct Orchestrator {
    config: Config,
    curriculum: Curriculum,
    generator: Arc<dyn ContentGenerator>,
    store: Arc<dyn SessionStore>,
    clock: MonotonicClock,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("config", &self.config)
            .field("curriculum_len", &self.curriculum.len())
            .field("model", &self.generator.model_name())
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    /// Creates an orchestrator over the built-in curriculum and an in-memory store.
    #[must_use]
    pub fn new(config: Config, generator: Arc<dyn ContentGenerator>) -> Self {
        Self {
            config,
            curriculum: Curriculum::builtin(),
            generator,
            store: Arc::new(InMemorySessionStore::new()),
            clock: MonotonicClock::default(),
        }
    }

    /// The curriculum.
    #[must_use]
    pub const fn curriculum(&self) -> &Curriculum {
        &self.curriculum
    }

    /// Every topic with its challenge flag.
    #[must_use]
    pub fn topics(&self) -> Vec<TopicSummary> {
        self.curriculum
            .list_topics()
            .iter()
            .map(TopicSummary::from)
            .collect()
    }

    /// Name of the generation model.
    #[must_use]
    pub fn model_name(&self) -> &str {
        self.generator.model_name()
    }

    /// The supported languages with descriptions.
    #[must_use]
    pub fn available_languages() -> Vec<LanguageInfo> {
        Language::ALL.into_iter().map(LanguageInfo::from).collect()
    }

    /// Number of sessions held by the store.
    pub async fn session_count(&self) -> usize {
        self.store.count().await
    }

    /// Mints a fresh session id of the form `session_<millis>`.
    fn mint_session_id(&self) -> String {
        format!("session_{}", self.clock.next())
    }

    /// Looks up a session, applying the configured missing-session policy.
    async fn resolve(&self, session_id: &str) -> Result<SessionHandle> {
        match self.store.lookup(session_id).await {
            SessionLookup::Found(handle) => Ok(handle),
            SessionLookup::NotFound => match self.config.missing_session {
                MissingSessionPolicy::Strict => {
                    warn!(session_id, "Unknown session");
                    Err(TutorError::session_not_found(session_id))
                }
                MissingSessionPolicy::Lenient => {
                    info!(session_id, "Creating session on first use");
                    Ok(self.store.get_or_insert(Session::new(session_id)).await)
                }
            },
        }
    }

    /// Selects a language, creating the session or resetting its progress.
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedLanguage` if `language` is not one of the eight
    /// supported languages. Nothing is created or reset in that case.
    pub async fn select_language(
        &self,
        session_id: Option<&str>,
        language: &str,
    ) -> Result<LanguageSelection> {
        let language = Language::parse(language)?;
        let session_id = session_id.map_or_else(|| self.mint_session_id(), str::to_string);

        let handle = self.store.get_or_insert(Session::new(&session_id)).await;
        handle.lock().await.select_language(language);
        info!(session_id = %session_id, %language, "Language selected");

        let total_lessons = self.curriculum.len();
        Ok(LanguageSelection {
            message: format!("{language} selected. Your course has {total_lessons} lessons."),
            session_id,
            language,
            total_lessons,
            curriculum_overview: self
                .curriculum
                .overview(OVERVIEW_LEN)
                .iter()
                .map(TopicSummary::from)
                .collect(),
        })
    }

    /// Generates the lesson for `lesson_id` and makes it the current lesson.
    ///
    /// # Errors
    ///
    /// `SessionNotFound`, `LanguageNotSelected`, `LessonNotFound`, or
    /// `GenerationUnavailable`.
    pub async fn get_lesson(&self, session_id: &str, lesson_id: u32) -> Result<LessonView> {
        let handle = self.resolve(session_id).await?;
        let mut session = handle.lock().await;
        let language = session.require_language()?;
        let topic = self.curriculum.get_topic(lesson_id)?;

        let content = self.generator.generate_lesson(topic, language).await?;

        session.open_lesson(lesson_id);
        info!(session_id, lesson_id, "Lesson opened");
        Ok(LessonView {
            topic: TopicSummary::from(topic),
            language,
            content,
        })
    }

    /// Generates and caches a quiz for `lesson_id`, replacing any earlier one.
    ///
    /// # Errors
    ///
    /// `SessionNotFound`, `LanguageNotSelected`, `LessonNotFound`, or
    /// `GenerationUnavailable` (including a quiz of the wrong shape).
    pub async fn generate_quiz(&self, session_id: &str, lesson_id: u32) -> Result<QuizView> {
        let handle = self.resolve(session_id).await?;
        let mut session = handle.lock().await;
        let language = session.require_language()?;
        let topic = self.curriculum.get_topic(lesson_id)?;
        let count = self.config.quiz_question_count;

        let quiz = self.generator.generate_quiz(topic, language, count).await?;
        quiz.validate(count)
            .map_err(|message| TutorError::generation("quiz", LlmError::malformed(message)))?;
        if quiz.lesson_id != lesson_id {
            return Err(TutorError::generation(
                "quiz",
                LlmError::malformed(format!(
                    "quiz generated for lesson {} instead of {lesson_id}",
                    quiz.lesson_id
                )),
            ));
        }

        let view = QuizView {
            lesson_id,
            lesson_title: topic.title.clone(),
            questions: quiz.questions_for_learner(),
        };
        session.cache_quiz(quiz);
        info!(session_id, lesson_id, questions = count, "Quiz issued");
        Ok(view)
    }

    /// Grades answers against the cached quiz for `lesson_id`.
    ///
    /// # Errors
    ///
    /// `SessionNotFound`, `LessonNotFound`, `NoSuchQuiz`, or
    /// `AnswerCountMismatch`.
    pub async fn submit_quiz(
        &self,
        session_id: &str,
        lesson_id: u32,
        answers: &[usize],
    ) -> Result<QuizGrade> {
        let handle = self.resolve(session_id).await?;
        let mut session = handle.lock().await;
        self.curriculum.get_topic(lesson_id)?;

        let threshold = self.config.pass_threshold;
        let outcome = session
            .grade_quiz(lesson_id, answers, threshold)
            .map_err(|e| {
                warn!(session_id, lesson_id, error = %e, "Quiz submission rejected");
                e
            })?;

        info!(
            session_id,
            lesson_id,
            score = outcome.score.score,
            passed = outcome.passed,
            "Quiz graded"
        );
        Ok(QuizGrade {
            lesson_id,
            score: outcome.score.score,
            passed: outcome.passed,
            pass_threshold: threshold,
            correct_answers: outcome.score.correct_answers,
            total_questions: outcome.score.total_questions,
            results: outcome.score.results,
        })
    }

    /// Issues a coding challenge.
    ///
    /// Without `topic_id`, picks the first challenge-eligible topic not yet
    /// issued in this session. With it, issues a fresh challenge for that
    /// topic even if one was issued before.
    ///
    /// # Errors
    ///
    /// `SessionNotFound`, `LanguageNotSelected`, `LessonNotFound`,
    /// `TopicNotChallengeEligible`, `NoEligibleTopic`, or
    /// `GenerationUnavailable`.
    pub async fn generate_challenge(
        &self,
        session_id: &str,
        topic_id: Option<u32>,
    ) -> Result<ChallengeView> {
        let handle = self.resolve(session_id).await?;
        let mut session = handle.lock().await;
        let language = session.require_language()?;

        let topic = match topic_id {
            Some(id) => {
                let topic = self.curriculum.get_topic(id)?;
                if !topic.is_challenge_eligible() {
                    return Err(TutorError::not_challenge_eligible(
                        id,
                        &self.curriculum.challenge_topic_ids(),
                    ));
                }
                topic
            }
            None => session
                .next_challenge_topic(&self.curriculum)
                .ok_or(TutorError::NoEligibleTopic)?,
        };

        let challenge = self.generator.generate_challenge(topic, language).await?;

        let challenge_id = mint_challenge_id(topic.id, self.clock.next());
        let view = ChallengeView {
            challenge_id: challenge_id.clone(),
            topic_id: topic.id,
            topic_title: topic.title.clone(),
            prompt: challenge.prompt_text(),
            challenge: challenge.clone(),
        };
        session.register_challenge(IssuedChallenge::new(&challenge_id, topic.id, challenge));
        info!(session_id, challenge_id = %challenge_id, topic_id = topic.id, "Challenge issued");
        Ok(view)
    }

    /// Reviews code submitted for a challenge issued to this session.
    ///
    /// Resubmitting for the same challenge is allowed and re-evaluates.
    ///
    /// # Errors
    ///
    /// `SessionNotFound`, `UnknownChallenge`, or `GenerationUnavailable`.
    pub async fn submit_code(
        &self,
        session_id: &str,
        code: &str,
        challenge_id: &str,
    ) -> Result<CodeReview> {
        let handle = self.resolve(session_id).await?;
        if parse_challenge_id(challenge_id).is_none() {
            warn!(session_id, challenge_id, "Malformed challenge id");
            return Err(TutorError::unknown_challenge(challenge_id));
        }

        let mut session = handle.lock().await;
        let issued = session
            .challenge(challenge_id)
            .map_err(|e| {
                warn!(session_id, challenge_id, "Challenge not issued to this session");
                e
            })?
            .clone();
        let language = session.require_language()?;

        let feedback = self
            .generator
            .evaluate_code(code, &issued.challenge, language)
            .await?;

        let submission = session.record_submission(challenge_id)?;
        info!(
            session_id,
            challenge_id,
            submission,
            score = feedback.score,
            "Code reviewed"
        );
        Ok(CodeReview {
            challenge_id: issued.challenge_id,
            challenge_title: issued.challenge.title,
            submission,
            feedback,
        })
    }

    /// Answers a question in the context of the learner's current lesson.
    ///
    /// Reads the session but never changes it.
    ///
    /// # Errors
    ///
    /// `SessionNotFound`, `LanguageNotSelected`, or `GenerationUnavailable`.
    pub async fn ask_tutor(&self, session_id: &str, question: &str) -> Result<TutorAnswer> {
        let handle = self.resolve(session_id).await?;
        let context = handle.lock().await.context(&self.curriculum)?;

        let answer = self.generator.answer_question(question, &context).await?;

        let lesson_id = context.lesson.as_ref().map(|topic| topic.id);
        info!(session_id, lesson_id, "Tutor question answered");
        Ok(TutorAnswer {
            answer,
            language: context.language,
            lesson_id,
        })
    }

    /// Reports the session's progress.
    ///
    /// # Errors
    ///
    /// `SessionNotFound` under the strict policy.
    pub async fn session_status(&self, session_id: &str) -> Result<SessionStatus> {
        let handle = self.resolve(session_id).await?;
        let session = handle.lock().await;
        let total_lessons = self.curriculum.len();

        Ok(SessionStatus {
            session_id: session.session_id.clone(),
            language: session.language(),
            phase: session.phase(),
            current_lesson: session.current_lesson(),
            completed_lessons: session.completed_lesson_ids().iter().copied().collect(),
            quiz_scores: session.quiz_scores().clone(),
            total_lessons,
            progress_percentage: session.progress_percentage(total_lessons),
            outstanding_quizzes: session.outstanding_quizzes(),
            issued_challenges: session
                .issued_challenges()
                .into_iter()
                .map(ChallengeSummary::from)
                .collect(),
            created_at: session.created_at,
            updated_at: session.updated_at,
        })
    }
}
