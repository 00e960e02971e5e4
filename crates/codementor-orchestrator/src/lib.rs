//! CodeMentor Orchestrator
//!
//! Drives per-learner sessions through a fixed programming curriculum:
//! language selection, generated lessons, graded quizzes, coding challenges,
//! and contextual tutoring. Exposes the whole flow over HTTP.

pub mod api;
pub mod config;
pub mod content;
pub mod curriculum;
pub mod error;
pub mod generator;
pub mod language;
pub mod orchestrator;
pub mod session;
pub mod store;

#[cfg(test)]
mod test_support;

pub use api::{create_router, AppState, ErrorResponse, SESSION_HEADER};
pub use config::{Config, GeneratorConfig, MissingSessionPolicy, CONFIG_FILE_NAME};
pub use content::{
    ChallengeText, CodeExample, CodeFeedback, LessonContent, QuestionResult, QuestionView, Quiz,
    QuizQuestion, QuizScore,
};
pub use curriculum::{is_challenge_eligible, Curriculum, Topic, CHALLENGE_INTERVAL};
pub use error::{ErrorKind, Result, TutorError};
pub use generator::{ContentGenerator, LlmContentGenerator};
pub use language::{Language, LanguageInfo};
pub use orchestrator::{
    ChallengeSummary, ChallengeView, CodeReview, LanguageSelection, LessonView, Orchestrator,
    QuizGrade, QuizView, SessionStatus, TopicSummary, TutorAnswer,
};
pub use session::{IssuedChallenge, Session, SessionContext, SessionPhase};
pub use store::{InMemorySessionStore, SessionHandle, SessionLookup, SessionStore};
