//! Error types for the CodeMentor orchestrator.
//!
//! Every orchestrator operation fails with a [`TutorError`]. Errors are grouped
//! into three kinds (see [`ErrorKind`]) so callers can tell bad input apart from
//! out-of-order requests and from generation service outages.

use std::path::PathBuf;

use codementor_llm::LlmError;

/// A specialized `Result` type for orchestrator operations.
pub type Result<T> = std::result::Result<T, TutorError>;

/// Errors that can occur while driving a learning session.
#[derive(Debug, thiserror::Error)]
pub enum TutorError {
    // ========================================================================
    // Validation Errors
    // ========================================================================
    /// The requested programming language is not supported.
    #[error("Unsupported language '{language}'\n\nSuggestion: Choose one of: {supported}")]
    UnsupportedLanguage {
        /// The language that was requested.
        language: String,
        /// Comma-separated list of supported languages.
        supported: String,
    },

    /// Lesson id is outside the curriculum.
    #[error("Lesson {lesson_id} not found: the curriculum has lessons 1-{max_lesson_id}")]
    LessonNotFound {
        /// The lesson id that was requested.
        lesson_id: u32,
        /// The highest valid lesson id.
        max_lesson_id: u32,
    },

    /// Number of submitted answers does not match the quiz.
    #[error("Expected {expected} answers but received {received}")]
    AnswerCountMismatch {
        /// Number of questions in the cached quiz.
        expected: usize,
        /// Number of answers submitted.
        received: usize,
    },

    /// A specific challenge topic was requested but is not challenge-eligible.
    #[error("Topic {topic_id} has no coding challenge: challenges exist for topics {eligible}")]
    TopicNotChallengeEligible {
        /// The requested topic id.
        topic_id: u32,
        /// Comma-separated list of eligible topic ids.
        eligible: String,
    },

    // ========================================================================
    // Session State Errors
    // ========================================================================
    /// No session exists for the given id.
    #[error("Session '{session_id}' not found\n\nSuggestion: Select a language first to start a session")]
    SessionNotFound {
        /// The session id that was looked up.
        session_id: String,
    },

    /// The operation requires a selected language.
    #[error("No language selected for session '{session_id}'\n\nSuggestion: Select a language first")]
    LanguageNotSelected {
        /// The session that has no language.
        session_id: String,
    },

    /// No quiz is outstanding for this lesson.
    #[error("No outstanding quiz for lesson {lesson_id}\n\nSuggestion: Generate a quiz for this lesson before submitting answers")]
    NoSuchQuiz {
        /// The lesson whose quiz was expected.
        lesson_id: u32,
    },

    /// The challenge id was never issued to this session.
    #[error("Unknown challenge '{challenge_id}'")]
    UnknownChallenge {
        /// The challenge id that was submitted.
        challenge_id: String,
    },

    /// Every challenge-eligible topic has already been issued.
    #[error("No challenge-eligible topic remains for this session")]
    NoEligibleTopic,

    // ========================================================================
    // Generation Errors
    // ========================================================================
    /// The content generation service failed or returned unusable output.
    #[error("Content generation unavailable while producing {what}: {source}")]
    GenerationUnavailable {
        /// What was being generated (lesson, quiz, ...).
        what: &'static str,
        /// The underlying service error.
        #[source]
        source: LlmError,
    },

    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Invalid JSON syntax in configuration file.
    #[error("Invalid JSON in config file '{path}': {message}\n\nSuggestion: Validate your codementor.json with a JSON linter")]
    ConfigParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Description of the parse error.
        message: String,
    },

    /// Configuration validation failed.
    #[error("Invalid configuration: {message}\n\nSuggestion: {suggestion}")]
    ConfigValidationError {
        /// Description of the validation failure.
        message: String,
        /// Actionable suggestion for the user.
        suggestion: String,
    },
}

/// Coarse classification of a [`TutorError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Bad input shape or range; the caller should fix the request.
    Validation,
    /// The request is valid but the session is not in a state to accept it.
    State,
    /// The generation service failed; the request may succeed later.
    Generation,
    /// The service itself is misconfigured.
    Configuration,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation => write!(f, "validation"),
            Self::State => write!(f, "state"),
            Self::Generation => write!(f, "generation"),
            Self::Configuration => write!(f, "configuration"),
        }
    }
}

impl TutorError {
    /// Creates a new `UnsupportedLanguage` error listing the supported set.
    #[must_use]
    pub fn unsupported_language(language: impl Into<String>, supported: &[&str]) -> Self {
        Self::UnsupportedLanguage {
            language: language.into(),
            supported: supported.join(", "),
        }
    }

    /// Creates a new `LessonNotFound` error.
    #[must_use]
    pub const fn lesson_not_found(lesson_id: u32, max_lesson_id: u32) -> Self {
        Self::LessonNotFound {
            lesson_id,
            max_lesson_id,
        }
    }

    /// Creates a new `TopicNotChallengeEligible` error.
    #[must_use]
    pub fn not_challenge_eligible(topic_id: u32, eligible: &[u32]) -> Self {
        let eligible = eligible
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        Self::TopicNotChallengeEligible { topic_id, eligible }
    }

    /// Creates a new `SessionNotFound` error.
    #[must_use]
    pub fn session_not_found(session_id: impl Into<String>) -> Self {
        Self::SessionNotFound {
            session_id: session_id.into(),
        }
    }

    /// Creates a new `LanguageNotSelected` error.
    #[must_use]
    pub fn language_not_selected(session_id: impl Into<String>) -> Self {
        Self::LanguageNotSelected {
            session_id: session_id.into(),
        }
    }

    /// Creates a new `UnknownChallenge` error.
    #[must_use]
    pub fn unknown_challenge(challenge_id: impl Into<String>) -> Self {
        Self::UnknownChallenge {
            challenge_id: challenge_id.into(),
        }
    }

    /// Creates a new `GenerationUnavailable` error.
    #[must_use]
    pub const fn generation(what: &'static str, source: LlmError) -> Self {
        Self::GenerationUnavailable { what, source }
    }

    /// Creates a new `ConfigParseError` with the given path and message.
    #[must_use]
    pub fn config_parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::ConfigParseError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a new `ConfigValidationError` with the given message and suggestion.
    #[must_use]
    pub fn config_validation(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::ConfigValidationError {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Returns the kind of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::UnsupportedLanguage { .. }
            | Self::LessonNotFound { .. }
            | Self::AnswerCountMismatch { .. }
            | Self::TopicNotChallengeEligible { .. } => ErrorKind::Validation,
            Self::SessionNotFound { .. }
            | Self::LanguageNotSelected { .. }
            | Self::NoSuchQuiz { .. }
            | Self::UnknownChallenge { .. }
            | Self::NoEligibleTopic => ErrorKind::State,
            Self::GenerationUnavailable { .. } => ErrorKind::Generation,
            Self::ConfigParseError { .. } | Self::ConfigValidationError { .. } => {
                ErrorKind::Configuration
            }
        }
    }

    /// Returns `true` if retrying the same request later may succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::GenerationUnavailable { source, .. } if source.is_transient())
    }
}
