//! CodeMentor Text Generation
//!
//! Client plumbing for the external text-generation service.
//!
//! This crate knows nothing about lessons or quizzes: it sends a prompt,
//! returns the raw completion, classifies failures, and offers helpers for
//! pulling a JSON object out of free-form model output. Higher layers own
//! prompt construction and schema validation.

pub mod gemini;
pub mod json;

use async_trait::async_trait;
use thiserror::Error;

pub use gemini::{GeminiClient, GeminiOptions};
pub use json::{extract_json_object, parse_json_object, strip_code_fences};

/// A specialized `Result` type for generation service calls.
pub type Result<T> = std::result::Result<T, LlmError>;

/// Errors that can occur while talking to the generation service.
#[derive(Debug, Error)]
pub enum LlmError {
    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(String),

    /// The service rejected or failed the request.
    #[error("generation service error ({kind}): {message}")]
    Api {
        /// Classification of the failure.
        kind: LlmErrorKind,
        /// HTTP status code, when one was received.
        status: Option<u16>,
        /// Detail reported by the service or transport.
        message: String,
    },

    /// The request did not complete within the configured timeout.
    #[error("generation request timed out after {timeout_secs}s")]
    Timeout {
        /// The timeout that elapsed, in seconds.
        timeout_secs: u64,
    },

    /// The service answered, but the payload could not be understood.
    #[error("malformed generation response: {0}")]
    Malformed(String),
}

/// Categories of generation service failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmErrorKind {
    /// Authentication failure (invalid API key, expired credentials).
    Authentication,
    /// Rate limit exceeded.
    RateLimit,
    /// Server error (5xx responses).
    Server,
    /// Network connectivity issues.
    Network,
    /// Other unclassified errors.
    Other,
}

impl std::fmt::Display for LlmErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Authentication => write!(f, "authentication"),
            Self::RateLimit => write!(f, "rate_limit"),
            Self::Server => write!(f, "server"),
            Self::Network => write!(f, "network"),
            Self::Other => write!(f, "other"),
        }
    }
}

impl LlmErrorKind {
    /// Maps an HTTP status code onto an error kind.
    #[must_use]
    pub const fn from_status(status: u16) -> Self {
        match status {
            401 | 403 => Self::Authentication,
            429 => Self::RateLimit,
            500..=599 => Self::Server,
            _ => Self::Other,
        }
    }

    /// Returns a suggestion message for this error kind.
    #[must_use]
    pub const fn suggestion(&self) -> &'static str {
        match self {
            Self::Authentication => "Check your API key or credentials",
            Self::RateLimit => "Wait and retry, or reduce request frequency",
            Self::Server => "Retry later; the generation service may be experiencing issues",
            Self::Network => "Check your network connection",
            Self::Other => "Check the generation service's status page",
        }
    }
}

impl LlmError {
    /// Creates an `Api` error from a kind and message.
    #[must_use]
    pub fn api(kind: LlmErrorKind, status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Api {
            kind,
            status,
            message: message.into(),
        }
    }

    /// Creates a `Malformed` error.
    #[must_use]
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed(message.into())
    }

    /// Returns `true` if an immediate retry may succeed.
    ///
    /// Timeouts, rate limits, server errors, and network failures qualify.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Api {
                kind: LlmErrorKind::RateLimit | LlmErrorKind::Server | LlmErrorKind::Network,
                ..
            } | Self::Timeout { .. }
        )
    }

    /// Returns `true` if the service answered with something unparseable.
    #[must_use]
    pub const fn is_malformed(&self) -> bool {
        matches!(self, Self::Malformed(_))
    }
}

/// A text-completion backend.
///
/// Implementations send a single prompt and return the model's raw text.
/// They must not retry on their own; retry policy lives with the caller.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Sends `prompt` to the service and returns the completion text.
    async fn complete(&self, prompt: &str) -> Result<String>;

    /// Name of the model that serves completions, for diagnostics.
    fn model(&self) -> &str;
}
