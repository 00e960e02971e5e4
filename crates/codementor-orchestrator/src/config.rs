//! Configuration types for the CodeMentor orchestrator.
//!
//! Settings are read from a `codementor.json` file in camelCase. Every field
//! is optional; missing fields take the defaults documented below.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TutorError};

/// Name of the configuration file looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "codementor.json";

/// Default fraction of correct answers needed to pass a quiz.
const fn default_pass_threshold() -> f64 {
    0.6
}

/// Default number of questions per quiz.
const fn default_quiz_question_count() -> usize {
    5
}

/// Default natural language for generated content.
fn default_content_language() -> String {
    "Arabic".to_string()
}

/// Default generation model.
fn default_model() -> String {
    "gemini-1.5-flash".to_string()
}

/// Default environment variable holding the API key.
fn default_api_key_env() -> String {
    "GOOGLE_API_KEY".to_string()
}

/// Default per-request timeout in seconds.
const fn default_request_timeout_secs() -> u64 {
    60
}

/// Default sampling temperature.
const fn default_temperature() -> f32 {
    0.7
}

/// Default value for boolean options that default to true.
const fn default_true() -> bool {
    true
}

/// Main configuration for the tutoring service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Fraction of correct answers in `(0, 1]` needed to pass a quiz.
    #[serde(default = "default_pass_threshold")]
    pub pass_threshold: f64,

    /// Number of questions in every generated quiz.
    #[serde(default = "default_quiz_question_count")]
    pub quiz_question_count: usize,

    /// What to do when a request names an unknown session.
    #[serde(default)]
    pub missing_session: MissingSessionPolicy,

    /// Natural language lessons, quizzes, and feedback are written in.
    #[serde(default = "default_content_language")]
    pub content_language: String,

    /// Generation service settings.
    #[serde(default)]
    pub generator: GeneratorConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pass_threshold: default_pass_threshold(),
            quiz_question_count: default_quiz_question_count(),
            missing_session: MissingSessionPolicy::default(),
            content_language: default_content_language(),
            generator: GeneratorConfig::default(),
        }
    }
}

impl Config {
    /// Loads configuration from the current working directory.
    ///
    /// # Errors
    ///
    /// Returns an error if `codementor.json` exists but is invalid.
    pub fn load() -> Result<Self> {
        let current_dir = std::env::current_dir().map_err(|e| {
            TutorError::config_parse(
                "<current directory>",
                format!("cannot determine current directory: {e}"),
            )
        })?;
        Self::load_from_dir(&current_dir)
    }

    /// Loads `codementor.json` from `dir`, or defaults if it is absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but is invalid.
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        Self::load_from_file(&dir.join(CONFIG_FILE_NAME))
    }

    /// Loads configuration from a specific file path.
    ///
    /// If the file does not exist, returns the default configuration.
    ///
    /// # Errors
    ///
    /// Returns `TutorError::ConfigParseError` if the file cannot be read or
    /// holds invalid JSON, and `TutorError::ConfigValidationError` if the
    /// values are out of range.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let config = Self::default();
                config.validate()?;
                return Ok(config);
            }
            Err(e) => {
                return Err(TutorError::config_parse(
                    path,
                    format!("failed to read file: {e}"),
                ));
            }
        };

        let config: Self = serde_json::from_str(&contents)
            .map_err(|e| TutorError::config_parse(path, e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `TutorError::ConfigValidationError` if any check fails.
    pub fn validate(&self) -> Result<()> {
        if !(self.pass_threshold > 0.0 && self.pass_threshold <= 1.0) {
            return Err(TutorError::config_validation(
                format!(
                    "passThreshold must be in (0, 1], got {}",
                    self.pass_threshold
                ),
                "Set passThreshold to a fraction such as 0.6 in your codementor.json",
            ));
        }

        if self.quiz_question_count == 0 {
            return Err(TutorError::config_validation(
                "quizQuestionCount must be greater than 0",
                "Set quizQuestionCount to at least 1 in your codementor.json",
            ));
        }

        if self.content_language.trim().is_empty() {
            return Err(TutorError::config_validation(
                "contentLanguage must not be empty",
                "Set contentLanguage to a natural language such as \"English\" in your codementor.json",
            ));
        }

        self.generator.validate()
    }
}

/// Policy for requests that name a session the store has never seen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MissingSessionPolicy {
    /// Reject the request with `SessionNotFound` (default).
    #[default]
    Strict,
    /// Create an empty session on first use.
    Lenient,
}

impl MissingSessionPolicy {
    /// Parses a string into a `MissingSessionPolicy`, case-insensitively.
    fn from_str_case_insensitive(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "strict" => Some(Self::Strict),
            "lenient" => Some(Self::Lenient),
            _ => None,
        }
    }

    /// Returns the config-file spelling of this policy.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Strict => "strict",
            Self::Lenient => "lenient",
        }
    }
}

impl std::fmt::Display for MissingSessionPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for MissingSessionPolicy {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_str_case_insensitive(&s).ok_or_else(|| {
            serde::de::Error::custom(format!(
                "invalid missing session policy '{s}': expected one of 'strict', 'lenient'"
            ))
        })
    }
}

impl Serialize for MissingSessionPolicy {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

/// Generation service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratorConfig {
    /// Model name passed to the generation API.
    #[serde(default = "default_model")]
    pub model: String,

    /// Name of the environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Upper bound on a single generation call, in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Retry once when a call fails transiently or returns malformed output.
    #[serde(default = "default_true")]
    pub retry_on_transient: bool,

    /// Sampling temperature in `[0, 2]`.
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            api_key_env: default_api_key_env(),
            request_timeout_secs: default_request_timeout_secs(),
            retry_on_transient: default_true(),
            temperature: default_temperature(),
        }
    }
}

impl GeneratorConfig {
    fn validate(&self) -> Result<()> {
        if self.model.trim().is_empty() {
            return Err(TutorError::config_validation(
                "generator.model must not be empty",
                "Set generator.model to a model name such as \"gemini-1.5-flash\"",
            ));
        }

        if self.api_key_env.trim().is_empty() {
            return Err(TutorError::config_validation(
                "generator.apiKeyEnv must not be empty",
                "Set generator.apiKeyEnv to the environment variable holding your API key",
            ));
        }

        if self.request_timeout_secs == 0 {
            return Err(TutorError::config_validation(
                "generator.requestTimeoutSecs must be greater than 0",
                "Set generator.requestTimeoutSecs to at least 1 second",
            ));
        }

        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(TutorError::config_validation(
                format!(
                    "generator.temperature must be in [0, 2], got {}",
                    self.temperature
                ),
                "Set generator.temperature to a value such as 0.7",
            ));
        }

        Ok(())
    }
}
