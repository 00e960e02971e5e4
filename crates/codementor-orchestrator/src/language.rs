//! Programming languages a learner can study.

use serde::{Deserialize, Serialize};

use crate::error::{Result, TutorError};

/// A supported target programming language.
///
/// The set is fixed; selection is matched case-insensitively against the
/// display name and a few common aliases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    /// Python.
    Python,
    /// JavaScript.
    JavaScript,
    /// Java.
    Java,
    /// C++.
    Cpp,
    /// C#.
    CSharp,
    /// Go.
    Go,
    /// Rust.
    Rust,
    /// PHP.
    Php,
}

impl Language {
    /// Every supported language, in catalog order.
    pub const ALL: [Self; 8] = [
        Self::Python,
        Self::JavaScript,
        Self::Java,
        Self::Cpp,
        Self::CSharp,
        Self::Go,
        Self::Rust,
        Self::Php,
    ];

    /// Human-readable name, also used on the wire.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Python => "Python",
            Self::JavaScript => "JavaScript",
            Self::Java => "Java",
            Self::Cpp => "C++",
            Self::CSharp => "C#",
            Self::Go => "Go",
            Self::Rust => "Rust",
            Self::Php => "PHP",
        }
    }

    /// Short description shown in the language picker.
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::Python => "An easy language that suits beginners",
            Self::JavaScript => "The language of the web and interactive applications",
            Self::Java => "A robust language for large projects",
            Self::Cpp => "A fast language for games and systems",
            Self::CSharp => "Microsoft's language for application development",
            Self::Go => "A modern, fast language from Google",
            Self::Rust => "A safe and fast systems language",
            Self::Php => "A language built for web development",
        }
    }

    /// Parses a language name case-insensitively.
    fn from_str_case_insensitive(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "python" => Some(Self::Python),
            "javascript" | "js" => Some(Self::JavaScript),
            "java" => Some(Self::Java),
            "c++" | "cpp" => Some(Self::Cpp),
            "c#" | "csharp" => Some(Self::CSharp),
            "go" | "golang" => Some(Self::Go),
            "rust" => Some(Self::Rust),
            "php" => Some(Self::Php),
            _ => None,
        }
    }

    /// Parses a language name, failing with `UnsupportedLanguage`.
    pub fn parse(s: &str) -> Result<Self> {
        Self::from_str_case_insensitive(s).ok_or_else(|| {
            let supported: Vec<&str> = Self::ALL.iter().map(|l| l.name()).collect();
            TutorError::unsupported_language(s, &supported)
        })
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for Language {
    type Err = TutorError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl<'de> Deserialize<'de> for Language {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_str_case_insensitive(&s).ok_or_else(|| {
            serde::de::Error::custom(format!("unsupported language '{s}'"))
        })
    }
}

impl Serialize for Language {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.name())
    }
}

/// Entry in the language picker listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LanguageInfo {
    /// Display name.
    pub name: String,
    /// Short description.
    pub description: String,
}

impl From<Language> for LanguageInfo {
    fn from(language: Language) -> Self {
        Self {
            name: language.name().to_string(),
            description: language.description().to_string(),
        }
    }
}
