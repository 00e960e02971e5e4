//! The curriculum catalog.
//!
//! A fixed, ordered list of topics shared by every session. Topic ids start
//! at 1 and are contiguous; every fourth topic carries a coding challenge.

use serde::{Deserialize, Serialize};

use crate::error::{Result, TutorError};

/// Every `CHALLENGE_INTERVAL`-th topic is challenge-eligible.
pub const CHALLENGE_INTERVAL: u32 = 4;

/// Titles and descriptions of the built-in fourteen-topic course.
const BUILTIN_TOPICS: [(&str, &str); 14] = [
    (
        "Computer and operating system basics",
        "How programs run, files and folders, and using a terminal.",
    ),
    (
        "Installing the toolchain and setting up a workspace",
        "Installing the language tools, choosing an editor, and running a first program.",
    ),
    (
        "Language fundamentals",
        "Syntax, statements, comments, and reading simple programs.",
    ),
    (
        "Variables and data types",
        "Declaring variables, primitive types, conversions, and basic operators.",
    ),
    (
        "Control flow with conditions and loops",
        "Branching with conditions and repeating work with loops.",
    ),
    (
        "Functions",
        "Defining and calling functions, parameters, return values, and scope.",
    ),
    (
        "Collections",
        "Lists, tuples, sets, and dictionaries or their closest equivalents.",
    ),
    (
        "Working with files",
        "Reading and writing text files and handling paths.",
    ),
    (
        "Modules and libraries",
        "Splitting code into modules and using the standard library.",
    ),
    (
        "Error handling",
        "Recognising, reporting, and recovering from errors.",
    ),
    (
        "Building small practical projects",
        "Combining earlier lessons into complete small programs.",
    ),
    (
        "Package and environment management",
        "Installing third-party packages and isolating project environments.",
    ),
    (
        "Open-source work and programming exercises",
        "Reading other people's code, contributing, and practising with exercises.",
    ),
    (
        "Specialised libraries for data analysis",
        "Numerical computing, tabular data, and plotting libraries.",
    ),
];

/// One curriculum unit, 1:1 with a lesson.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    /// 1-based position in the curriculum.
    pub id: u32,
    /// Short title.
    pub title: String,
    /// One-sentence description of what the lesson covers.
    pub description: String,
}

impl Topic {
    /// Creates a new topic.
    #[must_use]
    pub fn new(id: u32, title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            description: description.into(),
        }
    }

    /// Returns `true` if finishing this topic unlocks a coding challenge.
    #[must_use]
    pub const fn is_challenge_eligible(&self) -> bool {
        is_challenge_eligible(self.id)
    }
}

/// Returns `true` if `topic_id` is a challenge milestone.
///
/// # Examples
///
/// ```
/// use codementor_orchestrator::curriculum::is_challenge_eligible;
///
/// assert!(is_challenge_eligible(4));
/// assert!(is_challenge_eligible(12));
/// assert!(!is_challenge_eligible(5));
/// assert!(!is_challenge_eligible(0));
/// ```
#[must_use]
pub const fn is_challenge_eligible(topic_id: u32) -> bool {
    topic_id != 0 && topic_id % CHALLENGE_INTERVAL == 0
}

/// Read-only, ordered catalog of topics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Curriculum {
    topics: Vec<Topic>,
}

impl Default for Curriculum {
    fn default() -> Self {
        Self::builtin()
    }
}

impl Curriculum {
    /// The built-in programming fundamentals course.
    #[must_use]
    pub fn builtin() -> Self {
        let topics = (1u32..)
            .zip(BUILTIN_TOPICS)
            .map(|(id, (title, description))| Topic::new(id, title, description))
            .collect();
        Self { topics }
    }

    /// Looks up a topic by id.
    ///
    /// # Errors
    ///
    /// Returns `LessonNotFound` if `id` is outside `1..=max_topic_id()`.
    pub fn get_topic(&self, id: u32) -> Result<&Topic> {
        id.checked_sub(1)
            .and_then(|index| self.topics.get(index as usize))
            .ok_or_else(|| TutorError::lesson_not_found(id, self.max_topic_id()))
    }

    /// All topics in curriculum order.
    #[must_use]
    pub fn list_topics(&self) -> &[Topic] {
        &self.topics
    }

    /// The first `count` topics, for previews.
    #[must_use]
    pub fn overview(&self, count: usize) -> &[Topic] {
        &self.topics[..count.min(self.topics.len())]
    }

    /// Number of topics.
    #[must_use]
    pub fn len(&self) -> usize {
        self.topics.len()
    }

    /// Returns `true` if the catalog has no topics.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }

    /// Highest valid topic id.
    #[must_use]
    pub fn max_topic_id(&self) -> u32 {
        self.topics.last().map_or(0, |topic| topic.id)
    }

    /// Topics that carry a coding challenge, in order.
    pub fn challenge_topics(&self) -> impl Iterator<Item = &Topic> {
        self.topics.iter().filter(|topic| topic.is_challenge_eligible())
    }

    /// Ids of the challenge-eligible topics.
    #[must_use]
    pub fn challenge_topic_ids(&self) -> Vec<u32> {
        self.challenge_topics().map(|topic| topic.id).collect()
    }
}
