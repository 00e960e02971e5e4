//! Per-learner session state.
//!
//! A [`Session`] holds everything one learner has done: the selected
//! language, the current phase, completed lessons, quiz scores, the quizzes
//! waiting to be graded, and the coding challenges issued so far. Only the
//! orchestrator mutates it, always under the session's lock.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::content::{ChallengeText, Quiz, QuizScore};
use crate::curriculum::{Curriculum, Topic};
use crate::error::{Result, TutorError};
use crate::language::Language;

// ============================================================================
// SessionPhase
// ============================================================================

/// Where a session is in the learning flow.
///
/// The phases advance as:
/// - `NoLanguage` -> `LanguageSelected`
/// - `LanguageSelected` -> `LessonInProgress` -> `QuizIssued`
/// - From `QuizIssued`:
///   - `LessonComplete` (quiz passed)
///   - `LessonInProgress` (quiz failed, retry the lesson)
/// - `ChallengeIssued` whenever a coding challenge is handed out
///
/// Lessons are randomly addressable, so any phase after `LanguageSelected`
/// can move to `LessonInProgress` for a different lesson.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum SessionPhase {
    /// Session exists but no language is chosen.
    #[default]
    NoLanguage,
    /// A language is chosen; no lesson opened yet.
    LanguageSelected,
    /// The learner is reading a lesson.
    LessonInProgress {
        /// Lesson being read.
        lesson_id: u32,
    },
    /// A quiz has been issued and awaits answers.
    QuizIssued {
        /// Lesson the quiz covers.
        lesson_id: u32,
    },
    /// The learner passed the lesson's quiz.
    LessonComplete {
        /// Lesson that was completed.
        lesson_id: u32,
    },
    /// A coding challenge was issued.
    ChallengeIssued {
        /// Topic the challenge belongs to.
        topic_id: u32,
    },
}

impl std::fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoLanguage => write!(f, "no_language"),
            Self::LanguageSelected => write!(f, "language_selected"),
            Self::LessonInProgress { lesson_id } => write!(f, "lesson_in_progress({lesson_id})"),
            Self::QuizIssued { lesson_id } => write!(f, "quiz_issued({lesson_id})"),
            Self::LessonComplete { lesson_id } => write!(f, "lesson_complete({lesson_id})"),
            Self::ChallengeIssued { topic_id } => write!(f, "challenge_issued({topic_id})"),
        }
    }
}

// ============================================================================
// Challenges
// ============================================================================

/// Builds a challenge id of the form `challenge_<topic_id>_<stamp>`.
///
/// # Examples
///
/// ```
/// use codementor_orchestrator::session::{mint_challenge_id, parse_challenge_id};
///
/// let id = mint_challenge_id(4, 1_700_000_000_000);
/// assert_eq!(id, "challenge_4_1700000000000");
/// assert_eq!(parse_challenge_id(&id), Some((4, 1_700_000_000_000)));
/// ```
#[must_use]
pub fn mint_challenge_id(topic_id: u32, stamp: i64) -> String {
    format!("challenge_{topic_id}_{stamp}")
}

/// Splits a challenge id into its topic id and stamp.
///
/// Returns `None` for anything not shaped like a minted id.
#[must_use]
pub fn parse_challenge_id(challenge_id: &str) -> Option<(u32, i64)> {
    let rest = challenge_id.strip_prefix("challenge_")?;
    let (topic, stamp) = rest.split_once('_')?;
    Some((topic.parse().ok()?, stamp.parse().ok()?))
}

/// A coding challenge registered in a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuedChallenge {
    /// Unique id handed to the learner.
    pub challenge_id: String,
    /// Topic the challenge belongs to.
    pub topic_id: u32,
    /// The generated exercise.
    pub challenge: ChallengeText,
    /// When the challenge was issued.
    pub issued_at: DateTime<Utc>,
    /// How many times code was submitted for it.
    pub submissions: u32,
    /// When code was last submitted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_submitted_at: Option<DateTime<Utc>>,
}

impl IssuedChallenge {
    /// Creates a new challenge record issued now.
    #[must_use]
    pub fn new(challenge_id: impl Into<String>, topic_id: u32, challenge: ChallengeText) -> Self {
        Self {
            challenge_id: challenge_id.into(),
            topic_id,
            challenge,
            issued_at: Utc::now(),
            submissions: 0,
            last_submitted_at: None,
        }
    }

    /// Returns `true` once code has been submitted at least once.
    #[must_use]
    pub const fn is_consumed(&self) -> bool {
        self.submissions > 0
    }
}

// ============================================================================
// Quiz grading outcome
// ============================================================================

/// Result of grading a cached quiz against a pass threshold.
#[derive(Debug, Clone, PartialEq)]
pub struct QuizOutcome {
    /// Raw grading result.
    pub score: QuizScore,
    /// Whether the score met the threshold.
    pub passed: bool,
}

// ============================================================================
// SessionContext
// ============================================================================

/// Read-only context threaded into tutor requests.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionContext {
    /// The learner's target language.
    pub language: Language,
    /// Most recently accessed lesson, if any.
    pub lesson: Option<Topic>,
    /// Lessons passed so far.
    pub completed_lesson_ids: Vec<u32>,
    /// Latest quiz score per lesson.
    pub quiz_scores: BTreeMap<u32, f64>,
}

// ============================================================================
// Session
// ============================================================================

/// Mutable state for one learner.
#[derive(Debug, Clone)]
pub struct Session {
    /// Session identifier.
    pub session_id: String,
    language: Option<Language>,
    phase: SessionPhase,
    current_lesson: Option<u32>,
    completed_lesson_ids: BTreeSet<u32>,
    quiz_scores: BTreeMap<u32, f64>,
    quiz_cache: HashMap<u32, Quiz>,
    issued_challenges: HashMap<String, IssuedChallenge>,
    /// When the session was created.
    pub created_at: DateTime<Utc>,
    /// When the session was last changed.
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// Creates an empty session with no language.
    ///
    /// # Examples
    ///
    /// ```
    /// use codementor_orchestrator::session::{Session, SessionPhase};
    ///
    /// let session = Session::new("session_1");
    /// assert_eq!(session.phase(), SessionPhase::NoLanguage);
    /// assert!(session.language().is_none());
    /// assert!(session.completed_lesson_ids().is_empty());
    /// ```
    #[must_use]
    pub fn new(session_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            session_id: session_id.into(),
            language: None,
            phase: SessionPhase::NoLanguage,
            current_lesson: None,
            completed_lesson_ids: BTreeSet::new(),
            quiz_scores: BTreeMap::new(),
            quiz_cache: HashMap::new(),
            issued_challenges: HashMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// The selected language, if any.
    #[must_use]
    pub const fn language(&self) -> Option<Language> {
        self.language
    }

    /// The current phase.
    #[must_use]
    pub const fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// The most recently accessed lesson.
    #[must_use]
    pub const fn current_lesson(&self) -> Option<u32> {
        self.current_lesson
    }

    /// Lessons whose quiz was passed.
    #[must_use]
    pub const fn completed_lesson_ids(&self) -> &BTreeSet<u32> {
        &self.completed_lesson_ids
    }

    /// Latest quiz score per lesson.
    #[must_use]
    pub const fn quiz_scores(&self) -> &BTreeMap<u32, f64> {
        &self.quiz_scores
    }

    /// Lesson ids with a quiz awaiting answers, sorted.
    #[must_use]
    pub fn outstanding_quizzes(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = self.quiz_cache.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    #[cfg(test)]
    fn cached_quiz(&self, lesson_id: u32) -> Option<&Quiz> {
        self.quiz_cache.get(&lesson_id)
    }

    /// All issued challenges, oldest first.
    #[must_use]
    pub fn issued_challenges(&self) -> Vec<&IssuedChallenge> {
        let mut challenges: Vec<&IssuedChallenge> = self.issued_challenges.values().collect();
        challenges.sort_by(|a, b| {
            a.issued_at
                .cmp(&b.issued_at)
                .then_with(|| a.challenge_id.cmp(&b.challenge_id))
        });
        challenges
    }

    /// Updates the `updated_at` timestamp to the current time.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Selects a language, discarding all prior progress.
    ///
    /// Completed lessons, scores, cached quizzes, and issued challenges are
    /// all cleared.
    pub fn select_language(&mut self, language: Language) {
        self.language = Some(language);
        self.phase = SessionPhase::LanguageSelected;
        self.current_lesson = None;
        self.completed_lesson_ids.clear();
        self.quiz_scores.clear();
        self.quiz_cache.clear();
        self.issued_challenges.clear();
        self.touch();
    }

    /// Returns the selected language.
    ///
    /// # Errors
    ///
    /// Returns `LanguageNotSelected` if no language has been chosen.
    pub fn require_language(&self) -> Result<Language> {
        self.language
            .ok_or_else(|| TutorError::language_not_selected(&self.session_id))
    }

    /// Records `lesson_id` as the lesson being read.
    pub fn open_lesson(&mut self, lesson_id: u32) {
        self.current_lesson = Some(lesson_id);
        self.phase = SessionPhase::LessonInProgress { lesson_id };
        self.touch();
    }

    /// Caches `quiz` for grading, replacing any earlier quiz for the lesson.
    pub fn cache_quiz(&mut self, quiz: Quiz) {
        let lesson_id = quiz.lesson_id;
        self.current_lesson = Some(lesson_id);
        self.phase = SessionPhase::QuizIssued { lesson_id };
        self.quiz_cache.insert(lesson_id, quiz);
        self.touch();
    }

    /// Grades answers against the cached quiz for `lesson_id`.
    ///
    /// On success the cached quiz is consumed, the score is recorded, and the
    /// lesson is marked complete if `score >= pass_threshold`.
    ///
    /// # Errors
    ///
    /// Returns `NoSuchQuiz` if no quiz is cached for the lesson, and
    /// `AnswerCountMismatch` if the answer count is wrong. The cached quiz
    /// survives a count mismatch so the learner can resubmit.
    pub fn grade_quiz(
        &mut self,
        lesson_id: u32,
        answers: &[usize],
        pass_threshold: f64,
    ) -> Result<QuizOutcome> {
        let quiz = self
            .quiz_cache
            .get(&lesson_id)
            .ok_or(TutorError::NoSuchQuiz { lesson_id })?;
        let score = quiz.grade(answers)?;

        self.quiz_cache.remove(&lesson_id);
        let passed = score.score >= pass_threshold;
        self.quiz_scores.insert(lesson_id, score.score);
        if passed {
            self.completed_lesson_ids.insert(lesson_id);
            self.phase = SessionPhase::LessonComplete { lesson_id };
        } else {
            self.phase = SessionPhase::LessonInProgress { lesson_id };
        }
        self.touch();

        Ok(QuizOutcome { score, passed })
    }

    /// The first challenge-eligible topic not yet issued in this session.
    #[must_use]
    pub fn next_challenge_topic<'c>(&self, curriculum: &'c Curriculum) -> Option<&'c Topic> {
        curriculum
            .challenge_topics()
            .find(|topic| !self.has_challenge_for(topic.id))
    }

    /// Returns `true` if a challenge for `topic_id` was already issued.
    #[must_use]
    pub fn has_challenge_for(&self, topic_id: u32) -> bool {
        self.issued_challenges
            .values()
            .any(|issued| issued.topic_id == topic_id)
    }

    /// Registers a newly issued challenge.
    pub fn register_challenge(&mut self, issued: IssuedChallenge) {
        self.phase = SessionPhase::ChallengeIssued {
            topic_id: issued.topic_id,
        };
        self.issued_challenges
            .insert(issued.challenge_id.clone(), issued);
        self.touch();
    }

    /// Looks up a challenge issued to this session.
    ///
    /// # Errors
    ///
    /// Returns `UnknownChallenge` if the id was never issued here.
    pub fn challenge(&self, challenge_id: &str) -> Result<&IssuedChallenge> {
        self.issued_challenges
            .get(challenge_id)
            .ok_or_else(|| TutorError::unknown_challenge(challenge_id))
    }

    /// Records a code submission for a challenge and returns the new count.
    ///
    /// # Errors
    ///
    /// Returns `UnknownChallenge` if the id was never issued here.
    pub fn record_submission(&mut self, challenge_id: &str) -> Result<u32> {
        let issued = self
            .issued_challenges
            .get_mut(challenge_id)
            .ok_or_else(|| TutorError::unknown_challenge(challenge_id))?;
        issued.submissions += 1;
        issued.last_submitted_at = Some(Utc::now());
        let submissions = issued.submissions;
        self.touch();
        Ok(submissions)
    }

    /// Builds the context handed to tutor requests.
    ///
    /// # Errors
    ///
    /// Returns `LanguageNotSelected` if no language has been chosen.
    pub fn context(&self, curriculum: &Curriculum) -> Result<SessionContext> {
        let language = self.require_language()?;
        let lesson = self
            .current_lesson
            .and_then(|id| curriculum.get_topic(id).ok())
            .cloned();
        Ok(SessionContext {
            language,
            lesson,
            completed_lesson_ids: self.completed_lesson_ids.iter().copied().collect(),
            quiz_scores: self.quiz_scores.clone(),
        })
    }

    /// Share of the curriculum completed, as a percentage.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn progress_percentage(&self, total_lessons: usize) -> f64 {
        if total_lessons == 0 {
            return 0.0;
        }
        self.completed_lesson_ids.len() as f64 / total_lessons as f64 * 100.0
    }
}

// ============================================================================
// Tests
// ============================================================================
