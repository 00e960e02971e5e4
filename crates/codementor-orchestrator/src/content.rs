//! Generated content types.
//!
//! Each kind of generated content has a strict shape. Anything the generation
//! service returns is deserialized into these types and then checked with
//! `validate`; a response that fails either step is never shown to a learner.

use serde::{Deserialize, Serialize};

use crate::error::{Result, TutorError};

/// Explanatory content for one lesson.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LessonContent {
    /// Short introduction to the topic.
    pub introduction: String,
    /// Main body of the lesson.
    pub detailed_explanation: String,
    /// Worked examples.
    #[serde(default)]
    pub code_examples: Vec<CodeExample>,
    /// Practical tips.
    #[serde(default)]
    pub tips: Vec<String>,
    /// Recap of the lesson.
    #[serde(default)]
    pub summary: String,
}

impl LessonContent {
    /// Checks that the lesson has a body.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.introduction.trim().is_empty() {
            return Err("lesson introduction is empty".to_string());
        }
        if self.detailed_explanation.trim().is_empty() {
            return Err("lesson explanation is empty".to_string());
        }
        Ok(())
    }
}

/// A worked code example inside a lesson.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeExample {
    /// Example title.
    pub title: String,
    /// Source code.
    pub code: String,
    /// What the code demonstrates.
    #[serde(default)]
    pub explanation: String,
}

/// A single multiple-choice question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizQuestion {
    /// Question text.
    pub prompt: String,
    /// Answer choices, in display order.
    pub choices: Vec<String>,
    /// Index into `choices` of the one correct answer.
    pub correct_index: usize,
    /// Why the correct answer is correct.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

/// A multiple-choice quiz for one lesson.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quiz {
    /// The lesson this quiz covers.
    pub lesson_id: u32,
    /// Questions, in display order.
    pub questions: Vec<QuizQuestion>,
}

impl Quiz {
    /// Checks the structural guarantees every issued quiz must meet.
    ///
    /// Exactly `expected_count` questions, each with at least two non-empty
    /// choices and a correct index that points at one of them.
    pub fn validate(&self, expected_count: usize) -> std::result::Result<(), String> {
        if self.questions.len() != expected_count {
            return Err(format!(
                "quiz has {} questions, expected {expected_count}",
                self.questions.len()
            ));
        }

        for (number, question) in (1usize..).zip(&self.questions) {
            if question.prompt.trim().is_empty() {
                return Err(format!("question {number} has no prompt"));
            }
            if question.choices.len() < 2 {
                return Err(format!(
                    "question {number} has {} choices, expected at least 2",
                    question.choices.len()
                ));
            }
            if question.choices.iter().any(|choice| choice.trim().is_empty()) {
                return Err(format!("question {number} has an empty choice"));
            }
            if question.correct_index >= question.choices.len() {
                return Err(format!(
                    "question {number} marks choice {} correct but has only {} choices",
                    question.correct_index,
                    question.choices.len()
                ));
            }
        }

        Ok(())
    }

    /// Grades `answers` against this quiz.
    ///
    /// # Errors
    ///
    /// Returns `AnswerCountMismatch` if the number of answers differs from
    /// the number of questions.
    pub fn grade(&self, answers: &[usize]) -> Result<QuizScore> {
        if answers.len() != self.questions.len() {
            return Err(TutorError::AnswerCountMismatch {
                expected: self.questions.len(),
                received: answers.len(),
            });
        }

        let results: Vec<QuestionResult> = (1usize..)
            .zip(self.questions.iter().zip(answers))
            .map(|(number, (question, &submitted))| QuestionResult {
                question_number: number,
                prompt: question.prompt.clone(),
                submitted,
                correct_index: question.correct_index,
                is_correct: submitted == question.correct_index,
                explanation: question.explanation.clone(),
            })
            .collect();

        let correct_answers = results.iter().filter(|r| r.is_correct).count();
        let total_questions = self.questions.len();
        #[allow(clippy::cast_precision_loss)]
        let score = if total_questions == 0 {
            0.0
        } else {
            correct_answers as f64 / total_questions as f64
        };

        Ok(QuizScore {
            score,
            correct_answers,
            total_questions,
            results,
        })
    }

    /// The learner-facing view of the quiz, without correct answers.
    #[must_use]
    pub fn questions_for_learner(&self) -> Vec<QuestionView> {
        self.questions
            .iter()
            .map(|question| QuestionView {
                prompt: question.prompt.clone(),
                choices: question.choices.clone(),
            })
            .collect()
    }
}

/// A quiz question as shown to the learner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionView {
    /// Question text.
    pub prompt: String,
    /// Answer choices.
    pub choices: Vec<String>,
}

/// Outcome for one graded question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionResult {
    /// 1-based question number.
    pub question_number: usize,
    /// Question text.
    pub prompt: String,
    /// The submitted choice index.
    pub submitted: usize,
    /// The correct choice index.
    pub correct_index: usize,
    /// Whether the submission was correct.
    pub is_correct: bool,
    /// Explanation of the correct answer, if the quiz had one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

/// Raw grading result, before the pass threshold is applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizScore {
    /// Fraction of correct answers in `0.0..=1.0`.
    pub score: f64,
    /// Number of correct answers.
    pub correct_answers: usize,
    /// Number of questions.
    pub total_questions: usize,
    /// Per-question outcomes.
    pub results: Vec<QuestionResult>,
}

/// A coding exercise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeText {
    /// Challenge title.
    pub title: String,
    /// Problem statement.
    pub description: String,
    /// What a solution must do.
    #[serde(default)]
    pub requirements: Vec<String>,
    /// Sample input.
    #[serde(default)]
    pub example_input: String,
    /// Expected output for the sample input.
    #[serde(default)]
    pub example_output: String,
    /// Hints for getting started.
    #[serde(default)]
    pub hints: Vec<String>,
}

impl ChallengeText {
    /// Checks that the challenge states a problem.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.title.trim().is_empty() {
            return Err("challenge title is empty".to_string());
        }
        if self.description.trim().is_empty() {
            return Err("challenge description is empty".to_string());
        }
        Ok(())
    }

    /// Renders the challenge as a single Markdown prompt.
    #[must_use]
    pub fn prompt_text(&self) -> String {
        let mut out = format!("## {}\n\n{}\n", self.title, self.description);

        if !self.requirements.is_empty() {
            out.push_str("\n### Requirements\n");
            for requirement in &self.requirements {
                out.push_str(&format!("- {requirement}\n"));
            }
        }

        if !self.example_input.is_empty() || !self.example_output.is_empty() {
            out.push_str(&format!(
                "\n### Example\nInput: {}\nOutput: {}\n",
                self.example_input, self.example_output
            ));
        }

        if !self.hints.is_empty() {
            out.push_str("\n### Hints\n");
            for hint in &self.hints {
                out.push_str(&format!("- {hint}\n"));
            }
        }

        out
    }
}

/// Advisory feedback on submitted code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeFeedback {
    /// Whether the code appears to solve the challenge.
    pub is_correct: bool,
    /// Quality score out of 100.
    pub score: u8,
    /// Overall feedback.
    pub feedback: String,
    /// Problems found in the code.
    #[serde(default)]
    pub errors: Vec<String>,
    /// Nudges towards a fix, without giving the answer away.
    #[serde(default)]
    pub hints: Vec<String>,
    /// Style and quality suggestions.
    #[serde(default)]
    pub suggestions: Vec<String>,
}

impl CodeFeedback {
    /// Checks the score range and that feedback is present.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.score > 100 {
            return Err(format!("feedback score {} exceeds 100", self.score));
        }
        if self.feedback.trim().is_empty() {
            return Err("feedback text is empty".to_string());
        }
        Ok(())
    }
}
