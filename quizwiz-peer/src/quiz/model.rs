//! Quiz Documents
//!
//! Authored quizzes as stored and played. JSON keys are camelCase and
//! `createdAt` is epoch milliseconds so stored documents stay readable by
//! other QuizWiz clients.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// OPTION IDS AND COLORS
// =============================================================================

/// Identifier of an answer option (`opt1`..`opt4` for authored questions).
///
/// Votes carry whatever id the participant sent, so this is not restricted to
/// the four authored ids.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OptionId(String);

impl OptionId {
    /// Create from any string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for OptionId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// The four answer colors. Each color is bound to a fixed option id, which is
/// all a participant's controller pad knows about.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionColor {
    /// `opt1`
    Red,
    /// `opt2`
    Blue,
    /// `opt3`
    Green,
    /// `opt4`
    Yellow,
}

impl OptionColor {
    /// All colors in pad order.
    pub const ALL: [OptionColor; 4] = [
        OptionColor::Red,
        OptionColor::Blue,
        OptionColor::Green,
        OptionColor::Yellow,
    ];

    /// Option id bound to this color.
    pub fn option_id(self) -> OptionId {
        OptionId::new(match self {
            OptionColor::Red => "opt1",
            OptionColor::Blue => "opt2",
            OptionColor::Green => "opt3",
            OptionColor::Yellow => "opt4",
        })
    }

    /// Look up a color from its option id.
    pub fn from_option_id(id: &OptionId) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.option_id() == *id)
    }

    /// Parse a pad key: `1`..`4` or a color name.
    pub fn from_key(key: &str) -> Option<Self> {
        match key.trim().to_ascii_lowercase().as_str() {
            "1" | "red" => Some(OptionColor::Red),
            "2" | "blue" => Some(OptionColor::Blue),
            "3" | "green" => Some(OptionColor::Green),
            "4" | "yellow" => Some(OptionColor::Yellow),
            _ => None,
        }
    }
}

impl fmt::Display for OptionColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionColor::Red => write!(f, "red"),
            OptionColor::Blue => write!(f, "blue"),
            OptionColor::Green => write!(f, "green"),
            OptionColor::Yellow => write!(f, "yellow"),
        }
    }
}

// =============================================================================
// DOCUMENTS
// =============================================================================

/// One answer option of a question.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerOption {
    /// Option id.
    pub id: OptionId,
    /// Display color.
    pub color: OptionColor,
    /// Answer text shown on the host's projector.
    pub text: String,
}

/// A single question.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    /// Question id, unique within its quiz.
    pub id: u64,
    /// Question text.
    pub text: String,
    /// Exactly four options, one per color.
    pub options: Vec<AnswerOption>,
    /// Id of the correct option.
    pub correct_option_id: OptionId,
}

impl Question {
    /// A blank question: four empty colored options, `opt1` marked correct.
    pub fn blank(id: u64) -> Self {
        Self {
            id,
            text: String::new(),
            options: OptionColor::ALL
                .into_iter()
                .map(|color| AnswerOption {
                    id: color.option_id(),
                    color,
                    text: String::new(),
                })
                .collect(),
            correct_option_id: OptionColor::Red.option_id(),
        }
    }

    /// Build a question from text, four answers in color order, and the
    /// color of the correct answer.
    pub fn with_answers(id: u64, text: &str, answers: [&str; 4], correct: OptionColor) -> Self {
        let mut question = Self::blank(id);
        question.text = text.to_string();
        for (option, answer) in question.options.iter_mut().zip(answers) {
            option.text = answer.to_string();
        }
        question.correct_option_id = correct.option_id();
        question
    }

    /// The correct option, if the id resolves.
    pub fn correct_option(&self) -> Option<&AnswerOption> {
        self.options.iter().find(|o| o.id == self.correct_option_id)
    }

    /// Check one question. `number` is 1-based and only used in messages.
    fn validate(&self, number: usize) -> Result<(), QuizError> {
        if self.text.trim().is_empty() {
            return Err(QuizError::MissingQuestionText { number });
        }
        if self.options.len() != 4 {
            return Err(QuizError::WrongOptionCount { number, count: self.options.len() });
        }
        if self.options.iter().any(|o| o.text.trim().is_empty()) {
            return Err(QuizError::EmptyOption { number });
        }
        let mut colors: Vec<_> = self.options.iter().map(|o| o.color).collect();
        colors.sort();
        colors.dedup();
        if colors.len() != 4 {
            return Err(QuizError::DuplicateColor { number });
        }
        if self.correct_option().is_none() {
            return Err(QuizError::UnknownCorrectOption {
                number,
                option_id: self.correct_option_id.clone(),
            });
        }
        Ok(())
    }
}

/// A stored quiz.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quiz {
    /// Quiz id.
    pub id: String,
    /// Title.
    pub title: String,
    /// Ordered questions.
    pub questions: Vec<Question>,
    /// Creation time.
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

impl Quiz {
    /// Create a quiz from a title and questions. Trims the title, assigns a
    /// fresh id and timestamp, and validates before returning.
    pub fn create(title: &str, questions: Vec<Question>) -> Result<Self, QuizError> {
        let quiz = Self {
            id: uuid::Uuid::new_v4().to_string(),
            title: title.trim().to_string(),
            questions,
            created_at: Utc::now(),
        };
        quiz.validate()?;
        Ok(quiz)
    }

    /// Check the authoring rules: non-empty title, at least one question,
    /// and every question complete.
    pub fn validate(&self) -> Result<(), QuizError> {
        if self.title.trim().is_empty() {
            return Err(QuizError::MissingTitle);
        }
        if self.questions.is_empty() {
            return Err(QuizError::NoQuestions);
        }
        for (i, question) in self.questions.iter().enumerate() {
            question.validate(i + 1)?;
        }
        Ok(())
    }

    /// Question at `index`.
    pub fn question(&self, index: usize) -> Option<&Question> {
        self.questions.get(index)
    }

    /// Number of questions.
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    /// True if there are no questions.
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    /// The quiz seeded into an empty store.
    pub fn demo() -> Self {
        Self {
            id: "demo-business-1".to_string(),
            title: "Demo Business Quiz".to_string(),
            questions: vec![
                Question::with_answers(
                    1,
                    "Which company is known as 'Big Blue'?",
                    ["Microsoft", "IBM", "Facebook", "Amazon"],
                    OptionColor::Blue,
                ),
                Question::with_answers(
                    2,
                    "Who is the CEO of Tesla?",
                    ["Jeff Bezos", "Tim Cook", "Elon Musk", "Satya Nadella"],
                    OptionColor::Green,
                ),
                Question::with_answers(
                    3,
                    "What does 'IPO' stand for?",
                    [
                        "Initial Public Offering",
                        "International Payment Org",
                        "Internal Profit Output",
                        "Internet Protocol Office",
                    ],
                    OptionColor::Red,
                ),
            ],
            created_at: Utc::now(),
        }
    }
}

/// Authoring validation failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QuizError {
    /// Title is blank.
    #[error("Please enter a quiz title.")]
    MissingTitle,

    /// Quiz has no questions.
    #[error("A quiz needs at least one question.")]
    NoQuestions,

    /// Question text is blank.
    #[error("Question {number} is missing text.")]
    MissingQuestionText {
        /// 1-based question number.
        number: usize,
    },

    /// Question does not have four options.
    #[error("Question {number} has {count} options, expected 4.")]
    WrongOptionCount {
        /// 1-based question number.
        number: usize,
        /// Options found.
        count: usize,
    },

    /// An option has blank text.
    #[error("Question {number} has empty options.")]
    EmptyOption {
        /// 1-based question number.
        number: usize,
    },

    /// Two options share a color.
    #[error("Question {number} uses a color twice.")]
    DuplicateColor {
        /// 1-based question number.
        number: usize,
    },

    /// Correct option id is not one of the question's options.
    #[error("Question {number} marks unknown option {option_id} as correct.")]
    UnknownCorrectOption {
        /// 1-based question number.
        number: usize,
        /// The dangling id.
        option_id: OptionId,
    },
}
