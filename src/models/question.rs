// src/models/question.rs

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use validator::Validate;

pub const MIN_OPTIONS: usize = 2;
pub const MAX_OPTIONS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            other => Err(format!("unknown difficulty '{}'", other)),
        }
    }
}

/// Represents the 'questions' table in the database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: i64,

    pub subject_id: i64,

    /// The text content of the question.
    pub text: String,

    /// Ordered answer options, stored as a JSON array.
    pub options: Vec<String>,

    /// 1-based index of the correct entry in `options`.
    pub correct_option: i32,

    pub difficulty: Difficulty,
}

impl Question {
    /// Whether `option` addresses one of this question's options.
    pub fn accepts_option(&self, option: i32) -> bool {
        option >= 1 && (option as usize) <= self.options.len()
    }
}

/// DTO for sending a question to a learner. Has no correct option field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicQuestion {
    pub id: i64,
    pub text: String,
    pub options: Vec<String>,
    pub difficulty: Difficulty,
}

impl From<&Question> for PublicQuestion {
    fn from(q: &Question) -> Self {
        Self {
            id: q.id,
            text: q.text.clone(),
            options: q.options.clone(),
            difficulty: q.difficulty,
        }
    }
}

/// DTO for creating or replacing a question.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = validate_correct_option))]
pub struct QuestionRequest {
    pub subject_id: i64,
    #[validate(length(min = 1, max = 1000))]
    pub text: String,
    #[validate(custom(function = validate_options))]
    pub options: Vec<String>,
    pub correct_option: i32,
    pub difficulty: Difficulty,
}

/// Sanitised question content handed to the store.
#[derive(Debug, Clone)]
pub struct QuestionDraft {
    pub subject_id: i64,
    pub text: String,
    pub options: Vec<String>,
    pub correct_option: i32,
    pub difficulty: Difficulty,
}

fn validate_options(options: &[String]) -> Result<(), validator::ValidationError> {
    if options.len() < MIN_OPTIONS || options.len() > MAX_OPTIONS {
        return Err(validator::ValidationError::new("options_count_out_of_range"));
    }
    for opt in options {
        if opt.trim().is_empty() {
            return Err(validator::ValidationError::new("option_cannot_be_empty"));
        }
        if opt.len() > 500 {
            return Err(validator::ValidationError::new("option_too_long"));
        }
    }
    Ok(())
}

fn validate_correct_option(req: &QuestionRequest) -> Result<(), validator::ValidationError> {
    if req.correct_option < 1 || req.correct_option as usize > req.options.len() {
        return Err(validator::ValidationError::new("correct_option_out_of_range"));
    }
    Ok(())
}
