// src/models/exam.rs

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::models::question::PublicQuestion;

pub const MAX_DURATION_MINUTES: i32 = 600;

/// Represents the 'exams' table plus its ordered question links.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Exam {
    pub id: i64,
    pub title: String,
    pub subject_id: i64,
    /// Time budget in minutes.
    pub duration: i32,
    pub is_active: bool,
    pub question_ids: Vec<i64>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Learner-facing listing entry. Carries no options or answers.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamSummary {
    pub id: i64,
    pub title: String,
    pub duration: i32,
    pub question_count: i64,
    pub subject_name: String,
}

/// Response of `GET /user/exam/{id}/questions`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExamQuestionsResponse {
    pub exam: ExamSummary,
    pub questions: Vec<PublicQuestion>,
}

/// DTO for creating an exam.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateExamRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    pub subject_id: i64,
    #[validate(range(min = 1, max = 600))]
    pub duration: i32,
    #[serde(default)]
    pub is_active: bool,
    #[validate(custom(function = validate_question_ids))]
    pub question_ids: Vec<i64>,
}

/// DTO for updating exam metadata. The question set is fixed at creation.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateExamRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    #[validate(range(min = 1, max = 600))]
    pub duration: Option<i32>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct ExamDraft {
    pub title: String,
    pub subject_id: i64,
    pub duration: i32,
    pub is_active: bool,
    pub question_ids: Vec<i64>,
}

fn validate_question_ids(ids: &[i64]) -> Result<(), validator::ValidationError> {
    if ids.is_empty() {
        return Err(validator::ValidationError::new("exam_needs_questions"));
    }
    let unique: HashSet<&i64> = ids.iter().collect();
    if unique.len() != ids.len() {
        return Err(validator::ValidationError::new("duplicate_question_id"));
    }
    Ok(())
}
