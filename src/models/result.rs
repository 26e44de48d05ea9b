// src/models/result.rs

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::scoring::Scorecard;

/// Represents the 'results' table. Append-only.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamResult {
    pub id: i64,
    pub learner_id: i64,
    pub exam_id: i64,
    pub score: i32,
    pub total: i32,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// A graded attempt ready to be persisted.
#[derive(Debug, Clone)]
pub struct NewResult {
    pub learner_id: i64,
    pub exam_id: i64,
    pub scorecard: Scorecard,
    pub submitted_at: chrono::DateTime<chrono::Utc>,
}

/// DTO for submitting an exam attempt.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SubmitExamRequest {
    /// Any id is well-formed; unknown ones are answered with 404.
    pub exam_id: i64,

    /// Key: question id. Value: selected option (1-based).
    pub answers: HashMap<i64, i32>,
}

/// Per-question feedback in a submission response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionFeedback {
    pub question_id: i64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub selected_option: Option<i32>,
    pub correct: bool,
    /// Only present when answers are revealed after submission.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub correct_option: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionResponse {
    pub result_id: i64,
    pub score: u32,
    pub total: u32,
    pub per_question: Vec<QuestionFeedback>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultExam {
    pub id: i64,
    pub title: String,
}

/// An entry of `GET /user/my-results`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MyResult {
    pub id: i64,
    pub score: i32,
    pub total: i32,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub exam: ResultExam,
}
