// src/scoring.rs

//! Grading of a submitted answer sheet.
//!
//! Everything here is pure: the same keys and answers always produce the same
//! `Scorecard`, which keeps results reproducible and re-gradable.

use std::collections::HashMap;

use serde::Serialize;

/// The correct option for one exam question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnswerKey {
    pub question_id: i64,
    /// 1-based index into the question's options.
    pub correct_option: i32,
}

/// How a single question was answered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionOutcome {
    pub question_id: i64,
    pub selected_option: Option<i32>,
    pub correct: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Scorecard {
    pub score: u32,
    pub total: u32,
    pub per_question: Vec<QuestionOutcome>,
}

/// Grades `answers` (question id -> selected option) against `keys`.
///
/// * `total` is the number of keys, however many questions were answered.
/// * Unanswered questions count as incorrect.
/// * Answers for question ids absent from `keys` are ignored.
/// * `per_question` follows the order of `keys`.
pub fn score(keys: &[AnswerKey], answers: &HashMap<i64, i32>) -> Scorecard {
    let per_question: Vec<QuestionOutcome> = keys
        .iter()
        .map(|key| {
            let selected_option = answers.get(&key.question_id).copied();
            QuestionOutcome {
                question_id: key.question_id,
                selected_option,
                correct: selected_option == Some(key.correct_option),
            }
        })
        .collect();

    let score = per_question.iter().filter(|o| o.correct).count() as u32;

    Scorecard {
        score,
        total: keys.len() as u32,
        per_question,
    }
}
