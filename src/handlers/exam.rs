// src/handlers/exam.rs

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};

use crate::{
    config::Config,
    error::AppError,
    extractors::ValidatedJson,
    models::{
        exam::{Exam, ExamQuestionsResponse},
        question::PublicQuestion,
        result::{NewResult, QuestionFeedback, SubmissionResponse, SubmitExamRequest},
    },
    scoring::{self, AnswerKey},
    store::ExamStore,
    utils::jwt::Claims,
};

/// Loads an exam a learner may see. Unknown and inactive exams look the same.
async fn active_exam(store: &dyn ExamStore, exam_id: i64) -> Result<Exam, AppError> {
    store
        .find_exam(exam_id)
        .await?
        .filter(|exam| exam.is_active)
        .ok_or_else(|| AppError::NotFound(format!("Exam {} not found", exam_id)))
}

/// Lists the exams currently open to learners.
pub async fn list_available_exams(
    State(store): State<Arc<dyn ExamStore>>,
) -> Result<impl IntoResponse, AppError> {
    let exams = store.list_active_exams().await?;
    Ok(Json(exams))
}

/// Returns an active exam with its questions, stripped of correct answers.
pub async fn get_exam_questions(
    State(store): State<Arc<dyn ExamStore>>,
    Path(exam_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    active_exam(store.as_ref(), exam_id).await?;

    let exam = store
        .exam_summary(exam_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Exam {} not found", exam_id)))?;

    let questions: Vec<PublicQuestion> = store
        .exam_questions(exam_id)
        .await?
        .iter()
        .map(PublicQuestion::from)
        .collect();

    Ok(Json(ExamQuestionsResponse { exam, questions }))
}

/// Grades and records a learner's answers.
///
/// * Rejects unknown or inactive exams with 404.
/// * Rejects an out-of-range option for an exam question with 400.
/// * Answers for questions outside the exam are ignored.
/// * Persists exactly one result; repeats inside the resubmission window get 409.
pub async fn submit_exam(
    State(store): State<Arc<dyn ExamStore>>,
    State(config): State<Config>,
    Extension(claims): Extension<Claims>,
    ValidatedJson(req): ValidatedJson<SubmitExamRequest>,
) -> Result<impl IntoResponse, AppError> {
    let learner_id = claims.user_id()?;
    active_exam(store.as_ref(), req.exam_id).await?;

    let questions = store.exam_questions(req.exam_id).await?;

    for question in &questions {
        if let Some(&option) = req.answers.get(&question.id) {
            if !question.accepts_option(option) {
                return Err(AppError::BadRequest(format!(
                    "Option {} is out of range for question {}",
                    option, question.id
                )));
            }
        }
    }

    let keys: Vec<AnswerKey> = questions
        .iter()
        .map(|q| AnswerKey {
            question_id: q.id,
            correct_option: q.correct_option,
        })
        .collect();
    let scorecard = scoring::score(&keys, &req.answers);

    let record = store
        .record_result(
            &NewResult {
                learner_id,
                exam_id: req.exam_id,
                scorecard: scorecard.clone(),
                submitted_at: chrono::Utc::now(),
            },
            &config.exam_policy,
        )
        .await
        .inspect_err(|e| {
            if let AppError::Conflict(_) = e {
                tracing::warn!(learner_id, exam_id = req.exam_id, "Rejected repeated submission");
            }
        })?;

    tracing::info!(
        learner_id,
        exam_id = req.exam_id,
        result_id = record.id,
        score = scorecard.score,
        total = scorecard.total,
        "Exam submitted"
    );

    let reveal = config.exam_policy.reveal_answers_after_submit;
    let per_question = scorecard
        .per_question
        .iter()
        .zip(&keys)
        .map(|(outcome, key)| QuestionFeedback {
            question_id: outcome.question_id,
            selected_option: outcome.selected_option,
            correct: outcome.correct,
            correct_option: reveal.then_some(key.correct_option),
        })
        .collect();

    Ok(Json(SubmissionResponse {
        result_id: record.id,
        score: scorecard.score,
        total: scorecard.total,
        per_question,
    }))
}

/// Lists the caller's own results, most recent first.
pub async fn list_my_results(
    State(store): State<Arc<dyn ExamStore>>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let results = store.list_results_for(claims.user_id()?).await?;
    Ok(Json(results))
}
