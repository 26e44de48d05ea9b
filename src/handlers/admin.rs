// src/handlers/admin.rs

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;

use crate::{
    error::AppError,
    extractors::ValidatedJson,
    models::{
        exam::{CreateExamRequest, ExamDraft, UpdateExamRequest},
        question::{QuestionDraft, QuestionRequest},
        subject::SubjectRequest,
    },
    store::{ExamPatch, ExamStore},
    utils::html::clean_text,
};

/// Checks question content is plain text before it reaches the store.
fn question_draft(payload: QuestionRequest) -> Result<QuestionDraft, AppError> {
    let text = clean_text(&payload.text)?;
    let options = payload
        .options
        .iter()
        .map(|o| clean_text(o))
        .collect::<Result<Vec<String>, AppError>>()?;

    if text.is_empty() || options.iter().any(|o| o.is_empty()) {
        return Err(AppError::BadRequest(
            "Question text and options must contain text".to_string(),
        ));
    }

    Ok(QuestionDraft {
        subject_id: payload.subject_id,
        text,
        options,
        correct_option: payload.correct_option,
        difficulty: payload.difficulty,
    })
}

/// Lists all subjects.
/// Admin only.
pub async fn list_subjects(
    State(store): State<Arc<dyn ExamStore>>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(store.list_subjects().await?))
}

/// Creates a subject.
/// Admin only.
pub async fn create_subject(
    State(store): State<Arc<dyn ExamStore>>,
    ValidatedJson(payload): ValidatedJson<SubjectRequest>,
) -> Result<impl IntoResponse, AppError> {
    let subject = store.create_subject(&clean_text(&payload.name)?).await?;
    Ok((StatusCode::CREATED, Json(subject)))
}

/// Renames a subject. Refused once results reference it.
/// Admin only.
pub async fn rename_subject(
    State(store): State<Arc<dyn ExamStore>>,
    Path(id): Path<i64>,
    ValidatedJson(payload): ValidatedJson<SubjectRequest>,
) -> Result<impl IntoResponse, AppError> {
    let subject = store.rename_subject(id, &clean_text(&payload.name)?).await?;
    Ok(Json(subject))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionFilter {
    pub subject_id: Option<i64>,
}

/// Lists questions, optionally filtered by subject. Includes correct options.
/// Admin only.
pub async fn list_questions(
    State(store): State<Arc<dyn ExamStore>>,
    Query(filter): Query<QuestionFilter>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(store.list_questions(filter.subject_id).await?))
}

/// Creates a question. The correct option is bounds-checked here.
/// Admin only.
pub async fn create_question(
    State(store): State<Arc<dyn ExamStore>>,
    ValidatedJson(payload): ValidatedJson<QuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let question = store.create_question(&question_draft(payload)?).await?;
    tracing::info!("Created question {}", question.id);
    Ok((StatusCode::CREATED, Json(question)))
}

/// Replaces a question. Refused once results reference it.
/// Admin only.
pub async fn update_question(
    State(store): State<Arc<dyn ExamStore>>,
    Path(id): Path<i64>,
    ValidatedJson(payload): ValidatedJson<QuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let question = store.update_question(id, &question_draft(payload)?).await?;
    Ok(Json(question))
}

/// Deletes a question. Refused while an exam contains it or results reference it.
/// Admin only.
pub async fn delete_question(
    State(store): State<Arc<dyn ExamStore>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    store.delete_question(id).await?;
    tracing::info!("Deleted question {}", id);
    Ok(StatusCode::NO_CONTENT)
}

/// Lists every exam, active or not.
/// Admin only.
pub async fn list_exams(
    State(store): State<Arc<dyn ExamStore>>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(store.list_exams().await?))
}

/// Creates an exam over an ordered set of existing questions.
/// Admin only.
pub async fn create_exam(
    State(store): State<Arc<dyn ExamStore>>,
    ValidatedJson(payload): ValidatedJson<CreateExamRequest>,
) -> Result<impl IntoResponse, AppError> {
    let exam = store
        .create_exam(&ExamDraft {
            title: clean_text(&payload.title)?,
            subject_id: payload.subject_id,
            duration: payload.duration,
            is_active: payload.is_active,
            question_ids: payload.question_ids,
        })
        .await?;
    tracing::info!("Created exam {} ({} questions)", exam.id, exam.question_ids.len());
    Ok((StatusCode::CREATED, Json(exam)))
}

/// Updates exam title, duration or visibility.
/// Admin only.
pub async fn update_exam(
    State(store): State<Arc<dyn ExamStore>>,
    Path(id): Path<i64>,
    ValidatedJson(payload): ValidatedJson<UpdateExamRequest>,
) -> Result<impl IntoResponse, AppError> {
    let exam = store
        .update_exam(
            id,
            &ExamPatch {
                title: payload.title.as_deref().map(clean_text).transpose()?,
                duration: payload.duration,
                is_active: payload.is_active,
            },
        )
        .await?;
    Ok(Json(exam))
}
