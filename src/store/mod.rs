// src/store/mod.rs

//! Persistence seam for users, subjects, questions, exams and results.
//!
//! Handlers only talk to `dyn ExamStore`; `PgExamStore` is the production
//! backend and `MemoryExamStore` backs demo mode and the test-suite.

pub mod demo;
pub mod memory;
pub mod postgres;

use async_trait::async_trait;

use crate::{
    config::ExamPolicy,
    error::AppError,
    models::{
        exam::{Exam, ExamDraft, ExamSummary},
        question::{Question, QuestionDraft},
        result::{ExamResult, MyResult, NewResult},
        subject::Subject,
        user::{Role, User},
    },
};

pub use memory::MemoryExamStore;
pub use postgres::PgExamStore;

/// Metadata changes an admin may apply to an existing exam.
#[derive(Debug, Clone, Default)]
pub struct ExamPatch {
    pub title: Option<String>,
    pub duration: Option<i32>,
    pub is_active: Option<bool>,
}

#[async_trait]
pub trait ExamStore: Send + Sync {
    // Users

    /// Fails with `Conflict` if the username is taken.
    async fn create_user(&self, username: &str, password_hash: &str, role: Role) -> Result<User, AppError>;
    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, AppError>;

    // Subjects

    async fn create_subject(&self, name: &str) -> Result<Subject, AppError>;
    async fn list_subjects(&self) -> Result<Vec<Subject>, AppError>;
    /// Fails with `Conflict` once the subject is referenced by a persisted result.
    async fn rename_subject(&self, id: i64, name: &str) -> Result<Subject, AppError>;

    // Questions

    /// Fails with `NotFound` if the subject does not exist.
    async fn create_question(&self, draft: &QuestionDraft) -> Result<Question, AppError>;
    /// Fails with `Conflict` once the question is referenced by a persisted result.
    async fn update_question(&self, id: i64, draft: &QuestionDraft) -> Result<Question, AppError>;
    /// Fails with `Conflict` while an exam contains the question or a persisted
    /// result references it.
    async fn delete_question(&self, id: i64) -> Result<(), AppError>;
    async fn list_questions(&self, subject_id: Option<i64>) -> Result<Vec<Question>, AppError>;

    // Exams

    /// Fails with `NotFound` if the subject or any listed question does not exist.
    async fn create_exam(&self, draft: &ExamDraft) -> Result<Exam, AppError>;
    async fn update_exam(&self, id: i64, patch: &ExamPatch) -> Result<Exam, AppError>;
    async fn list_exams(&self) -> Result<Vec<Exam>, AppError>;
    /// Active exams only, ordered by id.
    async fn list_active_exams(&self) -> Result<Vec<ExamSummary>, AppError>;
    async fn find_exam(&self, id: i64) -> Result<Option<Exam>, AppError>;
    async fn exam_summary(&self, id: i64) -> Result<Option<ExamSummary>, AppError>;
    /// The exam's questions in exam order.
    async fn exam_questions(&self, exam_id: i64) -> Result<Vec<Question>, AppError>;

    // Results

    /// Persists a graded attempt and its answers atomically.
    ///
    /// Submissions of one learner are serialized. Within that critical section a
    /// retake while `policy.allow_retakes` is false, or a repeat submission inside
    /// `policy.resubmit_window_secs`, fails with `Conflict` and writes nothing.
    async fn record_result(&self, result: &NewResult, policy: &ExamPolicy) -> Result<ExamResult, AppError>;
    /// Most recent first, joined with the exam title.
    async fn list_results_for(&self, learner_id: i64) -> Result<Vec<MyResult>, AppError>;
}

/// Shared conflict check for the resubmission window and retake policy.
pub(crate) fn check_submission_policy(
    previous: Option<chrono::DateTime<chrono::Utc>>,
    submitted_at: chrono::DateTime<chrono::Utc>,
    policy: &ExamPolicy,
) -> Result<(), AppError> {
    let Some(previous) = previous else {
        return Ok(());
    };

    if !policy.allow_retakes {
        return Err(AppError::Conflict("Exam has already been submitted".to_string()));
    }

    let window = chrono::Duration::seconds(policy.resubmit_window_secs as i64);
    if submitted_at - previous < window {
        return Err(AppError::Conflict(
            "Duplicate submission, please wait before resubmitting".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    #[test]
    fn first_submission_always_passes() {
        let policy = ExamPolicy {
            allow_retakes: false,
            ..ExamPolicy::default()
        };
        assert!(check_submission_policy(None, Utc::now(), &policy).is_ok());
    }

    #[test]
    fn resubmission_inside_window_conflicts() {
        let policy = ExamPolicy::default();
        let now = Utc::now();
        let err = check_submission_policy(Some(now - Duration::seconds(2)), now, &policy).unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert!(check_submission_policy(Some(now - Duration::seconds(31)), now, &policy).is_ok());
    }

    #[test]
    fn retakes_can_be_disabled() {
        let policy = ExamPolicy {
            allow_retakes: false,
            ..ExamPolicy::default()
        };
        let now = Utc::now();
        let err = check_submission_policy(Some(now - Duration::days(3)), now, &policy).unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }
}
