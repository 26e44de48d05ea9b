// src/store/memory.rs

use std::collections::HashSet;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{
    config::ExamPolicy,
    error::AppError,
    models::{
        exam::{Exam, ExamDraft, ExamSummary},
        question::{Question, QuestionDraft},
        result::{ExamResult, MyResult, NewResult, ResultExam},
        subject::Subject,
        user::{Role, User},
    },
    store::{ExamPatch, ExamStore, check_submission_policy},
};

#[derive(Debug, Default)]
struct Tables {
    next_id: i64,
    users: Vec<User>,
    subjects: Vec<Subject>,
    questions: Vec<Question>,
    exams: Vec<Exam>,
    results: Vec<ExamResult>,
    /// Question ids referenced by persisted results.
    answered: HashSet<i64>,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn subject(&self, id: i64) -> Result<&Subject, AppError> {
        self.subjects
            .iter()
            .find(|s| s.id == id)
            .ok_or_else(|| AppError::NotFound(format!("Subject {} not found", id)))
    }

    fn question_in_results(&self, question_id: i64) -> bool {
        self.answered.contains(&question_id)
    }

    fn subject_in_results(&self, subject_id: i64) -> bool {
        let via_exam = self.results.iter().any(|r| {
            self.exams
                .iter()
                .any(|e| e.id == r.exam_id && e.subject_id == subject_id)
        });
        let via_question = self.questions.iter().any(|q| {
            q.subject_id == subject_id && self.answered.contains(&q.id)
        });
        via_exam || via_question
    }

    fn summary(&self, exam: &Exam) -> ExamSummary {
        let subject_name = self
            .subjects
            .iter()
            .find(|s| s.id == exam.subject_id)
            .map(|s| s.name.clone())
            .unwrap_or_default();
        ExamSummary {
            id: exam.id,
            title: exam.title.clone(),
            duration: exam.duration,
            question_count: exam.question_ids.len() as i64,
            subject_name,
        }
    }
}

/// `ExamStore` kept entirely in process memory.
///
/// A single write lock makes every mutation atomic, which also serializes
/// submissions the way the Postgres row lock does.
#[derive(Debug, Default)]
pub struct MemoryExamStore {
    tables: RwLock<Tables>,
}

impl MemoryExamStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ExamStore for MemoryExamStore {
    async fn create_user(&self, username: &str, password_hash: &str, role: Role) -> Result<User, AppError> {
        let mut t = self.tables.write().await;
        if t.users.iter().any(|u| u.username == username) {
            return Err(AppError::Conflict(format!("Username '{}' already exists", username)));
        }
        let user = User {
            id: t.next_id(),
            username: username.to_string(),
            password: password_hash.to_string(),
            role,
            created_at: chrono::Utc::now(),
        };
        t.users.push(user.clone());
        Ok(user)
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let t = self.tables.read().await;
        Ok(t.users.iter().find(|u| u.username == username).cloned())
    }

    async fn create_subject(&self, name: &str) -> Result<Subject, AppError> {
        let mut t = self.tables.write().await;
        if t.subjects.iter().any(|s| s.name == name) {
            return Err(AppError::Conflict(format!("Subject '{}' already exists", name)));
        }
        let subject = Subject {
            id: t.next_id(),
            name: name.to_string(),
        };
        t.subjects.push(subject.clone());
        Ok(subject)
    }

    async fn list_subjects(&self) -> Result<Vec<Subject>, AppError> {
        let t = self.tables.read().await;
        let mut subjects = t.subjects.clone();
        subjects.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(subjects)
    }

    async fn rename_subject(&self, id: i64, name: &str) -> Result<Subject, AppError> {
        let mut t = self.tables.write().await;
        t.subject(id)?;
        if t.subject_in_results(id) {
            return Err(AppError::Conflict(
                "Subject is referenced by submitted results".to_string(),
            ));
        }
        if t.subjects.iter().any(|s| s.name == name && s.id != id) {
            return Err(AppError::Conflict(format!("Subject '{}' already exists", name)));
        }
        let subject = t
            .subjects
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| AppError::NotFound(format!("Subject {} not found", id)))?;
        subject.name = name.to_string();
        Ok(subject.clone())
    }

    async fn create_question(&self, draft: &QuestionDraft) -> Result<Question, AppError> {
        let mut t = self.tables.write().await;
        t.subject(draft.subject_id)?;
        let question = Question {
            id: t.next_id(),
            subject_id: draft.subject_id,
            text: draft.text.clone(),
            options: draft.options.clone(),
            correct_option: draft.correct_option,
            difficulty: draft.difficulty,
        };
        t.questions.push(question.clone());
        Ok(question)
    }

    async fn update_question(&self, id: i64, draft: &QuestionDraft) -> Result<Question, AppError> {
        let mut t = self.tables.write().await;
        if !t.questions.iter().any(|q| q.id == id) {
            return Err(AppError::NotFound(format!("Question {} not found", id)));
        }
        if t.question_in_results(id) {
            return Err(AppError::Conflict(
                "Question is referenced by submitted results".to_string(),
            ));
        }
        t.subject(draft.subject_id)?;
        let question = t
            .questions
            .iter_mut()
            .find(|q| q.id == id)
            .ok_or_else(|| AppError::NotFound(format!("Question {} not found", id)))?;
        question.subject_id = draft.subject_id;
        question.text = draft.text.clone();
        question.options = draft.options.clone();
        question.correct_option = draft.correct_option;
        question.difficulty = draft.difficulty;
        Ok(question.clone())
    }

    async fn delete_question(&self, id: i64) -> Result<(), AppError> {
        let mut t = self.tables.write().await;
        if !t.questions.iter().any(|q| q.id == id) {
            return Err(AppError::NotFound(format!("Question {} not found", id)));
        }
        if t.question_in_results(id) {
            return Err(AppError::Conflict(
                "Question is referenced by submitted results".to_string(),
            ));
        }
        if let Some(exam) = t.exams.iter().find(|e| e.question_ids.contains(&id)) {
            return Err(AppError::Conflict(format!(
                "Question is part of exam {}",
                exam.id
            )));
        }
        t.questions.retain(|q| q.id != id);
        Ok(())
    }

    async fn list_questions(&self, subject_id: Option<i64>) -> Result<Vec<Question>, AppError> {
        let t = self.tables.read().await;
        Ok(t
            .questions
            .iter()
            .filter(|q| subject_id.is_none_or(|s| q.subject_id == s))
            .cloned()
            .collect())
    }

    async fn create_exam(&self, draft: &ExamDraft) -> Result<Exam, AppError> {
        let mut t = self.tables.write().await;
        t.subject(draft.subject_id)?;
        if let Some(missing) = draft
            .question_ids
            .iter()
            .find(|id| !t.questions.iter().any(|q| q.id == **id))
        {
            return Err(AppError::NotFound(format!("Question {} not found", missing)));
        }
        let exam = Exam {
            id: t.next_id(),
            title: draft.title.clone(),
            subject_id: draft.subject_id,
            duration: draft.duration,
            is_active: draft.is_active,
            question_ids: draft.question_ids.clone(),
            created_at: chrono::Utc::now(),
        };
        t.exams.push(exam.clone());
        Ok(exam)
    }

    async fn update_exam(&self, id: i64, patch: &ExamPatch) -> Result<Exam, AppError> {
        let mut t = self.tables.write().await;
        let exam = t
            .exams
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| AppError::NotFound(format!("Exam {} not found", id)))?;
        if let Some(title) = &patch.title {
            exam.title = title.clone();
        }
        if let Some(duration) = patch.duration {
            exam.duration = duration;
        }
        if let Some(is_active) = patch.is_active {
            exam.is_active = is_active;
        }
        Ok(exam.clone())
    }

    async fn list_exams(&self) -> Result<Vec<Exam>, AppError> {
        Ok(self.tables.read().await.exams.clone())
    }

    async fn list_active_exams(&self) -> Result<Vec<ExamSummary>, AppError> {
        let t = self.tables.read().await;
        let mut summaries: Vec<ExamSummary> = t
            .exams
            .iter()
            .filter(|e| e.is_active)
            .map(|e| t.summary(e))
            .collect();
        summaries.sort_by_key(|s| s.id);
        Ok(summaries)
    }

    async fn find_exam(&self, id: i64) -> Result<Option<Exam>, AppError> {
        let t = self.tables.read().await;
        Ok(t.exams.iter().find(|e| e.id == id).cloned())
    }

    async fn exam_summary(&self, id: i64) -> Result<Option<ExamSummary>, AppError> {
        let t = self.tables.read().await;
        Ok(t.exams.iter().find(|e| e.id == id).map(|e| t.summary(e)))
    }

    async fn exam_questions(&self, exam_id: i64) -> Result<Vec<Question>, AppError> {
        let t = self.tables.read().await;
        let Some(exam) = t.exams.iter().find(|e| e.id == exam_id) else {
            return Ok(Vec::new());
        };
        Ok(exam
            .question_ids
            .iter()
            .filter_map(|id| t.questions.iter().find(|q| q.id == *id).cloned())
            .collect())
    }

    async fn record_result(&self, result: &NewResult, policy: &ExamPolicy) -> Result<ExamResult, AppError> {
        let mut t = self.tables.write().await;

        let previous = t
            .results
            .iter()
            .filter(|r| r.learner_id == result.learner_id && r.exam_id == result.exam_id)
            .map(|r| r.created_at)
            .max();
        check_submission_policy(previous, result.submitted_at, policy)?;

        let record = ExamResult {
            id: t.next_id(),
            learner_id: result.learner_id,
            exam_id: result.exam_id,
            score: result.scorecard.score as i32,
            total: result.scorecard.total as i32,
            created_at: result.submitted_at,
        };
        for outcome in &result.scorecard.per_question {
            t.answered.insert(outcome.question_id);
        }
        t.results.push(record.clone());
        Ok(record)
    }

    async fn list_results_for(&self, learner_id: i64) -> Result<Vec<MyResult>, AppError> {
        let t = self.tables.read().await;
        let mut mine: Vec<MyResult> = t
            .results
            .iter()
            .filter(|r| r.learner_id == learner_id)
            .map(|r| MyResult {
                id: r.id,
                score: r.score,
                total: r.total,
                created_at: r.created_at,
                exam: ResultExam {
                    id: r.exam_id,
                    title: t
                        .exams
                        .iter()
                        .find(|e| e.id == r.exam_id)
                        .map(|e| e.title.clone())
                        .unwrap_or_default(),
                },
            })
            .collect();
        mine.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(mine)
    }
}
