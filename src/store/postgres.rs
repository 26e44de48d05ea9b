// src/store/postgres.rs

use async_trait::async_trait;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder, types::Json};

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

/// Helper struct for fetching users; `role` is stored as TEXT.
#[derive(FromRow)]
struct UserRow {
    id: i64,
    username: String,
    password: String,
    role: String,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = AppError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(User {
            id: row.id,
            username: row.username,
            password: row.password,
            role: row.role.parse().map_err(AppError::InternalServerError)?,
            created_at: row.created_at,
        })
    }
}

/// Helper struct for fetching questions; options live in a JSONB column.
#[derive(FromRow)]
struct QuestionRow {
    id: i64,
    subject_id: i64,
    text: String,
    options: Json<Vec<String>>,
    correct_option: i32,
    difficulty: String,
}

impl TryFrom<QuestionRow> for Question {
    type Error = AppError;

    fn try_from(row: QuestionRow) -> Result<Self, Self::Error> {
        Ok(Question {
            id: row.id,
            subject_id: row.subject_id,
            text: row.text,
            options: row.options.0,
            correct_option: row.correct_option,
            difficulty: row.difficulty.parse().map_err(AppError::InternalServerError)?,
        })
    }
}

#[derive(FromRow)]
struct ExamRow {
    id: i64,
    title: String,
    subject_id: i64,
    duration: i32,
    is_active: bool,
    question_ids: Vec<i64>,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl From<ExamRow> for Exam {
    fn from(row: ExamRow) -> Self {
        Exam {
            id: row.id,
            title: row.title,
            subject_id: row.subject_id,
            duration: row.duration,
            is_active: row.is_active,
            question_ids: row.question_ids,
            created_at: row.created_at,
        }
    }
}

#[derive(FromRow)]
struct MyResultRow {
    id: i64,
    score: i32,
    total: i32,
    created_at: chrono::DateTime<chrono::Utc>,
    exam_id: i64,
    exam_title: String,
}

const QUESTION_COLUMNS: &str = "id, subject_id, text, options, correct_option, difficulty";

const EXAM_SELECT: &str = r#"
    SELECT
        e.id,
        e.title,
        e.subject_id,
        e.duration,
        e.is_active,
        ARRAY(
            SELECT eq.question_id FROM exam_questions eq
            WHERE eq.exam_id = e.id
            ORDER BY eq.position
        ) AS question_ids,
        e.created_at
    FROM exams e
"#;

const SUMMARY_SELECT: &str = r#"
    SELECT
        e.id,
        e.title,
        e.duration,
        COUNT(eq.question_id) AS question_count,
        s.name AS subject_name
    FROM exams e
    JOIN subjects s ON s.id = e.subject_id
    LEFT JOIN exam_questions eq ON eq.exam_id = e.id
"#;

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_foreign_key_violation())
}

/// `ExamStore` backed by PostgreSQL.
#[derive(Clone)]
pub struct PgExamStore {
    pool: PgPool,
}

impl PgExamStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn require_subject(&self, id: i64) -> Result<(), AppError> {
        sqlx::query_scalar::<_, i64>("SELECT id FROM subjects WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Subject {} not found", id)))?;
        Ok(())
    }

    async fn question_in_results(&self, id: i64) -> Result<bool, AppError> {
        let referenced = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM result_answers WHERE question_id = $1)",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await?;
        Ok(referenced)
    }

    async fn exam_containing(&self, question_id: i64) -> Result<Option<i64>, AppError> {
        let exam_id = sqlx::query_scalar::<_, i64>(
            "SELECT exam_id FROM exam_questions WHERE question_id = $1 ORDER BY exam_id LIMIT 1",
        )
        .bind(question_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(exam_id)
    }

    async fn require_question(&self, id: i64) -> Result<(), AppError> {
        sqlx::query_scalar::<_, i64>("SELECT id FROM questions WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Question {} not found", id)))?;
        Ok(())
    }
}

#[async_trait]
impl ExamStore for PgExamStore {
    async fn create_user(&self, username: &str, password_hash: &str, role: Role) -> Result<User, AppError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            INSERT INTO users (username, password, role)
            VALUES ($1, $2, $3)
            RETURNING id, username, password, role, created_at
            "#,
        )
        .bind(username)
        .bind(password_hash)
        .bind(role.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Conflict(format!("Username '{}' already exists", username))
            } else {
                tracing::error!("Failed to create user: {:?}", e);
                AppError::from(e)
            }
        })?;

        row.try_into()
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, username, password, role, created_at FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        row.map(User::try_from).transpose()
    }

    async fn create_subject(&self, name: &str) -> Result<Subject, AppError> {
        sqlx::query_as::<_, Subject>("INSERT INTO subjects (name) VALUES ($1) RETURNING id, name")
            .bind(name)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    AppError::Conflict(format!("Subject '{}' already exists", name))
                } else {
                    AppError::from(e)
                }
            })
    }

    async fn list_subjects(&self) -> Result<Vec<Subject>, AppError> {
        let subjects = sqlx::query_as::<_, Subject>("SELECT id, name FROM subjects ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        Ok(subjects)
    }

    async fn rename_subject(&self, id: i64, name: &str) -> Result<Subject, AppError> {
        self.require_subject(id).await?;

        let referenced = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM results r
                JOIN exams e ON e.id = r.exam_id
                WHERE e.subject_id = $1
                UNION ALL
                SELECT 1 FROM result_answers ra
                JOIN questions q ON q.id = ra.question_id
                WHERE q.subject_id = $1
            )
            "#,
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await?;

        if referenced {
            return Err(AppError::Conflict(
                "Subject is referenced by submitted results".to_string(),
            ));
        }

        sqlx::query_as::<_, Subject>("UPDATE subjects SET name = $2 WHERE id = $1 RETURNING id, name")
            .bind(id)
            .bind(name)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    AppError::Conflict(format!("Subject '{}' already exists", name))
                } else {
                    AppError::from(e)
                }
            })
    }

    async fn create_question(&self, draft: &QuestionDraft) -> Result<Question, AppError> {
        self.require_subject(draft.subject_id).await?;

        let row = sqlx::query_as::<_, QuestionRow>(&format!(
            r#"
            INSERT INTO questions (subject_id, text, options, correct_option, difficulty)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {}
            "#,
            QUESTION_COLUMNS
        ))
        .bind(draft.subject_id)
        .bind(&draft.text)
        .bind(Json(&draft.options))
        .bind(draft.correct_option)
        .bind(draft.difficulty.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to create question: {:?}", e);
            AppError::from(e)
        })?;

        row.try_into()
    }

    async fn update_question(&self, id: i64, draft: &QuestionDraft) -> Result<Question, AppError> {
        self.require_question(id).await?;
        if self.question_in_results(id).await? {
            return Err(AppError::Conflict(
                "Question is referenced by submitted results".to_string(),
            ));
        }
        self.require_subject(draft.subject_id).await?;

        let row = sqlx::query_as::<_, QuestionRow>(&format!(
            r#"
            UPDATE questions
            SET subject_id = $2, text = $3, options = $4, correct_option = $5, difficulty = $6
            WHERE id = $1
            RETURNING {}
            "#,
            QUESTION_COLUMNS
        ))
        .bind(id)
        .bind(draft.subject_id)
        .bind(&draft.text)
        .bind(Json(&draft.options))
        .bind(draft.correct_option)
        .bind(draft.difficulty.as_str())
        .fetch_one(&self.pool)
        .await?;

        row.try_into()
    }

    async fn delete_question(&self, id: i64) -> Result<(), AppError> {
        self.require_question(id).await?;
        if self.question_in_results(id).await? {
            return Err(AppError::Conflict(
                "Question is referenced by submitted results".to_string(),
            ));
        }
        if let Some(exam_id) = self.exam_containing(id).await? {
            return Err(AppError::Conflict(format!("Question is part of exam {}", exam_id)));
        }

        sqlx::query("DELETE FROM questions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                // An exam or result picked the question up between the check and the delete.
                if is_foreign_key_violation(&e) {
                    AppError::Conflict("Question is referenced by an exam or a result".to_string())
                } else {
                    AppError::from(e)
                }
            })?;

        Ok(())
    }

    async fn list_questions(&self, subject_id: Option<i64>) -> Result<Vec<Question>, AppError> {
        let rows = sqlx::query_as::<_, QuestionRow>(&format!(
            "SELECT {} FROM questions WHERE ($1::BIGINT IS NULL OR subject_id = $1) ORDER BY id",
            QUESTION_COLUMNS
        ))
        .bind(subject_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Question::try_from).collect()
    }

    async fn create_exam(&self, draft: &ExamDraft) -> Result<Exam, AppError> {
        self.require_subject(draft.subject_id).await?;

        let mut tx = self.pool.begin().await?;

        let existing: Vec<i64> = sqlx::query_scalar("SELECT id FROM questions WHERE id = ANY($1)")
            .bind(&draft.question_ids)
            .fetch_all(&mut *tx)
            .await?;
        if let Some(missing) = draft.question_ids.iter().find(|id| !existing.contains(id)) {
            return Err(AppError::NotFound(format!("Question {} not found", missing)));
        }

        let (id, created_at): (i64, chrono::DateTime<chrono::Utc>) = sqlx::query_as(
            r#"
            INSERT INTO exams (title, subject_id, duration, is_active)
            VALUES ($1, $2, $3, $4)
            RETURNING id, created_at
            "#,
        )
        .bind(&draft.title)
        .bind(draft.subject_id)
        .bind(draft.duration)
        .bind(draft.is_active)
        .fetch_one(&mut *tx)
        .await?;

        let mut query_builder =
            QueryBuilder::<Postgres>::new("INSERT INTO exam_questions (exam_id, question_id, position) ");
        query_builder.push_values(draft.question_ids.iter().enumerate(), |mut b, (pos, qid)| {
            b.push_bind(id).push_bind(*qid).push_bind(pos as i32);
        });
        query_builder.build().execute(&mut *tx).await?;

        tx.commit().await?;

        Ok(Exam {
            id,
            title: draft.title.clone(),
            subject_id: draft.subject_id,
            duration: draft.duration,
            is_active: draft.is_active,
            question_ids: draft.question_ids.clone(),
            created_at,
        })
    }

    async fn update_exam(&self, id: i64, patch: &ExamPatch) -> Result<Exam, AppError> {
        let updated = sqlx::query(
            r#"
            UPDATE exams SET
                title = COALESCE($2, title),
                duration = COALESCE($3, duration),
                is_active = COALESCE($4, is_active)
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(patch.title.as_deref())
        .bind(patch.duration)
        .bind(patch.is_active)
        .execute(&self.pool)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Exam {} not found", id)));
        }

        self.find_exam(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Exam {} not found", id)))
    }

    async fn list_exams(&self) -> Result<Vec<Exam>, AppError> {
        let rows = sqlx::query_as::<_, ExamRow>(&format!("{} ORDER BY e.id", EXAM_SELECT))
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Exam::from).collect())
    }

    async fn list_active_exams(&self) -> Result<Vec<ExamSummary>, AppError> {
        let summaries = sqlx::query_as::<_, ExamSummary>(&format!(
            "{} WHERE e.is_active GROUP BY e.id, s.name ORDER BY e.id",
            SUMMARY_SELECT
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to list active exams: {:?}", e);
            AppError::from(e)
        })?;
        Ok(summaries)
    }

    async fn find_exam(&self, id: i64) -> Result<Option<Exam>, AppError> {
        let row = sqlx::query_as::<_, ExamRow>(&format!("{} WHERE e.id = $1", EXAM_SELECT))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Exam::from))
    }

    async fn exam_summary(&self, id: i64) -> Result<Option<ExamSummary>, AppError> {
        let summary = sqlx::query_as::<_, ExamSummary>(&format!(
            "{} WHERE e.id = $1 GROUP BY e.id, s.name",
            SUMMARY_SELECT
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(summary)
    }

    async fn exam_questions(&self, exam_id: i64) -> Result<Vec<Question>, AppError> {
        let rows = sqlx::query_as::<_, QuestionRow>(
            r#"
            SELECT q.id, q.subject_id, q.text, q.options, q.correct_option, q.difficulty
            FROM exam_questions eq
            JOIN questions q ON q.id = eq.question_id
            WHERE eq.exam_id = $1
            ORDER BY eq.position
            "#,
        )
        .bind(exam_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Question::try_from).collect()
    }

    async fn record_result(&self, result: &NewResult, policy: &ExamPolicy) -> Result<ExamResult, AppError> {
        let mut tx = self.pool.begin().await?;

        // Row lock on the learner serializes their submissions until commit.
        sqlx::query_scalar::<_, i64>("SELECT id FROM users WHERE id = $1 FOR UPDATE")
            .bind(result.learner_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::AuthError("Unknown learner".to_string()))?;

        let previous: Option<chrono::DateTime<chrono::Utc>> = sqlx::query_scalar(
            "SELECT MAX(created_at) FROM results WHERE learner_id = $1 AND exam_id = $2",
        )
        .bind(result.learner_id)
        .bind(result.exam_id)
        .fetch_one(&mut *tx)
        .await?;

        check_submission_policy(previous, result.submitted_at, policy)?;

        let record = sqlx::query_as::<_, ExamResult>(
            r#"
            INSERT INTO results (learner_id, exam_id, score, total, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, learner_id, exam_id, score, total, created_at
            "#,
        )
        .bind(result.learner_id)
        .bind(result.exam_id)
        .bind(result.scorecard.score as i32)
        .bind(result.scorecard.total as i32)
        .bind(result.submitted_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            tracing::error!("Failed to insert result: {:?}", e);
            AppError::from(e)
        })?;

        if !result.scorecard.per_question.is_empty() {
            let mut query_builder = QueryBuilder::<Postgres>::new(
                "INSERT INTO result_answers (result_id, question_id, selected_option, correct) ",
            );
            query_builder.push_values(&result.scorecard.per_question, |mut b, outcome| {
                b.push_bind(record.id)
                    .push_bind(outcome.question_id)
                    .push_bind(outcome.selected_option)
                    .push_bind(outcome.correct);
            });
            query_builder.build().execute(&mut *tx).await?;
        }

        tx.commit().await?;

        Ok(record)
    }

    async fn list_results_for(&self, learner_id: i64) -> Result<Vec<MyResult>, AppError> {
        let rows = sqlx::query_as::<_, MyResultRow>(
            r#"
            SELECT
                r.id,
                r.score,
                r.total,
                r.created_at,
                e.id AS exam_id,
                e.title AS exam_title
            FROM results r
            JOIN exams e ON e.id = r.exam_id
            WHERE r.learner_id = $1
            ORDER BY r.created_at DESC, r.id DESC
            "#,
        )
        .bind(learner_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to fetch results: {:?}", e);
            AppError::from(e)
        })?;

        Ok(rows
            .into_iter()
            .map(|row| MyResult {
                id: row.id,
                score: row.score,
                total: row.total,
                created_at: row.created_at,
                exam: ResultExam {
                    id: row.exam_id,
                    title: row.exam_title,
                },
            })
            .collect())
    }
}
