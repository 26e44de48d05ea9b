// src/client/api.rs

use std::{collections::HashMap, fmt};

use async_trait::async_trait;
use reqwest::{RequestBuilder, StatusCode};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::json;

use crate::{
    client::session::Session,
    models::{
        exam::{ExamQuestionsResponse, ExamSummary},
        result::{MyResult, SubmissionResponse},
        user::{LoginResponse, UserProfile},
    },
};

/// Failure of a single API call, as seen by the learner-side flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// Transport failure or timeout; nothing is known about the server side.
    Network(String),
    /// Missing, invalid or expired token (401).
    Unauthorized(String),
    NotFound(String),
    /// Any other non-success answer, with the server's error code.
    Rejected {
        status: u16,
        code: String,
        message: String,
    },
    /// The server answered with a body the client could not read.
    Decode(String),
}

impl ApiError {
    /// Whether trying the same call again may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::Network(_) => true,
            ApiError::Rejected { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// The server already holds a result for this attempt (409 `conflict`).
    pub fn already_recorded(&self) -> bool {
        matches!(self, ApiError::Rejected { status: 409, .. })
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Network(msg) => write!(f, "network error: {}", msg),
            ApiError::Unauthorized(msg) => write!(f, "unauthorized: {}", msg),
            ApiError::NotFound(msg) => write!(f, "not found: {}", msg),
            ApiError::Rejected { status, code, message } => {
                write!(f, "request rejected ({} {}): {}", status, code, message)
            }
            ApiError::Decode(msg) => write!(f, "unexpected response: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else {
            ApiError::Network(err.to_string())
        }
    }
}

/// The learner-facing endpoints the exam flow drives.
#[async_trait]
pub trait ExamApi: Send + Sync {
    async fn list_exams(&self) -> Result<Vec<ExamSummary>, ApiError>;
    async fn exam_questions(&self, exam_id: i64) -> Result<ExamQuestionsResponse, ApiError>;
    async fn submit(&self, exam_id: i64, answers: &HashMap<i64, i32>) -> Result<SubmissionResponse, ApiError>;
    async fn my_results(&self) -> Result<Vec<MyResult>, ApiError>;
}

/// `ExamApi` over HTTP/JSON.
#[derive(Debug, Clone)]
pub struct HttpExamApi {
    http: reqwest::Client,
    session: Session,
}

impl HttpExamApi {
    pub fn new(session: Session) -> Self {
        Self {
            http: reqwest::Client::new(),
            session,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    /// `POST /auth/login`.
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginResponse, ApiError> {
        let request = self
            .http
            .post(self.url("/auth/login"))
            .json(&json!({ "username": username, "password": password }));
        send(request).await
    }

    /// `POST /auth/register`.
    pub async fn register(&self, username: &str, password: &str) -> Result<UserProfile, ApiError> {
        let request = self
            .http
            .post(self.url("/auth/register"))
            .json(&json!({ "username": username, "password": password }));
        send(request).await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.session.base_url(), path)
    }

    fn authorized(&self, request: RequestBuilder) -> Result<RequestBuilder, ApiError> {
        let token = self
            .session
            .token()
            .ok_or_else(|| ApiError::Unauthorized("not logged in".to_string()))?;
        Ok(request.bearer_auth(token))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        send(self.authorized(self.http.get(self.url(path)))?).await
    }

    async fn post_json<B: Serialize + Sync, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T, ApiError> {
        send(self.authorized(self.http.post(self.url(path)))?.json(body)).await
    }
}

/// Sends `request` and maps the server's `{"error", "code"}` bodies onto `ApiError`.
async fn send<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, ApiError> {
    let response = request.send().await?;
    let status = response.status();

    if status.is_success() {
        return Ok(response.json::<T>().await?);
    }

    let body: serde_json::Value = response.json().await.unwrap_or_default();
    let message = body["error"].as_str().unwrap_or("").to_string();
    let code = body["code"].as_str().unwrap_or("").to_string();

    tracing::debug!(status = status.as_u16(), %code, "API call failed: {}", message);

    Err(match status {
        StatusCode::UNAUTHORIZED => ApiError::Unauthorized(message),
        StatusCode::NOT_FOUND => ApiError::NotFound(message),
        _ => ApiError::Rejected {
            status: status.as_u16(),
            code,
            message,
        },
    })
}

#[async_trait]
impl ExamApi for HttpExamApi {
    async fn list_exams(&self) -> Result<Vec<ExamSummary>, ApiError> {
        self.get_json("/user/exams").await
    }

    async fn exam_questions(&self, exam_id: i64) -> Result<ExamQuestionsResponse, ApiError> {
        self.get_json(&format!("/user/exam/{}/questions", exam_id)).await
    }

    async fn submit(&self, exam_id: i64, answers: &HashMap<i64, i32>) -> Result<SubmissionResponse, ApiError> {
        self.post_json(
            "/user/exam/submit",
            &json!({ "examId": exam_id, "answers": answers }),
        )
        .await
    }

    async fn my_results(&self) -> Result<Vec<MyResult>, ApiError> {
        self.get_json("/user/my-results").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transport_and_server_failures_are_retryable() {
        assert!(ApiError::Network("reset".into()).is_retryable());
        assert!(
            ApiError::Rejected {
                status: 500,
                code: "internal".into(),
                message: String::new()
            }
            .is_retryable()
        );
        assert!(
            !ApiError::Rejected {
                status: 409,
                code: "conflict".into(),
                message: String::new()
            }
            .is_retryable()
        );
        assert!(!ApiError::Unauthorized(String::new()).is_retryable());
    }

    #[test]
    fn conflict_means_already_recorded() {
        let conflict = ApiError::Rejected {
            status: 409,
            code: "conflict".into(),
            message: "Duplicate submission".into(),
        };
        assert!(conflict.already_recorded());
        assert!(!conflict.is_retryable());
        assert!(!ApiError::Network("reset".into()).already_recorded());
    }
}
