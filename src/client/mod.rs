// src/client/mod.rs

//! Learner-side exam flow: API client, session lifecycle, the
//! browse/answer/submit state machine and its text rendering.

pub mod api;
pub mod flow;
pub mod render;
pub mod session;

pub use api::{ApiError, ExamApi, HttpExamApi};
pub use flow::{AnswerSheet, CompletedExam, ExamFlow, FlowError, FlowState};
pub use session::{Session, SessionError};
