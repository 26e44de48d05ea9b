// src/client/flow.rs

use std::{
    collections::HashMap,
    fmt,
    time::{Duration, Instant},
};

use crate::{
    client::api::{ApiError, ExamApi},
    models::{
        exam::ExamSummary,
        question::PublicQuestion,
        result::SubmissionResponse,
    },
};

/// Answers captured so far for one exam, with its countdown.
#[derive(Debug, Clone)]
pub struct AnswerSheet {
    pub exam: ExamSummary,
    pub questions: Vec<PublicQuestion>,
    answers: HashMap<i64, i32>,
    deadline: Instant,
}

impl AnswerSheet {
    fn start(exam: ExamSummary, questions: Vec<PublicQuestion>, now: Instant) -> Self {
        let budget = Duration::from_secs(exam.duration.max(0) as u64 * 60);
        Self {
            exam,
            questions,
            answers: HashMap::new(),
            deadline: now + budget,
        }
    }

    pub fn answers(&self) -> &HashMap<i64, i32> {
        &self.answers
    }

    pub fn selected(&self, question_id: i64) -> Option<i32> {
        self.answers.get(&question_id).copied()
    }

    pub fn answered_count(&self) -> usize {
        self.answers.len()
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn remaining(&self, now: Instant) -> Duration {
        self.deadline.saturating_duration_since(now)
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.deadline
    }
}

/// A finished attempt as returned by the server.
#[derive(Debug, Clone)]
pub struct CompletedExam {
    pub exam: ExamSummary,
    pub questions: Vec<PublicQuestion>,
    pub outcome: SubmissionResponse,
    /// Submitted by the timer rather than the learner.
    pub auto_submitted: bool,
}

#[derive(Debug, Clone)]
pub enum FlowState {
    Browsing,
    LoadingQuestions { exam_id: i64 },
    Answering(AnswerSheet),
    Submitting(AnswerSheet),
    ShowingResult(CompletedExam),
}

impl FlowState {
    pub fn name(&self) -> &'static str {
        match self {
            FlowState::Browsing => "browsing",
            FlowState::LoadingQuestions { .. } => "loading questions",
            FlowState::Answering(_) => "answering",
            FlowState::Submitting(_) => "submitting",
            FlowState::ShowingResult(_) => "showing result",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowError {
    Api(ApiError),
    /// The requested action is not available in the current state.
    InvalidTransition { action: &'static str, state: &'static str },
    UnknownQuestion(i64),
    OptionOutOfRange { question_id: i64, option: i32 },
    /// The countdown reached zero; the sheet is submitted as it stands.
    TimeUp,
    /// A submission is already in flight.
    SubmissionInFlight,
}

impl fmt::Display for FlowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlowError::Api(e) => write!(f, "{}", e),
            FlowError::InvalidTransition { action, state } => {
                write!(f, "cannot {} while {}", action, state)
            }
            FlowError::UnknownQuestion(id) => write!(f, "question {} is not part of this exam", id),
            FlowError::OptionOutOfRange { question_id, option } => {
                write!(f, "option {} does not exist for question {}", option, question_id)
            }
            FlowError::TimeUp => write!(f, "time is up"),
            FlowError::SubmissionInFlight => write!(f, "submission already in progress"),
        }
    }
}

impl FlowError {
    /// The attempt is stored server-side; resubmitting can only conflict again.
    pub fn already_recorded(&self) -> bool {
        matches!(self, FlowError::Api(e) if e.already_recorded())
    }
}

impl std::error::Error for FlowError {}

impl From<ApiError> for FlowError {
    fn from(err: ApiError) -> Self {
        FlowError::Api(err)
    }
}

/// Browsing -> LoadingQuestions -> Answering -> Submitting -> ShowingResult.
///
/// A failed API call never advances the machine: it is recorded as the
/// current notice and the flow returns to the last stable state (Browsing for a
/// failed load, Answering with every answer kept for a failed submit).
/// `abandon` returns to Browsing from anywhere and persists nothing.
///
/// The timer submits at most once per attempt. After a failed auto-submit only
/// an explicit `submit` retries.
pub struct ExamFlow<A> {
    api: A,
    state: FlowState,
    exams: Vec<ExamSummary>,
    notice: Option<FlowError>,
    auto_submit_failed: bool,
}

impl<A: ExamApi> ExamFlow<A> {
    pub fn new(api: A) -> Self {
        Self {
            api,
            state: FlowState::Browsing,
            exams: Vec::new(),
            notice: None,
            auto_submit_failed: false,
        }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn state(&self) -> &FlowState {
        &self.state
    }

    pub fn exams(&self) -> &[ExamSummary] {
        &self.exams
    }

    /// Last retryable error, shown to the learner without blocking.
    pub fn notice(&self) -> Option<&FlowError> {
        self.notice.as_ref()
    }

    pub fn take_notice(&mut self) -> Option<FlowError> {
        self.notice.take()
    }

    /// Whether `tick` will still submit when the countdown runs out.
    pub fn timer_armed(&self) -> bool {
        matches!(self.state, FlowState::Answering(_)) && !self.auto_submit_failed
    }

    fn fail(&mut self, err: FlowError) -> FlowError {
        tracing::warn!(state = self.state.name(), "Exam flow error: {}", err);
        self.notice = Some(err.clone());
        err
    }

    /// Reloads the exam list. Only while browsing.
    pub async fn refresh_exams(&mut self) -> Result<&[ExamSummary], FlowError> {
        if !matches!(self.state, FlowState::Browsing) {
            return Err(FlowError::InvalidTransition {
                action: "list exams",
                state: self.state.name(),
            });
        }
        match self.api.list_exams().await {
            Ok(exams) => {
                self.exams = exams;
                self.notice = None;
                Ok(&self.exams)
            }
            Err(e) => Err(self.fail(e.into())),
        }
    }

    /// Browsing -> LoadingQuestions -> Answering; the countdown starts at `now`.
    pub async fn select_exam(&mut self, exam_id: i64, now: Instant) -> Result<(), FlowError> {
        if !matches!(self.state, FlowState::Browsing) {
            return Err(FlowError::InvalidTransition {
                action: "select an exam",
                state: self.state.name(),
            });
        }

        self.state = FlowState::LoadingQuestions { exam_id };
        match self.api.exam_questions(exam_id).await {
            Ok(loaded) => {
                tracing::info!(exam_id, questions = loaded.questions.len(), "Exam started");
                self.notice = None;
                self.auto_submit_failed = false;
                self.state = FlowState::Answering(AnswerSheet::start(loaded.exam, loaded.questions, now));
                Ok(())
            }
            Err(e) => {
                self.state = FlowState::Browsing;
                Err(self.fail(e.into()))
            }
        }
    }

    /// Records (or replaces) the selected option for a question.
    pub fn answer(&mut self, question_id: i64, option: i32, now: Instant) -> Result<(), FlowError> {
        let state = self.state.name();
        let FlowState::Answering(sheet) = &mut self.state else {
            return Err(FlowError::InvalidTransition {
                action: "answer",
                state,
            });
        };
        if sheet.is_expired(now) {
            return Err(FlowError::TimeUp);
        }
        let question = sheet
            .questions
            .iter()
            .find(|q| q.id == question_id)
            .ok_or(FlowError::UnknownQuestion(question_id))?;
        if option < 1 || option as usize > question.options.len() {
            return Err(FlowError::OptionOutOfRange { question_id, option });
        }
        sheet.answers.insert(question_id, option);
        Ok(())
    }

    /// Removes the answer for a question, leaving it unanswered.
    pub fn clear_answer(&mut self, question_id: i64) -> Result<(), FlowError> {
        let state = self.state.name();
        let FlowState::Answering(sheet) = &mut self.state else {
            return Err(FlowError::InvalidTransition {
                action: "clear an answer",
                state,
            });
        };
        sheet.answers.remove(&question_id);
        Ok(())
    }

    /// Answering -> Submitting -> ShowingResult on the learner's request.
    pub async fn submit(&mut self) -> Result<(), FlowError> {
        self.submit_sheet(false).await
    }

    /// Drives the countdown: once it reaches zero the sheet is submitted as it
    /// stands. Returns whether a submission succeeded on this tick.
    pub async fn tick(&mut self, now: Instant) -> Result<bool, FlowError> {
        if !self.timer_armed() {
            return Ok(false);
        }
        let expired = match &self.state {
            FlowState::Answering(sheet) if sheet.is_expired(now) => Some(sheet.exam.id),
            _ => None,
        };
        let Some(exam_id) = expired else {
            return Ok(false);
        };

        tracing::info!(exam_id, "Time is up, submitting");
        let submitted = self.submit_sheet(true).await;
        self.auto_submit_failed = submitted.is_err();
        submitted.map(|_| true)
    }

    async fn submit_sheet(&mut self, auto_submitted: bool) -> Result<(), FlowError> {
        let sheet = match &self.state {
            FlowState::Answering(sheet) => sheet.clone(),
            FlowState::Submitting(_) => return Err(FlowError::SubmissionInFlight),
            other => {
                return Err(FlowError::InvalidTransition {
                    action: "submit",
                    state: other.name(),
                });
            }
        };

        self.state = FlowState::Submitting(sheet.clone());
        let submitted = self.api.submit(sheet.exam.id, &sheet.answers).await;

        match submitted {
            Ok(outcome) => {
                tracing::info!(
                    exam_id = sheet.exam.id,
                    score = outcome.score,
                    total = outcome.total,
                    "Exam submitted"
                );
                self.notice = None;
                self.state = FlowState::ShowingResult(CompletedExam {
                    exam: sheet.exam,
                    questions: sheet.questions,
                    outcome,
                    auto_submitted,
                });
                Ok(())
            }
            Err(e) => {
                self.state = FlowState::Answering(sheet);
                Err(self.fail(e.into()))
            }
        }
    }

    /// Leaves whatever is in progress and goes back to the exam list.
    pub fn abandon(&mut self) {
        if !matches!(self.state, FlowState::Browsing) {
            tracing::info!(state = self.state.name(), "Exam session abandoned");
        }
        self.state = FlowState::Browsing;
    }
}
