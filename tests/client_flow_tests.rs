// tests/client_flow_tests.rs

mod common;

use std::{
    collections::HashMap,
    sync::Mutex,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use common::spawn_app;
use exam_portal::{
    client::{ApiError, ExamApi, ExamFlow, FlowError, FlowState, HttpExamApi, Session},
    models::{
        exam::{ExamQuestionsResponse, ExamSummary},
        question::{Difficulty, PublicQuestion},
        result::{MyResult, QuestionFeedback, SubmissionResponse},
    },
};

/// Scripted `ExamApi`: each call pops the next queued failure, if any.
#[derive(Default)]
struct FakeApi {
    load_failures: Mutex<Vec<ApiError>>,
    submit_failures: Mutex<Vec<ApiError>>,
    submitted: Mutex<Vec<HashMap<i64, i32>>>,
}

fn summary() -> ExamSummary {
    ExamSummary {
        id: 1,
        title: "General Knowledge Mock Test".to_string(),
        duration: 15,
        question_count: 2,
        subject_name: "General Knowledge".to_string(),
    }
}

fn questions() -> Vec<PublicQuestion> {
    vec![
        PublicQuestion {
            id: 1,
            text: "What is the capital of France?".to_string(),
            options: vec!["London".into(), "Berlin".into(), "Paris".into(), "Madrid".into()],
            difficulty: Difficulty::Easy,
        },
        PublicQuestion {
            id: 2,
            text: "Which planet is known as the Red Planet?".to_string(),
            options: vec!["Venus".into(), "Mars".into(), "Jupiter".into(), "Saturn".into()],
            difficulty: Difficulty::Easy,
        },
    ]
}

#[async_trait]
impl ExamApi for FakeApi {
    async fn list_exams(&self) -> Result<Vec<ExamSummary>, ApiError> {
        Ok(vec![summary()])
    }

    async fn exam_questions(&self, exam_id: i64) -> Result<ExamQuestionsResponse, ApiError> {
        if let Some(err) = self.load_failures.lock().unwrap().pop() {
            return Err(err);
        }
        if exam_id != 1 {
            return Err(ApiError::NotFound(format!("Exam {} not found", exam_id)));
        }
        Ok(ExamQuestionsResponse {
            exam: summary(),
            questions: questions(),
        })
    }

    async fn submit(&self, _exam_id: i64, answers: &HashMap<i64, i32>) -> Result<SubmissionResponse, ApiError> {
        if let Some(err) = self.submit_failures.lock().unwrap().pop() {
            return Err(err);
        }
        self.submitted.lock().unwrap().push(answers.clone());

        let key = [(1, 3), (2, 2)];
        let per_question: Vec<QuestionFeedback> = key
            .iter()
            .map(|(id, correct)| QuestionFeedback {
                question_id: *id,
                selected_option: answers.get(id).copied(),
                correct: answers.get(id) == Some(correct),
                correct_option: None,
            })
            .collect();
        Ok(SubmissionResponse {
            result_id: 10,
            score: per_question.iter().filter(|f| f.correct).count() as u32,
            total: 2,
            per_question,
        })
    }

    async fn my_results(&self) -> Result<Vec<MyResult>, ApiError> {
        Ok(Vec::new())
    }
}

#[tokio::test]
async fn full_attempt_reaches_result() {
    let mut flow = ExamFlow::new(FakeApi::default());
    let start = Instant::now();

    assert_eq!(flow.refresh_exams().await.unwrap().len(), 1);
    flow.select_exam(1, start).await.unwrap();
    assert!(matches!(flow.state(), FlowState::Answering(_)));

    flow.answer(1, 3, start).unwrap();
    flow.answer(2, 4, start).unwrap();
    // Changing an answer replaces it
    flow.answer(2, 1, start).unwrap();
    flow.submit().await.unwrap();

    let FlowState::ShowingResult(done) = flow.state() else {
        panic!("expected a result, got {}", flow.state().name());
    };
    assert_eq!(done.outcome.score, 1);
    assert_eq!(done.outcome.total, 2);
    assert!(!done.auto_submitted);
    assert_eq!(flow.api().submitted.lock().unwrap()[0], HashMap::from([(1, 3), (2, 1)]));
}

#[tokio::test]
async fn failed_load_returns_to_browsing() {
    let api = FakeApi::default();
    api.load_failures
        .lock()
        .unwrap()
        .push(ApiError::Network("connection reset".into()));
    let mut flow = ExamFlow::new(api);

    let err = flow.select_exam(1, Instant::now()).await.unwrap_err();
    assert!(matches!(err, FlowError::Api(ApiError::Network(_))));
    assert!(matches!(flow.state(), FlowState::Browsing));
    assert!(flow.take_notice().is_some());

    // Retrying works once the network is back
    flow.select_exam(1, Instant::now()).await.unwrap();
    assert!(matches!(flow.state(), FlowState::Answering(_)));
    assert!(flow.notice().is_none());
}

#[tokio::test]
async fn failed_submit_keeps_answers() {
    let api = FakeApi::default();
    api.submit_failures.lock().unwrap().push(ApiError::Rejected {
        status: 500,
        code: "internal".into(),
        message: "Internal Server Error".into(),
    });
    let mut flow = ExamFlow::new(api);
    let start = Instant::now();
    flow.select_exam(1, start).await.unwrap();
    flow.answer(1, 3, start).unwrap();

    let err = flow.submit().await.unwrap_err();
    assert!(matches!(err, FlowError::Api(ref e) if e.is_retryable()));

    let FlowState::Answering(sheet) = flow.state() else {
        panic!("expected to be answering, got {}", flow.state().name());
    };
    assert_eq!(sheet.selected(1), Some(3));

    flow.submit().await.unwrap();
    assert!(matches!(flow.state(), FlowState::ShowingResult(_)));
    assert_eq!(flow.api().submitted.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn timer_submits_when_time_is_up() {
    let mut flow = ExamFlow::new(FakeApi::default());
    let start = Instant::now();
    flow.select_exam(1, start).await.unwrap();
    flow.answer(1, 3, start).unwrap();

    // Not yet
    assert!(!flow.tick(start + Duration::from_secs(14 * 60)).await.unwrap());
    assert!(matches!(flow.state(), FlowState::Answering(_)));

    let late = start + Duration::from_secs(15 * 60);
    assert_eq!(flow.answer(2, 2, late), Err(FlowError::TimeUp));
    assert!(flow.tick(late).await.unwrap());

    let FlowState::ShowingResult(done) = flow.state() else {
        panic!("expected a result, got {}", flow.state().name());
    };
    assert!(done.auto_submitted);
    assert_eq!(done.outcome.score, 1);
}

#[tokio::test]
async fn answers_are_checked_against_the_sheet() {
    let mut flow = ExamFlow::new(FakeApi::default());
    let now = Instant::now();

    assert!(matches!(
        flow.answer(1, 1, now),
        Err(FlowError::InvalidTransition { .. })
    ));

    flow.select_exam(1, now).await.unwrap();
    assert_eq!(flow.answer(42, 1, now), Err(FlowError::UnknownQuestion(42)));
    assert_eq!(
        flow.answer(1, 5, now),
        Err(FlowError::OptionOutOfRange { question_id: 1, option: 5 })
    );

    flow.answer(1, 2, now).unwrap();
    flow.clear_answer(1).unwrap();
    let FlowState::Answering(sheet) = flow.state() else {
        panic!("expected to be answering");
    };
    assert_eq!(sheet.answered_count(), 0);
}

#[tokio::test]
async fn abandon_discards_the_attempt() {
    let mut flow = ExamFlow::new(FakeApi::default());
    flow.select_exam(1, Instant::now()).await.unwrap();
    flow.answer(1, 3, Instant::now()).unwrap();

    flow.abandon();

    assert!(matches!(flow.state(), FlowState::Browsing));
    assert!(flow.api().submitted.lock().unwrap().is_empty());
    assert!(matches!(
        flow.submit().await,
        Err(FlowError::InvalidTransition { action: "submit", .. })
    ));
}

#[tokio::test]
async fn http_client_takes_an_exam_end_to_end() {
    let app = spawn_app().await;
    let seeded = app.seed_exam(true).await;
    app.client
        .post(app.url("/auth/register"))
        .json(&serde_json::json!({ "username": "terminal_user", "password": "password123" }))
        .send()
        .await
        .unwrap();

    let mut api = HttpExamApi::new(Session::ephemeral(format!("{}/", app.address)));
    assert!(matches!(
        api.list_exams().await,
        Err(ApiError::Unauthorized(_))
    ));

    let login = api.login("terminal_user", "password123").await.unwrap();
    assert_eq!(login.token_type, "Bearer");
    api.session_mut().begin(login.token).unwrap();

    let mut flow = ExamFlow::new(api);
    let exams = flow.refresh_exams().await.unwrap();
    assert!(exams.iter().any(|e| e.id == seeded.exam_id));

    let now = Instant::now();
    flow.select_exam(seeded.exam_id, now).await.unwrap();
    flow.answer(seeded.q1, 3, now).unwrap();
    flow.answer(seeded.q2, 1, now).unwrap();
    flow.submit().await.unwrap();

    let FlowState::ShowingResult(done) = flow.state() else {
        panic!("expected a result, got {}", flow.state().name());
    };
    assert_eq!((done.outcome.score, done.outcome.total), (1, 2));

    let history = flow.api().my_results().await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].id, done.outcome.result_id);

    // Unknown exam maps to NotFound and leaves the flow browsing
    flow.abandon();
    let err = flow.select_exam(987_654, Instant::now()).await.unwrap_err();
    assert!(matches!(err, FlowError::Api(ApiError::NotFound(_))));
}

#[tokio::test]
async fn failed_auto_submit_waits_for_the_learner() {
    let api = FakeApi::default();
    api.submit_failures.lock().unwrap().push(ApiError::Rejected {
        status: 503,
        code: "internal".into(),
        message: "Service Unavailable".into(),
    });
    let mut flow = ExamFlow::new(api);
    let start = Instant::now();
    flow.select_exam(1, start).await.unwrap();
    flow.answer(1, 3, start).unwrap();
    assert!(flow.timer_armed());

    let late = start + Duration::from_secs(16 * 60);
    assert!(flow.tick(late).await.is_err());
    assert!(!flow.timer_armed());

    // Further ticks post nothing, however late it gets
    for minutes in [17, 30, 600] {
        assert!(!flow.tick(start + Duration::from_secs(minutes * 60)).await.unwrap());
    }
    assert!(flow.api().submitted.lock().unwrap().is_empty());

    // An explicit submit still goes through with the captured answers
    flow.submit().await.unwrap();
    assert_eq!(flow.api().submitted.lock().unwrap().len(), 1);
    assert_eq!(flow.api().submitted.lock().unwrap()[0], HashMap::from([(1, 3)]));
}

#[tokio::test]
async fn conflict_on_submit_is_reported_as_already_recorded() {
    let api = FakeApi::default();
    api.submit_failures.lock().unwrap().push(ApiError::Rejected {
        status: 409,
        code: "conflict".into(),
        message: "Duplicate submission, please wait before resubmitting".into(),
    });
    let mut flow = ExamFlow::new(api);
    let start = Instant::now();
    flow.select_exam(1, start).await.unwrap();

    let err = flow.tick(start + Duration::from_secs(15 * 60)).await.unwrap_err();
    assert!(err.already_recorded());
    assert!(!FlowError::Api(ApiError::Network("reset".into())).already_recorded());
    assert!(!flow.timer_armed());
}

#[tokio::test]
async fn timer_rearms_for_the_next_attempt() {
    let api = FakeApi::default();
    api.submit_failures
        .lock()
        .unwrap()
        .push(ApiError::Network("timed out".into()));
    let mut flow = ExamFlow::new(api);
    let start = Instant::now();
    flow.select_exam(1, start).await.unwrap();
    assert!(flow.tick(start + Duration::from_secs(15 * 60)).await.is_err());

    flow.abandon();
    let restart = Instant::now();
    flow.select_exam(1, restart).await.unwrap();
    assert!(flow.timer_armed());
    assert!(flow.tick(restart + Duration::from_secs(15 * 60)).await.unwrap());
}
