// tests/common/mod.rs

#![allow(dead_code)]

use std::sync::Arc;

use exam_portal::{
    config::{Config, ExamPolicy, StoreBackend},
    models::{
        exam::ExamDraft,
        question::{Difficulty, QuestionDraft},
        user::Role,
    },
    routes,
    state::AppState,
    store::{ExamStore, MemoryExamStore},
    utils::jwt::sign_jwt,
};

pub const JWT_SECRET: &str = "test_secret_for_integration_tests";
pub const ALLOWED_ORIGIN: &str = "http://localhost:3000";

pub struct TestApp {
    pub address: String,
    pub store: Arc<MemoryExamStore>,
    pub client: reqwest::Client,
}

/// Ids of the fixture exam seeded by `seed_exam`.
pub struct SeededExam {
    pub subject_id: i64,
    pub exam_id: i64,
    /// Correct option 3 of 4.
    pub q1: i64,
    /// Correct option 2 of 4.
    pub q2: i64,
}

pub fn test_config(policy: ExamPolicy) -> Config {
    Config {
        store: StoreBackend::Memory,
        database_url: None,
        jwt_secret: JWT_SECRET.to_string(),
        jwt_expiration: 600, // 10 minutes for tests
        rust_log: "error".to_string(),
        port: 0,
        allowed_origins: vec![ALLOWED_ORIGIN.to_string()],
        admin_username: None,
        admin_password: None,
        exam_policy: policy,
    }
}

/// Spawns the app on a random port with the default exam policy.
pub async fn spawn_app() -> TestApp {
    spawn_app_with(ExamPolicy::default()).await
}

/// Helper function to spawn the app on a random port for testing.
pub async fn spawn_app_with(policy: ExamPolicy) -> TestApp {
    let store = Arc::new(MemoryExamStore::new());
    let state = AppState {
        store: store.clone(),
        config: test_config(policy),
    };

    let app = routes::create_router(state);

    // Bind to port 0 to get a random available port
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestApp {
        address: format!("http://127.0.0.1:{}", port),
        store,
        client: reqwest::Client::new(),
    }
}

pub fn unique_name(prefix: &str) -> String {
    format!("{}_{}", prefix, &uuid::Uuid::new_v4().to_string()[..8])
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    /// Registers a fresh learner and returns `(token, user_id)`.
    pub async fn learner(&self) -> (String, i64) {
        let username = unique_name("learner");
        let response = self
            .client
            .post(self.url("/auth/register"))
            .json(&serde_json::json!({ "username": username, "password": "password123" }))
            .send()
            .await
            .expect("Failed to register");
        assert_eq!(response.status().as_u16(), 201);

        let response = self
            .client
            .post(self.url("/auth/login"))
            .json(&serde_json::json!({ "username": username, "password": "password123" }))
            .send()
            .await
            .expect("Failed to login");
        assert_eq!(response.status().as_u16(), 200);

        let body: serde_json::Value = response.json().await.unwrap();
        (
            body["token"].as_str().unwrap().to_string(),
            body["user"]["id"].as_i64().unwrap(),
        )
    }

    /// Creates an admin directly in the store and signs a token for it.
    pub async fn admin(&self) -> String {
        let admin = self
            .store
            .create_user(&unique_name("admin"), "not-a-real-hash", Role::Admin)
            .await
            .unwrap();
        sign_jwt(admin.id, Role::Admin, JWT_SECRET, 600).unwrap()
    }

    /// One subject with a two-question exam: q1 answers 3, q2 answers 2.
    pub async fn seed_exam(&self, is_active: bool) -> SeededExam {
        let subject = self.store.create_subject(&unique_name("subject")).await.unwrap();

        let mut ids = Vec::new();
        for (text, correct_option) in [("What is the capital of France?", 3), ("What is 2 + 2?", 2)] {
            let question = self
                .store
                .create_question(&QuestionDraft {
                    subject_id: subject.id,
                    text: text.to_string(),
                    options: vec!["A".into(), "B".into(), "C".into(), "D".into()],
                    correct_option,
                    difficulty: Difficulty::Easy,
                })
                .await
                .unwrap();
            ids.push(question.id);
        }

        let exam = self
            .store
            .create_exam(&ExamDraft {
                title: "General Knowledge Mock Test".to_string(),
                subject_id: subject.id,
                duration: 15,
                is_active,
                question_ids: ids.clone(),
            })
            .await
            .unwrap();

        SeededExam {
            subject_id: subject.id,
            exam_id: exam.id,
            q1: ids[0],
            q2: ids[1],
        }
    }

    pub async fn submit(&self, token: &str, body: serde_json::Value) -> reqwest::Response {
        self.client
            .post(self.url("/user/exam/submit"))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .expect("Failed to execute request")
    }
}
