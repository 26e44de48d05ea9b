// tests/admin_tests.rs

mod common;

use common::spawn_app;
use serde_json::json;

#[tokio::test]
async fn learner_cannot_reach_admin_routes() {
    let app = spawn_app().await;
    let (token, _) = app.learner().await;

    let response = app
        .client
        .get(app.url("/admin/subjects"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 403);

    let anonymous = app.client.get(app.url("/admin/subjects")).send().await.unwrap();
    assert_eq!(anonymous.status().as_u16(), 401);
}

#[tokio::test]
async fn admin_builds_an_exam_learners_can_take() {
    let app = spawn_app().await;
    let admin = app.admin().await;

    // 1. Subject
    let subject: serde_json::Value = app
        .client
        .post(app.url("/admin/subjects"))
        .bearer_auth(&admin)
        .json(&json!({ "name": "Geography" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let subject_id = subject["id"].as_i64().unwrap();

    // 2. Question
    let response = app
        .client
        .post(app.url("/admin/questions"))
        .bearer_auth(&admin)
        .json(&json!({
            "subjectId": subject_id,
            "text": "Which is the longest river?",
            "options": ["Nile", "Amazon", "Yangtze"],
            "correctOption": 1,
            "difficulty": "medium"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 201);
    let question: serde_json::Value = response.json().await.unwrap();
    assert_eq!(question["correctOption"], 1);

    // 3. Exam
    let response = app
        .client
        .post(app.url("/admin/exams"))
        .bearer_auth(&admin)
        .json(&json!({
            "title": "Rivers",
            "subjectId": subject_id,
            "duration": 10,
            "isActive": true,
            "questionIds": [question["id"]]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 201);
    let exam: serde_json::Value = response.json().await.unwrap();

    // 4. Visible to a learner
    let (token, _) = app.learner().await;
    let exams: Vec<serde_json::Value> = app
        .client
        .get(app.url("/user/exams"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let listed = exams.iter().find(|e| e["id"] == exam["id"]).unwrap();
    assert_eq!(listed["subjectName"], "Geography");
    assert_eq!(listed["questionCount"], 1);

    // 5. Deactivated exams disappear
    let response = app
        .client
        .put(app.url(&format!("/admin/exams/{}", exam["id"])))
        .bearer_auth(&admin)
        .json(&json!({ "isActive": false }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    let exams: Vec<serde_json::Value> = app
        .client
        .get(app.url("/user/exams"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(exams.iter().all(|e| e["id"] != exam["id"]));
}

#[tokio::test]
async fn correct_option_must_be_within_options() {
    let app = spawn_app().await;
    let admin = app.admin().await;
    let seeded = app.seed_exam(true).await;

    for (options, correct) in [(json!(["A", "B"]), 3), (json!(["A", "B"]), 0), (json!(["Only"]), 1)] {
        let response = app
            .client
            .post(app.url("/admin/questions"))
            .bearer_auth(&admin)
            .json(&json!({
                "subjectId": seeded.subject_id,
                "text": "Pick one",
                "options": options,
                "correctOption": correct,
                "difficulty": "easy"
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 400);
    }
}

#[tokio::test]
async fn exam_with_unknown_question_is_rejected() {
    let app = spawn_app().await;
    let admin = app.admin().await;
    let seeded = app.seed_exam(true).await;

    let response = app
        .client
        .post(app.url("/admin/exams"))
        .bearer_auth(&admin)
        .json(&json!({
            "title": "Broken",
            "subjectId": seeded.subject_id,
            "duration": 10,
            "questionIds": [seeded.q1, 424_242]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 404);

    let empty = app
        .client
        .post(app.url("/admin/exams"))
        .bearer_auth(&admin)
        .json(&json!({
            "title": "Empty",
            "subjectId": seeded.subject_id,
            "duration": 10,
            "questionIds": []
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(empty.status().as_u16(), 400);
}

#[tokio::test]
async fn answered_questions_are_frozen() {
    let app = spawn_app().await;
    let admin = app.admin().await;
    let seeded = app.seed_exam(true).await;

    // Before any result, edits are allowed
    let response = app
        .client
        .put(app.url(&format!("/admin/questions/{}", seeded.q2)))
        .bearer_auth(&admin)
        .json(&json!({
            "subjectId": seeded.subject_id,
            "text": "What is 3 + 3?",
            "options": ["5", "6", "7", "8"],
            "correctOption": 2,
            "difficulty": "easy"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    let (token, _) = app.learner().await;
    let submitted = app
        .submit(&token, json!({ "examId": seeded.exam_id, "answers": {} }))
        .await;
    assert_eq!(submitted.status().as_u16(), 200);

    let delete = app
        .client
        .delete(app.url(&format!("/admin/questions/{}", seeded.q1)))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(delete.status().as_u16(), 409);

    let update = app
        .client
        .put(app.url(&format!("/admin/questions/{}", seeded.q1)))
        .bearer_auth(&admin)
        .json(&json!({
            "subjectId": seeded.subject_id,
            "text": "Changed",
            "options": ["A", "B"],
            "correctOption": 1,
            "difficulty": "easy"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(update.status().as_u16(), 409);

    let rename = app
        .client
        .put(app.url(&format!("/admin/subjects/{}", seeded.subject_id)))
        .bearer_auth(&admin)
        .json(&json!({ "name": "Renamed" }))
        .send()
        .await
        .unwrap();
    assert_eq!(rename.status().as_u16(), 409);
}

#[tokio::test]
async fn question_content_keeps_comparison_symbols() {
    let app = spawn_app().await;
    let admin = app.admin().await;
    let seeded = app.seed_exam(true).await;

    let response = app
        .client
        .post(app.url("/admin/questions"))
        .bearer_auth(&admin)
        .json(&json!({
            "subjectId": seeded.subject_id,
            "text": "Is 5 > 3 & 2 < 4?",
            "options": ["2 < 3", "3 > 2 & 1 > 0"],
            "correctOption": 1,
            "difficulty": "easy"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 201);

    let question: serde_json::Value = response.json().await.unwrap();
    assert_eq!(question["text"], "Is 5 > 3 & 2 < 4?");
    assert_eq!(question["options"], json!(["2 < 3", "3 > 2 & 1 > 0"]));
}

#[tokio::test]
async fn question_markup_is_rejected() {
    let app = spawn_app().await;
    let admin = app.admin().await;
    let seeded = app.seed_exam(true).await;

    for (text, option) in [
        ("Which is the longest river?<script>alert(1)</script>", "Nile"),
        ("Which is the longest river?", "<b>Nile</b>"),
    ] {
        let response = app
            .client
            .post(app.url("/admin/questions"))
            .bearer_auth(&admin)
            .json(&json!({
                "subjectId": seeded.subject_id,
                "text": text,
                "options": [option, "Amazon"],
                "correctOption": 1,
                "difficulty": "easy"
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 400);
    }
}

#[tokio::test]
async fn question_in_an_exam_cannot_be_deleted() {
    let app = spawn_app().await;
    let admin = app.admin().await;
    let seeded = app.seed_exam(true).await;
    let (token, _) = app.learner().await;

    for id in [seeded.q1, seeded.q2] {
        let response = app
            .client
            .delete(app.url(&format!("/admin/questions/{}", id)))
            .bearer_auth(&admin)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 409);
    }

    let exams: Vec<serde_json::Value> = app
        .client
        .get(app.url("/user/exams"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let listed = exams.iter().find(|e| e["id"] == seeded.exam_id).unwrap();
    assert_eq!(listed["questionCount"], 2);
}

#[tokio::test]
async fn unused_question_can_be_deleted() {
    let app = spawn_app().await;
    let admin = app.admin().await;
    let seeded = app.seed_exam(true).await;

    let created: serde_json::Value = app
        .client
        .post(app.url("/admin/questions"))
        .bearer_auth(&admin)
        .json(&json!({
            "subjectId": seeded.subject_id,
            "text": "Spare question",
            "options": ["yes", "no"],
            "correctOption": 2,
            "difficulty": "hard"
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let response = app
        .client
        .delete(app.url(&format!("/admin/questions/{}", created["id"])))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 204);

    let questions: Vec<serde_json::Value> = app
        .client
        .get(app.url(&format!("/admin/questions?subjectId={}", seeded.subject_id)))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let ids: Vec<i64> = questions.iter().map(|q| q["id"].as_i64().unwrap()).collect();
    assert_eq!(ids, vec![seeded.q1, seeded.q2]);
}
