// src/store/demo.rs

use crate::{
    error::AppError,
    models::{
        exam::ExamDraft,
        question::{Difficulty, QuestionDraft},
        user::Role,
    },
    store::ExamStore,
    utils::hash::hash_password,
};

/// Password shared by the demo accounts.
pub const DEMO_PASSWORD: &str = "demo1234";

const USERS: [(&str, Role); 2] = [("admin", Role::Admin), ("student", Role::Learner)];

struct DemoQuestion {
    subject: usize,
    text: &'static str,
    options: [&'static str; 4],
    correct_option: i32,
    difficulty: Difficulty,
}

const SUBJECTS: [&str; 2] = ["General Knowledge", "Mathematics"];

const QUESTIONS: [DemoQuestion; 5] = [
    DemoQuestion {
        subject: 0,
        text: "What is the capital of France?",
        options: ["London", "Berlin", "Paris", "Madrid"],
        correct_option: 3,
        difficulty: Difficulty::Easy,
    },
    DemoQuestion {
        subject: 0,
        text: "Which planet is known as the Red Planet?",
        options: ["Venus", "Mars", "Jupiter", "Saturn"],
        correct_option: 2,
        difficulty: Difficulty::Easy,
    },
    DemoQuestion {
        subject: 1,
        text: "What is 2 + 2?",
        options: ["3", "4", "5", "6"],
        correct_option: 2,
        difficulty: Difficulty::Easy,
    },
    DemoQuestion {
        subject: 0,
        text: "Who wrote \"Hamlet\"?",
        options: ["Shakespeare", "Dickens", "Twain", "Austen"],
        correct_option: 1,
        difficulty: Difficulty::Medium,
    },
    DemoQuestion {
        subject: 1,
        text: "What is the chemical symbol for Gold?",
        options: ["Ag", "Fe", "Au", "Pb"],
        correct_option: 3,
        difficulty: Difficulty::Hard,
    },
];

/// Seeds two accounts, two subjects, five questions and two active exams.
pub async fn seed_demo_content(store: &dyn ExamStore) -> Result<(), AppError> {
    let password_hash = hash_password(DEMO_PASSWORD)?;
    for (username, role) in USERS {
        store.create_user(username, &password_hash, role).await?;
    }

    let mut subject_ids = Vec::with_capacity(SUBJECTS.len());
    for name in SUBJECTS {
        subject_ids.push(store.create_subject(name).await?.id);
    }

    let mut by_subject: Vec<Vec<i64>> = vec![Vec::new(); SUBJECTS.len()];
    for q in &QUESTIONS {
        let created = store
            .create_question(&QuestionDraft {
                subject_id: subject_ids[q.subject],
                text: q.text.to_string(),
                options: q.options.iter().map(|o| o.to_string()).collect(),
                correct_option: q.correct_option,
                difficulty: q.difficulty,
            })
            .await?;
        by_subject[q.subject].push(created.id);
    }

    let titles = [
        ("General Knowledge Mock Test", 15),
        ("Mathematics Basic Test", 20),
    ];
    for (idx, (title, duration)) in titles.into_iter().enumerate() {
        store
            .create_exam(&ExamDraft {
                title: title.to_string(),
                subject_id: subject_ids[idx],
                duration,
                is_active: true,
                question_ids: by_subject[idx].clone(),
            })
            .await?;
    }

    tracing::info!(
        "Seeded demo content: {} exams, users {:?} (password {:?})",
        titles.len(),
        USERS.map(|(name, _)| name),
        DEMO_PASSWORD
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{store::MemoryExamStore, utils::hash::verify_password};

    #[tokio::test]
    async fn seeds_mock_exams_and_accounts() {
        let store = MemoryExamStore::new();
        seed_demo_content(&store).await.unwrap();

        let exams = store.list_active_exams().await.unwrap();
        assert_eq!(exams.len(), 2);
        assert_eq!(exams[0].title, "General Knowledge Mock Test");
        assert_eq!(exams[0].question_count, 3);
        assert_eq!(exams[1].duration, 20);

        let student = store.find_user_by_username("student").await.unwrap().unwrap();
        assert_eq!(student.role, Role::Learner);
        assert!(verify_password(DEMO_PASSWORD, &student.password).unwrap());
    }
}
