// src/client/render.rs

use std::{fmt::Write, time::{Duration, Instant}};

use crate::{
    client::flow::{AnswerSheet, CompletedExam},
    models::{exam::ExamSummary, question::PublicQuestion, result::MyResult},
};

/// `mm:ss`, rounded down.
pub fn format_remaining(remaining: Duration) -> String {
    let secs = remaining.as_secs();
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

pub fn exam_list(exams: &[ExamSummary]) -> String {
    if exams.is_empty() {
        return "No exams available currently.\n".to_string();
    }

    let mut out = String::from("Available exams\n");
    for exam in exams {
        let _ = writeln!(
            out,
            "  [{}] {} ({}) - {} questions, {} min",
            exam.id, exam.title, exam.subject_name, exam.question_count, exam.duration
        );
    }
    out
}

pub fn question(position: usize, question: &PublicQuestion, selected: Option<i32>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}. {} [{}]", position, question.text, question.difficulty);
    for (idx, option) in question.options.iter().enumerate() {
        let number = idx as i32 + 1;
        let marker = if selected == Some(number) { "x" } else { " " };
        let _ = writeln!(out, "   ({}) {}. {}", marker, number, option);
    }
    out
}

pub fn answer_sheet(sheet: &AnswerSheet, now: Instant) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} - {} left, {}/{} answered",
        sheet.exam.title,
        format_remaining(sheet.remaining(now)),
        sheet.answered_count(),
        sheet.questions.len()
    );
    for (idx, q) in sheet.questions.iter().enumerate() {
        out.push_str(&question(idx + 1, q, sheet.selected(q.id)));
    }
    out.push_str("Answer with `<question> <option>`, `submit` to finish, `quit` to abandon.\n");
    out
}

pub fn result(done: &CompletedExam) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{}: {}/{}{}",
        done.exam.title,
        done.outcome.score,
        done.outcome.total,
        if done.auto_submitted { " (submitted when time ran out)" } else { "" }
    );
    for (idx, feedback) in done.outcome.per_question.iter().enumerate() {
        let text = done
            .questions
            .iter()
            .find(|q| q.id == feedback.question_id)
            .map(|q| q.text.as_str())
            .unwrap_or("");
        let verdict = match (feedback.correct, feedback.selected_option) {
            (true, _) => "correct".to_string(),
            (false, None) => "unanswered".to_string(),
            (false, Some(_)) => "wrong".to_string(),
        };
        let _ = write!(out, "  {}. {} - {}", idx + 1, text, verdict);
        if let Some(correct) = feedback.correct_option {
            let _ = write!(out, " (answer: {})", correct);
        }
        out.push('\n');
    }
    out
}

pub fn history(results: &[MyResult]) -> String {
    if results.is_empty() {
        return "No results yet.\n".to_string();
    }

    let mut out = String::from("Recent results\n");
    for r in results {
        let _ = writeln!(
            out,
            "  {}: {}/{} on {}",
            r.exam.title,
            r.score,
            r.total,
            r.created_at.format("%Y-%m-%d %H:%M")
        );
    }
    out
}
