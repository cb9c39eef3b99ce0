// src/models/exam_result.rs

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sqlx::{prelude::FromRow, types::Json};

/// Per-question record persisted with a result. Unanswered questions keep
/// `selected_option_id = None`; a question whose options carry no correct
/// flag keeps `correct_option_id = None` and can never be correct.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerRecord {
    pub question_id: i64,
    pub selected_option_id: Option<i32>,
    pub correct_option_id: Option<i32>,
    pub is_correct: bool,
}

/// Represents the 'exam_results' table: the durable scored outcome of a
/// student's attempt, keyed uniquely by `(exam_id, student_id)` and written
/// with upsert semantics. Read-only after the write.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ExamResult {
    pub id: i64,
    pub exam_id: i64,
    pub student_id: i64,
    /// Count of correctly answered questions.
    pub score: i32,
    pub total_questions: i32,
    pub correct_answers: i32,
    /// Answered-and-wrong only; correct + wrong need not sum to total.
    pub wrong_answers: i32,
    pub percentage: f64,
    pub passed: bool,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub completed_at: chrono::DateTime<chrono::Utc>,
    pub time_taken_seconds: i64,
    pub answers: Json<Vec<AnswerRecord>>,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Maps a stored pass flag to the reported result label.
pub fn result_label(passed: bool) -> &'static str {
    if passed { "pass" } else { "fail" }
}

/// DTO for submitting an attempt.
#[derive(Debug, Deserialize)]
pub struct SubmitExamRequest {
    /// Key: question id, value: selected option id. Missing keys are
    /// unanswered questions, not an error.
    pub answers: HashMap<i64, i32>,
    /// Client-reported seconds spent, if the taking page tracked it.
    pub time_taken: Option<i64>,
}

/// Score summary returned to the student right after submission.
#[derive(Debug, Serialize)]
pub struct SubmitExamResponse {
    pub score: i32,
    pub total_questions: i32,
    pub correct_answers: i32,
    pub wrong_answers: i32,
    pub percentage: f64,
    pub result: String,
    pub review: Vec<crate::scoring::ReviewEntry>,
}

/// History row joined with exam metadata.
#[derive(Debug, Serialize, FromRow)]
pub struct HistoryRow {
    pub exam_id: i64,
    pub title: String,
    pub category: String,
    pub score: i32,
    pub total_questions: i32,
    pub percentage: f64,
    pub passed: bool,
    pub completed_at: chrono::DateTime<chrono::Utc>,
    pub time_taken_seconds: i64,
}

/// Admin export row joined with the student's username.
#[derive(Debug, Serialize, FromRow)]
pub struct ExportRow {
    pub exam_id: i64,
    pub title: String,
    pub student_id: i64,
    pub username: String,
    pub score: i32,
    pub total_questions: i32,
    pub percentage: f64,
    pub passed: bool,
    pub completed_at: chrono::DateTime<chrono::Utc>,
    pub time_taken_seconds: i64,
}
