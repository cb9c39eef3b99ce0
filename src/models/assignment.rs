// src/models/assignment.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

pub const STATUS_PENDING: &str = "pending";
pub const STATUS_COMPLETED: &str = "completed";

/// Represents the 'assignments' table: the workflow record binding one
/// student to one exam. The `(exam_id, student_id)` pair is unique.
///
/// Score fields mirror the result at completion time so list views need no
/// join against 'exam_results'; the result row stays the source of truth.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Assignment {
    pub id: i64,
    pub exam_id: i64,
    pub student_id: i64,
    /// 'pending' or 'completed'.
    pub status: String,
    pub score: Option<i32>,
    pub percentage: Option<f64>,
    pub passed: Option<bool>,
    /// Set exactly once, on first fetch of the exam content.
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Row for the student's assigned-exams list, joined with exam metadata.
#[derive(Debug, Serialize, FromRow)]
pub struct AssignedExamRow {
    pub exam_id: i64,
    pub title: String,
    pub category: String,
    pub duration_minutes: i32,
    pub pass_percentage: f64,
    pub status: String,
    pub score: Option<i32>,
    pub percentage: Option<f64>,
    pub passed: Option<bool>,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// DTO for fanning one exam out to all current students.
#[derive(Debug, Deserialize)]
pub struct AssignExamRequest {
    pub exam_id: i64,
}

/// DTO for resetting a completed attempt back to pending.
#[derive(Debug, Deserialize)]
pub struct RetryExamRequest {
    pub exam_id: i64,
    pub student_id: i64,
}
