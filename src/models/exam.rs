// src/models/exam.rs

use serde::{Deserialize, Serialize};
use sqlx::{prelude::FromRow, types::Json};
use validator::Validate;

use crate::models::question::TakerQuestion;

/// Represents the 'exams' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Exam {
    pub id: i64,
    pub title: String,
    pub category: String,
    /// Time allowed for one attempt, in minutes.
    pub duration_minutes: i32,
    /// Inclusive pass threshold, 0-100.
    pub pass_percentage: f64,
    /// Ordered question references. Duplicates are kept as authored.
    pub question_ids: Json<Vec<i64>>,
    pub is_active: bool,
    pub created_by: Option<i64>,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// DTO for creating a new exam definition.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateExamRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(min = 1, max = 100))]
    pub category: String,
    #[validate(range(min = 1))]
    pub duration_minutes: i32,
    #[validate(range(min = 0.0, max = 100.0))]
    pub pass_percentage: f64,
    #[validate(length(min = 1, message = "An exam needs at least one question."))]
    pub question_ids: Vec<i64>,
}

#[derive(Debug, Deserialize)]
pub struct SetActiveRequest {
    pub is_active: bool,
}

/// Payload of the start endpoint: exam metadata plus taker-view questions.
#[derive(Debug, Serialize)]
pub struct StartExamResponse {
    pub exam_id: i64,
    pub title: String,
    pub duration_minutes: i32,
    pub total_questions: usize,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub questions: Vec<TakerQuestion>,
}
