// src/handlers/results.rs

use std::collections::HashMap;

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use serde::Deserialize;
use sqlx::PgPool;

use crate::{
    error::AppError,
    handlers::exams::{fetch_exam, load_exam_questions},
    models::exam_result::{ExamResult, ExportRow, HistoryRow, result_label},
    models::question::Question,
    scoring,
    utils::jwt::Claims,
};

/// Joined row backing the result-detail projection.
#[derive(Debug, sqlx::FromRow)]
struct ResultJoinRow {
    exam_id: i64,
    title: String,
    category: String,
    score: i32,
    total_questions: i32,
    correct_answers: i32,
    wrong_answers: i32,
    percentage: f64,
    passed: bool,
    pass_percentage: f64,
    started_at: chrono::DateTime<chrono::Utc>,
    completed_at: chrono::DateTime<chrono::Utc>,
    time_taken_seconds: i64,
}

/// Lists the current student's completed attempts, newest first.
pub async fn exam_history(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let rows = sqlx::query_as::<_, HistoryRow>(
        r#"
        SELECT
            r.exam_id, e.title, e.category, r.score, r.total_questions,
            r.percentage, r.passed, r.completed_at, r.time_taken_seconds
        FROM exam_results r
        JOIN exams e ON r.exam_id = e.id
        WHERE r.student_id = $1
        ORDER BY r.completed_at DESC
        "#,
    )
    .bind(claims.user_id())
    .fetch_all(&pool)
    .await?;

    Ok(Json(rows))
}

/// Returns the current student's scored outcome for one exam.
pub async fn exam_result(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(exam_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let row = sqlx::query_as::<_, ResultJoinRow>(
        r#"
        SELECT
            r.exam_id, e.title, e.category, r.score, r.total_questions,
            r.correct_answers, r.wrong_answers, r.percentage, r.passed,
            e.pass_percentage, r.started_at, r.completed_at, r.time_taken_seconds
        FROM exam_results r
        JOIN exams e ON r.exam_id = e.id
        WHERE r.exam_id = $1 AND r.student_id = $2
        "#,
    )
    .bind(exam_id)
    .bind(claims.user_id())
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::NotFound("Result not found".to_string()))?;

    Ok(Json(serde_json::json!({
        "exam_id": row.exam_id,
        "title": row.title,
        "category": row.category,
        "score": row.score,
        "total_questions": row.total_questions,
        "correct_answers": row.correct_answers,
        "wrong_answers": row.wrong_answers,
        "percentage": row.percentage,
        "result": result_label(row.passed),
        "pass_percentage": row.pass_percentage,
        "started_at": row.started_at,
        "completed_at": row.completed_at,
        "time_taken_seconds": row.time_taken_seconds
    })))
}

/// Rebuilds the per-question review for the current student's attempt.
///
/// The stored answer records are re-joined against the current question
/// documents, so prompts edited after the attempt show their current text.
pub async fn exam_review(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(exam_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query_as::<_, ExamResult>(
        r#"
        SELECT id, exam_id, student_id, score, total_questions, correct_answers,
               wrong_answers, percentage, passed, started_at, completed_at,
               time_taken_seconds, answers, created_at
        FROM exam_results
        WHERE exam_id = $1 AND student_id = $2
        "#,
    )
    .bind(exam_id)
    .bind(claims.user_id())
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::NotFound("Result not found".to_string()))?;

    let exam = fetch_exam(&pool, exam_id).await?;

    let questions = load_exam_questions(&pool, &exam).await?;
    let by_id: HashMap<i64, &Question> = questions.iter().map(|q| (q.id, q)).collect();

    let review = scoring::rebuild_review(&result.answers, &by_id);

    Ok(Json(serde_json::json!({
        "exam_id": exam.id,
        "title": exam.title,
        "score": result.score,
        "total_questions": result.total_questions,
        "percentage": result.percentage,
        "result": result_label(result.passed),
        "review": review,
        "answers": result.answers
    })))
}

/// Query parameters for the admin results export.
#[derive(Debug, Deserialize)]
pub struct ExportParams {
    pub exam_id: Option<i64>,
}

/// Exports all results, optionally filtered to one exam, joined with
/// usernames and exam titles.
/// Admin only.
pub async fn export_results(
    State(pool): State<PgPool>,
    Query(params): Query<ExportParams>,
) -> Result<impl IntoResponse, AppError> {
    let rows = sqlx::query_as::<_, ExportRow>(
        r#"
        SELECT
            r.exam_id, e.title, r.student_id, u.username, r.score,
            r.total_questions, r.percentage, r.passed, r.completed_at,
            r.time_taken_seconds
        FROM exam_results r
        JOIN exams e ON r.exam_id = e.id
        JOIN users u ON r.student_id = u.id
        WHERE ($1::BIGINT IS NULL OR r.exam_id = $1)
        ORDER BY r.completed_at DESC
        "#,
    )
    .bind(params.exam_id)
    .fetch_all(&pool)
    .await?;

    Ok(Json(rows))
}
