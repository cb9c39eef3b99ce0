// src/handlers/assignments.rs

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use sqlx::PgPool;

use crate::{
    error::AppError,
    models::assignment::{AssignExamRequest, RetryExamRequest, STATUS_COMPLETED, STATUS_PENDING},
    models::user::ROLE_STUDENT,
};

/// Assigns one exam to every current student.
///
/// Students already holding an assignment for this exam are skipped via the
/// unique (exam_id, student_id) index; the insert ignores those conflicts.
/// Teacher/Admin only.
pub async fn assign_exam(
    State(pool): State<PgPool>,
    Json(payload): Json<AssignExamRequest>,
) -> Result<impl IntoResponse, AppError> {
    let exam_exists = sqlx::query_scalar::<_, i64>("SELECT id FROM exams WHERE id = $1")
        .bind(payload.exam_id)
        .fetch_optional(&pool)
        .await?;

    if exam_exists.is_none() {
        return Err(AppError::NotFound("Exam not found".to_string()));
    }

    let result = sqlx::query(
        r#"
        INSERT INTO assignments (exam_id, student_id)
        SELECT $1, id FROM users WHERE role = $2
        ON CONFLICT (exam_id, student_id) DO NOTHING
        "#,
    )
    .bind(payload.exam_id)
    .bind(ROLE_STUDENT)
    .execute(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to assign exam: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "assigned_count": result.rows_affected()
        })),
    ))
}

/// Resets a completed attempt back to pending so the student can retake
/// the exam. Score fields and timestamps on the assignment are cleared;
/// the previously written exam result is left untouched and will be
/// overwritten by the next submission's upsert.
/// Teacher/Admin only.
pub async fn retry_exam(
    State(pool): State<PgPool>,
    Json(payload): Json<RetryExamRequest>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query(
        r#"
        UPDATE assignments
        SET status = $1, score = NULL, percentage = NULL, passed = NULL,
            started_at = NULL, completed_at = NULL
        WHERE exam_id = $2 AND student_id = $3 AND status = $4
        "#,
    )
    .bind(STATUS_PENDING)
    .bind(payload.exam_id)
    .bind(payload.student_id)
    .bind(STATUS_COMPLETED)
    .execute(&pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(
            "No completed attempt found for this student and exam".to_string(),
        ));
    }

    Ok(StatusCode::OK)
}
