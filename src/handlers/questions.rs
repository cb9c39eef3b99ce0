// src/handlers/questions.rs

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use sqlx::{PgPool, types::Json as SqlJson};
use validator::Validate;

use crate::{
    error::AppError,
    models::question::{
        AnswerOption, BulkDeleteRequest, BulkImportReport, BulkImportRequest,
        CreateQuestionRequest, ImportQuestionRow, OptionInput, Question,
    },
    utils::html::clean_html,
};

/// Cap on the per-row error list returned by a bulk import.
const MAX_REPORTED_ERRORS: usize = 20;

/// Query parameters for listing questions.
#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub category: Option<String>,
    pub q: Option<String>,
}

/// Lists questions in the bank (author view), optionally filtered by
/// category and prompt keyword.
/// Teacher/Admin only.
pub async fn list_questions(
    State(pool): State<PgPool>,
    Query(params): Query<ListParams>,
) -> Result<impl IntoResponse, AppError> {
    let search_pattern = params.q.map(|k| format!("%{}%", k));

    let questions = sqlx::query_as::<_, Question>(
        r#"
        SELECT id, category, content, options, created_at
        FROM questions
        WHERE ($1::TEXT IS NULL OR category = $1)
          AND ($2::TEXT IS NULL OR content ILIKE $2)
        ORDER BY id DESC
        "#,
    )
    .bind(&params.category)
    .bind(&search_pattern)
    .fetch_all(&pool)
    .await?;

    Ok(Json(questions))
}

/// Builds the stored option list: sanitized text, 0-based ids.
fn build_options(options: &[OptionInput]) -> Vec<AnswerOption> {
    options
        .iter()
        .enumerate()
        .map(|(i, opt)| AnswerOption {
            id: i as i32,
            text: clean_html(opt.text.trim()),
            is_correct: opt.is_correct,
        })
        .collect()
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    // Postgres error code for unique violation is 23505
    e.to_string().contains("unique constraint") || e.to_string().contains("23505")
}

/// Creates a new question.
/// Teacher/Admin only.
pub async fn create_question(
    State(pool): State<PgPool>,
    Json(payload): Json<CreateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let options = build_options(&payload.options);

    let id = sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO questions (category, content, options)
        VALUES ($1, $2, $3)
        RETURNING id
        "#,
    )
    .bind(payload.category.trim())
    .bind(clean_html(payload.content.trim()))
    .bind(SqlJson(&options))
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            AppError::Conflict(
                "A question with this prompt already exists in this category".to_string(),
            )
        } else {
            tracing::error!("Failed to create question: {:?}", e);
            AppError::InternalServerError(e.to_string())
        }
    })?;

    Ok((StatusCode::CREATED, Json(serde_json::json!({"id": id}))))
}

/// Updates a question by ID, replacing the full option list.
/// Validation runs before the write, so a rejected payload leaves the
/// stored document unchanged.
/// Teacher/Admin only.
pub async fn update_question(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
    Json(payload): Json<CreateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let options = build_options(&payload.options);

    let result = sqlx::query(
        r#"
        UPDATE questions
        SET category = $1, content = $2, options = $3
        WHERE id = $4
        "#,
    )
    .bind(payload.category.trim())
    .bind(clean_html(payload.content.trim()))
    .bind(SqlJson(&options))
    .bind(id)
    .execute(&pool)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            AppError::Conflict(
                "A question with this prompt already exists in this category".to_string(),
            )
        } else {
            tracing::error!("Failed to update question: {:?}", e);
            AppError::InternalServerError(e.to_string())
        }
    })?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Question not found".to_string()));
    }

    Ok(StatusCode::OK)
}

/// Deletes a question by ID.
/// Teacher/Admin only.
pub async fn delete_question(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query("DELETE FROM questions WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to delete question: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Question not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}

/// Normalizes one import row into the shared creation payload.
///
/// Spreadsheet rows carry a 1-based correct index; it becomes the 0-based
/// flag position before the shared validation contract runs.
fn normalize_import_row(row: &ImportQuestionRow) -> Result<CreateQuestionRequest, String> {
    if row.correct_index < 1 || row.correct_index as usize > row.options.len() {
        return Err(format!(
            "correct_index {} is out of bounds for {} options",
            row.correct_index,
            row.options.len()
        ));
    }
    let correct = (row.correct_index - 1) as usize;

    let payload = CreateQuestionRequest {
        category: row.category.clone(),
        content: row.content.clone(),
        options: row
            .options
            .iter()
            .enumerate()
            .map(|(i, text)| OptionInput {
                text: text.clone(),
                is_correct: i == correct,
            })
            .collect(),
    };

    payload.validate().map_err(|e| e.to_string())?;
    Ok(payload)
}

/// Imports questions in bulk with partial-success semantics: rows failing
/// validation (or colliding with an existing prompt) are reported
/// individually, valid rows persist regardless.
/// Teacher/Admin only.
pub async fn bulk_import(
    State(pool): State<PgPool>,
    Json(payload): Json<BulkImportRequest>,
) -> Result<impl IntoResponse, AppError> {
    let mut inserted_count = 0usize;
    let mut errors = Vec::new();

    for (index, row) in payload.rows.iter().enumerate() {
        let row_number = index + 1;

        let request = match normalize_import_row(row) {
            Ok(request) => request,
            Err(message) => {
                errors.push(format!("row {}: {}", row_number, message));
                continue;
            }
        };

        let options = build_options(&request.options);

        let inserted = sqlx::query(
            r#"
            INSERT INTO questions (category, content, options)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(request.category.trim())
        .bind(clean_html(request.content.trim()))
        .bind(SqlJson(&options))
        .execute(&pool)
        .await;

        match inserted {
            Ok(_) => inserted_count += 1,
            Err(e) if is_unique_violation(&e) => {
                errors.push(format!(
                    "row {}: duplicate prompt in category '{}'",
                    row_number, request.category
                ));
            }
            Err(e) => {
                tracing::error!("Failed to import question row {}: {:?}", row_number, e);
                errors.push(format!("row {}: database error", row_number));
            }
        }
    }

    let error_count = errors.len();
    if error_count > MAX_REPORTED_ERRORS {
        errors.truncate(MAX_REPORTED_ERRORS);
        errors.push(format!(
            "... and {} more errors",
            error_count - MAX_REPORTED_ERRORS
        ));
    }

    Ok(Json(BulkImportReport {
        inserted_count,
        error_count,
        errors,
    }))
}

/// Deletes a set of questions by identity.
/// Teacher/Admin only.
pub async fn bulk_delete(
    State(pool): State<PgPool>,
    Json(payload): Json<BulkDeleteRequest>,
) -> Result<impl IntoResponse, AppError> {
    if payload.ids.is_empty() {
        return Err(AppError::BadRequest("No question ids supplied".to_string()));
    }

    let result = sqlx::query("DELETE FROM questions WHERE id = ANY($1)")
        .bind(&payload.ids)
        .execute(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to bulk delete questions: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

    Ok(Json(serde_json::json!({
        "deleted_count": result.rows_affected()
    })))
}
