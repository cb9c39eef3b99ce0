// src/handlers/exams.rs

use std::collections::HashMap;

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use sqlx::{PgPool, types::Json as SqlJson};
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        assignment::{Assignment, AssignedExamRow, STATUS_COMPLETED, STATUS_PENDING},
        exam::{CreateExamRequest, Exam, SetActiveRequest, StartExamResponse},
        exam_result::{SubmitExamRequest, SubmitExamResponse, result_label},
        question::{Question, TakerQuestion},
        user::ROLE_STUDENT,
    },
    scoring,
    utils::jwt::Claims,
};

const EXAM_COLUMNS: &str =
    "id, title, category, duration_minutes, pass_percentage, question_ids, is_active, created_by, created_at";

/// Creates a new exam definition over existing questions.
/// Teacher/Admin only.
pub async fn create_exam(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateExamRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    // Every referenced question must exist. Duplicates in the list are
    // allowed and kept as authored.
    let mut distinct_ids = payload.question_ids.clone();
    distinct_ids.sort_unstable();
    distinct_ids.dedup();

    let found: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM questions WHERE id = ANY($1)")
        .bind(&distinct_ids)
        .fetch_one(&pool)
        .await?;

    if found != distinct_ids.len() as i64 {
        return Err(AppError::BadRequest(
            "One or more referenced questions do not exist".to_string(),
        ));
    }

    let id = sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO exams (title, category, duration_minutes, pass_percentage, question_ids, created_by)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING id
        "#,
    )
    .bind(payload.title.trim())
    .bind(payload.category.trim())
    .bind(payload.duration_minutes)
    .bind(payload.pass_percentage)
    .bind(SqlJson(&payload.question_ids))
    .bind(claims.user_id())
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create exam: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok((StatusCode::CREATED, Json(serde_json::json!({"id": id}))))
}

/// Lists all exam definitions (author view).
/// Teacher/Admin only.
pub async fn list_exams(State(pool): State<PgPool>) -> Result<impl IntoResponse, AppError> {
    let exams = sqlx::query_as::<_, Exam>(&format!(
        "SELECT {EXAM_COLUMNS} FROM exams ORDER BY id DESC"
    ))
    .fetch_all(&pool)
    .await?;

    Ok(Json(exams))
}

/// Toggles an exam active or inactive.
/// Teacher/Admin only.
pub async fn set_exam_active(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
    Json(payload): Json<SetActiveRequest>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query("UPDATE exams SET is_active = $1 WHERE id = $2")
        .bind(payload.is_active)
        .bind(id)
        .execute(&pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Exam not found".to_string()));
    }

    Ok(StatusCode::OK)
}

/// Lists the current student's assigned exams with attempt status.
pub async fn list_assigned(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let rows = sqlx::query_as::<_, AssignedExamRow>(
        r#"
        SELECT
            a.exam_id, e.title, e.category, e.duration_minutes, e.pass_percentage,
            a.status, a.score, a.percentage, a.passed, a.completed_at
        FROM assignments a
        JOIN exams e ON a.exam_id = e.id
        WHERE a.student_id = $1 AND e.is_active = TRUE
        ORDER BY a.created_at DESC
        "#,
    )
    .bind(claims.user_id())
    .fetch_all(&pool)
    .await?;

    Ok(Json(rows))
}

fn require_student(claims: &Claims) -> Result<i64, AppError> {
    if claims.role != ROLE_STUDENT {
        return Err(AppError::Forbidden(
            "Only students can take exams".to_string(),
        ));
    }
    Ok(claims.user_id())
}

async fn fetch_assignment(
    pool: &PgPool,
    exam_id: i64,
    student_id: i64,
) -> Result<Assignment, AppError> {
    sqlx::query_as::<_, Assignment>(
        r#"
        SELECT id, exam_id, student_id, status, score, percentage, passed,
               started_at, completed_at, created_at
        FROM assignments
        WHERE exam_id = $1 AND student_id = $2
        "#,
    )
    .bind(exam_id)
    .bind(student_id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::Forbidden(
        "You are not assigned to this exam".to_string(),
    ))
}

pub(crate) async fn fetch_exam(pool: &PgPool, exam_id: i64) -> Result<Exam, AppError> {
    sqlx::query_as::<_, Exam>(&format!("SELECT {EXAM_COLUMNS} FROM exams WHERE id = $1"))
        .bind(exam_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("Exam not found".to_string()))
}

/// Loads an exam's questions in the order (and multiplicity) of its
/// question list. References to since-deleted questions are skipped.
pub(crate) async fn load_exam_questions(
    pool: &PgPool,
    exam: &Exam,
) -> Result<Vec<Question>, AppError> {
    let mut distinct_ids = exam.question_ids.0.clone();
    distinct_ids.sort_unstable();
    distinct_ids.dedup();

    let rows = sqlx::query_as::<_, Question>(
        "SELECT id, category, content, options, created_at FROM questions WHERE id = ANY($1)",
    )
    .bind(&distinct_ids)
    .fetch_all(pool)
    .await?;

    let by_id: HashMap<i64, Question> = rows.into_iter().map(|q| (q.id, q)).collect();

    Ok(exam
        .question_ids
        .iter()
        .filter_map(|id| by_id.get(id).cloned())
        .collect())
}

/// Starts (or resumes) an exam attempt for the current student.
///
/// Returns the taker view of the questions: correctness flags are absent
/// from the payload by type, so the answer key never reaches the client.
/// `started_at` is set exactly once, on the first fetch.
pub async fn start_exam(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(exam_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let student_id = require_student(&claims)?;

    let assignment = fetch_assignment(&pool, exam_id, student_id).await?;
    if assignment.status == STATUS_COMPLETED {
        return Err(AppError::Conflict("Exam already submitted".to_string()));
    }

    let exam = fetch_exam(&pool, exam_id).await?;
    if !exam.is_active {
        return Err(AppError::Forbidden("Exam is not active".to_string()));
    }

    let started_at = match assignment.started_at {
        Some(t) => t,
        None => {
            // Guarded write keeps the first timestamp if two fetches race.
            sqlx::query("UPDATE assignments SET started_at = NOW() WHERE id = $1 AND started_at IS NULL")
                .bind(assignment.id)
                .execute(&pool)
                .await?;
            sqlx::query_scalar::<_, DateTime<Utc>>(
                "SELECT started_at FROM assignments WHERE id = $1",
            )
            .bind(assignment.id)
            .fetch_one(&pool)
            .await?
        }
    };

    let questions = load_exam_questions(&pool, &exam).await?;
    let taker_questions: Vec<TakerQuestion> = questions.iter().map(TakerQuestion::from).collect();

    Ok(Json(StartExamResponse {
        exam_id: exam.id,
        title: exam.title,
        duration_minutes: exam.duration_minutes,
        total_questions: taker_questions.len(),
        started_at,
        questions: taker_questions,
    }))
}

/// Submits a student's answers and scores the attempt.
///
/// Preconditions: the caller is a student, an assignment row exists for
/// (student, exam), and the assignment is still pending. Correctness is
/// judged against the exam's own question options at submission time.
///
/// Persistence is a single transaction. The status flip
/// (pending -> completed) is a guarded update and the serialization point
/// for concurrent submissions: only the request that wins it upserts the
/// result row, the loser is rejected. A crash cannot leave a completed
/// assignment without its result.
pub async fn submit_exam(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(exam_id): Path<i64>,
    Json(req): Json<SubmitExamRequest>,
) -> Result<impl IntoResponse, AppError> {
    let student_id = require_student(&claims)?;

    let assignment = fetch_assignment(&pool, exam_id, student_id).await?;
    if assignment.status == STATUS_COMPLETED {
        return Err(AppError::Conflict("Exam already submitted".to_string()));
    }

    let exam = fetch_exam(&pool, exam_id).await?;
    let questions = load_exam_questions(&pool, &exam).await?;
    if questions.is_empty() {
        return Err(AppError::BadRequest("Exam has no questions".to_string()));
    }

    let outcome = scoring::score_submission(&questions, &req.answers, exam.pass_percentage);

    let completed_at = Utc::now();
    // A never-started attempt is recorded as zero duration.
    let started_at = assignment.started_at.unwrap_or(completed_at);
    let time_taken_seconds = match req.time_taken {
        Some(seconds) => seconds,
        None => {
            let elapsed_ms = (completed_at - started_at).num_milliseconds();
            ((elapsed_ms as f64 / 1000.0).round() as i64).max(0)
        }
    };

    let mut tx = pool.begin().await?;

    let claimed = sqlx::query(
        r#"
        UPDATE assignments
        SET status = $1, score = $2, percentage = $3, passed = $4, completed_at = $5
        WHERE id = $6 AND status = $7
        "#,
    )
    .bind(STATUS_COMPLETED)
    .bind(outcome.score)
    .bind(outcome.percentage)
    .bind(outcome.passed)
    .bind(completed_at)
    .bind(assignment.id)
    .bind(STATUS_PENDING)
    .execute(&mut *tx)
    .await?;

    if claimed.rows_affected() == 0 {
        // Lost the race against a concurrent submission.
        return Err(AppError::Conflict("Exam already submitted".to_string()));
    }

    sqlx::query(
        r#"
        INSERT INTO exam_results
            (exam_id, student_id, score, total_questions, correct_answers, wrong_answers,
             percentage, passed, started_at, completed_at, time_taken_seconds, answers)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        ON CONFLICT (exam_id, student_id) DO UPDATE SET
            score = EXCLUDED.score,
            total_questions = EXCLUDED.total_questions,
            correct_answers = EXCLUDED.correct_answers,
            wrong_answers = EXCLUDED.wrong_answers,
            percentage = EXCLUDED.percentage,
            passed = EXCLUDED.passed,
            started_at = EXCLUDED.started_at,
            completed_at = EXCLUDED.completed_at,
            time_taken_seconds = EXCLUDED.time_taken_seconds,
            answers = EXCLUDED.answers
        "#,
    )
    .bind(exam_id)
    .bind(student_id)
    .bind(outcome.score)
    .bind(outcome.total_questions)
    .bind(outcome.correct_answers)
    .bind(outcome.wrong_answers)
    .bind(outcome.percentage)
    .bind(outcome.passed)
    .bind(started_at)
    .bind(completed_at)
    .bind(time_taken_seconds)
    .bind(SqlJson(&outcome.answers))
    .execute(&mut *tx)
    .await
    .map_err(|e| {
        tracing::error!("Failed to upsert exam result: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    tx.commit().await?;

    Ok(Json(SubmitExamResponse {
        score: outcome.score,
        total_questions: outcome.total_questions,
        correct_answers: outcome.correct_answers,
        wrong_answers: outcome.wrong_answers,
        percentage: outcome.percentage,
        result: result_label(outcome.passed).to_string(),
        review: outcome.review,
    }))
}
