// src/models/question.rs

use serde::{Deserialize, Serialize};
use sqlx::{prelude::FromRow, types::Json};
use validator::Validate;

/// One answer option embedded in a question document.
/// Option ids are 0-based positions assigned whenever the list is written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerOption {
    pub id: i32,
    pub text: String,
    pub is_correct: bool,
}

/// Represents the 'questions' table in the database.
///
/// This is the author view: correctness flags are present. It must never be
/// serialized toward an exam-taking client; use `TakerQuestion` there.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,

    /// Grouping key within the question bank.
    pub category: String,

    /// The prompt text of the question.
    pub content: String,

    /// Ordered option list. Stored as a JSON array in the database.
    pub options: Json<Vec<AnswerOption>>,

    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Taker view of an option. Has no correctness field by construction,
/// so the answer key cannot leak through serialization.
#[derive(Debug, Serialize)]
pub struct TakerOption {
    pub id: i32,
    pub text: String,
}

/// Taker view of a question, sent to exam-taking clients.
#[derive(Debug, Serialize)]
pub struct TakerQuestion {
    pub id: i64,
    pub content: String,
    pub options: Vec<TakerOption>,
}

impl From<&Question> for TakerQuestion {
    fn from(question: &Question) -> Self {
        TakerQuestion {
            id: question.id,
            content: question.content.clone(),
            options: question
                .options
                .iter()
                .map(|o| TakerOption {
                    id: o.id,
                    text: o.text.clone(),
                })
                .collect(),
        }
    }
}

/// One option as supplied by the author.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionInput {
    pub text: String,
    pub is_correct: bool,
}

/// DTO for creating a question, and for updating one (the option list is
/// always replaced as a whole).
#[derive(Debug, Deserialize, Validate)]
pub struct CreateQuestionRequest {
    #[validate(length(min = 1, max = 100))]
    pub category: String,
    #[validate(length(min = 1, max = 2000))]
    pub content: String,
    #[validate(custom(function = validate_options))]
    pub options: Vec<OptionInput>,
}

/// Shared option-set contract: at least two options, every text non-empty,
/// exactly one option flagged correct.
pub fn validate_options(options: &[OptionInput]) -> Result<(), validator::ValidationError> {
    if options.len() < 2 {
        return Err(validator::ValidationError::new("at_least_two_options"));
    }
    let mut correct_count = 0;
    for opt in options {
        if opt.text.trim().is_empty() {
            return Err(validator::ValidationError::new("option_text_empty"));
        }
        if opt.text.len() > 500 {
            return Err(validator::ValidationError::new("option_text_too_long"));
        }
        if opt.is_correct {
            correct_count += 1;
        }
    }
    if correct_count != 1 {
        return Err(validator::ValidationError::new("exactly_one_correct_option"));
    }
    Ok(())
}

/// One row of a bulk import, as produced by spreadsheet parsing.
#[derive(Debug, Deserialize)]
pub struct ImportQuestionRow {
    pub category: String,
    pub content: String,
    pub options: Vec<String>,
    /// 1-based index of the correct option, the convention spreadsheet
    /// exports use. Normalized to 0-based before validation.
    pub correct_index: i32,
}

#[derive(Debug, Deserialize)]
pub struct BulkImportRequest {
    pub rows: Vec<ImportQuestionRow>,
}

/// Partial-success report: valid rows persist even when others fail.
#[derive(Debug, Serialize)]
pub struct BulkImportReport {
    pub inserted_count: usize,
    pub error_count: usize,
    /// Per-row messages, truncated to a bounded list.
    pub errors: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct BulkDeleteRequest {
    pub ids: Vec<i64>,
}
