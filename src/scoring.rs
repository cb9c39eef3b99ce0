// src/scoring.rs

use std::collections::HashMap;

use serde::Serialize;

use crate::models::{exam_result::AnswerRecord, question::Question};

/// Display text used when a student left a question blank (or selected an
/// option id that no longer resolves).
pub const NOT_ANSWERED: &str = "Not answered";

/// Per-question feedback line, returned to the student right after
/// submission and rebuilt later by the review endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ReviewEntry {
    pub question_id: i64,
    pub question_text: String,
    pub selected_option: String,
    pub correct_option: Option<String>,
    pub is_correct: bool,
}

/// Outcome of scoring one submission.
#[derive(Debug)]
pub struct ScoreOutcome {
    pub score: i32,
    pub total_questions: i32,
    pub correct_answers: i32,
    pub wrong_answers: i32,
    pub percentage: f64,
    pub passed: bool,
    /// Persisted with the exam result.
    pub answers: Vec<AnswerRecord>,
    /// Returned to the caller only; reporting reconstructs it on demand.
    pub review: Vec<ReviewEntry>,
}

/// Scores a submitted answer map against an exam's question list.
///
/// Questions are walked in list order. A question is correct iff the
/// submitted option id equals the id of the option flagged correct; the
/// flag is read off the exam's own questions, never a separate answer key.
/// Unanswered questions count toward neither the correct nor the wrong
/// tally. A question with no flagged option can never be judged correct.
/// The pass threshold is inclusive.
pub fn score_submission(
    questions: &[Question],
    submitted: &HashMap<i64, i32>,
    pass_percentage: f64,
) -> ScoreOutcome {
    let total_questions = questions.len() as i32;
    let mut score = 0;
    let mut correct_answers = 0;
    let mut wrong_answers = 0;
    let mut answers = Vec::with_capacity(questions.len());
    let mut review = Vec::with_capacity(questions.len());

    for question in questions {
        let selected_id = submitted.get(&question.id).copied();
        let correct_option = question.options.iter().find(|o| o.is_correct);
        let correct_id = correct_option.map(|o| o.id);

        let is_correct = match (selected_id, correct_id) {
            (Some(selected), Some(correct)) => selected == correct,
            _ => false,
        };

        if is_correct {
            score += 1;
            correct_answers += 1;
        } else if selected_id.is_some() {
            wrong_answers += 1;
        }

        let selected_text = selected_id
            .and_then(|sel| question.options.iter().find(|o| o.id == sel))
            .map(|o| o.text.clone())
            .unwrap_or_else(|| NOT_ANSWERED.to_string());

        answers.push(AnswerRecord {
            question_id: question.id,
            selected_option_id: selected_id,
            correct_option_id: correct_id,
            is_correct,
        });

        review.push(ReviewEntry {
            question_id: question.id,
            question_text: question.content.clone(),
            selected_option: selected_text,
            correct_option: correct_option.map(|o| o.text.clone()),
            is_correct,
        });
    }

    let percentage = if total_questions > 0 {
        (score as f64 / total_questions as f64) * 100.0
    } else {
        0.0
    };
    let passed = percentage >= pass_percentage;

    ScoreOutcome {
        score,
        total_questions,
        correct_answers,
        wrong_answers,
        percentage,
        passed,
        answers,
        review,
    }
}

/// Rebuilds review entries from stored answer records and the current
/// question documents. Prompt or option text edited after the attempt
/// shows in its current form; the stored ids and correctness do not change.
pub fn rebuild_review(
    records: &[AnswerRecord],
    questions_by_id: &HashMap<i64, &Question>,
) -> Vec<ReviewEntry> {
    records
        .iter()
        .map(|record| {
            let question = questions_by_id.get(&record.question_id);

            let option_text = |id: Option<i32>| {
                id.and_then(|id| {
                    question.and_then(|q| q.options.iter().find(|o| o.id == id))
                })
                .map(|o| o.text.clone())
            };

            ReviewEntry {
                question_id: record.question_id,
                question_text: question
                    .map(|q| q.content.clone())
                    .unwrap_or_else(|| "(question removed)".to_string()),
                selected_option: option_text(record.selected_option_id)
                    .unwrap_or_else(|| NOT_ANSWERED.to_string()),
                correct_option: option_text(record.correct_option_id),
                is_correct: record.is_correct,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::question::AnswerOption;
    use sqlx::types::Json;

    fn question(id: i64, content: &str, options: &[(&str, bool)]) -> Question {
        Question {
            id,
            category: "general".to_string(),
            content: content.to_string(),
            options: Json(
                options
                    .iter()
                    .enumerate()
                    .map(|(i, (text, is_correct))| AnswerOption {
                        id: i as i32,
                        text: text.to_string(),
                        is_correct: *is_correct,
                    })
                    .collect(),
            ),
            created_at: None,
        }
    }

    #[test]
    fn test_all_correct_scores_full() {
        let questions = vec![
            question(1, "Q1", &[("A", true), ("B", false)]),
            question(2, "Q2", &[("A", false), ("B", true)]),
        ];
        let mut submitted = HashMap::new();
        submitted.insert(1, 0);
        submitted.insert(2, 1);

        let outcome = score_submission(&questions, &submitted, 60.0);
        assert_eq!(outcome.score, 2);
        assert_eq!(outcome.correct_answers, 2);
        assert_eq!(outcome.wrong_answers, 0);
        assert_eq!(outcome.percentage, 100.0);
        assert!(outcome.passed);
    }

    #[test]
    fn test_empty_submission_scores_zero() {
        let questions = vec![
            question(1, "Q1", &[("A", true), ("B", false)]),
            question(2, "Q2", &[("A", false), ("B", true)]),
        ];
        let submitted = HashMap::new();

        let outcome = score_submission(&questions, &submitted, 60.0);
        assert_eq!(outcome.score, 0);
        assert_eq!(outcome.correct_answers, 0);
        // Unanswered questions are not wrong.
        assert_eq!(outcome.wrong_answers, 0);
        assert_eq!(outcome.percentage, 0.0);
        assert!(!outcome.passed);
        assert_eq!(outcome.review[0].selected_option, NOT_ANSWERED);
    }

    #[test]
    fn test_pass_threshold_is_inclusive() {
        // 5 questions, 2 correct = 40%. With pass_percentage = 40 this passes.
        let questions: Vec<Question> = (1..=5)
            .map(|i| question(i, "Q", &[("A", true), ("B", false)]))
            .collect();
        let mut submitted = HashMap::new();
        submitted.insert(1, 0);
        submitted.insert(2, 0);
        submitted.insert(3, 1);
        submitted.insert(4, 1);
        submitted.insert(5, 1);

        let outcome = score_submission(&questions, &submitted, 40.0);
        assert_eq!(outcome.score, 2);
        assert_eq!(outcome.percentage, 40.0);
        assert!(outcome.passed);
    }

    #[test]
    fn test_one_right_one_wrong() {
        // Q1 correct = A, Q2 correct = B; submission picks A and C.
        let questions = vec![
            question(1, "Q1", &[("A", true), ("B", false), ("C", false)]),
            question(2, "Q2", &[("A", false), ("B", true), ("C", false)]),
        ];
        let mut submitted = HashMap::new();
        submitted.insert(1, 0);
        submitted.insert(2, 2);

        let outcome = score_submission(&questions, &submitted, 60.0);
        assert_eq!(outcome.score, 1);
        assert_eq!(outcome.correct_answers, 1);
        assert_eq!(outcome.wrong_answers, 1);
        assert_eq!(outcome.percentage, 50.0);
        assert!(!outcome.passed);
    }

    #[test]
    fn test_unanswered_counts_toward_neither_tally() {
        let questions = vec![
            question(1, "Q1", &[("A", true), ("B", false)]),
            question(2, "Q2", &[("A", true), ("B", false)]),
            question(3, "Q3", &[("A", true), ("B", false)]),
        ];
        let mut submitted = HashMap::new();
        submitted.insert(1, 0); // correct
        submitted.insert(2, 1); // wrong
        // question 3 left blank

        let outcome = score_submission(&questions, &submitted, 50.0);
        assert_eq!(outcome.correct_answers, 1);
        assert_eq!(outcome.wrong_answers, 1);
        assert_eq!(outcome.total_questions, 3);
        assert_eq!(outcome.answers[2].selected_option_id, None);
        assert!(!outcome.answers[2].is_correct);
    }

    #[test]
    fn test_question_without_correct_flag_is_never_correct() {
        let questions = vec![question(1, "Q1", &[("A", false), ("B", false)])];
        let mut submitted = HashMap::new();
        submitted.insert(1, 0);

        let outcome = score_submission(&questions, &submitted, 0.0);
        assert_eq!(outcome.score, 0);
        assert_eq!(outcome.wrong_answers, 1);
        assert_eq!(outcome.answers[0].correct_option_id, None);
    }

    #[test]
    fn test_empty_exam_has_zero_percentage() {
        let outcome = score_submission(&[], &HashMap::new(), 50.0);
        assert_eq!(outcome.total_questions, 0);
        assert_eq!(outcome.percentage, 0.0);
        // 0 >= 50 is false; an empty exam cannot be passed.
        assert!(!outcome.passed);
    }

    #[test]
    fn test_rebuild_review_round_trips_records() {
        let questions = vec![
            question(1, "Q1", &[("A", true), ("B", false)]),
            question(2, "Q2", &[("A", false), ("B", true)]),
        ];
        let mut submitted = HashMap::new();
        submitted.insert(1, 1);

        let outcome = score_submission(&questions, &submitted, 50.0);

        let by_id: HashMap<i64, &Question> = questions.iter().map(|q| (q.id, q)).collect();
        let rebuilt = rebuild_review(&outcome.answers, &by_id);

        assert_eq!(rebuilt.len(), outcome.review.len());
        for (a, b) in outcome.review.iter().zip(rebuilt.iter()) {
            assert_eq!(a.question_id, b.question_id);
            assert_eq!(a.selected_option, b.selected_option);
            assert_eq!(a.correct_option, b.correct_option);
            assert_eq!(a.is_correct, b.is_correct);
        }
    }
}
