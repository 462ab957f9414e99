use std::collections::HashSet;

use thiserror::Error;

use crate::db::types::QuestionKind;

#[derive(Debug, Error, PartialEq, Eq)]
pub(crate) enum TaskRuleError {
    #[error("task must contain at least one question")]
    Empty,
    #[error("question positions start at 1")]
    InvalidPosition(i32),
    #[error("duplicate question position {0}")]
    DuplicatePosition(i32),
    #[error("question {position} must be worth a positive number of points")]
    NonPositivePoints { position: i32 },
    #[error("question {position} needs at least two options")]
    TooFewOptions { position: i32 },
    #[error("question {position} must have exactly one correct option")]
    CorrectCountMismatch { position: i32 },
    #[error("question {position} is an essay and cannot have options")]
    EssayWithOptions { position: i32 },
}

/// Shape of one question as submitted by the task author. Option order in
/// the request is the display order, so only the correctness flags matter
/// here.
pub(crate) struct QuestionSpec<'a> {
    pub(crate) position: i32,
    pub(crate) kind: QuestionKind,
    pub(crate) points: f64,
    pub(crate) option_correct_flags: &'a [bool],
}

pub(crate) fn validate_question_set(questions: &[QuestionSpec<'_>]) -> Result<(), TaskRuleError> {
    if questions.is_empty() {
        return Err(TaskRuleError::Empty);
    }

    let mut seen = HashSet::new();
    for question in questions {
        if question.position < 1 {
            return Err(TaskRuleError::InvalidPosition(question.position));
        }
        if !seen.insert(question.position) {
            return Err(TaskRuleError::DuplicatePosition(question.position));
        }
        if !question.points.is_finite() || question.points <= 0.0 {
            return Err(TaskRuleError::NonPositivePoints { position: question.position });
        }

        match question.kind {
            QuestionKind::MultipleChoice => {
                if question.option_correct_flags.len() < 2 {
                    return Err(TaskRuleError::TooFewOptions { position: question.position });
                }
                let correct =
                    question.option_correct_flags.iter().filter(|&&flag| flag).count();
                if correct != 1 {
                    return Err(TaskRuleError::CorrectCountMismatch {
                        position: question.position,
                    });
                }
            }
            QuestionKind::Essay => {
                if !question.option_correct_flags.is_empty() {
                    return Err(TaskRuleError::EssayWithOptions { position: question.position });
                }
            }
        }
    }

    Ok(())
}
