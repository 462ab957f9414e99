use std::collections::HashMap;

use thiserror::Error;

use crate::db::types::QuestionKind;

#[derive(Debug, Error, PartialEq)]
pub(crate) enum GradingError {
    #[error("unknown question id '{0}' in scores")]
    UnknownQuestion(String),
    #[error("question {position} is scored automatically")]
    AutoScored { position: i32 },
    #[error("question {position} requires a manual score")]
    MissingScore { position: i32 },
    #[error("score {score} for question {position} is outside 0..={max}")]
    ScoreOutOfRange { position: i32, score: f64, max: f64 },
}

/// Everything needed to score one question, detached from storage.
#[derive(Debug, Clone)]
pub(crate) struct GradableQuestion {
    pub(crate) id: String,
    pub(crate) position: i32,
    pub(crate) kind: QuestionKind,
    pub(crate) points: f64,
    pub(crate) correct_option_id: Option<String>,
}

#[derive(Debug, Clone)]
pub(crate) struct GradableAnswer {
    pub(crate) question_id: String,
    pub(crate) chosen_option_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct GradeOutcome {
    pub(crate) per_question: HashMap<String, f64>,
    pub(crate) total_score: f64,
    pub(crate) correct_count: usize,
}

/// Deterministic scoring pass. Multiple-choice answers earn full points or
/// zero; essay questions take the supplied manual score, defaulting to zero
/// when absent. Grading, regrading and report views all run through here so
/// a submission never scores differently depending on who is looking.
pub(crate) fn grade_submission(
    questions: &[GradableQuestion],
    answers: &[GradableAnswer],
    essay_scores: &HashMap<String, f64>,
) -> GradeOutcome {
    let chosen_by_question: HashMap<&str, Option<&str>> = answers
        .iter()
        .map(|answer| (answer.question_id.as_str(), answer.chosen_option_id.as_deref()))
        .collect();

    let mut per_question = HashMap::with_capacity(questions.len());
    let mut total_score = 0.0;
    let mut correct_count = 0;

    for question in questions {
        let score = match question.kind {
            QuestionKind::MultipleChoice => {
                let chosen = chosen_by_question.get(question.id.as_str()).copied().flatten();
                match (chosen, question.correct_option_id.as_deref()) {
                    (Some(chosen), Some(correct)) if chosen == correct => question.points,
                    _ => 0.0,
                }
            }
            QuestionKind::Essay => essay_scores.get(&question.id).copied().unwrap_or(0.0),
        };

        if question.points > 0.0 && score >= question.points {
            correct_count += 1;
        }
        total_score += score;
        per_question.insert(question.id.clone(), score);
    }

    GradeOutcome { per_question, total_score, correct_count }
}

/// Strict check of teacher-supplied scores, run before anything persists.
pub(crate) fn validate_manual_scores(
    questions: &[GradableQuestion],
    manual_scores: &HashMap<String, f64>,
) -> Result<(), GradingError> {
    for question_id in manual_scores.keys() {
        let question = questions
            .iter()
            .find(|question| question.id == *question_id)
            .ok_or_else(|| GradingError::UnknownQuestion(question_id.clone()))?;
        if question.kind != QuestionKind::Essay {
            return Err(GradingError::AutoScored { position: question.position });
        }
    }

    for question in questions {
        if question.kind != QuestionKind::Essay {
            continue;
        }
        let score = manual_scores
            .get(&question.id)
            .copied()
            .ok_or(GradingError::MissingScore { position: question.position })?;
        if !score.is_finite() || score < 0.0 || score > question.points {
            return Err(GradingError::ScoreOutOfRange {
                position: question.position,
                score,
                max: question.points,
            });
        }
    }

    Ok(())
}
