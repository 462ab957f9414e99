use std::collections::HashMap;

use uuid::Uuid;

use crate::api::errors::ApiError;
pub(crate) use crate::core::time::primitive_now_utc as now_primitive;
use crate::db::models::{Answer, Submission, Task};
use crate::repositories;
use crate::schemas::submission::GradeOutcomeResponse;
use crate::services::grading::{self, GradableAnswer, GradableQuestion};

pub(crate) async fn fetch_task(pool: &sqlx::PgPool, task_id: &str) -> Result<Task, ApiError> {
    repositories::tasks::find_by_id(pool, task_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch task"))?
        .ok_or_else(|| ApiError::NotFound("Task not found".to_string()))
}

pub(crate) async fn fetch_submission(
    pool: &sqlx::PgPool,
    submission_id: &str,
) -> Result<Submission, ApiError> {
    repositories::submissions::find_by_id(pool, submission_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch submission"))?
        .ok_or_else(|| ApiError::NotFound("Submission not found".to_string()))
}

/// Lazily creates the row for this (task, student) pair. Concurrent calls
/// settle on one row; the flag reports whether this call created it.
pub(crate) async fn ensure_submission(
    pool: &sqlx::PgPool,
    task_id: &str,
    student_id: &str,
) -> Result<(Submission, bool), ApiError> {
    let existing = repositories::submissions::find_by_task_and_student(pool, task_id, student_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch submission"))?;

    if let Some(submission) = existing {
        return Ok((submission, false));
    }

    let id = Uuid::new_v4().to_string();
    let now = now_primitive();
    repositories::submissions::create_if_absent(
        pool,
        repositories::submissions::CreateSubmission {
            id: &id,
            task_id,
            student_id,
            started_at: now,
            created_at: now,
            updated_at: now,
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to create submission"))?;

    let submission = repositories::submissions::find_by_task_and_student(pool, task_id, student_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch submission"))?
        .ok_or_else(|| ApiError::Internal("Submission missing after creation".to_string()))?;

    let created = submission.id == id;
    Ok((submission, created))
}

pub(crate) async fn fetch_gradable_questions(
    executor: impl sqlx::PgExecutor<'_>,
    task_id: &str,
) -> Result<Vec<GradableQuestion>, ApiError> {
    let rows = repositories::questions::list_gradable(executor, task_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list questions"))?;

    Ok(rows
        .into_iter()
        .map(|row| GradableQuestion {
            id: row.id,
            position: row.position,
            kind: row.kind,
            points: row.points,
            correct_option_id: row.correct_option_id,
        })
        .collect())
}

pub(crate) fn to_gradable_answers(answers: &[Answer]) -> Vec<GradableAnswer> {
    answers
        .iter()
        .map(|answer| GradableAnswer {
            question_id: answer.question_id.clone(),
            chosen_option_id: answer.chosen_option_id.clone(),
        })
        .collect()
}

/// Rebuilds a graded submission's outcome from the persisted per-answer
/// scores, so every view reports exactly what grading stored.
pub(crate) fn persisted_outcome(
    questions: &[GradableQuestion],
    answers: &[Answer],
) -> GradeOutcomeResponse {
    let essay_scores: HashMap<String, f64> = answers
        .iter()
        .filter_map(|answer| answer.score.map(|score| (answer.question_id.clone(), score)))
        .collect();
    let gradable_answers = to_gradable_answers(answers);
    let outcome = grading::grade_submission(questions, &gradable_answers, &essay_scores);
    GradeOutcomeResponse::from_outcome(outcome)
}
