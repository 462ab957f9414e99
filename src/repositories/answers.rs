use sqlx::{PgExecutor, PgPool};
use time::PrimitiveDateTime;

use crate::db::models::Answer;

const ANSWER_COLUMNS: &str = "\
    id, submission_id, question_id, response_text, chosen_option_id, score, feedback, \
    graded_at, created_at, updated_at";

pub(crate) struct UpsertAnswer<'a> {
    pub(crate) id: &'a str,
    pub(crate) submission_id: &'a str,
    pub(crate) question_id: &'a str,
    pub(crate) response_text: Option<&'a str>,
    pub(crate) chosen_option_id: Option<&'a str>,
    pub(crate) now: PrimitiveDateTime,
}

/// Saving twice for the same question overwrites the previous payload and
/// keeps the original row id.
pub(crate) async fn upsert(
    executor: impl PgExecutor<'_>,
    params: UpsertAnswer<'_>,
) -> Result<Answer, sqlx::Error> {
    sqlx::query_as::<_, Answer>(&format!(
        "INSERT INTO answers (
            id, submission_id, question_id, response_text, chosen_option_id, created_at, updated_at
         ) VALUES ($1,$2,$3,$4,$5,$6,$6)
         ON CONFLICT (submission_id, question_id) DO UPDATE SET
            response_text = EXCLUDED.response_text,
            chosen_option_id = EXCLUDED.chosen_option_id,
            updated_at = EXCLUDED.updated_at
         RETURNING {ANSWER_COLUMNS}"
    ))
    .bind(params.id)
    .bind(params.submission_id)
    .bind(params.question_id)
    .bind(params.response_text)
    .bind(params.chosen_option_id)
    .bind(params.now)
    .fetch_one(executor)
    .await
}

pub(crate) async fn list_by_submission(
    executor: impl PgExecutor<'_>,
    submission_id: &str,
) -> Result<Vec<Answer>, sqlx::Error> {
    sqlx::query_as::<_, Answer>(
        "SELECT a.id, a.submission_id, a.question_id, a.response_text, a.chosen_option_id,
                a.score, a.feedback, a.graded_at, a.created_at, a.updated_at
         FROM answers a
         JOIN questions q ON q.id = a.question_id
         WHERE a.submission_id = $1
         ORDER BY q.position",
    )
    .bind(submission_id)
    .fetch_all(executor)
    .await
}

pub(crate) async fn set_score(
    executor: impl PgExecutor<'_>,
    submission_id: &str,
    question_id: &str,
    score: f64,
    feedback: Option<&str>,
    graded_at: PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE answers
         SET score = $1, feedback = COALESCE($2, feedback), graded_at = $3, updated_at = $3
         WHERE submission_id = $4 AND question_id = $5",
    )
    .bind(score)
    .bind(feedback)
    .bind(graded_at)
    .bind(submission_id)
    .bind(question_id)
    .execute(executor)
    .await?;
    Ok(())
}

/// All answers for a task in one round trip. Report builders group the rows
/// by submission id.
pub(crate) async fn list_by_task(pool: &PgPool, task_id: &str) -> Result<Vec<Answer>, sqlx::Error> {
    sqlx::query_as::<_, Answer>(
        "SELECT a.id, a.submission_id, a.question_id, a.response_text, a.chosen_option_id,
                a.score, a.feedback, a.graded_at, a.created_at, a.updated_at
         FROM answers a
         JOIN submissions s ON s.id = a.submission_id
         WHERE s.task_id = $1",
    )
    .bind(task_id)
    .fetch_all(pool)
    .await
}
