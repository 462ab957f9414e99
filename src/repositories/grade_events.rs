use sqlx::{PgExecutor, PgPool};
use time::PrimitiveDateTime;

use crate::db::models::GradeEvent;
use crate::db::types::SubmissionStatus;

const EVENT_COLUMNS: &str =
    "id, submission_id, actor_id, previous_status, previous_total, new_total, created_at";

pub(crate) struct CreateGradeEvent<'a> {
    pub(crate) id: &'a str,
    pub(crate) submission_id: &'a str,
    pub(crate) actor_id: &'a str,
    pub(crate) previous_status: SubmissionStatus,
    pub(crate) previous_total: Option<f64>,
    pub(crate) new_total: f64,
    pub(crate) created_at: PrimitiveDateTime,
}

/// Append-only; rows are never updated or deleted.
pub(crate) async fn append(
    executor: impl PgExecutor<'_>,
    params: CreateGradeEvent<'_>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO grade_events (
            id, submission_id, actor_id, previous_status, previous_total, new_total, created_at
         ) VALUES ($1,$2,$3,$4,$5,$6,$7)",
    )
    .bind(params.id)
    .bind(params.submission_id)
    .bind(params.actor_id)
    .bind(params.previous_status)
    .bind(params.previous_total)
    .bind(params.new_total)
    .bind(params.created_at)
    .execute(executor)
    .await?;
    Ok(())
}

pub(crate) async fn list_by_submission(
    pool: &PgPool,
    submission_id: &str,
) -> Result<Vec<GradeEvent>, sqlx::Error> {
    sqlx::query_as::<_, GradeEvent>(&format!(
        "SELECT {EVENT_COLUMNS} FROM grade_events WHERE submission_id = $1 ORDER BY created_at, id"
    ))
    .bind(submission_id)
    .fetch_all(pool)
    .await
}
