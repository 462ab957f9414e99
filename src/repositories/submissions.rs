use sqlx::{PgConnection, PgExecutor, PgPool, Postgres, QueryBuilder};
use time::PrimitiveDateTime;

use crate::db::models::Submission;
use crate::db::types::SubmissionStatus;

const SUBMISSION_COLUMNS: &str = "\
    id, task_id, student_id, status, started_at, submitted_at, total_score, \
    teacher_feedback, graded_by, graded_at, created_at, updated_at";

/// Listing row for teacher views, joined with the student account.
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct SubmissionListRow {
    pub(crate) id: String,
    pub(crate) student_id: String,
    pub(crate) student_email: String,
    pub(crate) student_name: String,
    pub(crate) status: SubmissionStatus,
    pub(crate) started_at: PrimitiveDateTime,
    pub(crate) submitted_at: Option<PrimitiveDateTime>,
    pub(crate) total_score: Option<f64>,
}

pub(crate) struct CreateSubmission<'a> {
    pub(crate) id: &'a str,
    pub(crate) task_id: &'a str,
    pub(crate) student_id: &'a str,
    pub(crate) started_at: PrimitiveDateTime,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

/// First write wins; concurrent calls for the same (task, student) pair leave
/// exactly one row. Callers re-fetch to observe the surviving row.
pub(crate) async fn create_if_absent(
    pool: &PgPool,
    params: CreateSubmission<'_>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO submissions (id, task_id, student_id, status, started_at, created_at, updated_at)
         VALUES ($1,$2,$3,$4,$5,$6,$7)
         ON CONFLICT (task_id, student_id) DO NOTHING",
    )
    .bind(params.id)
    .bind(params.task_id)
    .bind(params.student_id)
    .bind(SubmissionStatus::InProgress)
    .bind(params.started_at)
    .bind(params.created_at)
    .bind(params.updated_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub(crate) async fn find_by_id(
    executor: impl PgExecutor<'_>,
    id: &str,
) -> Result<Option<Submission>, sqlx::Error> {
    sqlx::query_as::<_, Submission>(&format!(
        "SELECT {SUBMISSION_COLUMNS} FROM submissions WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(executor)
    .await
}

pub(crate) async fn find_by_task_and_student(
    pool: &PgPool,
    task_id: &str,
    student_id: &str,
) -> Result<Option<Submission>, sqlx::Error> {
    sqlx::query_as::<_, Submission>(&format!(
        "SELECT {SUBMISSION_COLUMNS} FROM submissions WHERE task_id = $1 AND student_id = $2"
    ))
    .bind(task_id)
    .bind(student_id)
    .fetch_optional(pool)
    .await
}

/// Locks the row for the rest of the transaction. Status transitions and
/// answer writes take this lock first.
pub(crate) async fn find_for_update(
    conn: &mut PgConnection,
    id: &str,
) -> Result<Option<Submission>, sqlx::Error> {
    sqlx::query_as::<_, Submission>(&format!(
        "SELECT {SUBMISSION_COLUMNS} FROM submissions WHERE id = $1 FOR UPDATE"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await
}

/// Returns the number of rows moved. Zero means another writer already took
/// the submission out of `in_progress`.
pub(crate) async fn mark_submitted(
    executor: impl PgExecutor<'_>,
    id: &str,
    status: SubmissionStatus,
    submitted_at: PrimitiveDateTime,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE submissions
         SET status = $1, submitted_at = $2, updated_at = $2
         WHERE id = $3 AND status = $4",
    )
    .bind(status)
    .bind(submitted_at)
    .bind(id)
    .bind(SubmissionStatus::InProgress)
    .execute(executor)
    .await?;
    Ok(result.rows_affected())
}

pub(crate) struct ApplyGrade<'a> {
    pub(crate) total_score: f64,
    pub(crate) teacher_feedback: Option<&'a str>,
    pub(crate) graded_by: &'a str,
    pub(crate) graded_at: PrimitiveDateTime,
}

pub(crate) async fn apply_grade(
    executor: impl PgExecutor<'_>,
    id: &str,
    params: ApplyGrade<'_>,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE submissions
         SET status = $1,
             total_score = $2,
             teacher_feedback = COALESCE($3, teacher_feedback),
             graded_by = $4,
             graded_at = $5,
             updated_at = $5
         WHERE id = $6 AND status IN ($7, $8)",
    )
    .bind(SubmissionStatus::Graded)
    .bind(params.total_score)
    .bind(params.teacher_feedback)
    .bind(params.graded_by)
    .bind(params.graded_at)
    .bind(id)
    .bind(SubmissionStatus::Submitted)
    .bind(SubmissionStatus::SubmittedLate)
    .execute(executor)
    .await?;
    Ok(result.rows_affected())
}

/// Like [`apply_grade`] but only touches already-graded work, so the status
/// never moves.
pub(crate) async fn apply_regrade(
    executor: impl PgExecutor<'_>,
    id: &str,
    params: ApplyGrade<'_>,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE submissions
         SET total_score = $1,
             teacher_feedback = COALESCE($2, teacher_feedback),
             graded_by = $3,
             graded_at = $4,
             updated_at = $4
         WHERE id = $5 AND status = $6",
    )
    .bind(params.total_score)
    .bind(params.teacher_feedback)
    .bind(params.graded_by)
    .bind(params.graded_at)
    .bind(id)
    .bind(SubmissionStatus::Graded)
    .execute(executor)
    .await?;
    Ok(result.rows_affected())
}

pub(crate) async fn list_by_task(
    pool: &PgPool,
    task_id: &str,
    status: Option<SubmissionStatus>,
    skip: i64,
    limit: i64,
) -> Result<Vec<SubmissionListRow>, sqlx::Error> {
    let mut builder = QueryBuilder::<Postgres>::new(
        "SELECT s.id,
                s.student_id,
                u.email AS student_email,
                u.full_name AS student_name,
                s.status,
                s.started_at,
                s.submitted_at,
                s.total_score
         FROM submissions s
         JOIN users u ON u.id = s.student_id
         WHERE s.task_id = ",
    );
    builder.push_bind(task_id);

    if let Some(status) = status {
        builder.push(" AND s.status = ");
        builder.push_bind(status);
    }

    builder.push(" ORDER BY s.submitted_at DESC NULLS LAST, s.started_at DESC OFFSET ");
    builder.push_bind(skip.max(0));
    builder.push(" LIMIT ");
    builder.push_bind(limit.clamp(1, 1000));

    builder
        .build_query_as::<SubmissionListRow>()
        .fetch_all(pool)
        .await
}

pub(crate) async fn count_by_task(
    pool: &PgPool,
    task_id: &str,
    status: Option<SubmissionStatus>,
) -> Result<i64, sqlx::Error> {
    let mut builder =
        QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM submissions WHERE task_id = ");
    builder.push_bind(task_id);

    if let Some(status) = status {
        builder.push(" AND status = ");
        builder.push_bind(status);
    }

    builder.build_query_scalar::<i64>().fetch_one(pool).await
}

pub(crate) async fn list_graded_by_task(
    pool: &PgPool,
    task_id: &str,
) -> Result<Vec<SubmissionListRow>, sqlx::Error> {
    sqlx::query_as::<_, SubmissionListRow>(
        "SELECT s.id,
                s.student_id,
                u.email AS student_email,
                u.full_name AS student_name,
                s.status,
                s.started_at,
                s.submitted_at,
                s.total_score
         FROM submissions s
         JOIN users u ON u.id = s.student_id
         WHERE s.task_id = $1 AND s.status = $2
         ORDER BY u.full_name, s.id",
    )
    .bind(task_id)
    .bind(SubmissionStatus::Graded)
    .fetch_all(pool)
    .await
}
