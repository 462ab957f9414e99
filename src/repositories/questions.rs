use sqlx::{PgExecutor, PgPool};
use time::PrimitiveDateTime;

use crate::db::models::{Question, QuestionOption};
use crate::db::types::QuestionKind;

const QUESTION_COLUMNS: &str = "id, task_id, position, kind, prompt, points, created_at";
const OPTION_COLUMNS: &str = "id, question_id, position, text, is_correct";

pub(crate) struct CreateQuestion<'a> {
    pub(crate) id: &'a str,
    pub(crate) task_id: &'a str,
    pub(crate) position: i32,
    pub(crate) kind: QuestionKind,
    pub(crate) prompt: &'a str,
    pub(crate) points: f64,
    pub(crate) created_at: PrimitiveDateTime,
}

pub(crate) async fn create(
    executor: impl PgExecutor<'_>,
    params: CreateQuestion<'_>,
) -> Result<Question, sqlx::Error> {
    sqlx::query_as::<_, Question>(&format!(
        "INSERT INTO questions (
            id, task_id, position, kind, prompt, points, created_at
         ) VALUES ($1,$2,$3,$4,$5,$6,$7)
         RETURNING {QUESTION_COLUMNS}",
    ))
    .bind(params.id)
    .bind(params.task_id)
    .bind(params.position)
    .bind(params.kind)
    .bind(params.prompt)
    .bind(params.points)
    .bind(params.created_at)
    .fetch_one(executor)
    .await
}

pub(crate) struct CreateQuestionOption<'a> {
    pub(crate) id: &'a str,
    pub(crate) question_id: &'a str,
    pub(crate) position: i32,
    pub(crate) text: &'a str,
    pub(crate) is_correct: bool,
}

pub(crate) async fn create_option(
    executor: impl PgExecutor<'_>,
    params: CreateQuestionOption<'_>,
) -> Result<QuestionOption, sqlx::Error> {
    sqlx::query_as::<_, QuestionOption>(&format!(
        "INSERT INTO question_options (
            id, question_id, position, text, is_correct
         ) VALUES ($1,$2,$3,$4,$5)
         RETURNING {OPTION_COLUMNS}",
    ))
    .bind(params.id)
    .bind(params.question_id)
    .bind(params.position)
    .bind(params.text)
    .bind(params.is_correct)
    .fetch_one(executor)
    .await
}

/// Options cascade with their questions.
pub(crate) async fn delete_by_task(
    executor: impl PgExecutor<'_>,
    task_id: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM questions WHERE task_id = $1").bind(task_id).execute(executor).await?;
    Ok(())
}

pub(crate) async fn list_by_task(
    executor: impl PgExecutor<'_>,
    task_id: &str,
) -> Result<Vec<Question>, sqlx::Error> {
    sqlx::query_as::<_, Question>(&format!(
        "SELECT {QUESTION_COLUMNS} FROM questions WHERE task_id = $1 ORDER BY position"
    ))
    .bind(task_id)
    .fetch_all(executor)
    .await
}

pub(crate) async fn list_options_for_task(
    pool: &PgPool,
    task_id: &str,
) -> Result<Vec<QuestionOption>, sqlx::Error> {
    sqlx::query_as::<_, QuestionOption>(
        "SELECT o.id, o.question_id, o.position, o.text, o.is_correct
         FROM question_options o
         JOIN questions q ON q.id = o.question_id
         WHERE q.task_id = $1
         ORDER BY q.position, o.position",
    )
    .bind(task_id)
    .fetch_all(pool)
    .await
}

pub(crate) async fn find_for_task(
    executor: impl PgExecutor<'_>,
    question_id: &str,
    task_id: &str,
) -> Result<Option<Question>, sqlx::Error> {
    sqlx::query_as::<_, Question>(&format!(
        "SELECT {QUESTION_COLUMNS} FROM questions WHERE id = $1 AND task_id = $2"
    ))
    .bind(question_id)
    .bind(task_id)
    .fetch_optional(executor)
    .await
}

pub(crate) async fn option_belongs_to_question(
    executor: impl PgExecutor<'_>,
    option_id: &str,
    question_id: &str,
) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM question_options WHERE id = $1 AND question_id = $2)",
    )
    .bind(option_id)
    .bind(question_id)
    .fetch_one(executor)
    .await
}

/// One row per question with the id of its correct option, if any. Input for
/// scoring without loading full option lists.
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct GradableQuestionRow {
    pub(crate) id: String,
    pub(crate) position: i32,
    pub(crate) kind: QuestionKind,
    pub(crate) points: f64,
    pub(crate) correct_option_id: Option<String>,
}

pub(crate) async fn list_gradable(
    executor: impl PgExecutor<'_>,
    task_id: &str,
) -> Result<Vec<GradableQuestionRow>, sqlx::Error> {
    sqlx::query_as::<_, GradableQuestionRow>(
        "SELECT q.id,
                q.position,
                q.kind,
                q.points,
                (SELECT o.id
                 FROM question_options o
                 WHERE o.question_id = q.id AND o.is_correct
                 LIMIT 1) AS correct_option_id
         FROM questions q
         WHERE q.task_id = $1
         ORDER BY q.position",
    )
    .bind(task_id)
    .fetch_all(executor)
    .await
}
