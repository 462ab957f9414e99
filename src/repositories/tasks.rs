use sqlx::{PgExecutor, PgPool, Postgres, QueryBuilder};
use time::PrimitiveDateTime;

use crate::db::models::Task;

const TASK_COLUMNS: &str = "\
    id, class_id, title, description, points, due_date, published, published_at, \
    created_by, created_at, updated_at";

pub(crate) struct CreateTask<'a> {
    pub(crate) id: &'a str,
    pub(crate) class_id: &'a str,
    pub(crate) title: &'a str,
    pub(crate) description: Option<&'a str>,
    pub(crate) points: f64,
    pub(crate) due_date: PrimitiveDateTime,
    pub(crate) created_by: &'a str,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

pub(crate) async fn create(
    executor: impl PgExecutor<'_>,
    params: CreateTask<'_>,
) -> Result<Task, sqlx::Error> {
    sqlx::query_as::<_, Task>(&format!(
        "INSERT INTO tasks (
            id, class_id, title, description, points, due_date, published,
            created_by, created_at, updated_at
         ) VALUES ($1,$2,$3,$4,$5,$6,FALSE,$7,$8,$9)
         RETURNING {TASK_COLUMNS}",
    ))
    .bind(params.id)
    .bind(params.class_id)
    .bind(params.title)
    .bind(params.description)
    .bind(params.points)
    .bind(params.due_date)
    .bind(params.created_by)
    .bind(params.created_at)
    .bind(params.updated_at)
    .fetch_one(executor)
    .await
}

pub(crate) async fn find_by_id(
    executor: impl PgExecutor<'_>,
    id: &str,
) -> Result<Option<Task>, sqlx::Error> {
    sqlx::query_as::<_, Task>(&format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = $1"))
        .bind(id)
        .fetch_optional(executor)
        .await
}

pub(crate) struct UpdateTask {
    pub(crate) title: Option<String>,
    pub(crate) description: Option<String>,
    pub(crate) due_date: Option<PrimitiveDateTime>,
    pub(crate) updated_at: PrimitiveDateTime,
}

pub(crate) async fn update(pool: &PgPool, id: &str, params: UpdateTask) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE tasks SET
            title = COALESCE($1, title),
            description = COALESCE($2, description),
            due_date = COALESCE($3, due_date),
            updated_at = $4
         WHERE id = $5",
    )
    .bind(params.title)
    .bind(params.description)
    .bind(params.due_date)
    .bind(params.updated_at)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

pub(crate) async fn set_published(
    pool: &PgPool,
    id: &str,
    published: bool,
    published_at: Option<PrimitiveDateTime>,
    now: PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE tasks SET published = $1, published_at = $2, updated_at = $3 WHERE id = $4")
        .bind(published)
        .bind(published_at)
        .bind(now)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

pub(crate) async fn set_points(
    executor: impl PgExecutor<'_>,
    id: &str,
    points: f64,
    now: PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE tasks SET points = $1, updated_at = $2 WHERE id = $3")
        .bind(points)
        .bind(now)
        .bind(id)
        .execute(executor)
        .await?;
    Ok(())
}

pub(crate) async fn delete_by_id(pool: &PgPool, id: &str) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM tasks WHERE id = $1").bind(id).execute(pool).await?;
    Ok(())
}

pub(crate) async fn list_by_class(
    pool: &PgPool,
    class_id: &str,
    published_only: bool,
) -> Result<Vec<Task>, sqlx::Error> {
    let mut builder = QueryBuilder::<Postgres>::new(format!(
        "SELECT {TASK_COLUMNS} FROM tasks WHERE class_id = "
    ));
    builder.push_bind(class_id);

    if published_only {
        builder.push(" AND published = TRUE");
    }

    builder.push(" ORDER BY due_date ASC, created_at DESC");

    builder.build_query_as::<Task>().fetch_all(pool).await
}

pub(crate) async fn count_submissions(
    executor: impl PgExecutor<'_>,
    task_id: &str,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM submissions WHERE task_id = $1")
        .bind(task_id)
        .fetch_one(executor)
        .await
}
