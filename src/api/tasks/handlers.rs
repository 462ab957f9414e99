use axum::Json;
use uuid::Uuid;
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::{require_class_membership, require_class_role, CurrentUser};
use crate::core::state::AppState;
use crate::core::time::{primitive_now_utc, to_primitive_utc};
use crate::db::types::ClassRole;
use crate::repositories;
use crate::schemas::task::{QuestionSetReplace, TaskCreate, TaskListItem, TaskResponse, TaskUpdate};

use super::helpers;

pub(super) async fn create_task(
    axum::extract::Path(class_id): axum::extract::Path<String>,
    CurrentUser(user): CurrentUser,
    state: axum::extract::State<AppState>,
    Json(payload): Json<TaskCreate>,
) -> Result<(axum::http::StatusCode, Json<TaskResponse>), ApiError> {
    require_class_role(&state, &user, &class_id, ClassRole::Teacher).await?;

    if repositories::classes::find_by_id(state.db(), &class_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch class"))?
        .is_none()
    {
        return Err(ApiError::NotFound("Class not found".to_string()));
    }

    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;
    helpers::validate_questions(&payload.questions)?;

    let due_date = to_primitive_utc(payload.due_date);
    let points = helpers::points_total(&payload.questions);
    let now = primitive_now_utc();

    let mut tx = state
        .db()
        .begin()
        .await
        .map_err(|e| ApiError::internal(e, "Failed to start transaction"))?;

    let task = repositories::tasks::create(
        &mut *tx,
        repositories::tasks::CreateTask {
            id: &Uuid::new_v4().to_string(),
            class_id: &class_id,
            title: payload.title.trim(),
            description: payload.description.as_deref(),
            points,
            due_date,
            created_by: &user.id,
            created_at: now,
            updated_at: now,
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to create task"))?;

    let questions = helpers::insert_questions(&mut tx, &task.id, payload.questions, now).await?;
    tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit transaction"))?;

    Ok((axum::http::StatusCode::CREATED, Json(TaskResponse::from_db(task, questions))))
}

pub(super) async fn list_class_tasks(
    axum::extract::Path(class_id): axum::extract::Path<String>,
    CurrentUser(user): CurrentUser,
    state: axum::extract::State<AppState>,
) -> Result<Json<Vec<TaskListItem>>, ApiError> {
    let access = require_class_membership(&state, &user, &class_id).await?;
    let published_only = access.role == ClassRole::Student;

    let tasks = repositories::tasks::list_by_class(state.db(), &class_id, published_only)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list tasks"))?;

    Ok(Json(tasks.into_iter().map(TaskListItem::from_db).collect()))
}

pub(super) async fn get_task(
    axum::extract::Path(task_id): axum::extract::Path<String>,
    CurrentUser(user): CurrentUser,
    state: axum::extract::State<AppState>,
) -> Result<Json<TaskResponse>, ApiError> {
    let task = helpers::fetch_task(&state, &task_id).await?;
    let access = require_class_membership(&state, &user, &task.class_id).await?;

    let is_teacher = access.role == ClassRole::Teacher;
    if !is_teacher && !task.published {
        return Err(ApiError::NotFound("Task not found".to_string()));
    }

    let questions = helpers::load_question_responses(&state, &task.id, is_teacher).await?;
    Ok(Json(TaskResponse::from_db(task, questions)))
}

pub(super) async fn update_task(
    axum::extract::Path(task_id): axum::extract::Path<String>,
    CurrentUser(user): CurrentUser,
    state: axum::extract::State<AppState>,
    Json(payload): Json<TaskUpdate>,
) -> Result<Json<TaskResponse>, ApiError> {
    let task = helpers::fetch_task(&state, &task_id).await?;
    require_class_role(&state, &user, &task.class_id, ClassRole::Teacher).await?;

    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    repositories::tasks::update(
        state.db(),
        &task.id,
        repositories::tasks::UpdateTask {
            title: payload.title,
            description: payload.description,
            due_date: payload.due_date.map(to_primitive_utc),
            updated_at: primitive_now_utc(),
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to update task"))?;

    let updated = helpers::fetch_task(&state, &task_id).await?;
    let questions = helpers::load_question_responses(&state, &task.id, true).await?;
    Ok(Json(TaskResponse::from_db(updated, questions)))
}

pub(super) async fn delete_task(
    axum::extract::Path(task_id): axum::extract::Path<String>,
    CurrentUser(user): CurrentUser,
    state: axum::extract::State<AppState>,
) -> Result<axum::http::StatusCode, ApiError> {
    let task = helpers::fetch_task(&state, &task_id).await?;
    require_class_role(&state, &user, &task.class_id, ClassRole::Teacher).await?;

    repositories::tasks::delete_by_id(state.db(), &task.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to delete task"))?;

    tracing::info!(
        user_id = %user.id,
        task_id = %task.id,
        action = "task_delete",
        "Teacher deleted task"
    );

    Ok(axum::http::StatusCode::NO_CONTENT)
}

pub(super) async fn publish_task(
    axum::extract::Path(task_id): axum::extract::Path<String>,
    CurrentUser(user): CurrentUser,
    state: axum::extract::State<AppState>,
) -> Result<Json<TaskResponse>, ApiError> {
    let task = helpers::fetch_task(&state, &task_id).await?;
    require_class_role(&state, &user, &task.class_id, ClassRole::Teacher).await?;

    // Republishing keeps the original published_at.
    if !task.published {
        let now = primitive_now_utc();
        repositories::tasks::set_published(state.db(), &task.id, true, Some(now), now)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to publish task"))?;
    }

    let updated = helpers::fetch_task(&state, &task_id).await?;
    let questions = helpers::load_question_responses(&state, &task.id, true).await?;
    Ok(Json(TaskResponse::from_db(updated, questions)))
}

pub(super) async fn unpublish_task(
    axum::extract::Path(task_id): axum::extract::Path<String>,
    CurrentUser(user): CurrentUser,
    state: axum::extract::State<AppState>,
) -> Result<Json<TaskResponse>, ApiError> {
    let task = helpers::fetch_task(&state, &task_id).await?;
    require_class_role(&state, &user, &task.class_id, ClassRole::Teacher).await?;

    let submissions = repositories::tasks::count_submissions(state.db(), &task.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to count submissions"))?;
    if submissions > 0 {
        return Err(ApiError::Conflict(
            "Cannot unpublish a task that already has submissions".to_string(),
        ));
    }

    let now = primitive_now_utc();
    repositories::tasks::set_published(state.db(), &task.id, false, None, now)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to unpublish task"))?;

    let updated = helpers::fetch_task(&state, &task_id).await?;
    let questions = helpers::load_question_responses(&state, &task.id, true).await?;
    Ok(Json(TaskResponse::from_db(updated, questions)))
}

pub(super) async fn replace_questions(
    axum::extract::Path(task_id): axum::extract::Path<String>,
    CurrentUser(user): CurrentUser,
    state: axum::extract::State<AppState>,
    Json(payload): Json<QuestionSetReplace>,
) -> Result<Json<TaskResponse>, ApiError> {
    let task = helpers::fetch_task(&state, &task_id).await?;
    require_class_role(&state, &user, &task.class_id, ClassRole::Teacher).await?;

    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;
    helpers::validate_questions(&payload.questions)?;

    let points = helpers::points_total(&payload.questions);
    let now = primitive_now_utc();

    let mut tx = state
        .db()
        .begin()
        .await
        .map_err(|e| ApiError::internal(e, "Failed to start transaction"))?;

    let submissions = repositories::tasks::count_submissions(&mut *tx, &task.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to count submissions"))?;
    if submissions > 0 {
        return Err(ApiError::Conflict(
            "Cannot replace questions once submissions exist".to_string(),
        ));
    }

    repositories::questions::delete_by_task(&mut *tx, &task.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to delete previous questions"))?;
    let questions = helpers::insert_questions(&mut tx, &task.id, payload.questions, now).await?;
    repositories::tasks::set_points(&mut *tx, &task.id, points, now)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to update task points"))?;
    tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit transaction"))?;

    let updated = helpers::fetch_task(&state, &task_id).await?;
    Ok(Json(TaskResponse::from_db(updated, questions)))
}
