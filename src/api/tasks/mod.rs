mod handlers;
mod helpers;

use axum::{routing::get, routing::post, routing::put, Router};

use crate::core::state::AppState;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/:task_id",
            get(handlers::get_task).patch(handlers::update_task).delete(handlers::delete_task),
        )
        .route("/:task_id/publish", post(handlers::publish_task))
        .route("/:task_id/unpublish", post(handlers::unpublish_task))
        .route("/:task_id/questions", put(handlers::replace_questions))
        .merge(crate::api::submissions::task_router())
}

/// Task routes that hang off a class; the classes router merges these.
pub(crate) fn class_router() -> Router<AppState> {
    Router::new()
        .route("/:class_id/tasks", get(handlers::list_class_tasks).post(handlers::create_task))
}
