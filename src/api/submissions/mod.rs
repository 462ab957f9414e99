pub(crate) mod helpers;
mod student;
mod teacher;

use axum::{routing::get, routing::post, routing::put, Router};
use serde::Deserialize;

use crate::core::state::AppState;
use crate::db::types::SubmissionStatus;

#[derive(Debug, Deserialize)]
pub(crate) struct ListSubmissionsQuery {
    #[serde(default)]
    pub(crate) status: Option<SubmissionStatus>,
    #[serde(default)]
    pub(crate) skip: i64,
    #[serde(default = "crate::api::pagination::default_limit")]
    pub(crate) limit: i64,
}

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/:submission_id",
            get(teacher::get_submission).patch(student::submit_submission),
        )
        .route("/:submission_id/answers/:question_id", put(student::record_answer))
        .route("/:submission_id/grade", post(teacher::grade_submission))
        .route("/:submission_id/regrade", post(teacher::regrade_submission))
}

/// Submission routes that hang off a task; the tasks router merges these.
pub(crate) fn task_router() -> Router<AppState> {
    Router::new()
        .route(
            "/:task_id/submissions",
            post(student::start_submission).get(teacher::list_task_submissions),
        )
        .route("/:task_id/submissions/mine", get(student::my_submission))
        .route("/:task_id/report", get(teacher::task_report))
}

#[cfg(test)]
mod tests;
