use std::collections::HashSet;

use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use crate::api::errors::ApiError;
use crate::api::guards::{require_enrolled_student, CurrentUser};
use crate::core::state::AppState;
use crate::db::models::Question;
use crate::db::types::{QuestionKind, SubmissionStatus};
use crate::repositories;
use crate::schemas::submission::{
    AnswerResponse, AnswerUpsertRequest, SubmissionPatchRequest, SubmissionResponse,
};
use crate::services::submission_flow;

pub(super) async fn start_submission(
    Path(task_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<(axum::http::StatusCode, Json<SubmissionResponse>), ApiError> {
    let task = super::helpers::fetch_task(state.db(), &task_id).await?;
    require_enrolled_student(&state, &user, &task.class_id).await?;

    // Unpublished tasks stay invisible to students.
    if !task.published {
        return Err(ApiError::NotFound("Task not found".to_string()));
    }

    let (submission, created) =
        super::helpers::ensure_submission(state.db(), &task.id, &user.id).await?;
    let answers = repositories::answers::list_by_submission(state.db(), &submission.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list answers"))?;

    let code = if created { axum::http::StatusCode::CREATED } else { axum::http::StatusCode::OK };
    let answers = answers.into_iter().map(AnswerResponse::from_db).collect();
    Ok((code, Json(SubmissionResponse::from_db(submission, answers, None, None))))
}

pub(super) async fn record_answer(
    Path((submission_id, question_id)): Path<(String, String)>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<AnswerUpsertRequest>,
) -> Result<Json<AnswerResponse>, ApiError> {
    let submission = super::helpers::fetch_submission(state.db(), &submission_id).await?;
    if submission.student_id != user.id {
        return Err(ApiError::Forbidden("Access denied"));
    }

    let mut tx = state
        .db()
        .begin()
        .await
        .map_err(|e| ApiError::internal(e, "Failed to start transaction"))?;

    let locked = repositories::submissions::find_for_update(&mut *tx, &submission.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to lock submission"))?
        .ok_or_else(|| ApiError::NotFound("Submission not found".to_string()))?;

    submission_flow::ensure_in_progress(locked.status)
        .map_err(|e| ApiError::Conflict(e.to_string()))?;

    let question = repositories::questions::find_for_task(&mut *tx, &question_id, &locked.task_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch question"))?
        .ok_or_else(|| ApiError::NotFound("Question not found in this task".to_string()))?;

    validate_answer_payload(&mut tx, &question, &payload).await?;

    // Only the field matching the question kind is stored.
    let (response_text, chosen_option_id) = match question.kind {
        QuestionKind::MultipleChoice => (None, payload.chosen_option_id.as_deref()),
        QuestionKind::Essay => (payload.response_text.as_deref(), None),
    };

    let answer = repositories::answers::upsert(
        &mut *tx,
        repositories::answers::UpsertAnswer {
            id: &Uuid::new_v4().to_string(),
            submission_id: &locked.id,
            question_id: &question.id,
            response_text,
            chosen_option_id,
            now: super::helpers::now_primitive(),
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to save answer"))?;

    tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit transaction"))?;

    Ok(Json(AnswerResponse::from_db(answer)))
}

pub(super) async fn submit_submission(
    Path(submission_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<SubmissionPatchRequest>,
) -> Result<Json<SubmissionResponse>, ApiError> {
    let submission = super::helpers::fetch_submission(state.db(), &submission_id).await?;
    if submission.student_id != user.id {
        return Err(ApiError::Forbidden("Access denied"));
    }

    if payload.status != SubmissionStatus::Submitted {
        return Err(ApiError::BadRequest(
            "The only accepted status change is to 'submitted'".to_string(),
        ));
    }

    let mut tx = state
        .db()
        .begin()
        .await
        .map_err(|e| ApiError::internal(e, "Failed to start transaction"))?;

    let locked = repositories::submissions::find_for_update(&mut *tx, &submission.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to lock submission"))?
        .ok_or_else(|| ApiError::NotFound("Submission not found".to_string()))?;

    submission_flow::ensure_submittable(locked.status)
        .map_err(|e| ApiError::Conflict(e.to_string()))?;

    let task = repositories::tasks::find_by_id(&mut *tx, &locked.task_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch task"))?
        .ok_or_else(|| ApiError::Internal("Task is missing for submission".to_string()))?;

    let questions = repositories::questions::list_by_task(&mut *tx, &locked.task_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list questions"))?;
    let answers = repositories::answers::list_by_submission(&mut *tx, &locked.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list answers"))?;

    let question_positions: Vec<(&str, i32)> =
        questions.iter().map(|question| (question.id.as_str(), question.position)).collect();
    let answered: HashSet<&str> =
        answers.iter().map(|answer| answer.question_id.as_str()).collect();
    let missing = submission_flow::unanswered_positions(&question_positions, &answered);
    if !missing.is_empty() {
        let positions = missing.iter().map(|p| p.to_string()).collect::<Vec<_>>().join(", ");
        return Err(ApiError::Incomplete(format!(
            "Unanswered questions at positions: {positions}"
        )));
    }

    let now = super::helpers::now_primitive();
    let status = submission_flow::submitted_status(now, task.due_date);
    let moved = repositories::submissions::mark_submitted(&mut *tx, &locked.id, status, now)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to submit"))?;
    if moved == 0 {
        return Err(ApiError::Conflict("Submission was already submitted".to_string()));
    }

    tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit transaction"))?;

    tracing::info!(
        student_id = %user.id,
        submission_id = %submission.id,
        status = status.as_str(),
        action = "submission_submit",
        "Submission handed in"
    );

    let submitted = super::helpers::fetch_submission(state.db(), &submission.id).await?;
    let answers = answers.into_iter().map(AnswerResponse::from_db).collect();
    Ok(Json(SubmissionResponse::from_db(submitted, answers, None, None)))
}

pub(super) async fn my_submission(
    Path(task_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<SubmissionResponse>, ApiError> {
    let task = super::helpers::fetch_task(state.db(), &task_id).await?;
    require_enrolled_student(&state, &user, &task.class_id).await?;

    let submission =
        repositories::submissions::find_by_task_and_student(state.db(), &task.id, &user.id)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to fetch submission"))?
            .ok_or_else(|| ApiError::NotFound("No submission for this task yet".to_string()))?;

    let answers = repositories::answers::list_by_submission(state.db(), &submission.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list answers"))?;

    let outcome = if submission.status == SubmissionStatus::Graded {
        let questions = super::helpers::fetch_gradable_questions(state.db(), &task.id).await?;
        Some(super::helpers::persisted_outcome(&questions, &answers))
    } else {
        None
    };

    let answers = answers.into_iter().map(AnswerResponse::from_db).collect();
    Ok(Json(SubmissionResponse::from_db(submission, answers, outcome, None)))
}

async fn validate_answer_payload(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    question: &Question,
    payload: &AnswerUpsertRequest,
) -> Result<(), ApiError> {
    let has_text = payload.response_text.as_deref().is_some_and(|text| !text.trim().is_empty());
    let has_option = payload.chosen_option_id.is_some();

    match question.kind {
        QuestionKind::MultipleChoice => {
            if has_text || !has_option {
                return Err(ApiError::BadRequest(
                    "Multiple choice answers carry exactly a chosen_option_id".to_string(),
                ));
            }
            let option_id = payload.chosen_option_id.as_deref().unwrap_or_default();
            let belongs = repositories::questions::option_belongs_to_question(
                &mut **tx,
                option_id,
                &question.id,
            )
            .await
            .map_err(|e| ApiError::internal(e, "Failed to check option"))?;
            if !belongs {
                return Err(ApiError::BadRequest(
                    "Option does not belong to this question".to_string(),
                ));
            }
        }
        QuestionKind::Essay => {
            if has_option || !has_text {
                return Err(ApiError::BadRequest(
                    "Essay answers carry exactly a non-empty response_text".to_string(),
                ));
            }
        }
    }

    Ok(())
}
