use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use uuid::Uuid;

use crate::api::errors::ApiError;
use crate::api::guards::{require_class_role, CurrentUser};
use crate::api::pagination::PaginatedResponse;
use crate::core::state::AppState;
use crate::db::models::Answer;
use crate::db::types::{ClassRole, SubmissionStatus};
use crate::repositories;
use crate::schemas::submission::{
    AnswerResponse, GradeEventResponse, GradeRequest, SubmissionListItem, SubmissionResponse,
    TaskReportResponse, TaskReportRow,
};
use crate::services::grading::{self, GradableQuestion};
use crate::services::submission_flow;

use super::ListSubmissionsQuery;

pub(super) async fn get_submission(
    Path(submission_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<SubmissionResponse>, ApiError> {
    let submission = super::helpers::fetch_submission(state.db(), &submission_id).await?;
    let task = super::helpers::fetch_task(state.db(), &submission.task_id).await?;

    let is_owner = submission.student_id == user.id;
    if !is_owner {
        require_class_role(&state, &user, &task.class_id, ClassRole::Teacher).await?;
    }

    let answers = repositories::answers::list_by_submission(state.db(), &submission.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list answers"))?;

    let outcome = if submission.status == SubmissionStatus::Graded {
        let questions = super::helpers::fetch_gradable_questions(state.db(), &task.id).await?;
        Some(super::helpers::persisted_outcome(&questions, &answers))
    } else {
        None
    };

    let grade_events = if is_owner {
        None
    } else {
        let events = repositories::grade_events::list_by_submission(state.db(), &submission.id)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to list grade events"))?;
        Some(events.into_iter().map(GradeEventResponse::from_db).collect())
    };

    let answers = answers.into_iter().map(AnswerResponse::from_db).collect();
    Ok(Json(SubmissionResponse::from_db(submission, answers, outcome, grade_events)))
}

pub(super) async fn grade_submission(
    Path(submission_id): Path<String>,
    CurrentUser(teacher): CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<GradeRequest>,
) -> Result<Json<SubmissionResponse>, ApiError> {
    let submission = super::helpers::fetch_submission(state.db(), &submission_id).await?;
    let task = super::helpers::fetch_task(state.db(), &submission.task_id).await?;
    require_class_role(&state, &teacher, &task.class_id, ClassRole::Teacher).await?;

    let mut tx = state
        .db()
        .begin()
        .await
        .map_err(|e| ApiError::internal(e, "Failed to start transaction"))?;

    let locked = repositories::submissions::find_for_update(&mut *tx, &submission.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to lock submission"))?
        .ok_or_else(|| ApiError::NotFound("Submission not found".to_string()))?;

    submission_flow::ensure_gradable(locked.status)
        .map_err(|e| ApiError::Conflict(e.to_string()))?;

    let questions = super::helpers::fetch_gradable_questions(&mut *tx, &task.id).await?;
    let answers = repositories::answers::list_by_submission(&mut *tx, &locked.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list answers"))?;

    grading::validate_manual_scores(&questions, &payload.scores)
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    validate_feedback_keys(&questions, &payload.question_feedback)?;

    let outcome = apply_scores(&mut tx, &locked.id, &questions, &answers, &payload).await?;

    let now = super::helpers::now_primitive();
    let moved = repositories::submissions::apply_grade(
        &mut *tx,
        &locked.id,
        repositories::submissions::ApplyGrade {
            total_score: outcome.total_score,
            teacher_feedback: payload.teacher_feedback.as_deref(),
            graded_by: &teacher.id,
            graded_at: now,
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to apply grade"))?;
    if moved == 0 {
        return Err(ApiError::Conflict("Submission is no longer gradable".to_string()));
    }

    repositories::grade_events::append(
        &mut *tx,
        repositories::grade_events::CreateGradeEvent {
            id: &Uuid::new_v4().to_string(),
            submission_id: &locked.id,
            actor_id: &teacher.id,
            previous_status: locked.status,
            previous_total: locked.total_score,
            new_total: outcome.total_score,
            created_at: now,
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to record grade event"))?;

    tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit transaction"))?;

    tracing::info!(
        teacher_id = %teacher.id,
        submission_id = %locked.id,
        total_score = outcome.total_score,
        action = "submission_grade",
        "Submission graded"
    );

    graded_response(&state, &locked.id, &task.id).await
}

pub(super) async fn regrade_submission(
    Path(submission_id): Path<String>,
    CurrentUser(teacher): CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<GradeRequest>,
) -> Result<Json<SubmissionResponse>, ApiError> {
    let submission = super::helpers::fetch_submission(state.db(), &submission_id).await?;
    let task = super::helpers::fetch_task(state.db(), &submission.task_id).await?;
    require_class_role(&state, &teacher, &task.class_id, ClassRole::Teacher).await?;

    let mut tx = state
        .db()
        .begin()
        .await
        .map_err(|e| ApiError::internal(e, "Failed to start transaction"))?;

    let locked = repositories::submissions::find_for_update(&mut *tx, &submission.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to lock submission"))?
        .ok_or_else(|| ApiError::NotFound("Submission not found".to_string()))?;

    submission_flow::ensure_regradable(locked.status)
        .map_err(|e| ApiError::Conflict(e.to_string()))?;

    let questions = super::helpers::fetch_gradable_questions(&mut *tx, &task.id).await?;
    let answers = repositories::answers::list_by_submission(&mut *tx, &locked.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list answers"))?;

    grading::validate_manual_scores(&questions, &payload.scores)
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    validate_feedback_keys(&questions, &payload.question_feedback)?;

    let outcome = apply_scores(&mut tx, &locked.id, &questions, &answers, &payload).await?;

    let now = super::helpers::now_primitive();
    let moved = repositories::submissions::apply_regrade(
        &mut *tx,
        &locked.id,
        repositories::submissions::ApplyGrade {
            total_score: outcome.total_score,
            teacher_feedback: payload.teacher_feedback.as_deref(),
            graded_by: &teacher.id,
            graded_at: now,
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to apply regrade"))?;
    if moved == 0 {
        return Err(ApiError::Conflict("Submission is not graded yet".to_string()));
    }

    repositories::grade_events::append(
        &mut *tx,
        repositories::grade_events::CreateGradeEvent {
            id: &Uuid::new_v4().to_string(),
            submission_id: &locked.id,
            actor_id: &teacher.id,
            previous_status: locked.status,
            previous_total: locked.total_score,
            new_total: outcome.total_score,
            created_at: now,
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to record grade event"))?;

    tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit transaction"))?;

    tracing::info!(
        teacher_id = %teacher.id,
        submission_id = %locked.id,
        total_score = outcome.total_score,
        action = "submission_regrade",
        "Submission regraded"
    );

    graded_response(&state, &locked.id, &task.id).await
}

pub(super) async fn list_task_submissions(
    Path(task_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Query(params): Query<ListSubmissionsQuery>,
) -> Result<Json<PaginatedResponse<SubmissionListItem>>, ApiError> {
    let task = super::helpers::fetch_task(state.db(), &task_id).await?;
    require_class_role(&state, &user, &task.class_id, ClassRole::Teacher).await?;

    let skip = params.skip.max(0);
    let limit = params.limit.clamp(1, 1000);

    let rows =
        repositories::submissions::list_by_task(state.db(), &task.id, params.status, skip, limit)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to list submissions"))?;
    let total_count = repositories::submissions::count_by_task(state.db(), &task.id, params.status)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to count submissions"))?;

    Ok(Json(PaginatedResponse {
        items: rows.into_iter().map(SubmissionListItem::from_row).collect(),
        total_count,
        skip,
        limit,
    }))
}

pub(super) async fn task_report(
    Path(task_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<TaskReportResponse>, ApiError> {
    let task = super::helpers::fetch_task(state.db(), &task_id).await?;
    require_class_role(&state, &user, &task.class_id, ClassRole::Teacher).await?;

    let questions = super::helpers::fetch_gradable_questions(state.db(), &task.id).await?;
    let graded = repositories::submissions::list_graded_by_task(state.db(), &task.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list graded submissions"))?;
    let task_answers = repositories::answers::list_by_task(state.db(), &task.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list answers"))?;

    let mut answers_by_submission: HashMap<String, Vec<Answer>> = HashMap::new();
    for answer in task_answers {
        answers_by_submission.entry(answer.submission_id.clone()).or_default().push(answer);
    }

    let mut submissions = Vec::with_capacity(graded.len());
    let mut score_sum = 0.0;
    for row in graded {
        let answers = answers_by_submission.remove(&row.id).unwrap_or_default();
        let outcome = super::helpers::persisted_outcome(&questions, &answers);
        let percent =
            if task.points > 0.0 { outcome.total_score / task.points * 100.0 } else { 0.0 };
        score_sum += outcome.total_score;
        submissions.push(TaskReportRow {
            submission_id: row.id,
            student_id: row.student_id,
            student_name: row.student_name,
            student_email: row.student_email,
            status: row.status,
            total_score: row.total_score,
            correct_count: outcome.correct_count,
            percent,
        });
    }

    let graded_count = submissions.len();
    let average_score = if graded_count > 0 { Some(score_sum / graded_count as f64) } else { None };

    Ok(Json(TaskReportResponse {
        task_id: task.id,
        title: task.title,
        points: task.points,
        graded_count,
        average_score,
        submissions,
    }))
}

/// Scores every question through the shared grading pass and stores the
/// per-answer results inside the caller's transaction.
async fn apply_scores(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    submission_id: &str,
    questions: &[GradableQuestion],
    answers: &[Answer],
    payload: &GradeRequest,
) -> Result<grading::GradeOutcome, ApiError> {
    let gradable_answers = super::helpers::to_gradable_answers(answers);
    let outcome = grading::grade_submission(questions, &gradable_answers, &payload.scores);

    let now = super::helpers::now_primitive();
    for (question_id, score) in &outcome.per_question {
        repositories::answers::set_score(
            &mut **tx,
            submission_id,
            question_id,
            *score,
            payload.question_feedback.get(question_id).map(String::as_str),
            now,
        )
        .await
        .map_err(|e| ApiError::internal(e, "Failed to store answer score"))?;
    }

    Ok(outcome)
}

async fn graded_response(
    state: &AppState,
    submission_id: &str,
    task_id: &str,
) -> Result<Json<SubmissionResponse>, ApiError> {
    let submission = super::helpers::fetch_submission(state.db(), submission_id).await?;
    let answers = repositories::answers::list_by_submission(state.db(), submission_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list answers"))?;
    let questions = super::helpers::fetch_gradable_questions(state.db(), task_id).await?;
    let outcome = Some(super::helpers::persisted_outcome(&questions, &answers));

    let events = repositories::grade_events::list_by_submission(state.db(), submission_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list grade events"))?;
    let grade_events = Some(events.into_iter().map(GradeEventResponse::from_db).collect());

    let answers = answers.into_iter().map(AnswerResponse::from_db).collect();
    Ok(Json(SubmissionResponse::from_db(submission, answers, outcome, grade_events)))
}

fn validate_feedback_keys(
    questions: &[GradableQuestion],
    feedback: &HashMap<String, String>,
) -> Result<(), ApiError> {
    for question_id in feedback.keys() {
        if !questions.iter().any(|question| question.id == *question_id) {
            return Err(ApiError::BadRequest(format!(
                "unknown question id '{question_id}' in question_feedback"
            )));
        }
    }
    Ok(())
}
