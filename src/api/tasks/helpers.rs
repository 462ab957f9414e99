use std::collections::HashMap;

use time::PrimitiveDateTime;
use uuid::Uuid;

use crate::api::errors::ApiError;
use crate::core::state::AppState;
use crate::db::models::Task;
use crate::repositories;
use crate::schemas::task::{QuestionCreate, QuestionOptionResponse, QuestionResponse};
use crate::services::task_rules::{self, QuestionSpec};

pub(super) async fn fetch_task(state: &AppState, task_id: &str) -> Result<Task, ApiError> {
    repositories::tasks::find_by_id(state.db(), task_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch task"))?
        .ok_or_else(|| ApiError::NotFound("Task not found".to_string()))
}

pub(super) fn validate_questions(questions: &[QuestionCreate]) -> Result<(), ApiError> {
    let flag_sets: Vec<Vec<bool>> = questions
        .iter()
        .map(|question| question.options.iter().map(|option| option.is_correct).collect())
        .collect();
    let specs: Vec<QuestionSpec<'_>> = questions
        .iter()
        .zip(flag_sets.iter())
        .map(|(question, flags)| QuestionSpec {
            position: question.position,
            kind: question.kind,
            points: question.points,
            option_correct_flags: flags,
        })
        .collect();

    task_rules::validate_question_set(&specs).map_err(|e| ApiError::BadRequest(e.to_string()))
}

pub(super) fn points_total(questions: &[QuestionCreate]) -> f64 {
    questions.iter().map(|question| question.points).sum()
}

/// Inserts a question set inside the caller's transaction. Option positions
/// follow the request array order, starting at 1.
pub(super) async fn insert_questions(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    task_id: &str,
    questions: Vec<QuestionCreate>,
    now: PrimitiveDateTime,
) -> Result<Vec<QuestionResponse>, ApiError> {
    let mut responses = Vec::with_capacity(questions.len());

    for question in questions {
        let created = repositories::questions::create(
            &mut **tx,
            repositories::questions::CreateQuestion {
                id: &Uuid::new_v4().to_string(),
                task_id,
                position: question.position,
                kind: question.kind,
                prompt: &question.prompt,
                points: question.points,
                created_at: now,
            },
        )
        .await
        .map_err(|e| ApiError::internal(e, "Failed to create question"))?;

        let mut options = Vec::with_capacity(question.options.len());
        for (index, option) in question.options.into_iter().enumerate() {
            let created_option = repositories::questions::create_option(
                &mut **tx,
                repositories::questions::CreateQuestionOption {
                    id: &Uuid::new_v4().to_string(),
                    question_id: &created.id,
                    position: index as i32 + 1,
                    text: &option.text,
                    is_correct: option.is_correct,
                },
            )
            .await
            .map_err(|e| ApiError::internal(e, "Failed to create question option"))?;
            options.push(QuestionOptionResponse::from_db(created_option, true));
        }

        responses.push(QuestionResponse::from_db(created, options));
    }

    Ok(responses)
}

/// Loads a task's questions with their options grouped per question.
/// `include_correct` decides whether correctness flags survive into the view.
pub(super) async fn load_question_responses(
    state: &AppState,
    task_id: &str,
    include_correct: bool,
) -> Result<Vec<QuestionResponse>, ApiError> {
    let questions = repositories::questions::list_by_task(state.db(), task_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list questions"))?;
    let options = repositories::questions::list_options_for_task(state.db(), task_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list question options"))?;

    let mut by_question: HashMap<String, Vec<QuestionOptionResponse>> = HashMap::new();
    for option in options {
        by_question
            .entry(option.question_id.clone())
            .or_default()
            .push(QuestionOptionResponse::from_db(option, include_correct));
    }

    Ok(questions
        .into_iter()
        .map(|question| {
            let options = by_question.remove(&question.id).unwrap_or_default();
            QuestionResponse::from_db(question, options)
        })
        .collect())
}
