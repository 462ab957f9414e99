use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::core::time::format_primitive;
use crate::db::models::{Answer, GradeEvent, Submission};
use crate::db::types::SubmissionStatus;
use crate::repositories::submissions::SubmissionListRow;
use crate::services::grading::GradeOutcome;

#[derive(Debug, Deserialize)]
pub(crate) struct AnswerUpsertRequest {
    #[serde(default)]
    #[serde(alias = "responseText")]
    pub(crate) response_text: Option<String>,
    #[serde(default)]
    #[serde(alias = "chosenOptionId")]
    pub(crate) chosen_option_id: Option<String>,
}

/// Body of `PATCH /submissions/{id}`. The only accepted transition is to
/// `submitted`; the server decides whether the result is late.
#[derive(Debug, Deserialize)]
pub(crate) struct SubmissionPatchRequest {
    pub(crate) status: SubmissionStatus,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GradeRequest {
    /// Manual scores for essay questions, keyed by question id.
    #[serde(default)]
    pub(crate) scores: HashMap<String, f64>,
    #[serde(default)]
    #[serde(alias = "questionFeedback")]
    pub(crate) question_feedback: HashMap<String, String>,
    #[serde(default)]
    #[serde(alias = "teacherFeedback")]
    pub(crate) teacher_feedback: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct AnswerResponse {
    pub(crate) id: String,
    pub(crate) question_id: String,
    pub(crate) response_text: Option<String>,
    pub(crate) chosen_option_id: Option<String>,
    pub(crate) score: Option<f64>,
    pub(crate) feedback: Option<String>,
    pub(crate) graded_at: Option<String>,
    pub(crate) updated_at: String,
}

impl AnswerResponse {
    pub(crate) fn from_db(answer: Answer) -> Self {
        Self {
            id: answer.id,
            question_id: answer.question_id,
            response_text: answer.response_text,
            chosen_option_id: answer.chosen_option_id,
            score: answer.score,
            feedback: answer.feedback,
            graded_at: answer.graded_at.map(format_primitive),
            updated_at: format_primitive(answer.updated_at),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct GradeOutcomeResponse {
    pub(crate) per_question_scores: HashMap<String, f64>,
    pub(crate) total_score: f64,
    pub(crate) correct_count: usize,
}

impl GradeOutcomeResponse {
    pub(crate) fn from_outcome(outcome: GradeOutcome) -> Self {
        Self {
            per_question_scores: outcome.per_question,
            total_score: outcome.total_score,
            correct_count: outcome.correct_count,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct GradeEventResponse {
    pub(crate) id: String,
    pub(crate) actor_id: String,
    pub(crate) previous_status: SubmissionStatus,
    pub(crate) previous_total: Option<f64>,
    pub(crate) new_total: f64,
    pub(crate) created_at: String,
}

impl GradeEventResponse {
    pub(crate) fn from_db(event: GradeEvent) -> Self {
        Self {
            id: event.id,
            actor_id: event.actor_id,
            previous_status: event.previous_status,
            previous_total: event.previous_total,
            new_total: event.new_total,
            created_at: format_primitive(event.created_at),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct SubmissionResponse {
    pub(crate) id: String,
    pub(crate) task_id: String,
    pub(crate) student_id: String,
    pub(crate) status: SubmissionStatus,
    pub(crate) started_at: String,
    pub(crate) submitted_at: Option<String>,
    pub(crate) total_score: Option<f64>,
    pub(crate) teacher_feedback: Option<String>,
    pub(crate) graded_by: Option<String>,
    pub(crate) graded_at: Option<String>,
    pub(crate) answers: Vec<AnswerResponse>,
    /// Per-question breakdown, present once the submission is graded.
    pub(crate) outcome: Option<GradeOutcomeResponse>,
    /// Grading history; only teacher views carry it.
    pub(crate) grade_events: Option<Vec<GradeEventResponse>>,
}

impl SubmissionResponse {
    pub(crate) fn from_db(
        submission: Submission,
        answers: Vec<AnswerResponse>,
        outcome: Option<GradeOutcomeResponse>,
        grade_events: Option<Vec<GradeEventResponse>>,
    ) -> Self {
        Self {
            id: submission.id,
            task_id: submission.task_id,
            student_id: submission.student_id,
            status: submission.status,
            started_at: format_primitive(submission.started_at),
            submitted_at: submission.submitted_at.map(format_primitive),
            total_score: submission.total_score,
            teacher_feedback: submission.teacher_feedback,
            graded_by: submission.graded_by,
            graded_at: submission.graded_at.map(format_primitive),
            answers,
            outcome,
            grade_events,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct SubmissionListItem {
    pub(crate) id: String,
    pub(crate) student_id: String,
    pub(crate) student_email: String,
    pub(crate) student_name: String,
    pub(crate) status: SubmissionStatus,
    pub(crate) started_at: String,
    pub(crate) submitted_at: Option<String>,
    pub(crate) total_score: Option<f64>,
}

impl SubmissionListItem {
    pub(crate) fn from_row(row: SubmissionListRow) -> Self {
        Self {
            id: row.id,
            student_id: row.student_id,
            student_email: row.student_email,
            student_name: row.student_name,
            status: row.status,
            started_at: format_primitive(row.started_at),
            submitted_at: row.submitted_at.map(format_primitive),
            total_score: row.total_score,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct TaskReportRow {
    pub(crate) submission_id: String,
    pub(crate) student_id: String,
    pub(crate) student_name: String,
    pub(crate) student_email: String,
    pub(crate) status: SubmissionStatus,
    pub(crate) total_score: Option<f64>,
    pub(crate) correct_count: usize,
    pub(crate) percent: f64,
}

#[derive(Debug, Serialize)]
pub(crate) struct TaskReportResponse {
    pub(crate) task_id: String,
    pub(crate) title: String,
    pub(crate) points: f64,
    pub(crate) graded_count: usize,
    pub(crate) average_score: Option<f64>,
    pub(crate) submissions: Vec<TaskReportRow>,
}
