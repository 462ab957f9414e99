use sqlx::FromRow;
use time::PrimitiveDateTime;

use crate::db::types::{ClassRole, MembershipStatus, QuestionKind, SubmissionStatus};

#[derive(Debug, Clone, FromRow)]
pub(crate) struct User {
    pub(crate) id: String,
    pub(crate) email: String,
    pub(crate) hashed_password: String,
    pub(crate) full_name: String,
    pub(crate) is_platform_admin: bool,
    pub(crate) is_active: bool,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, FromRow)]
pub(crate) struct Class {
    pub(crate) id: String,
    pub(crate) slug: String,
    pub(crate) title: String,
    pub(crate) is_active: bool,
    pub(crate) created_by: String,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, FromRow)]
pub(crate) struct ClassMembership {
    pub(crate) id: String,
    pub(crate) class_id: String,
    pub(crate) user_id: String,
    pub(crate) role: ClassRole,
    pub(crate) status: MembershipStatus,
    pub(crate) joined_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, FromRow)]
pub(crate) struct ClassInviteCode {
    pub(crate) id: String,
    pub(crate) class_id: String,
    pub(crate) code_hash: String,
    pub(crate) is_active: bool,
    pub(crate) usage_count: i64,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

/// An assignment authored by a teacher inside a class. `points` is kept in
/// sync with the sum of the question points whenever the question set changes.
#[derive(Debug, Clone, FromRow)]
pub(crate) struct Task {
    pub(crate) id: String,
    pub(crate) class_id: String,
    pub(crate) title: String,
    pub(crate) description: Option<String>,
    pub(crate) points: f64,
    pub(crate) due_date: PrimitiveDateTime,
    pub(crate) published: bool,
    pub(crate) published_at: Option<PrimitiveDateTime>,
    pub(crate) created_by: String,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, FromRow)]
pub(crate) struct Question {
    pub(crate) id: String,
    pub(crate) task_id: String,
    pub(crate) position: i32,
    pub(crate) kind: QuestionKind,
    pub(crate) prompt: String,
    pub(crate) points: f64,
    pub(crate) created_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, FromRow)]
pub(crate) struct QuestionOption {
    pub(crate) id: String,
    pub(crate) question_id: String,
    pub(crate) position: i32,
    pub(crate) text: String,
    pub(crate) is_correct: bool,
}

#[derive(Debug, Clone, FromRow)]
pub(crate) struct Submission {
    pub(crate) id: String,
    pub(crate) task_id: String,
    pub(crate) student_id: String,
    pub(crate) status: SubmissionStatus,
    pub(crate) started_at: PrimitiveDateTime,
    pub(crate) submitted_at: Option<PrimitiveDateTime>,
    pub(crate) total_score: Option<f64>,
    pub(crate) teacher_feedback: Option<String>,
    pub(crate) graded_by: Option<String>,
    pub(crate) graded_at: Option<PrimitiveDateTime>,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

/// Exactly one of `response_text` and `chosen_option_id` is populated,
/// depending on the question kind. The schema enforces at most one.
#[derive(Debug, Clone, FromRow)]
pub(crate) struct Answer {
    pub(crate) id: String,
    pub(crate) submission_id: String,
    pub(crate) question_id: String,
    pub(crate) response_text: Option<String>,
    pub(crate) chosen_option_id: Option<String>,
    pub(crate) score: Option<f64>,
    pub(crate) feedback: Option<String>,
    pub(crate) graded_at: Option<PrimitiveDateTime>,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

/// Audit entry appended on every grade and regrade.
#[derive(Debug, Clone, FromRow)]
pub(crate) struct GradeEvent {
    pub(crate) id: String,
    pub(crate) submission_id: String,
    pub(crate) actor_id: String,
    pub(crate) previous_status: SubmissionStatus,
    pub(crate) previous_total: Option<f64>,
    pub(crate) new_total: f64,
    pub(crate) created_at: PrimitiveDateTime,
}
