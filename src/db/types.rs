use serde::{Deserialize, Serialize};
use sqlx::Type;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "classrole", rename_all = "lowercase")]
pub(crate) enum ClassRole {
    Teacher,
    Student,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "membershipstatus", rename_all = "lowercase")]
pub(crate) enum MembershipStatus {
    Active,
    Removed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "questionkind", rename_all = "snake_case")]
pub(crate) enum QuestionKind {
    MultipleChoice,
    Essay,
}

/// Lifecycle of a student's work on a task. A row is only created once the
/// student opens the task, so there is no stored "not started" state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "submissionstatus", rename_all = "snake_case")]
pub(crate) enum SubmissionStatus {
    InProgress,
    Submitted,
    SubmittedLate,
    Graded,
}

impl SubmissionStatus {
    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            SubmissionStatus::InProgress => "in_progress",
            SubmissionStatus::Submitted => "submitted",
            SubmissionStatus::SubmittedLate => "submitted_late",
            SubmissionStatus::Graded => "graded",
        }
    }

    /// Both on-time and late submissions sit in the "awaiting grading" bucket.
    pub(crate) fn is_submitted(&self) -> bool {
        matches!(
            self,
            SubmissionStatus::Submitted | SubmissionStatus::SubmittedLate
        )
    }
}
