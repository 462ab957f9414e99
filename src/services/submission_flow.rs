use std::collections::HashSet;

use thiserror::Error;
use time::PrimitiveDateTime;

use crate::db::types::SubmissionStatus;

#[derive(Debug, Error, PartialEq, Eq)]
pub(crate) enum FlowError {
    #[error("answers can only be recorded while the submission is in progress")]
    NotEditable,
    #[error("submission has already been submitted")]
    NotSubmittable,
    #[error("only submitted work can be graded")]
    NotGradable,
    #[error("only graded work can be regraded")]
    NotRegradable,
}

pub(crate) fn ensure_in_progress(status: SubmissionStatus) -> Result<(), FlowError> {
    if status == SubmissionStatus::InProgress {
        Ok(())
    } else {
        Err(FlowError::NotEditable)
    }
}

pub(crate) fn ensure_submittable(status: SubmissionStatus) -> Result<(), FlowError> {
    if status == SubmissionStatus::InProgress {
        Ok(())
    } else {
        Err(FlowError::NotSubmittable)
    }
}

pub(crate) fn ensure_gradable(status: SubmissionStatus) -> Result<(), FlowError> {
    if status.is_submitted() {
        Ok(())
    } else {
        Err(FlowError::NotGradable)
    }
}

pub(crate) fn ensure_regradable(status: SubmissionStatus) -> Result<(), FlowError> {
    if status == SubmissionStatus::Graded {
        Ok(())
    } else {
        Err(FlowError::NotRegradable)
    }
}

/// The deadline itself is inclusive: work handed in at exactly the due date
/// counts as on time.
pub(crate) fn submitted_status(
    now: PrimitiveDateTime,
    due_date: PrimitiveDateTime,
) -> SubmissionStatus {
    if now <= due_date {
        SubmissionStatus::Submitted
    } else {
        SubmissionStatus::SubmittedLate
    }
}

/// Positions of questions without a saved answer, in task order.
pub(crate) fn unanswered_positions(
    questions: &[(&str, i32)],
    answered: &HashSet<&str>,
) -> Vec<i32> {
    let mut positions: Vec<i32> = questions
        .iter()
        .filter(|(id, _)| !answered.contains(id))
        .map(|&(_, position)| position)
        .collect();
    positions.sort_unstable();
    positions
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn editing_is_blocked_outside_in_progress() {
        assert!(ensure_in_progress(SubmissionStatus::InProgress).is_ok());
        for status in [
            SubmissionStatus::Submitted,
            SubmissionStatus::SubmittedLate,
            SubmissionStatus::Graded,
        ] {
            assert_eq!(ensure_in_progress(status), Err(FlowError::NotEditable));
        }
    }

    #[test]
    fn submitting_twice_is_rejected() {
        assert!(ensure_submittable(SubmissionStatus::InProgress).is_ok());
        assert_eq!(
            ensure_submittable(SubmissionStatus::Submitted),
            Err(FlowError::NotSubmittable)
        );
        assert_eq!(
            ensure_submittable(SubmissionStatus::Graded),
            Err(FlowError::NotSubmittable)
        );
    }

    #[test]
    fn grading_accepts_both_submitted_variants() {
        assert!(ensure_gradable(SubmissionStatus::Submitted).is_ok());
        assert!(ensure_gradable(SubmissionStatus::SubmittedLate).is_ok());
        assert_eq!(
            ensure_gradable(SubmissionStatus::InProgress),
            Err(FlowError::NotGradable)
        );
        assert_eq!(ensure_gradable(SubmissionStatus::Graded), Err(FlowError::NotGradable));
    }

    #[test]
    fn regrading_requires_a_previous_grade() {
        assert!(ensure_regradable(SubmissionStatus::Graded).is_ok());
        assert_eq!(
            ensure_regradable(SubmissionStatus::Submitted),
            Err(FlowError::NotRegradable)
        );
    }

    #[test]
    fn deadline_is_inclusive() {
        let due = datetime!(2024-01-01 23:59:59);
        assert_eq!(submitted_status(due, due), SubmissionStatus::Submitted);
        assert_eq!(
            submitted_status(datetime!(2024-01-01 12:00:00), due),
            SubmissionStatus::Submitted
        );
        assert_eq!(
            submitted_status(datetime!(2024-01-02 00:00:00), due),
            SubmissionStatus::SubmittedLate
        );
    }

    #[test]
    fn unanswered_positions_come_back_sorted() {
        let questions = [("q3", 3), ("q1", 1), ("q2", 2)];
        let answered = HashSet::from(["q2"]);

        assert_eq!(unanswered_positions(&questions, &answered), vec![1, 3]);
    }

    #[test]
    fn fully_answered_task_has_no_gaps() {
        let questions = [("q1", 1), ("q2", 2)];
        let answered = HashSet::from(["q1", "q2"]);

        assert!(unanswered_positions(&questions, &answered).is_empty());
    }
}
