pub(crate) mod grading;
pub(crate) mod invite_codes;
pub(crate) mod submission_flow;
pub(crate) mod task_rules;
