pub(crate) mod answers;
pub(crate) mod class_invites;
pub(crate) mod class_memberships;
pub(crate) mod classes;
pub(crate) mod grade_events;
pub(crate) mod questions;
pub(crate) mod submissions;
pub(crate) mod tasks;
pub(crate) mod users;
