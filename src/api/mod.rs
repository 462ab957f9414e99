pub(crate) mod auth;
pub(crate) mod classes;
pub(crate) mod errors;
pub(crate) mod guards;
pub(crate) mod handlers;
pub(crate) mod pagination;
pub(crate) mod router;
pub(crate) mod submissions;
pub(crate) mod tasks;
pub(crate) mod users;
pub(crate) mod validation;
