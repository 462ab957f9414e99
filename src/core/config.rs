mod parsing;
mod secret;
mod settings;
pub(crate) mod types;

pub(crate) use types::Settings;
