use crate::api::errors::ApiError;

pub(crate) const MIN_PASSWORD_LEN: usize = 8;
pub(crate) const MAX_SLUG_LEN: usize = 64;

pub(crate) fn validate_email(email: &str) -> Result<(), ApiError> {
    let mut parts = email.splitn(2, '@');
    let local = parts.next().unwrap_or_default();
    let domain = parts.next().unwrap_or_default();

    let valid = !local.is_empty()
        && !domain.is_empty()
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && email.len() <= 254
        && !email.chars().any(char::is_whitespace);

    if valid {
        Ok(())
    } else {
        Err(ApiError::BadRequest("Invalid email format".to_string()))
    }
}

pub(crate) fn validate_password_len(password: &str) -> Result<(), ApiError> {
    if password.chars().count() >= MIN_PASSWORD_LEN {
        Ok(())
    } else {
        Err(ApiError::BadRequest(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters long"
        )))
    }
}

/// Slugs appear in invite codes and URLs: lowercase ascii, digits and
/// hyphens, 3 to 64 characters, no leading or trailing hyphen.
pub(crate) fn validate_slug(slug: &str) -> Result<(), ApiError> {
    let valid = (3..=MAX_SLUG_LEN).contains(&slug.len())
        && slug.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        && !slug.starts_with('-')
        && !slug.ends_with('-');

    if valid {
        Ok(())
    } else {
        Err(ApiError::BadRequest(
            "Slug must be 3-64 lowercase letters, digits or hyphens".to_string(),
        ))
    }
}
