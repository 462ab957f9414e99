use async_trait::async_trait;
use axum::extract::{FromRequestParts, State};
use axum::http::{header, request::Parts};

use crate::api::errors::ApiError;
use crate::core::{security, state::AppState};
use crate::db::models::User;
use crate::db::types::{ClassRole, MembershipStatus};
use crate::repositories;

pub(crate) struct CurrentUser(pub(crate) User);
pub(crate) struct CurrentAdmin(pub(crate) User);

#[derive(Debug, Clone)]
pub(crate) struct ClassAccess {
    pub(crate) role: ClassRole,
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let State(app_state) = State::<AppState>::from_request_parts(parts, state)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to access application state"))?;

        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or(ApiError::Unauthorized("Invalid authentication credentials"))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or(ApiError::Unauthorized("Invalid authentication credentials"))?;

        let claims = security::verify_token(token, app_state.settings())
            .map_err(|_| ApiError::Unauthorized("Invalid authentication credentials"))?;

        let user = repositories::users::find_by_id(app_state.db(), &claims.sub)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to load user"))?;

        let Some(user) = user else {
            return Err(ApiError::Unauthorized("User not found"));
        };

        if !user.is_active {
            return Err(ApiError::Unauthorized("Invalid authentication credentials"));
        }

        Ok(CurrentUser(user))
    }
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentAdmin {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;

        if user.is_platform_admin {
            Ok(CurrentAdmin(user))
        } else {
            Err(ApiError::Forbidden("Admin access required"))
        }
    }
}

pub(crate) async fn require_class_membership(
    state: &AppState,
    user: &User,
    class_id: &str,
) -> Result<ClassAccess, ApiError> {
    if user.is_platform_admin {
        return Ok(ClassAccess { role: ClassRole::Teacher });
    }

    let membership =
        repositories::class_memberships::find_for_user_class(state.db(), &user.id, class_id)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to fetch class membership"))?;

    let Some(membership) = membership else {
        return Err(ApiError::Forbidden("Not a member of this class"));
    };

    if membership.status != MembershipStatus::Active {
        return Err(ApiError::Forbidden("Not a member of this class"));
    }

    Ok(ClassAccess { role: membership.role })
}

pub(crate) async fn require_class_role(
    state: &AppState,
    user: &User,
    class_id: &str,
    role: ClassRole,
) -> Result<ClassAccess, ApiError> {
    let access = require_class_membership(state, user, class_id).await?;

    if user.is_platform_admin || access.role == role {
        return Ok(access);
    }

    Err(ApiError::Forbidden("Not enough permissions for this class"))
}

/// Submissions always belong to an enrolled student; platform admins do not
/// get a bypass here.
pub(crate) async fn require_enrolled_student(
    state: &AppState,
    user: &User,
    class_id: &str,
) -> Result<(), ApiError> {
    let membership =
        repositories::class_memberships::find_for_user_class(state.db(), &user.id, class_id)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to fetch class membership"))?;

    let enrolled = membership
        .map(|m| m.status == MembershipStatus::Active && m.role == ClassRole::Student)
        .unwrap_or(false);

    if enrolled {
        Ok(())
    } else {
        Err(ApiError::Forbidden("Only enrolled students can work on this task"))
    }
}
