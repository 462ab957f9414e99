use axum::{routing::get, Json, Router};
use uuid::Uuid;

use crate::api::errors::ApiError;
use crate::api::guards::{require_class_membership, require_class_role, CurrentUser};
use crate::api::validation::validate_slug;
use crate::core::state::AppState;
use crate::core::time::{format_primitive, primitive_now_utc};
use crate::db::types::ClassRole;
use crate::repositories;
use crate::schemas::class::{
    ClassCreate, ClassListItem, ClassResponse, InviteCodeResponse, JoinClassRequest,
    MemberResponse,
};
use crate::services::invite_codes;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_classes).post(create_class))
        .route("/join", axum::routing::post(join_class))
        .route("/:class_id", get(get_class))
        .route("/:class_id/members", get(list_class_members))
        .route("/:class_id/invite-code", axum::routing::post(rotate_invite_code))
        .merge(crate::api::tasks::class_router())
}

async fn create_class(
    CurrentUser(user): CurrentUser,
    state: axum::extract::State<AppState>,
    Json(payload): Json<ClassCreate>,
) -> Result<(axum::http::StatusCode, Json<ClassResponse>), ApiError> {
    let slug = payload.slug.trim();
    validate_slug(slug)?;
    if payload.title.trim().is_empty() {
        return Err(ApiError::BadRequest("Class title must not be empty".to_string()));
    }

    if repositories::classes::exists_by_slug(state.db(), slug)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to check class slug"))?
        .is_some()
    {
        return Err(ApiError::Conflict("A class with this slug already exists".to_string()));
    }

    let now = primitive_now_utc();
    let class = repositories::classes::create(
        state.db(),
        repositories::classes::CreateClass {
            id: &Uuid::new_v4().to_string(),
            slug,
            title: payload.title.trim(),
            is_active: true,
            created_by: &user.id,
            created_at: now,
            updated_at: now,
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to create class"))?;

    repositories::class_memberships::ensure_membership(
        state.db(),
        repositories::class_memberships::EnsureMembershipParams {
            class_id: &class.id,
            user_id: &user.id,
            role: ClassRole::Teacher,
            joined_at: now,
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to create creator membership"))?;

    Ok((axum::http::StatusCode::CREATED, Json(ClassResponse::from_db(class))))
}

async fn list_classes(
    CurrentUser(user): CurrentUser,
    state: axum::extract::State<AppState>,
) -> Result<Json<Vec<ClassListItem>>, ApiError> {
    let memberships = repositories::class_memberships::list_for_user(state.db(), &user.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list memberships"))?;

    Ok(Json(memberships.into_iter().map(ClassListItem::from_view).collect()))
}

async fn get_class(
    axum::extract::Path(class_id): axum::extract::Path<String>,
    CurrentUser(user): CurrentUser,
    state: axum::extract::State<AppState>,
) -> Result<Json<ClassResponse>, ApiError> {
    require_class_membership(&state, &user, &class_id).await?;

    let class = repositories::classes::find_by_id(state.db(), &class_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch class"))?
        .ok_or_else(|| ApiError::NotFound("Class not found".to_string()))?;

    Ok(Json(ClassResponse::from_db(class)))
}

async fn list_class_members(
    axum::extract::Path(class_id): axum::extract::Path<String>,
    CurrentUser(user): CurrentUser,
    state: axum::extract::State<AppState>,
) -> Result<Json<Vec<MemberResponse>>, ApiError> {
    require_class_role(&state, &user, &class_id, ClassRole::Teacher).await?;

    let members = repositories::class_memberships::list_members(state.db(), &class_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list class members"))?;

    Ok(Json(members.into_iter().map(MemberResponse::from_row).collect()))
}

async fn rotate_invite_code(
    axum::extract::Path(class_id): axum::extract::Path<String>,
    CurrentUser(user): CurrentUser,
    state: axum::extract::State<AppState>,
) -> Result<Json<InviteCodeResponse>, ApiError> {
    require_class_role(&state, &user, &class_id, ClassRole::Teacher).await?;

    let class = repositories::classes::find_by_id(state.db(), &class_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch class"))?
        .ok_or_else(|| ApiError::NotFound("Class not found".to_string()))?;

    let now = primitive_now_utc();
    let previous = repositories::class_invites::find_active_for_class(state.db(), &class_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch active invite"))?;

    if let Some(previous) = previous.as_ref() {
        repositories::class_invites::deactivate(state.db(), &previous.id, now)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to deactivate previous invite"))?;
    }

    let code = invite_codes::generate_code(&class.slug);
    let code_hash = invite_codes::hash_invite_code(&code);
    repositories::class_invites::create(
        state.db(),
        repositories::class_invites::CreateInviteCode {
            id: &Uuid::new_v4().to_string(),
            class_id: &class_id,
            code_hash: &code_hash,
            is_active: true,
            created_at: now,
            updated_at: now,
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to create invite"))?;

    Ok(Json(InviteCodeResponse { code }))
}

async fn join_class(
    CurrentUser(user): CurrentUser,
    state: axum::extract::State<AppState>,
    Json(payload): Json<JoinClassRequest>,
) -> Result<Json<ClassListItem>, ApiError> {
    let code = payload.code.trim();
    if code.is_empty() {
        return Err(ApiError::BadRequest("Invite code must not be empty".to_string()));
    }

    let now = primitive_now_utc();
    let code_hash = invite_codes::hash_invite_code(code);
    let invite = repositories::class_invites::find_active_by_hash(state.db(), &code_hash)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch invite"))?
        .ok_or_else(|| ApiError::BadRequest("Invalid invite code".to_string()))?;

    let class = repositories::classes::find_by_id(state.db(), &invite.class_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch class"))?
        .ok_or_else(|| ApiError::Internal("Class is missing for invite".to_string()))?;

    repositories::class_memberships::ensure_membership(
        state.db(),
        repositories::class_memberships::EnsureMembershipParams {
            class_id: &invite.class_id,
            user_id: &user.id,
            role: ClassRole::Student,
            joined_at: now,
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to upsert membership"))?;

    repositories::class_invites::increment_usage(state.db(), &invite.id, now)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to increment invite usage"))?;

    let membership =
        repositories::class_memberships::find_for_user_class(state.db(), &user.id, &invite.class_id)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to fetch joined membership"))?
            .ok_or_else(|| ApiError::Internal("Membership missing after join".to_string()))?;

    Ok(Json(ClassListItem {
        class_id: class.id,
        slug: class.slug,
        title: class.title,
        role: membership.role,
        status: membership.status,
        joined_at: format_primitive(membership.joined_at),
    }))
}
