use sqlx::PgPool;
use uuid::Uuid;

use crate::db::models::ClassMembership;
use crate::db::types::{ClassRole, MembershipStatus};

const MEMBERSHIP_COLUMNS: &str = "id, class_id, user_id, role, status, joined_at";

/// A membership joined with the class it belongs to, for "my classes" views.
#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct MembershipView {
    pub(crate) membership_id: String,
    pub(crate) class_id: String,
    pub(crate) class_slug: String,
    pub(crate) class_title: String,
    pub(crate) role: ClassRole,
    pub(crate) status: MembershipStatus,
    pub(crate) joined_at: time::PrimitiveDateTime,
}

/// A membership joined with the member's user record, for roster views.
#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct MemberRow {
    pub(crate) user_id: String,
    pub(crate) email: String,
    pub(crate) full_name: String,
    pub(crate) role: ClassRole,
    pub(crate) status: MembershipStatus,
    pub(crate) joined_at: time::PrimitiveDateTime,
}

pub(crate) struct EnsureMembershipParams<'a> {
    pub(crate) class_id: &'a str,
    pub(crate) user_id: &'a str,
    pub(crate) role: ClassRole,
    pub(crate) joined_at: time::PrimitiveDateTime,
}

/// Create the membership or reactivate a removed one. The row is locked so a
/// concurrent join with the same code settles on a single membership. An
/// existing row keeps its role; rejoining does not promote or demote.
pub(crate) async fn ensure_membership(
    pool: &PgPool,
    params: EnsureMembershipParams<'_>,
) -> Result<String, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let existing_id = sqlx::query_scalar::<_, String>(
        "SELECT id
         FROM class_memberships
         WHERE class_id = $1 AND user_id = $2
         FOR UPDATE",
    )
    .bind(params.class_id)
    .bind(params.user_id)
    .fetch_optional(&mut *tx)
    .await?;

    let membership_id = if let Some(id) = existing_id {
        sqlx::query("UPDATE class_memberships SET status = $1 WHERE id = $2")
            .bind(MembershipStatus::Active)
            .bind(&id)
            .execute(&mut *tx)
            .await?;
        id
    } else {
        let id = Uuid::new_v4().to_string();
        sqlx::query(
            "INSERT INTO class_memberships (
                id, class_id, user_id, role, status, joined_at
             ) VALUES ($1,$2,$3,$4,$5,$6)",
        )
        .bind(&id)
        .bind(params.class_id)
        .bind(params.user_id)
        .bind(params.role)
        .bind(MembershipStatus::Active)
        .bind(params.joined_at)
        .execute(&mut *tx)
        .await?;
        id
    };

    tx.commit().await?;
    Ok(membership_id)
}

pub(crate) async fn find_for_user_class(
    pool: &PgPool,
    user_id: &str,
    class_id: &str,
) -> Result<Option<ClassMembership>, sqlx::Error> {
    sqlx::query_as::<_, ClassMembership>(&format!(
        "SELECT {MEMBERSHIP_COLUMNS}
         FROM class_memberships
         WHERE user_id = $1 AND class_id = $2"
    ))
    .bind(user_id)
    .bind(class_id)
    .fetch_optional(pool)
    .await
}

pub(crate) async fn list_for_user(
    pool: &PgPool,
    user_id: &str,
) -> Result<Vec<MembershipView>, sqlx::Error> {
    sqlx::query_as::<_, MembershipView>(
        "SELECT cm.id AS membership_id,
                cm.class_id,
                c.slug AS class_slug,
                c.title AS class_title,
                cm.role,
                cm.status,
                cm.joined_at
         FROM class_memberships cm
         JOIN classes c ON c.id = cm.class_id
         WHERE cm.user_id = $1
         ORDER BY cm.joined_at DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
}

pub(crate) async fn list_members(
    pool: &PgPool,
    class_id: &str,
) -> Result<Vec<MemberRow>, sqlx::Error> {
    sqlx::query_as::<_, MemberRow>(
        "SELECT cm.user_id,
                u.email,
                u.full_name,
                cm.role,
                cm.status,
                cm.joined_at
         FROM class_memberships cm
         JOIN users u ON u.id = cm.user_id
         WHERE cm.class_id = $1
         ORDER BY cm.role, u.full_name",
    )
    .bind(class_id)
    .fetch_all(pool)
    .await
}
