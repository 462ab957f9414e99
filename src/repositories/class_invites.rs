use sqlx::PgPool;

use crate::db::models::ClassInviteCode;

const COLUMNS: &str = "\
    id, class_id, code_hash, is_active, usage_count, created_at, updated_at";

pub(crate) struct CreateInviteCode<'a> {
    pub(crate) id: &'a str,
    pub(crate) class_id: &'a str,
    pub(crate) code_hash: &'a str,
    pub(crate) is_active: bool,
    pub(crate) created_at: time::PrimitiveDateTime,
    pub(crate) updated_at: time::PrimitiveDateTime,
}

pub(crate) async fn create(
    pool: &PgPool,
    params: CreateInviteCode<'_>,
) -> Result<ClassInviteCode, sqlx::Error> {
    sqlx::query_as::<_, ClassInviteCode>(&format!(
        "INSERT INTO class_invite_codes (
            id, class_id, code_hash, is_active, usage_count, created_at, updated_at
         ) VALUES ($1,$2,$3,$4,0,$5,$6)
         RETURNING {COLUMNS}",
    ))
    .bind(params.id)
    .bind(params.class_id)
    .bind(params.code_hash)
    .bind(params.is_active)
    .bind(params.created_at)
    .bind(params.updated_at)
    .fetch_one(pool)
    .await
}

pub(crate) async fn find_active_for_class(
    pool: &PgPool,
    class_id: &str,
) -> Result<Option<ClassInviteCode>, sqlx::Error> {
    sqlx::query_as::<_, ClassInviteCode>(&format!(
        "SELECT {COLUMNS}
         FROM class_invite_codes
         WHERE class_id = $1
           AND is_active = TRUE
         ORDER BY created_at DESC
         LIMIT 1",
    ))
    .bind(class_id)
    .fetch_optional(pool)
    .await
}

pub(crate) async fn deactivate(
    pool: &PgPool,
    invite_id: &str,
    updated_at: time::PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE class_invite_codes
         SET is_active = FALSE,
             updated_at = $1
         WHERE id = $2",
    )
    .bind(updated_at)
    .bind(invite_id)
    .execute(pool)
    .await?;
    Ok(())
}

pub(crate) async fn find_active_by_hash(
    pool: &PgPool,
    code_hash: &str,
) -> Result<Option<ClassInviteCode>, sqlx::Error> {
    sqlx::query_as::<_, ClassInviteCode>(&format!(
        "SELECT {COLUMNS}
         FROM class_invite_codes
         WHERE code_hash = $1
           AND is_active = TRUE
         LIMIT 1",
    ))
    .bind(code_hash)
    .fetch_optional(pool)
    .await
}

pub(crate) async fn increment_usage(
    pool: &PgPool,
    invite_id: &str,
    updated_at: time::PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE class_invite_codes
         SET usage_count = usage_count + 1,
             updated_at = $1
         WHERE id = $2",
    )
    .bind(updated_at)
    .bind(invite_id)
    .execute(pool)
    .await?;
    Ok(())
}
