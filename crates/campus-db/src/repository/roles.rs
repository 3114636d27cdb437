//! Role-grant repository.
//!
//! Partial unique indexes (one for channel-scoped grants, one for global)
//! guarantee a user never holds duplicate identical grants.

use campus_common::models::role::{Role, RoleGrant};
use sqlx::PgPool;
use uuid::Uuid;

/// Grant a role. Returns false when the identical grant already exists.
pub async fn grant(
    pool: &PgPool,
    user_id: Uuid,
    channel_id: Option<Uuid>,
    role: Role,
    granted_by: Uuid,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        INSERT INTO role_grants (user_id, channel_id, role, granted_by, granted_at)
        VALUES ($1, $2, $3, $4, NOW())
        ON CONFLICT DO NOTHING
        "#,
    )
    .bind(user_id)
    .bind(channel_id)
    .bind(role)
    .bind(granted_by)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Revoke a role. Returns false when no such grant existed.
pub async fn revoke(
    pool: &PgPool,
    user_id: Uuid,
    channel_id: Option<Uuid>,
    role: Role,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        DELETE FROM role_grants
        WHERE user_id = $1 AND channel_id IS NOT DISTINCT FROM $2 AND role = $3
        "#,
    )
    .bind(user_id)
    .bind(channel_id)
    .bind(role)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// All grants held by a user (global and channel-scoped).
pub async fn list_for_user(pool: &PgPool, user_id: Uuid) -> Result<Vec<RoleGrant>, sqlx::Error> {
    sqlx::query_as::<_, RoleGrant>(
        "SELECT * FROM role_grants WHERE user_id = $1 ORDER BY granted_at",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
}
