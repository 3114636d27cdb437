//! Membership repository.
//!
//! Every status mutation takes an equality precondition on the current
//! status (`WHERE ... AND status = ...`) and reports whether a row matched.
//! Operations on a single (user, channel) pair are thereby serialized: of
//! two racing transitions, exactly one sees its expected status and wins,
//! the other observes `false` and surfaces a conflict. No global locks.

use campus_common::models::membership::Membership;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

/// Fetch the membership row for a (user, channel) pair.
pub async fn find(
    pool: &PgPool,
    user_id: Uuid,
    channel_id: Uuid,
) -> Result<Option<Membership>, sqlx::Error> {
    sqlx::query_as::<_, Membership>(
        "SELECT * FROM memberships WHERE user_id = $1 AND channel_id = $2",
    )
    .bind(user_id)
    .bind(channel_id)
    .fetch_optional(pool)
    .await
}

/// Insert a fresh pending row. Returns false if a row already exists —
/// the caller decides what the existing standing means.
pub async fn insert_pending(
    pool: &PgPool,
    user_id: Uuid,
    channel_id: Uuid,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        INSERT INTO memberships (user_id, channel_id, status, created_at, updated_at)
        VALUES ($1, $2, 'pending', NOW(), NOW())
        ON CONFLICT (user_id, channel_id) DO NOTHING
        "#,
    )
    .bind(user_id)
    .bind(channel_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// denied/kicked → pending (re-request). Conditional; false on a lost race.
pub async fn reset_to_pending(
    pool: &PgPool,
    user_id: Uuid,
    channel_id: Uuid,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE memberships
        SET status = 'pending', kicked_at = NULL, kicked_by = NULL, updated_at = NOW()
        WHERE user_id = $1 AND channel_id = $2 AND status IN ('denied', 'kicked')
        "#,
    )
    .bind(user_id)
    .bind(channel_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// pending/kicked → approved. Clears any leftover moderation fields.
pub async fn approve(pool: &PgPool, user_id: Uuid, channel_id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE memberships
        SET status = 'approved', is_banned = false, ban_expires_at = NULL,
            ban_reason = NULL, banned_by = NULL, kicked_at = NULL, kicked_by = NULL,
            updated_at = NOW()
        WHERE user_id = $1 AND channel_id = $2 AND status IN ('pending', 'kicked')
        "#,
    )
    .bind(user_id)
    .bind(channel_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// pending → denied.
pub async fn deny(pool: &PgPool, user_id: Uuid, channel_id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE memberships
        SET status = 'denied', updated_at = NOW()
        WHERE user_id = $1 AND channel_id = $2 AND status = 'pending'
        "#,
    )
    .bind(user_id)
    .bind(channel_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// approved → banned. NULL expiry means permanent.
pub async fn ban(
    pool: &PgPool,
    user_id: Uuid,
    channel_id: Uuid,
    expires_at: Option<DateTime<Utc>>,
    reason: Option<&str>,
    banned_by: Uuid,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE memberships
        SET status = 'banned', is_banned = true, ban_expires_at = $3,
            ban_reason = $4, banned_by = $5, updated_at = NOW()
        WHERE user_id = $1 AND channel_id = $2 AND status = 'approved'
        "#,
    )
    .bind(user_id)
    .bind(channel_id)
    .bind(expires_at)
    .bind(reason)
    .bind(banned_by)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// approved → kicked.
pub async fn kick(
    pool: &PgPool,
    user_id: Uuid,
    channel_id: Uuid,
    kicked_by: Uuid,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE memberships
        SET status = 'kicked', kicked_at = NOW(), kicked_by = $3, updated_at = NOW()
        WHERE user_id = $1 AND channel_id = $2 AND status = 'approved'
        "#,
    )
    .bind(user_id)
    .bind(channel_id)
    .bind(kicked_by)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// banned → approved, clearing all ban fields.
pub async fn unban(pool: &PgPool, user_id: Uuid, channel_id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE memberships
        SET status = 'approved', is_banned = false, ban_expires_at = NULL,
            ban_reason = NULL, banned_by = NULL, updated_at = NOW()
        WHERE user_id = $1 AND channel_id = $2 AND status = 'banned'
        "#,
    )
    .bind(user_id)
    .bind(channel_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Idempotent approved-row insert used by the sub-channel cascade.
pub async fn insert_approved_if_absent(
    pool: &PgPool,
    user_id: Uuid,
    channel_id: Uuid,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        INSERT INTO memberships (user_id, channel_id, status, created_at, updated_at)
        VALUES ($1, $2, 'approved', NOW(), NOW())
        ON CONFLICT (user_id, channel_id) DO NOTHING
        "#,
    )
    .bind(user_id)
    .bind(channel_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Remove a membership row entirely (admin tooling).
pub async fn delete(pool: &PgPool, user_id: Uuid, channel_id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM memberships WHERE user_id = $1 AND channel_id = $2")
        .bind(user_id)
        .bind(channel_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// All approved members of a channel.
pub async fn list_approved(
    pool: &PgPool,
    channel_id: Uuid,
) -> Result<Vec<Membership>, sqlx::Error> {
    sqlx::query_as::<_, Membership>(
        r#"
        SELECT * FROM memberships
        WHERE channel_id = $1 AND status = 'approved'
        ORDER BY created_at
        "#,
    )
    .bind(channel_id)
    .fetch_all(pool)
    .await
}

/// Bans whose expiry has passed but whose row still says banned —
/// the sweeper's work list.
pub async fn list_expired_bans(
    pool: &PgPool,
    now: DateTime<Utc>,
) -> Result<Vec<Membership>, sqlx::Error> {
    sqlx::query_as::<_, Membership>(
        r#"
        SELECT * FROM memberships
        WHERE is_banned = true AND status = 'banned'
          AND ban_expires_at IS NOT NULL AND ban_expires_at <= $1
        ORDER BY ban_expires_at
        "#,
    )
    .bind(now)
    .fetch_all(pool)
    .await
}
