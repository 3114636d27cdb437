//! Channel repository.

use campus_common::models::channel::{Channel, ChannelKind};
use sqlx::PgPool;
use uuid::Uuid;

/// Create a new channel.
#[allow(clippy::too_many_arguments)]
pub async fn create_channel(
    pool: &PgPool,
    id: Uuid,
    name: &str,
    kind: ChannelKind,
    group_tag: &str,
    parent_channel_id: Option<Uuid>,
    can_message: bool,
    can_read: bool,
    created_by: Uuid,
) -> Result<Channel, sqlx::Error> {
    sqlx::query_as::<_, Channel>(
        r#"
        INSERT INTO channels (
            id, name, kind, group_tag, parent_channel_id,
            can_message, can_read, is_active, created_by, moderators,
            created_at, updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, true, $8, '{}', NOW(), NOW())
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(name)
    .bind(kind)
    .bind(group_tag)
    .bind(parent_channel_id)
    .bind(can_message)
    .bind(can_read)
    .bind(created_by)
    .fetch_one(pool)
    .await
}

/// Find a channel by ID.
pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Channel>, sqlx::Error> {
    sqlx::query_as::<_, Channel>("SELECT * FROM channels WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// List all channels, top-level first.
pub async fn list_channels(pool: &PgPool) -> Result<Vec<Channel>, sqlx::Error> {
    sqlx::query_as::<_, Channel>(
        "SELECT * FROM channels ORDER BY parent_channel_id NULLS FIRST, group_tag, name",
    )
    .fetch_all(pool)
    .await
}

/// Find a sub-channel of a parent by name (cascade lookup).
pub async fn find_sub_channel(
    pool: &PgPool,
    parent_id: Uuid,
    name: &str,
) -> Result<Option<Channel>, sqlx::Error> {
    sqlx::query_as::<_, Channel>(
        "SELECT * FROM channels WHERE parent_channel_id = $1 AND name = $2",
    )
    .bind(parent_id)
    .bind(name)
    .fetch_optional(pool)
    .await
}

/// List the sub-channels of a top-level channel.
pub async fn list_sub_channels(
    pool: &PgPool,
    parent_id: Uuid,
) -> Result<Vec<Channel>, sqlx::Error> {
    sqlx::query_as::<_, Channel>(
        "SELECT * FROM channels WHERE parent_channel_id = $1 ORDER BY name",
    )
    .bind(parent_id)
    .fetch_all(pool)
    .await
}

/// Update a channel's metadata and permission flags.
pub async fn update_channel(
    pool: &PgPool,
    id: Uuid,
    name: Option<&str>,
    group_tag: Option<&str>,
    can_message: Option<bool>,
    can_read: Option<bool>,
    is_active: Option<bool>,
) -> Result<Channel, sqlx::Error> {
    sqlx::query_as::<_, Channel>(
        r#"
        UPDATE channels SET
            name = COALESCE($2, name),
            group_tag = COALESCE($3, group_tag),
            can_message = COALESCE($4, can_message),
            can_read = COALESCE($5, can_read),
            is_active = COALESCE($6, is_active),
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(name)
    .bind(group_tag)
    .bind(can_message)
    .bind(can_read)
    .bind(is_active)
    .fetch_one(pool)
    .await
}

/// Delete a channel (sub-channels cascade at the schema level).
pub async fn delete_channel(pool: &PgPool, id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM channels WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}
