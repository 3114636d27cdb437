//! Message repository — append, soft edit/delete, paginated history.

use campus_common::models::message::{Message, MessageKind};
use sqlx::PgPool;
use uuid::Uuid;

/// Append a message row.
#[allow(clippy::too_many_arguments)]
pub async fn create_message(
    pool: &PgPool,
    id: Uuid,
    channel_id: Uuid,
    author_id: Uuid,
    author_display_name: &str,
    content: &str,
    kind: MessageKind,
    mentions: &[Uuid],
    reply_to: Option<Uuid>,
) -> Result<Message, sqlx::Error> {
    sqlx::query_as::<_, Message>(
        r#"
        INSERT INTO messages (
            id, channel_id, author_id, author_display_name, content, kind,
            mentions, reply_to, edited, deleted, created_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, false, false, NOW())
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(channel_id)
    .bind(author_id)
    .bind(author_display_name)
    .bind(content)
    .bind(kind)
    .bind(mentions)
    .bind(reply_to)
    .fetch_one(pool)
    .await
}

/// Find a message by ID.
pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Message>, sqlx::Error> {
    sqlx::query_as::<_, Message>("SELECT * FROM messages WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Page through a channel's history, newest first. `before` is an exclusive
/// id cursor for "load more"; ids are time-sortable so (created_at, id)
/// ordering and the id cursor agree.
pub async fn list_channel_messages(
    pool: &PgPool,
    channel_id: Uuid,
    before: Option<Uuid>,
    limit: i64,
) -> Result<Vec<Message>, sqlx::Error> {
    sqlx::query_as::<_, Message>(
        r#"
        SELECT * FROM messages
        WHERE channel_id = $1
          AND ($2::uuid IS NULL OR id < $2)
        ORDER BY created_at DESC, id DESC
        LIMIT $3
        "#,
    )
    .bind(channel_id)
    .bind(before)
    .bind(limit)
    .fetch_all(pool)
    .await
}

/// Rewrite content, flipping the edited flag. Only the author's own row
/// matches; returns None when the message belongs to someone else.
pub async fn edit_message(
    pool: &PgPool,
    id: Uuid,
    author_id: Uuid,
    content: &str,
) -> Result<Option<Message>, sqlx::Error> {
    sqlx::query_as::<_, Message>(
        r#"
        UPDATE messages
        SET content = $3, edited = true, edited_at = NOW()
        WHERE id = $1 AND author_id = $2 AND deleted = false
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(author_id)
    .bind(content)
    .fetch_optional(pool)
    .await
}

/// Soft-delete (moderation). The row stays for audit; content is blanked.
pub async fn soft_delete_message(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE messages SET deleted = true, content = '' WHERE id = $1 AND deleted = false",
    )
    .bind(id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Hard delete many rows at once — admin bulk tooling only.
pub async fn bulk_delete_messages(pool: &PgPool, ids: &[Uuid]) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM messages WHERE id = ANY($1)")
        .bind(ids)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}
