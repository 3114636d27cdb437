//! Message model — the core content unit.
//!
//! Messages are append-mostly: edits flip `edited` and rewrite `content`,
//! moderation flips `deleted`. Physical removal happens only through the
//! admin bulk-delete endpoint. Within a channel, (created_at, id) is a total
//! order — UUID v7 ids break timestamp ties in insertion order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// A message in a channel.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Message {
    pub id: Uuid,

    pub channel_id: Uuid,

    pub author_id: Uuid,

    /// Author display name, denormalized at send time
    pub author_display_name: String,

    pub content: String,

    pub kind: MessageKind,

    /// Users mentioned in this message
    pub mentions: Vec<Uuid>,

    /// Message this one replies to, if any
    pub reply_to: Option<Uuid>,

    pub edited: bool,

    pub edited_at: Option<DateTime<Utc>>,

    /// Soft-delete flag set by moderation
    pub deleted: bool,

    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// Normal user message
    Text,
    /// System message (membership approved, channel created, etc.)
    System,
}

/// Create message request (operator tooling; the gateway has its own frame).
#[derive(Debug, Deserialize, Validate)]
pub struct CreateMessageRequest {
    #[validate(length(min = 1, max = 4000, message = "Message must be 1-4000 characters"))]
    pub content: String,

    pub reply_to: Option<Uuid>,

    #[serde(default)]
    pub mentions: Vec<Uuid>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateMessageRequest {
    #[validate(length(min = 1, max = 4000, message = "Message must be 1-4000 characters"))]
    pub content: String,
}

/// Hard delete of many messages at once — admin tooling only.
#[derive(Debug, Deserialize, Validate)]
pub struct BulkDeleteRequest {
    #[validate(length(min = 1, max = 500, message = "Bulk delete takes 1-500 message ids"))]
    pub message_ids: Vec<Uuid>,
}

/// Extract `@<uuid>` mentions from message content.
pub fn parse_mentions(content: &str) -> Vec<Uuid> {
    let mut out = Vec::new();
    for token in content.split_whitespace() {
        if let Some(raw) = token.strip_prefix('@') {
            if let Ok(id) = raw.trim_end_matches(|c: char| !c.is_ascii_hexdigit() && c != '-').parse::<Uuid>() {
                if !out.contains(&id) {
                    out.push(id);
                }
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_uuid_mentions() {
        let id = Uuid::now_v7();
        let content = format!("hey @{id} look at this");
        assert_eq!(parse_mentions(&content), vec![id]);
    }

    #[test]
    fn ignores_plain_at_words() {
        assert!(parse_mentions("meet @noon at @the-lab").is_empty());
    }

    #[test]
    fn deduplicates_mentions() {
        let id = Uuid::now_v7();
        let content = format!("@{id} @{id}");
        assert_eq!(parse_mentions(&content).len(), 1);
    }
}
