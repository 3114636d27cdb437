//! Room event types — shared between API and Gateway crates.
//!
//! The API emits events when data changes (message created, role granted,
//! channel permissions updated) and the gateway forwards them to connected
//! WebSocket clients. This module lives in `campus-common` so both crates can
//! use it without circular deps. The same envelope travels over the pub/sub
//! backplane so every gateway process delivers it, not just the one that
//! handled the mutation.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Events broadcast through the gateway to connected clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomEvent {
    /// Event type (e.g., "NEW_MESSAGE", "USER_TYPING", "ROLE_UPDATED")
    pub event_type: String,
    /// Event payload as JSON
    pub data: serde_json::Value,
    /// Room this event belongs to — delivered to every connection joined to
    /// the channel (None for user-targeted events)
    pub channel_id: Option<Uuid>,
    /// Target user for directed events; for room events, the user who
    /// triggered it
    pub user_id: Option<Uuid>,
}

impl RoomEvent {
    /// A new persisted message, fanned out to the channel's room.
    pub fn new_message(channel_id: Uuid, author_id: Uuid, message: serde_json::Value) -> Self {
        Self {
            event_type: "NEW_MESSAGE".into(),
            data: message,
            channel_id: Some(channel_id),
            user_id: Some(author_id),
        }
    }

    /// Ephemeral typing indicator, never persisted.
    pub fn user_typing(channel_id: Uuid, user_id: Uuid, is_typing: bool) -> Self {
        Self {
            event_type: "USER_TYPING".into(),
            data: serde_json::json!({
                "channel_id": channel_id,
                "user_id": user_id,
                "is_typing": is_typing,
            }),
            channel_id: Some(channel_id),
            user_id: Some(user_id),
        }
    }

    /// Tells the affected user to re-fetch authoritative role data rather
    /// than trusting a pushed payload.
    pub fn role_updated(user_id: Uuid, channel_id: Option<Uuid>) -> Self {
        Self {
            event_type: "ROLE_UPDATED".into(),
            data: serde_json::json!({
                "user_id": user_id,
                "channel_id": channel_id,
            }),
            channel_id: None,
            user_id: Some(user_id),
        }
    }

    /// Tells everyone in the room that channel permission flags changed.
    pub fn channel_permissions_updated(channel_id: Uuid) -> Self {
        Self {
            event_type: "CHANNEL_PERMISSIONS_UPDATED".into(),
            data: serde_json::json!({ "channel_id": channel_id }),
            channel_id: Some(channel_id),
            user_id: None,
        }
    }
}
