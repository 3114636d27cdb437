//! Channel model — a named scope for messages.
//!
//! Channels nest at most one level: a sub-channel's `parent_channel_id`
//! references a top-level channel, so cycles are impossible by construction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// A channel in the community directory.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Channel {
    pub id: Uuid,

    pub name: String,

    /// Channel kind — governs who may write
    pub kind: ChannelKind,

    /// Free-form category tag (e.g. "community", "hackathons")
    pub group_tag: String,

    /// Parent channel (None ⇒ top-level; Some ⇒ sub-channel, one level only)
    pub parent_channel_id: Option<Uuid>,

    /// Permission flag: members may post here
    pub can_message: bool,

    /// Permission flag: channel is readable without approved membership
    pub can_read: bool,

    pub is_active: bool,

    pub created_by: Uuid,

    /// Per-channel moderator list, legacy/secondary to role grants
    pub moderators: Vec<Uuid>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Channel {
    /// Whether this channel sits at the top of the hierarchy.
    pub fn is_top_level(&self) -> bool {
        self.parent_channel_id.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    /// Standard text channel — any approved member may post
    Text,
    /// Announcement channel — moderators post, members read
    Announcement,
    /// Read-only channel — never writable by plain members
    Readonly,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateChannelRequest {
    #[validate(length(min = 1, max = 100, message = "Channel name must be 1-100 characters"))]
    pub name: String,

    pub kind: ChannelKind,

    #[validate(length(min = 1, max = 64, message = "Group tag must be 1-64 characters"))]
    pub group_tag: String,

    pub parent_channel_id: Option<Uuid>,

    pub can_message: Option<bool>,

    pub can_read: Option<bool>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateChannelRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,

    #[validate(length(min = 1, max = 64))]
    pub group_tag: Option<String>,

    pub can_message: Option<bool>,

    pub can_read: Option<bool>,

    pub is_active: Option<bool>,
}

impl UpdateChannelRequest {
    /// Whether this update touches a permission flag — if so, connected
    /// members get a CHANNEL_PERMISSIONS_UPDATED push.
    pub fn changes_permissions(&self) -> bool {
        self.can_message.is_some() || self.can_read.is_some() || self.is_active.is_some()
    }
}
