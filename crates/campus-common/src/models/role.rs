//! Role model — elevated permissions, globally or per channel.
//!
//! A grant with `channel_id = NULL` is global and implies the role on every
//! channel. Lookup precedence: global > channel-scoped > default `user`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// An elevated role held by a user.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Default standing — no grant row exists
    #[default]
    User,
    Moderator,
    Admin,
}

impl Role {
    pub fn is_at_least(self, required: Role) -> bool {
        self >= required
    }
}

/// A persisted role grant.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RoleGrant {
    pub user_id: Uuid,

    /// None ⇒ global grant
    pub channel_id: Option<Uuid>,

    pub role: Role,

    pub granted_by: Uuid,

    pub granted_at: DateTime<Utc>,
}

/// POST /user-roles — grant a role.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct GrantRoleRequest {
    pub user_id: Uuid,
    pub channel_id: Option<Uuid>,
    pub role: Role,
}

/// DELETE /user-roles — revoke a role.
#[derive(Debug, Deserialize, Validate)]
pub struct RevokeRoleRequest {
    pub user_id: Uuid,
    pub channel_id: Option<Uuid>,
    pub role: Role,
}

/// POST /user-roles/bulk — many grants in one call.
#[derive(Debug, Deserialize, Validate)]
pub struct BulkGrantRequest {
    #[validate(length(min = 1, max = 200, message = "Bulk grant takes 1-200 items"))]
    pub items: Vec<GrantRoleRequest>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bulk_grant_size_is_bounded() {
        let item = GrantRoleRequest {
            user_id: Uuid::now_v7(),
            channel_id: None,
            role: Role::Moderator,
        };

        let ok = BulkGrantRequest {
            items: vec![item.clone()],
        };
        assert!(crate::validation::validate_request(&ok).is_ok());

        let too_many = BulkGrantRequest {
            items: vec![item; 201],
        };
        assert!(crate::validation::validate_request(&too_many).is_err());
    }

    #[test]
    fn role_ladder_orders_correctly() {
        assert!(Role::Admin.is_at_least(Role::Moderator));
        assert!(Role::Moderator.is_at_least(Role::Moderator));
        assert!(!Role::User.is_at_least(Role::Moderator));
        assert!(!Role::Moderator.is_at_least(Role::Admin));
    }
}
