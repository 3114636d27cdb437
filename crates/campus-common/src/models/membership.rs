//! Membership model — a user's standing in a specific channel.
//!
//! Exactly one row exists per (user, channel) pair once any interaction has
//! occurred; no row means "never requested". All transitions go through the
//! workflow layer, which enforces the state machine below with conditional
//! writes:
//!
//! `(none) → pending → {approved, denied}`; `approved → {banned, kicked}`;
//! `banned → approved` (expiry sweep or manual unban); `kicked → {approved,
//! pending}` (admin re-approval, or the user re-requests).
//!
//! A permanent ban is `banned` with `ban_expires_at = NULL`; `kicked` means
//! "removed, may re-request". Only `banned` blocks re-requesting.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// A user's membership row for one channel.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Membership {
    pub user_id: Uuid,
    pub channel_id: Uuid,

    pub status: MembershipStatus,

    /// Fast-path ban flag, kept in lockstep with `status` by the workflow.
    /// The evaluator trusts `status` + expiry; the sweeper repairs this flag.
    pub is_banned: bool,

    /// None while banned ⇒ permanent ban, admin unban required
    pub ban_expires_at: Option<DateTime<Utc>>,

    pub ban_reason: Option<String>,

    pub banned_by: Option<Uuid>,

    pub kicked_at: Option<DateTime<Utc>>,

    pub kicked_by: Option<Uuid>,

    /// Read-state tracking
    pub last_read_message_id: Option<Uuid>,

    pub last_read_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Membership {
    /// Whether the ban is in effect at `now`. Expiry is self-healing: once
    /// `ban_expires_at` passes this returns false even before the sweeper
    /// has reconciled the row.
    pub fn banned_at(&self, now: DateTime<Utc>) -> bool {
        self.status == MembershipStatus::Banned
            && match self.ban_expires_at {
                Some(expires) => now < expires,
                None => true,
            }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MembershipStatus {
    Pending,
    Approved,
    Denied,
    Banned,
    Kicked,
}

impl MembershipStatus {
    /// Statuses from which a fresh join request may be made. `None` (no row)
    /// is always allowed and handled by the caller.
    pub fn allows_rejoin_request(self) -> bool {
        matches!(self, Self::Denied | Self::Kicked)
    }

    /// Whether the given moderation transition is legal from this status.
    pub fn allows(self, transition: Transition) -> bool {
        match transition {
            Transition::Approve => matches!(self, Self::Pending | Self::Kicked),
            Transition::Deny => self == Self::Pending,
            Transition::Ban | Transition::Kick => self == Self::Approved,
            Transition::Unban => self == Self::Banned,
        }
    }
}

/// Moderation transitions applied to an existing membership row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    Approve,
    Deny,
    Ban,
    Kick,
    Unban,
}

/// POST /user-status — a user requesting to join a channel.
#[derive(Debug, Deserialize, Validate)]
pub struct RequestJoinRequest {
    pub channel_id: Uuid,
}

/// PUT /user-status — a moderation transition on one membership row.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct UpdateMembershipRequest {
    pub user_id: Uuid,
    pub channel_id: Uuid,
    pub transition: Transition,

    /// Ban fields, only meaningful for `transition: ban`.
    /// Omitted expiry ⇒ permanent ban.
    pub ban_expires_at: Option<DateTime<Utc>>,

    #[validate(length(max = 512))]
    pub ban_reason: Option<String>,
}

/// POST /user-status/bulk — many transitions in one call.
#[derive(Debug, Deserialize, Validate)]
pub struct BulkMembershipRequest {
    #[validate(length(min = 1, max = 200, message = "Bulk update takes 1-200 items"))]
    pub items: Vec<UpdateMembershipRequest>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use MembershipStatus::*;

    #[test]
    fn approve_only_from_pending_or_kicked() {
        assert!(Pending.allows(Transition::Approve));
        assert!(Kicked.allows(Transition::Approve));
        assert!(!Approved.allows(Transition::Approve));
        assert!(!Banned.allows(Transition::Approve));
        assert!(!Denied.allows(Transition::Approve));
    }

    #[test]
    fn ban_and_kick_only_from_approved() {
        for t in [Transition::Ban, Transition::Kick] {
            assert!(Approved.allows(t));
            assert!(!Pending.allows(t));
            assert!(!Denied.allows(t));
            assert!(!Banned.allows(t));
            assert!(!Kicked.allows(t));
        }
    }

    #[test]
    fn unban_only_from_banned() {
        assert!(Banned.allows(Transition::Unban));
        assert!(!Approved.allows(Transition::Unban));
        assert!(!Kicked.allows(Transition::Unban));
    }

    #[test]
    fn rejoin_after_denied_or_kicked_but_not_banned() {
        assert!(Denied.allows_rejoin_request());
        assert!(Kicked.allows_rejoin_request());
        assert!(!Banned.allows_rejoin_request());
        assert!(!Pending.allows_rejoin_request());
        assert!(!Approved.allows_rejoin_request());
    }

    #[test]
    fn ban_expiry_is_self_healing() {
        let now = chrono::Utc::now();
        let mut m = membership_with(Banned);
        m.ban_expires_at = Some(now - chrono::Duration::hours(1));
        assert!(!m.banned_at(now));

        m.ban_expires_at = Some(now + chrono::Duration::hours(1));
        assert!(m.banned_at(now));
    }

    #[test]
    fn null_expiry_means_permanent() {
        let now = chrono::Utc::now();
        let mut m = membership_with(Banned);
        m.ban_expires_at = None;
        assert!(m.banned_at(now));
        assert!(m.banned_at(now + chrono::Duration::days(365)));
    }

    #[test]
    fn bulk_update_size_is_bounded() {
        let item = UpdateMembershipRequest {
            user_id: Uuid::now_v7(),
            channel_id: Uuid::now_v7(),
            transition: Transition::Approve,
            ban_expires_at: None,
            ban_reason: None,
        };

        let ok = BulkMembershipRequest {
            items: vec![item.clone()],
        };
        assert!(crate::validation::validate_request(&ok).is_ok());

        let too_many = BulkMembershipRequest {
            items: vec![item; 201],
        };
        assert!(crate::validation::validate_request(&too_many).is_err());
    }

    fn membership_with(status: MembershipStatus) -> Membership {
        let now = chrono::Utc::now();
        Membership {
            user_id: Uuid::now_v7(),
            channel_id: Uuid::now_v7(),
            status,
            is_banned: status == Banned,
            ban_expires_at: None,
            ban_reason: None,
            banned_by: None,
            kicked_at: None,
            kicked_by: None,
            last_read_message_id: None,
            last_read_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}
