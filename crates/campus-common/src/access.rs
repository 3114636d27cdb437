//! Access evaluator — pure logic answering "can user X read/write channel Y
//! right now".
//!
//! Combines role grants and the membership row for a channel. No I/O happens
//! here; callers load the rows and hand them in together with `now`. Ban
//! expiry is evaluated at read time, so an expired ban stops blocking access
//! the moment it lapses — the sweeper only reconciles the stored row later.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{CampusError, CampusResult};
use crate::models::channel::{Channel, ChannelKind};
use crate::models::membership::{Membership, MembershipStatus};
use crate::models::role::{Role, RoleGrant};

/// Resolve the user's global rank: the token claim or any stored global
/// grant (`channel_id = NULL`), whichever ranks higher.
pub fn global_role_of(user_id: Uuid, global_role: Role, grants: &[RoleGrant]) -> Role {
    grants
        .iter()
        .filter(|g| g.user_id == user_id && g.channel_id.is_none())
        .map(|g| g.role)
        .fold(global_role, Role::max)
}

/// Resolve the effective role of a user on a channel.
///
/// Precedence is global-first: a global grant (token claim or stored row)
/// outranks any channel-scoped grant, which outranks the default `user`.
/// The channel's legacy `moderators` list counts as a channel-scoped
/// moderator grant.
pub fn role_of(user_id: Uuid, global_role: Role, grants: &[RoleGrant], channel: &Channel) -> Role {
    let channel_role = grants
        .iter()
        .filter(|g| g.user_id == user_id && g.channel_id == Some(channel.id))
        .map(|g| g.role)
        .max()
        .unwrap_or(Role::User);

    let legacy_role = if channel.moderators.contains(&user_id) {
        Role::Moderator
    } else {
        Role::User
    };

    global_role_of(user_id, global_role, grants)
        .max(channel_role)
        .max(legacy_role)
}

/// Can the user read this channel right now?
pub fn can_read(
    user_id: Uuid,
    global_role: Role,
    grants: &[RoleGrant],
    channel: &Channel,
    membership: Option<&Membership>,
    now: DateTime<Utc>,
) -> CampusResult<()> {
    // Global staff pass every channel-level check unconditionally.
    if global_role_of(user_id, global_role, grants).is_at_least(Role::Moderator) {
        return Ok(());
    }

    if !channel.is_active {
        return Err(CampusError::ChannelDisabled);
    }

    // Channel-scoped moderators read their channel without a membership row.
    if role_of(user_id, global_role, grants, channel).is_at_least(Role::Moderator) {
        return Ok(());
    }

    // Top-level channels with an open read flag are readable without
    // membership. Sub-channels always require standing.
    if channel.can_read && channel.is_top_level() {
        // A live ban still shuts the door.
        if let Some(m) = membership {
            if m.banned_at(now) {
                return Err(banned_error(m));
            }
        }
        return Ok(());
    }

    check_standing(membership, now)
}

/// Can the user write to this channel right now?
///
/// Requires approved standing (ban expiry self-heals), an active channel,
/// messaging enabled, and moderator rank for announcement/readonly kinds.
pub fn can_write(
    user_id: Uuid,
    global_role: Role,
    grants: &[RoleGrant],
    channel: &Channel,
    membership: Option<&Membership>,
    now: DateTime<Utc>,
) -> CampusResult<()> {
    // Global staff pass every channel-level check unconditionally.
    if global_role_of(user_id, global_role, grants).is_at_least(Role::Moderator) {
        return Ok(());
    }

    check_standing(membership, now)?;

    if !channel.is_active {
        return Err(CampusError::ChannelDisabled);
    }

    let role = role_of(user_id, global_role, grants, channel);
    match channel.kind {
        ChannelKind::Text => {
            if !channel.can_message {
                return Err(CampusError::ChannelReadOnly);
            }
        }
        ChannelKind::Announcement => {
            if !role.is_at_least(Role::Moderator) {
                return Err(CampusError::MissingRole {
                    role: "moderator".into(),
                });
            }
            if !channel.can_message {
                return Err(CampusError::ChannelReadOnly);
            }
        }
        // Readonly never consults can_message: only moderators write.
        ChannelKind::Readonly => {
            if !role.is_at_least(Role::Moderator) {
                return Err(CampusError::ChannelReadOnly);
            }
        }
    }

    Ok(())
}

/// Approved-and-in-good-standing check shared by read and write paths.
fn check_standing(membership: Option<&Membership>, now: DateTime<Utc>) -> CampusResult<()> {
    let m = membership.ok_or(CampusError::NotMember)?;
    match m.status {
        MembershipStatus::Approved => Ok(()),
        MembershipStatus::Pending => Err(CampusError::MembershipPending),
        MembershipStatus::Denied => Err(CampusError::MembershipDenied),
        MembershipStatus::Kicked => Err(CampusError::Kicked),
        MembershipStatus::Banned => {
            if m.banned_at(now) {
                Err(banned_error(m))
            } else {
                // Expired ban: treated as approved before the sweeper runs.
                Ok(())
            }
        }
    }
}

fn banned_error(m: &Membership) -> CampusError {
    CampusError::Banned {
        reason: m.ban_reason.clone(),
        expires_at: m.ban_expires_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn channel(kind: ChannelKind) -> Channel {
        let now = Utc::now();
        Channel {
            id: Uuid::now_v7(),
            name: "general".into(),
            kind,
            group_tag: "community".into(),
            parent_channel_id: None,
            can_message: true,
            can_read: false,
            is_active: true,
            created_by: Uuid::now_v7(),
            moderators: vec![],
            created_at: now,
            updated_at: now,
        }
    }

    fn membership(user_id: Uuid, channel_id: Uuid, status: MembershipStatus) -> Membership {
        let now = Utc::now();
        Membership {
            user_id,
            channel_id,
            status,
            is_banned: status == MembershipStatus::Banned,
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

    fn channel_grant(user_id: Uuid, channel_id: Uuid, role: Role) -> RoleGrant {
        RoleGrant {
            user_id,
            channel_id: Some(channel_id),
            role,
            granted_by: Uuid::now_v7(),
            granted_at: Utc::now(),
        }
    }

    fn global_grant(user_id: Uuid, role: Role) -> RoleGrant {
        RoleGrant {
            user_id,
            channel_id: None,
            role,
            granted_by: Uuid::now_v7(),
            granted_at: Utc::now(),
        }
    }

    #[test]
    fn write_denied_for_every_non_approved_status() {
        let user = Uuid::now_v7();
        let ch = channel(ChannelKind::Text);
        let now = Utc::now();

        for status in [
            MembershipStatus::Pending,
            MembershipStatus::Denied,
            MembershipStatus::Kicked,
            MembershipStatus::Banned,
        ] {
            let m = membership(user, ch.id, status);
            // Channel-scoped roles do not bypass the approved requirement.
            let grants = vec![channel_grant(user, ch.id, Role::Moderator)];
            assert!(
                can_write(user, Role::User, &grants, &ch, Some(&m), now).is_err(),
                "status {status:?} should deny write"
            );
        }

        // No row at all also denies.
        assert!(can_write(user, Role::User, &[], &ch, None, now).is_err());
    }

    #[test]
    fn approved_member_can_write_text_channel() {
        let user = Uuid::now_v7();
        let ch = channel(ChannelKind::Text);
        let m = membership(user, ch.id, MembershipStatus::Approved);
        assert!(can_write(user, Role::User, &[], &ch, Some(&m), Utc::now()).is_ok());
    }

    #[test]
    fn expired_ban_self_heals_before_sweeper() {
        let user = Uuid::now_v7();
        let ch = channel(ChannelKind::Text);
        let now = Utc::now();

        let mut m = membership(user, ch.id, MembershipStatus::Banned);
        m.ban_expires_at = Some(now - Duration::hours(1));
        assert!(can_write(user, Role::User, &[], &ch, Some(&m), now).is_ok());

        m.ban_expires_at = Some(now + Duration::hours(1));
        let err = can_write(user, Role::User, &[], &ch, Some(&m), now).unwrap_err();
        assert!(matches!(err, CampusError::Banned { .. }));
    }

    #[test]
    fn permanent_ban_never_heals() {
        let user = Uuid::now_v7();
        let ch = channel(ChannelKind::Text);
        let now = Utc::now();
        let m = membership(user, ch.id, MembershipStatus::Banned);
        assert!(m.ban_expires_at.is_none());
        assert!(
            can_write(user, Role::User, &[], &ch, Some(&m), now + Duration::days(400)).is_err()
        );
    }

    #[test]
    fn global_admin_passes_everything() {
        let user = Uuid::now_v7();
        let mut ch = channel(ChannelKind::Readonly);
        ch.can_message = false;
        ch.is_active = false;
        let m = membership(user, ch.id, MembershipStatus::Denied);

        assert!(can_write(user, Role::Admin, &[], &ch, Some(&m), Utc::now()).is_ok());
        assert!(can_read(user, Role::Admin, &[], &ch, Some(&m), Utc::now()).is_ok());
        // Pending, or no row at all — still fine for global staff.
        assert!(can_write(user, Role::Moderator, &[], &ch, None, Utc::now()).is_ok());
    }

    #[test]
    fn announcement_requires_moderator() {
        let user = Uuid::now_v7();
        let ch = channel(ChannelKind::Announcement);
        let m = membership(user, ch.id, MembershipStatus::Approved);
        let now = Utc::now();

        let err = can_write(user, Role::User, &[], &ch, Some(&m), now).unwrap_err();
        assert!(matches!(err, CampusError::MissingRole { .. }));

        let grants = vec![channel_grant(user, ch.id, Role::Moderator)];
        assert!(can_write(user, Role::User, &grants, &ch, Some(&m), now).is_ok());
    }

    #[test]
    fn readonly_ignores_can_message_flag() {
        let user = Uuid::now_v7();
        let ch = channel(ChannelKind::Readonly);
        assert!(ch.can_message);
        let m = membership(user, ch.id, MembershipStatus::Approved);
        let now = Utc::now();

        let err = can_write(user, Role::User, &[], &ch, Some(&m), now).unwrap_err();
        assert!(matches!(err, CampusError::ChannelReadOnly));

        // Channel moderators may still post.
        let grants = vec![channel_grant(user, ch.id, Role::Moderator)];
        assert!(can_write(user, Role::User, &grants, &ch, Some(&m), now).is_ok());
    }

    #[test]
    fn legacy_moderator_list_counts_as_channel_moderator() {
        let user = Uuid::now_v7();
        let mut ch = channel(ChannelKind::Announcement);
        ch.moderators = vec![user];
        let m = membership(user, ch.id, MembershipStatus::Approved);
        assert!(can_write(user, Role::User, &[], &ch, Some(&m), Utc::now()).is_ok());
        assert_eq!(role_of(user, Role::User, &[], &ch), Role::Moderator);
    }

    #[test]
    fn open_read_top_level_channel_needs_no_membership() {
        let user = Uuid::now_v7();
        let mut ch = channel(ChannelKind::Text);
        ch.can_read = true;
        assert!(can_read(user, Role::User, &[], &ch, None, Utc::now()).is_ok());

        // Sub-channels are never open-read.
        ch.parent_channel_id = Some(Uuid::now_v7());
        assert!(can_read(user, Role::User, &[], &ch, None, Utc::now()).is_err());
    }

    #[test]
    fn open_read_still_blocks_live_bans() {
        let user = Uuid::now_v7();
        let mut ch = channel(ChannelKind::Text);
        ch.can_read = true;
        let mut m = membership(user, ch.id, MembershipStatus::Banned);
        m.ban_expires_at = Some(Utc::now() + Duration::hours(1));
        assert!(can_read(user, Role::User, &[], &ch, Some(&m), Utc::now()).is_err());
    }

    #[test]
    fn membership_gated_read_requires_approval() {
        let user = Uuid::now_v7();
        let ch = channel(ChannelKind::Text);
        let now = Utc::now();
        assert!(matches!(
            can_read(user, Role::User, &[], &ch, None, now).unwrap_err(),
            CampusError::NotMember
        ));

        let m = membership(user, ch.id, MembershipStatus::Approved);
        assert!(can_read(user, Role::User, &[], &ch, Some(&m), now).is_ok());
    }

    #[test]
    fn stored_global_grant_counts_on_every_channel() {
        let user = Uuid::now_v7();
        let ch = channel(ChannelKind::Announcement);
        let m = membership(user, ch.id, MembershipStatus::Approved);
        let now = Utc::now();

        // Plain member: announcement channels reject the write.
        assert!(can_write(user, Role::User, &[], &ch, Some(&m), now).is_err());

        // A global grant row from the role store, no token claim.
        let grants = vec![global_grant(user, Role::Moderator)];
        assert_eq!(role_of(user, Role::User, &grants, &ch), Role::Moderator);
        assert!(can_write(user, Role::User, &grants, &ch, Some(&m), now).is_ok());
    }

    #[test]
    fn stored_global_admin_bypasses_like_a_token_admin() {
        let user = Uuid::now_v7();
        let mut ch = channel(ChannelKind::Readonly);
        ch.is_active = false;
        let now = Utc::now();

        let grants = vec![global_grant(user, Role::Admin)];
        // No membership row at all, channel disabled — still passes.
        assert!(can_write(user, Role::User, &grants, &ch, None, now).is_ok());
        assert!(can_read(user, Role::User, &grants, &ch, None, now).is_ok());
    }

    #[test]
    fn open_read_join_confers_no_write_standing() {
        let user = Uuid::now_v7();
        let mut ch = channel(ChannelKind::Text);
        ch.can_read = true;
        let now = Utc::now();

        // Readable without a membership row, but typing/sending is not.
        assert!(can_read(user, Role::User, &[], &ch, None, now).is_ok());
        assert!(matches!(
            can_write(user, Role::User, &[], &ch, None, now).unwrap_err(),
            CampusError::NotMember
        ));
    }

    #[test]
    fn global_role_outranks_channel_role() {
        let user = Uuid::now_v7();
        let ch = channel(ChannelKind::Text);
        let grants = vec![channel_grant(user, ch.id, Role::Moderator)];
        assert_eq!(role_of(user, Role::Admin, &grants, &ch), Role::Admin);
        assert_eq!(role_of(user, Role::User, &grants, &ch), Role::Moderator);
        assert_eq!(role_of(user, Role::User, &[], &ch), Role::User);
    }
}
