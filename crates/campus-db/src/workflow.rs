//! Membership workflow — every status mutation in the system goes through
//! these functions.
//!
//! The state machine lives in `campus_common::models::membership`; this
//! module executes it with conditional writes, runs the sub-channel
//! provisioning cascade on approval, and hosts the ban-reconciliation sweep.

use campus_common::config::ModerationConfig;
use campus_common::error::{CampusError, CampusResult};
use campus_common::id;
use campus_common::models::channel::{Channel, ChannelKind};
use campus_common::models::membership::{
    Membership, MembershipStatus, Transition, UpdateMembershipRequest,
};
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::repository::{channels, memberships};

/// A user asks to join a channel.
///
/// Fresh pair → pending. denied/kicked → back to pending. banned → rejected
/// while the ban is live; an expired ban self-heals to approved here.
pub async fn request_join(
    pool: &PgPool,
    user_id: Uuid,
    channel_id: Uuid,
) -> CampusResult<Membership> {
    let channel = require_channel(pool, channel_id).await?;

    if memberships::insert_pending(pool, user_id, channel.id).await? {
        tracing::info!(%user_id, %channel_id, "Join requested");
        return require_membership(pool, user_id, channel_id).await;
    }

    // A row already exists; its standing decides.
    let existing = require_membership(pool, user_id, channel_id).await?;
    match existing.status {
        MembershipStatus::Pending => Err(CampusError::AlreadyExists {
            resource: "Join request".into(),
        }),
        MembershipStatus::Approved => Err(CampusError::AlreadyExists {
            resource: "Membership".into(),
        }),
        MembershipStatus::Denied | MembershipStatus::Kicked => {
            if !memberships::reset_to_pending(pool, user_id, channel_id).await? {
                return Err(CampusError::Conflict {
                    message: "membership changed while re-requesting".into(),
                });
            }
            tracing::info!(%user_id, %channel_id, "Join re-requested");
            require_membership(pool, user_id, channel_id).await
        }
        MembershipStatus::Banned => {
            if existing.banned_at(Utc::now()) {
                Err(CampusError::Banned {
                    reason: existing.ban_reason.clone(),
                    expires_at: existing.ban_expires_at,
                })
            } else {
                // Ban lapsed but the sweeper hasn't run yet; reconcile now.
                memberships::unban(pool, user_id, channel_id).await?;
                require_membership(pool, user_id, channel_id).await
            }
        }
    }
}

/// Apply a moderation transition to one membership row.
pub async fn apply_transition(
    pool: &PgPool,
    cfg: &ModerationConfig,
    actor: Uuid,
    req: &UpdateMembershipRequest,
) -> CampusResult<Membership> {
    match req.transition {
        Transition::Approve => approve(pool, cfg, req.user_id, req.channel_id).await,
        Transition::Deny => deny(pool, req.user_id, req.channel_id).await,
        Transition::Ban => {
            ban(
                pool,
                req.user_id,
                req.channel_id,
                req.ban_expires_at,
                req.ban_reason.as_deref(),
                actor,
            )
            .await
        }
        Transition::Kick => kick(pool, req.user_id, req.channel_id, actor).await,
        Transition::Unban => unban(pool, req.user_id, req.channel_id).await,
    }
}

/// Approve a pending (or kicked) member. Top-level channels trigger the
/// sub-channel cascade; re-approving an already approved member is a no-op
/// and still re-runs the (idempotent) cascade.
pub async fn approve(
    pool: &PgPool,
    cfg: &ModerationConfig,
    user_id: Uuid,
    channel_id: Uuid,
) -> CampusResult<Membership> {
    let channel = require_channel(pool, channel_id).await?;

    if !memberships::approve(pool, user_id, channel_id).await? {
        let existing = require_membership(pool, user_id, channel_id).await?;
        if existing.status != MembershipStatus::Approved {
            return Err(conflict(Transition::Approve, &existing));
        }
        // Already approved: fall through to the cascade, change nothing.
    } else {
        tracing::info!(%user_id, %channel_id, "Membership approved");
    }

    if channel.is_top_level() {
        run_sub_channel_cascade(pool, cfg, user_id, &channel).await?;
    }

    require_membership(pool, user_id, channel_id).await
}

/// Deny a pending request.
pub async fn deny(pool: &PgPool, user_id: Uuid, channel_id: Uuid) -> CampusResult<Membership> {
    require_channel(pool, channel_id).await?;
    if !memberships::deny(pool, user_id, channel_id).await? {
        let existing = require_membership(pool, user_id, channel_id).await?;
        return Err(conflict(Transition::Deny, &existing));
    }
    tracing::info!(%user_id, %channel_id, "Membership denied");
    require_membership(pool, user_id, channel_id).await
}

/// Ban an approved member. `expires_at = None` is a permanent ban that only
/// an explicit unban lifts.
pub async fn ban(
    pool: &PgPool,
    user_id: Uuid,
    channel_id: Uuid,
    expires_at: Option<DateTime<Utc>>,
    reason: Option<&str>,
    banned_by: Uuid,
) -> CampusResult<Membership> {
    require_channel(pool, channel_id).await?;
    if let Some(t) = expires_at {
        if t <= Utc::now() {
            return Err(CampusError::Validation {
                message: "Ban expiry must be in the future".into(),
            });
        }
    }
    if !memberships::ban(pool, user_id, channel_id, expires_at, reason, banned_by).await? {
        let existing = require_membership(pool, user_id, channel_id).await?;
        return Err(conflict(Transition::Ban, &existing));
    }
    tracing::info!(%user_id, %channel_id, ?expires_at, "Member banned");
    require_membership(pool, user_id, channel_id).await
}

/// Kick an approved member. Kicked users may re-request membership.
pub async fn kick(
    pool: &PgPool,
    user_id: Uuid,
    channel_id: Uuid,
    kicked_by: Uuid,
) -> CampusResult<Membership> {
    require_channel(pool, channel_id).await?;
    if !memberships::kick(pool, user_id, channel_id, kicked_by).await? {
        let existing = require_membership(pool, user_id, channel_id).await?;
        return Err(conflict(Transition::Kick, &existing));
    }
    tracing::info!(%user_id, %channel_id, "Member kicked");
    require_membership(pool, user_id, channel_id).await
}

/// Lift a ban, restoring approved standing.
pub async fn unban(pool: &PgPool, user_id: Uuid, channel_id: Uuid) -> CampusResult<Membership> {
    require_channel(pool, channel_id).await?;
    if !memberships::unban(pool, user_id, channel_id).await? {
        let existing = require_membership(pool, user_id, channel_id).await?;
        return Err(conflict(Transition::Unban, &existing));
    }
    tracing::info!(%user_id, %channel_id, "Member unbanned");
    require_membership(pool, user_id, channel_id).await
}

/// Ensure the configured sub-channels exist under `parent` and that the
/// approved user has an approved row on each. Safe to re-run: existing
/// sub-channels and membership rows are left untouched.
async fn run_sub_channel_cascade(
    pool: &PgPool,
    cfg: &ModerationConfig,
    user_id: Uuid,
    parent: &Channel,
) -> CampusResult<()> {
    for name in &cfg.sub_channel_names {
        let sub = match channels::find_sub_channel(pool, parent.id, name).await? {
            Some(existing) => existing,
            None => {
                let kind = if name == "announcement" {
                    ChannelKind::Announcement
                } else {
                    ChannelKind::Text
                };
                match channels::create_channel(
                    pool,
                    id::generate_id(),
                    name,
                    kind,
                    &parent.group_tag,
                    Some(parent.id),
                    true,
                    true,
                    cfg.system_user_id,
                )
                .await
                {
                    Ok(created) => {
                        tracing::info!(parent = %parent.id, sub = %created.id, %name,
                            "Sub-channel provisioned");
                        created
                    }
                    // A concurrent cascade won the (parent, name) insert race.
                    Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                        channels::find_sub_channel(pool, parent.id, name)
                            .await?
                            .ok_or_else(|| CampusError::NotFound {
                                resource: "Sub-channel".into(),
                            })?
                    }
                    Err(e) => return Err(e.into()),
                }
            }
        };

        memberships::insert_approved_if_absent(pool, user_id, sub.id).await?;
    }
    Ok(())
}

/// Reconcile expired bans back to approved standing. Idempotent; individual
/// row failures are logged and skipped so one bad row never aborts the batch.
pub async fn sweep_expired_bans(pool: &PgPool, now: DateTime<Utc>) -> CampusResult<u64> {
    let expired = memberships::list_expired_bans(pool, now).await?;
    let total = expired.len();
    let mut swept = 0u64;

    for row in expired {
        match memberships::unban(pool, row.user_id, row.channel_id).await {
            // false: someone (admin, self-heal path) got there first — fine.
            Ok(true) => swept += 1,
            Ok(false) => {}
            Err(e) => {
                tracing::warn!(user_id = %row.user_id, channel_id = %row.channel_id,
                    "Sweep failed for row: {e}");
            }
        }
    }

    tracing::info!(candidates = total, swept, "Ban sweep complete");
    Ok(swept)
}

async fn require_channel(pool: &PgPool, channel_id: Uuid) -> CampusResult<Channel> {
    channels::find_by_id(pool, channel_id)
        .await?
        .ok_or(CampusError::NotFound {
            resource: "Channel".into(),
        })
}

async fn require_membership(
    pool: &PgPool,
    user_id: Uuid,
    channel_id: Uuid,
) -> CampusResult<Membership> {
    memberships::find(pool, user_id, channel_id)
        .await?
        .ok_or(CampusError::NotFound {
            resource: "Membership".into(),
        })
}

fn conflict(transition: Transition, existing: &Membership) -> CampusError {
    CampusError::Conflict {
        message: format!(
            "cannot apply {:?} to a membership in status {:?}",
            transition, existing.status
        ),
    }
}
