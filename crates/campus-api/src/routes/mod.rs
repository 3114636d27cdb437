//! API route modules.

pub mod channels;
pub mod health;
pub mod memberships;
pub mod messages;
pub mod roles;

use campus_common::error::{CampusError, CampusResult};
use campus_common::models::channel::Channel;
use campus_common::models::role::Role;
use campus_db::repository;
use uuid::Uuid;

use crate::AppState;
use crate::middleware::AuthContext;

/// Load a channel or 404.
pub(crate) async fn require_channel(state: &AppState, channel_id: Uuid) -> CampusResult<Channel> {
    repository::channels::find_by_id(&state.db.pg, channel_id)
        .await?
        .ok_or(CampusError::NotFound {
            resource: "Channel".into(),
        })
}

/// Effective role of the caller on a channel (global > channel > default).
pub(crate) async fn effective_role(
    state: &AppState,
    auth: &AuthContext,
    channel: &Channel,
) -> CampusResult<Role> {
    let grants = repository::roles::list_for_user(&state.db.pg, auth.user_id).await?;
    Ok(campus_common::access::role_of(
        auth.user_id,
        auth.global_role,
        &grants,
        channel,
    ))
}

/// Reject unless the caller moderates this channel (or is global staff).
pub(crate) async fn require_channel_moderator(
    state: &AppState,
    auth: &AuthContext,
    channel_id: Uuid,
) -> CampusResult<Channel> {
    let channel = require_channel(state, channel_id).await?;
    if !effective_role(state, auth, &channel)
        .await?
        .is_at_least(Role::Moderator)
    {
        return Err(CampusError::MissingRole {
            role: "moderator".into(),
        });
    }
    Ok(channel)
}

/// Reject unless the caller may read the channel right now.
pub(crate) async fn authorize_read(
    state: &AppState,
    auth: &AuthContext,
    channel: &Channel,
) -> CampusResult<()> {
    let membership =
        repository::memberships::find(&state.db.pg, auth.user_id, channel.id).await?;
    let grants = repository::roles::list_for_user(&state.db.pg, auth.user_id).await?;
    campus_common::access::can_read(
        auth.user_id,
        auth.global_role,
        &grants,
        channel,
        membership.as_ref(),
        chrono::Utc::now(),
    )
}

/// Reject unless the caller may write to the channel right now.
pub(crate) async fn authorize_write(
    state: &AppState,
    auth: &AuthContext,
    channel: &Channel,
) -> CampusResult<()> {
    let membership =
        repository::memberships::find(&state.db.pg, auth.user_id, channel.id).await?;
    let grants = repository::roles::list_for_user(&state.db.pg, auth.user_id).await?;
    campus_common::access::can_write(
        auth.user_id,
        auth.global_role,
        &grants,
        channel,
        membership.as_ref(),
        chrono::Utc::now(),
    )
}

/// Reject unless the caller holds the global admin role.
pub(crate) fn require_global_admin(auth: &AuthContext) -> CampusResult<()> {
    if auth.global_role != Role::Admin {
        return Err(CampusError::MissingRole {
            role: "admin".into(),
        });
    }
    Ok(())
}
