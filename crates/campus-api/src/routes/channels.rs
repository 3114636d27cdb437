//! Channel routes — CRUD for the channel directory.

use axum::{
    Json, Router,
    extract::{Extension, Path, State},
    middleware,
    routing::get,
};
use campus_common::{
    error::CampusResult,
    id,
    models::channel::{Channel, CreateChannelRequest, UpdateChannelRequest},
    room_event::RoomEvent,
    validation::validate_request,
};
use campus_db::repository::channels;
use std::sync::Arc;
use uuid::Uuid;

use crate::{AppState, middleware::AuthContext};

use super::{require_channel, require_channel_moderator, require_global_admin};

/// Channel routes.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/channels", get(list_channels).post(create_channel))
        .route(
            "/channels/{channel_id}",
            get(get_channel)
                .patch(update_channel)
                .delete(delete_channel),
        )
        .route("/channels/{channel_id}/sub-channels", get(list_sub_channels))
        .route_layer(middleware::from_fn(crate::middleware::auth_middleware))
}

/// GET /api/v1/channels
async fn list_channels(State(state): State<Arc<AppState>>) -> CampusResult<Json<Vec<Channel>>> {
    let channel_list = channels::list_channels(&state.db.pg).await?;
    Ok(Json(channel_list))
}

/// POST /api/v1/channels
async fn create_channel(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateChannelRequest>,
) -> CampusResult<Json<Channel>> {
    validate_request(&body)?;

    // Only global admins shape the directory by hand; sub-channels under a
    // channel the caller moderates are the one exception.
    match body.parent_channel_id {
        Some(parent_id) => {
            let parent = require_channel_moderator(&state, &auth, parent_id).await?;
            // One level of nesting only.
            if !parent.is_top_level() {
                return Err(campus_common::error::CampusError::Validation {
                    message: "Sub-channels cannot have sub-channels".into(),
                });
            }
        }
        None => require_global_admin(&auth)?,
    }

    let channel = channels::create_channel(
        &state.db.pg,
        id::generate_id(),
        &body.name,
        body.kind,
        &body.group_tag,
        body.parent_channel_id,
        body.can_message.unwrap_or(true),
        body.can_read.unwrap_or(false),
        auth.user_id,
    )
    .await?;

    tracing::info!(
        channel_id = %channel.id,
        name = %body.name,
        "Channel created"
    );

    Ok(Json(channel))
}

/// GET /api/v1/channels/:channel_id
async fn get_channel(
    State(state): State<Arc<AppState>>,
    Path(channel_id): Path<Uuid>,
) -> CampusResult<Json<Channel>> {
    Ok(Json(require_channel(&state, channel_id).await?))
}

/// GET /api/v1/channels/:channel_id/sub-channels
async fn list_sub_channels(
    State(state): State<Arc<AppState>>,
    Path(channel_id): Path<Uuid>,
) -> CampusResult<Json<Vec<Channel>>> {
    require_channel(&state, channel_id).await?;
    let subs = channels::list_sub_channels(&state.db.pg, channel_id).await?;
    Ok(Json(subs))
}

/// PATCH /api/v1/channels/:channel_id
async fn update_channel(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Path(channel_id): Path<Uuid>,
    Json(body): Json<UpdateChannelRequest>,
) -> CampusResult<Json<Channel>> {
    validate_request(&body)?;
    require_channel_moderator(&state, &auth, channel_id).await?;

    let updated = channels::update_channel(
        &state.db.pg,
        channel_id,
        body.name.as_deref(),
        body.group_tag.as_deref(),
        body.can_message,
        body.can_read,
        body.is_active,
    )
    .await?;

    // Permission flags changed: tell connected members to re-evaluate, the
    // payload deliberately carries no permission data.
    if body.changes_permissions() {
        if let Err(e) = state
            .backplane
            .publish(RoomEvent::channel_permissions_updated(channel_id))
            .await
        {
            tracing::error!(%channel_id, "Permission change publish failed: {e}");
        }
    }

    Ok(Json(updated))
}

/// DELETE /api/v1/channels/:channel_id
async fn delete_channel(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Path(channel_id): Path<Uuid>,
) -> CampusResult<Json<serde_json::Value>> {
    require_global_admin(&auth)?;
    require_channel(&state, channel_id).await?;
    channels::delete_channel(&state.db.pg, channel_id).await?;

    tracing::info!(channel_id = %channel_id, "Channel deleted");

    Ok(Json(serde_json::json!({ "deleted": true })))
}
