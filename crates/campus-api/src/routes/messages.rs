//! Message routes — history, REST sends, edits, moderation deletes.

use axum::{
    Json, Router,
    extract::{Extension, Path, Query, State},
    middleware,
    routing::{delete, get, patch},
};
use campus_common::{
    error::{CampusError, CampusResult},
    id,
    models::message::{
        BulkDeleteRequest, CreateMessageRequest, Message, MessageKind, UpdateMessageRequest,
        parse_mentions,
    },
    models::role::Role,
    room_event::RoomEvent,
    validation::{validate_message_content, validate_request},
};
use campus_db::repository::messages;
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::{AppState, middleware::AuthContext};

use super::{
    authorize_read, authorize_write, effective_role, require_channel, require_global_admin,
};

/// Message routes.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/channels/{channel_id}/messages",
            get(list_messages).post(send_message),
        )
        .route("/messages/bulk", delete(bulk_delete))
        .route("/messages/{message_id}", patch(edit_message).delete(delete_message))
        .route_layer(middleware::from_fn(crate::middleware::auth_middleware))
}

#[derive(Debug, Deserialize)]
struct HistoryQuery {
    /// Exclusive cursor: return messages strictly older than this id
    before: Option<Uuid>,
    limit: Option<u32>,
}

/// GET /api/v1/channels/:channel_id/messages
async fn list_messages(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Path(channel_id): Path<Uuid>,
    Query(query): Query<HistoryQuery>,
) -> CampusResult<Json<Vec<Message>>> {
    let channel = require_channel(&state, channel_id).await?;
    authorize_read(&state, &auth, &channel).await?;

    let page_size = campus_common::config::get().limits.page_size;
    let limit = query.limit.unwrap_or(page_size).min(page_size) as i64;

    let page = messages::list_channel_messages(&state.db.pg, channel_id, query.before, limit)
        .await?;
    Ok(Json(page))
}

/// POST /api/v1/channels/:channel_id/messages
///
/// REST twin of the gateway's send frame — used by bots and tooling. Same
/// contract: persist first, then broadcast.
async fn send_message(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Path(channel_id): Path<Uuid>,
    Json(body): Json<CreateMessageRequest>,
) -> CampusResult<Json<Message>> {
    validate_request(&body)?;
    let config = campus_common::config::get();
    validate_message_content(&body.content, config.limits.max_message_length)?;

    let channel = require_channel(&state, channel_id).await?;
    authorize_write(&state, &auth, &channel).await?;

    let mut mentions = parse_mentions(&body.content);
    for id in &body.mentions {
        if !mentions.contains(id) {
            mentions.push(*id);
        }
    }

    let message = messages::create_message(
        &state.db.pg,
        id::generate_id(),
        channel_id,
        auth.user_id,
        &auth.display_name,
        &body.content,
        MessageKind::Text,
        &mentions,
        body.reply_to,
    )
    .await?;

    let event = RoomEvent::new_message(
        channel_id,
        auth.user_id,
        serde_json::to_value(&message).unwrap_or_default(),
    );
    if let Err(e) = state.backplane.publish(event).await {
        tracing::error!(message_id = %message.id, "Backplane publish failed: {e}");
    }

    Ok(Json(message))
}

/// PATCH /api/v1/messages/:message_id
///
/// Authors edit their own messages only; the conditional update enforces it.
async fn edit_message(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Path(message_id): Path<Uuid>,
    Json(body): Json<UpdateMessageRequest>,
) -> CampusResult<Json<Message>> {
    validate_request(&body)?;
    let config = campus_common::config::get();
    validate_message_content(&body.content, config.limits.max_message_length)?;

    let updated = messages::edit_message(&state.db.pg, message_id, auth.user_id, &body.content)
        .await?
        .ok_or(CampusError::NotFound {
            resource: "Message".into(),
        })?;

    Ok(Json(updated))
}

/// DELETE /api/v1/messages/:message_id
///
/// Soft delete. Allowed for the author, or a moderator of the channel.
async fn delete_message(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Path(message_id): Path<Uuid>,
) -> CampusResult<Json<serde_json::Value>> {
    let message = messages::find_by_id(&state.db.pg, message_id)
        .await?
        .ok_or(CampusError::NotFound {
            resource: "Message".into(),
        })?;

    if message.author_id != auth.user_id {
        let channel = require_channel(&state, message.channel_id).await?;
        if !effective_role(&state, &auth, &channel)
            .await?
            .is_at_least(Role::Moderator)
        {
            return Err(CampusError::MissingRole {
                role: "moderator".into(),
            });
        }
    }

    let deleted = messages::soft_delete_message(&state.db.pg, message_id).await?;
    if deleted {
        tracing::info!(message_id = %message_id, by = %auth.user_id, "Message deleted");
    }

    Ok(Json(serde_json::json!({ "deleted": deleted })))
}

/// DELETE /api/v1/messages/bulk
///
/// Hard delete — admin cleanup tooling, bypasses the soft-delete audit trail.
async fn bulk_delete(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Json(body): Json<BulkDeleteRequest>,
) -> CampusResult<Json<serde_json::Value>> {
    require_global_admin(&auth)?;
    validate_request(&body)?;

    let removed = messages::bulk_delete_messages(&state.db.pg, &body.message_ids).await?;
    tracing::info!(removed, by = %auth.user_id, "Bulk message delete");

    Ok(Json(serde_json::json!({ "deleted": removed })))
}
