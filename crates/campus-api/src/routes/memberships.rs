//! Membership routes — join requests and moderation transitions.
//!
//! All status mutations delegate to the workflow layer; handlers here only
//! authenticate, authorize, and shape the HTTP surface.

use axum::{
    Json, Router,
    extract::{Extension, Path, State},
    middleware,
    routing::{get, post},
};
use campus_common::{
    error::{CampusError, CampusResult},
    models::membership::{
        BulkMembershipRequest, Membership, RequestJoinRequest, UpdateMembershipRequest,
    },
    room_event::RoomEvent,
    validation::validate_request,
};
use campus_db::{repository::memberships, workflow};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::{AppState, middleware::AuthContext};

use super::{require_channel, require_channel_moderator, require_global_admin};

/// Membership routes.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/user-status",
            post(request_join)
                .put(update_status)
                .delete(delete_status),
        )
        .route("/user-status/bulk", post(bulk_update_status))
        .route("/user-status/{channel_id}", get(my_status))
        .route(
            "/channels/{channel_id}/approved-users",
            get(list_approved_users),
        )
        .route_layer(middleware::from_fn(crate::middleware::auth_middleware))
}

/// POST /api/v1/user-status — the caller asks to join a channel.
async fn request_join(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Json(body): Json<RequestJoinRequest>,
) -> CampusResult<Json<Membership>> {
    validate_request(&body)?;
    let membership = workflow::request_join(&state.db.pg, auth.user_id, body.channel_id).await?;
    Ok(Json(membership))
}

/// GET /api/v1/user-status/:channel_id — the caller's own standing.
async fn my_status(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Path(channel_id): Path<Uuid>,
) -> CampusResult<Json<Membership>> {
    require_channel(&state, channel_id).await?;
    memberships::find(&state.db.pg, auth.user_id, channel_id)
        .await?
        .map(Json)
        .ok_or(CampusError::NotFound {
            resource: "Membership".into(),
        })
}

/// PUT /api/v1/user-status — apply one moderation transition.
async fn update_status(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Json(body): Json<UpdateMembershipRequest>,
) -> CampusResult<Json<Membership>> {
    validate_request(&body)?;
    require_channel_moderator(&state, &auth, body.channel_id).await?;

    let membership = apply_and_notify(&state, auth.user_id, &body).await?;
    Ok(Json(membership))
}

#[derive(Debug, Serialize)]
struct BulkItemOutcome {
    user_id: Uuid,
    channel_id: Uuid,
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// POST /api/v1/user-status/bulk — many transitions in one call.
///
/// Items are applied independently; one failure never aborts the rest.
async fn bulk_update_status(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Json(body): Json<BulkMembershipRequest>,
) -> CampusResult<Json<Vec<BulkItemOutcome>>> {
    validate_request(&body)?;

    let mut outcomes = Vec::with_capacity(body.items.len());
    for item in &body.items {
        let result = async {
            require_channel_moderator(&state, &auth, item.channel_id).await?;
            apply_and_notify(&state, auth.user_id, item).await
        }
        .await;

        outcomes.push(match result {
            Ok(_) => BulkItemOutcome {
                user_id: item.user_id,
                channel_id: item.channel_id,
                ok: true,
                error: None,
            },
            Err(e) => BulkItemOutcome {
                user_id: item.user_id,
                channel_id: item.channel_id,
                ok: false,
                error: Some(e.error_code().to_string()),
            },
        });
    }

    Ok(Json(outcomes))
}

#[derive(Debug, Deserialize)]
struct DeleteStatusRequest {
    user_id: Uuid,
    channel_id: Uuid,
}

/// DELETE /api/v1/user-status — remove a membership row entirely.
async fn delete_status(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Json(body): Json<DeleteStatusRequest>,
) -> CampusResult<Json<serde_json::Value>> {
    require_global_admin(&auth)?;
    let removed = memberships::delete(&state.db.pg, body.user_id, body.channel_id).await?;
    Ok(Json(serde_json::json!({ "deleted": removed })))
}

/// GET /api/v1/channels/:channel_id/approved-users
async fn list_approved_users(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Path(channel_id): Path<Uuid>,
) -> CampusResult<Json<Vec<Membership>>> {
    require_channel_moderator(&state, &auth, channel_id).await?;
    let approved = memberships::list_approved(&state.db.pg, channel_id).await?;
    Ok(Json(approved))
}

/// Run the transition, then nudge the affected user to re-fetch their
/// standing. The push carries no state — the client reloads from the API.
async fn apply_and_notify(
    state: &AppState,
    actor: Uuid,
    req: &UpdateMembershipRequest,
) -> CampusResult<Membership> {
    let cfg = &campus_common::config::get().moderation;
    let membership = workflow::apply_transition(&state.db.pg, cfg, actor, req).await?;

    let event = RoomEvent::role_updated(req.user_id, Some(req.channel_id));
    if let Err(e) = state.backplane.publish(event).await {
        tracing::error!(user_id = %req.user_id, channel_id = %req.channel_id,
            "Membership change publish failed: {e}");
    }

    Ok(membership)
}
