//! Role administration routes — grant and revoke elevated permissions.

use axum::{
    Json, Router,
    extract::{Extension, Path, State},
    middleware,
    routing::{get, post},
};
use campus_common::{
    error::CampusResult,
    models::role::{BulkGrantRequest, GrantRoleRequest, RevokeRoleRequest, Role, RoleGrant},
    room_event::RoomEvent,
    validation::validate_request,
};
use campus_db::repository::roles;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::{AppState, middleware::AuthContext};

use super::require_global_admin;

/// Role routes.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/user-roles", post(grant_role).delete(revoke_role))
        .route("/user-roles/bulk", post(bulk_grant))
        .route("/user-roles/{user_id}", get(list_roles))
        .route_layer(middleware::from_fn(crate::middleware::auth_middleware))
}

/// POST /api/v1/user-roles — grant a role, globally or on one channel.
async fn grant_role(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Json(body): Json<GrantRoleRequest>,
) -> CampusResult<Json<serde_json::Value>> {
    require_global_admin(&auth)?;
    validate_request(&body)?;

    let created = apply_grant(&state, auth.user_id, &body).await?;
    Ok(Json(serde_json::json!({ "granted": created })))
}

/// DELETE /api/v1/user-roles — revoke a role.
async fn revoke_role(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Json(body): Json<RevokeRoleRequest>,
) -> CampusResult<Json<serde_json::Value>> {
    require_global_admin(&auth)?;
    validate_request(&body)?;

    let removed = roles::revoke(&state.db.pg, body.user_id, body.channel_id, body.role).await?;
    if removed {
        tracing::info!(user_id = %body.user_id, role = ?body.role,
            channel = ?body.channel_id, by = %auth.user_id, "Role revoked");
        notify_role_change(&state, body.user_id, body.channel_id).await;
    }

    Ok(Json(serde_json::json!({ "revoked": removed })))
}

#[derive(Debug, Serialize)]
struct BulkGrantOutcome {
    user_id: Uuid,
    role: Role,
    granted: bool,
}

/// POST /api/v1/user-roles/bulk — many grants in one call.
async fn bulk_grant(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Json(body): Json<BulkGrantRequest>,
) -> CampusResult<Json<Vec<BulkGrantOutcome>>> {
    require_global_admin(&auth)?;
    validate_request(&body)?;

    let mut outcomes = Vec::with_capacity(body.items.len());
    for item in &body.items {
        let granted = apply_grant(&state, auth.user_id, item).await?;
        outcomes.push(BulkGrantOutcome {
            user_id: item.user_id,
            role: item.role,
            granted,
        });
    }

    Ok(Json(outcomes))
}

/// GET /api/v1/users/:user_id/roles — callers see their own grants;
/// global staff see anyone's.
async fn list_roles(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
) -> CampusResult<Json<Vec<RoleGrant>>> {
    if user_id != auth.user_id && !auth.is_global_staff() {
        return Err(campus_common::error::CampusError::MissingRole {
            role: "moderator".into(),
        });
    }
    let grants = roles::list_for_user(&state.db.pg, user_id).await?;
    Ok(Json(grants))
}

/// Insert the grant and notify the affected user. Duplicate grants are a
/// quiet no-op (the unique index catches them), reported as `granted: false`.
async fn apply_grant(
    state: &AppState,
    actor: Uuid,
    req: &GrantRoleRequest,
) -> CampusResult<bool> {
    let created = roles::grant(&state.db.pg, req.user_id, req.channel_id, req.role, actor).await?;
    if created {
        tracing::info!(user_id = %req.user_id, role = ?req.role,
            channel = ?req.channel_id, by = %actor, "Role granted");
        notify_role_change(state, req.user_id, req.channel_id).await;
    }
    Ok(created)
}

/// Push a "refresh your permissions" nudge to the affected user's live
/// connections. Deliberately carries no role data.
async fn notify_role_change(state: &AppState, user_id: Uuid, channel_id: Option<Uuid>) {
    let event = RoomEvent::role_updated(user_id, channel_id);
    if let Err(e) = state.backplane.publish(event).await {
        tracing::error!(%user_id, "Role change publish failed: {e}");
    }
}
