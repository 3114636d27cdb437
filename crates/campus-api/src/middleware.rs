//! Middleware — authentication extraction and the general rate-limit gate.

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use campus_common::error::CampusError;
use campus_common::models::role::Role;
use std::sync::Arc;

use crate::AppState;
use crate::limiter::{self, RateScope};

/// Authentication context extracted from the Authorization header.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: uuid::Uuid,
    pub display_name: String,
    pub global_role: Role,
}

impl AuthContext {
    /// Whether the caller holds global staff rank.
    pub fn is_global_staff(&self) -> bool {
        self.global_role.is_at_least(Role::Moderator)
    }
}

/// Extract and validate the JWT from the Authorization: Bearer <token> header.
pub async fn auth_middleware(mut request: Request, next: Next) -> Result<Response, CampusError> {
    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(CampusError::Unauthorized)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(CampusError::Unauthorized)?;

    let config = campus_common::config::get();
    let claims = campus_common::auth::validate_token(token, &config.auth.jwt_secret)
        .map_err(|_| CampusError::InvalidToken)?;

    let user_id = claims
        .sub
        .parse::<uuid::Uuid>()
        .map_err(|_| CampusError::InvalidToken)?;

    let auth_ctx = AuthContext {
        user_id,
        display_name: claims.display_name,
        global_role: claims.global_role,
    };

    // Insert auth context into request extensions for handlers to use
    request.extensions_mut().insert(auth_ctx);

    Ok(next.run(request).await)
}

/// General-scope rate limiting for all API traffic.
///
/// Runs outside the auth layer, so the identity is the forwarded client
/// address, not the user. Fails open when the counting store is down.
pub async fn rate_limit_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, CampusError> {
    let identity = client_identity(request.headers());
    limiter::check(&state.db, RateScope::General, &identity).await?;

    Ok(next.run(request).await)
}

/// Rate-limit identity: the first forwarded client address, or one shared
/// anonymous bucket when the proxy header is absent.
fn client_identity(headers: &axum::http::HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|ip| ip.trim().to_string())
        .unwrap_or_else(|| "anonymous".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderMap;

    #[test]
    fn identity_uses_first_forwarded_address() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "203.0.113.9, 10.0.0.1".parse().unwrap());
        assert_eq!(client_identity(&headers), "203.0.113.9");
    }

    #[test]
    fn identity_falls_back_to_a_shared_bucket() {
        assert_eq!(client_identity(&HeaderMap::new()), "anonymous");
    }
}
