//! Centralized error types for Campus.
//!
//! Uses `thiserror` for ergonomic error definitions and provides HTTP-friendly
//! error variants that can be directly converted to API responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Core application error type used across all Campus services.
#[derive(Debug, thiserror::Error)]
pub enum CampusError {
    // === Auth errors ===
    #[error("Invalid token")]
    InvalidToken,

    #[error("Unauthorized")]
    Unauthorized,

    // === Resource errors ===
    #[error("{resource} not found")]
    NotFound { resource: String },

    #[error("{resource} already exists")]
    AlreadyExists { resource: String },

    /// A conditional write found the row in a different state than expected
    /// (e.g. simultaneous approve + ban on the same membership).
    #[error("Conflicting update: {message}")]
    Conflict { message: String },

    // === Validation errors ===
    #[error("Validation failed: {message}")]
    Validation { message: String },

    // === Authorization errors (membership / role) ===
    #[error("Not a member of this channel")]
    NotMember,

    #[error("Membership request is still pending")]
    MembershipPending,

    #[error("Membership request was denied")]
    MembershipDenied,

    #[error("Banned from this channel")]
    Banned {
        reason: Option<String>,
        /// None means a permanent ban (admin unban required).
        expires_at: Option<DateTime<Utc>>,
    },

    #[error("Removed from this channel")]
    Kicked,

    #[error("Channel is read-only")]
    ChannelReadOnly,

    #[error("Channel is disabled")]
    ChannelDisabled,

    #[error("Missing role: {role}")]
    MissingRole { role: String },

    // === Rate limiting ===
    #[error("Rate limited. Retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    // === Infrastructure errors ===
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// JSON error response body sent to clients.
#[derive(Serialize)]
struct ErrorResponse {
    code: u16,
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    retry_after_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ban_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ban_expires_at: Option<DateTime<Utc>>,
}

impl CampusError {
    /// Map error to HTTP status code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidToken | Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::AlreadyExists { .. } | Self::Conflict { .. } => StatusCode::CONFLICT,
            Self::Validation { .. } => StatusCode::BAD_REQUEST,
            Self::NotMember
            | Self::MembershipPending
            | Self::MembershipDenied
            | Self::Banned { .. }
            | Self::Kicked
            | Self::ChannelReadOnly
            | Self::ChannelDisabled
            | Self::MissingRole { .. } => StatusCode::FORBIDDEN,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::Database(_) | Self::Redis(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Error code string for programmatic handling by clients.
    pub fn error_code(&self) -> &str {
        match self {
            Self::InvalidToken => "INVALID_TOKEN",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::AlreadyExists { .. } => "ALREADY_EXISTS",
            Self::Conflict { .. } => "CONFLICT",
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::NotMember => "NOT_A_MEMBER",
            Self::MembershipPending => "MEMBERSHIP_PENDING",
            Self::MembershipDenied => "MEMBERSHIP_DENIED",
            Self::Banned { .. } => "BANNED",
            Self::Kicked => "KICKED",
            Self::ChannelReadOnly => "CHANNEL_READ_ONLY",
            Self::ChannelDisabled => "CHANNEL_DISABLED",
            Self::MissingRole { .. } => "MISSING_ROLE",
            Self::RateLimited { .. } => "RATE_LIMITED",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Redis(_) => "CACHE_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for CampusError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Don't leak internal details to clients
        let message = match &self {
            CampusError::Database(e) => {
                tracing::error!("Database error: {e}");
                "An internal error occurred".to_string()
            }
            CampusError::Redis(e) => {
                tracing::error!("Redis error: {e}");
                "An internal error occurred".to_string()
            }
            CampusError::Internal(e) => {
                tracing::error!("Internal error: {e}");
                "An internal error occurred".to_string()
            }
            other => other.to_string(),
        };

        let retry_after_ms = if let CampusError::RateLimited { retry_after_ms } = &self {
            Some(*retry_after_ms)
        } else {
            None
        };

        // Ban rejections carry the reason and expiry so the client can show
        // the user exactly why and until when.
        let (ban_reason, ban_expires_at) = match &self {
            CampusError::Banned { reason, expires_at } => (reason.clone(), *expires_at),
            _ => (None, None),
        };

        let body = ErrorResponse {
            code: status.as_u16(),
            error: self.error_code().to_string(),
            message,
            retry_after_ms,
            ban_reason,
            ban_expires_at,
        };

        (status, axum::Json(body)).into_response()
    }
}

/// Convenience type alias for Results using CampusError.
pub type CampusResult<T> = Result<T, CampusError>;
