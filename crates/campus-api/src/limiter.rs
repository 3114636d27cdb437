//! Fixed-window rate limiter backed by the shared Redis counter.
//!
//! The counter is keyed by (scope, client identity, window bucket) and lives
//! in the store shared by all server processes, so a client cannot dodge its
//! ceiling by spreading requests across processes. The limiter FAILS OPEN:
//! when the counting store is unreachable the request is allowed, because a
//! cache outage must never become an API outage.

use campus_common::config::RateLimitConfig;
use campus_common::error::{CampusError, CampusResult};
use campus_db::{Database, redis_pool};

/// Traffic classes with distinct ceilings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateScope {
    /// All ordinary API traffic
    General,
    /// AI-analysis endpoints — tight ceiling
    Ai,
    /// Inbound webhook delivery — moderate ceiling
    Webhook,
}

impl RateScope {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::General => "general",
            Self::Ai => "ai",
            Self::Webhook => "webhook",
        }
    }

    /// Requests allowed per window for this scope.
    pub fn ceiling(self, cfg: &RateLimitConfig) -> i64 {
        match self {
            Self::General => cfg.general_max,
            Self::Ai => cfg.ai_max,
            Self::Webhook => cfg.webhook_max,
        }
    }
}

/// Counter key for the window containing `now_secs`.
pub fn counter_key(scope: RateScope, identity: &str, now_secs: i64, window_secs: u64) -> String {
    let bucket = now_secs / window_secs.max(1) as i64;
    format!("ratelimit:{}:{identity}:{bucket}", scope.as_str())
}

/// Pure admission decision for a counter reading.
///
/// `count` is the value AFTER this request's increment, so the request that
/// lands exactly on the ceiling is still admitted.
pub fn decide(count: i64, ceiling: i64, now_secs: i64, window_secs: u64) -> CampusResult<()> {
    if count <= ceiling {
        return Ok(());
    }
    let window = window_secs.max(1) as i64;
    let remaining_secs = window - now_secs.rem_euclid(window);
    Err(CampusError::RateLimited {
        retry_after_ms: (remaining_secs as u64) * 1000,
    })
}

/// Count this request against the shared store and decide.
///
/// Without Redis configured (single-process mode) rate limiting is off.
pub async fn check(db: &Database, scope: RateScope, identity: &str) -> CampusResult<()> {
    let Some(redis) = &db.redis else {
        return Ok(());
    };
    let cfg = &campus_common::config::get().rate_limit;
    let now_secs = chrono::Utc::now().timestamp();
    let key = counter_key(scope, identity, now_secs, cfg.window_secs);

    let mut conn = redis.clone();
    match redis_pool::incr_expire(&mut conn, &key, cfg.window_secs).await {
        Ok(count) => decide(count, scope.ceiling(cfg), now_secs, cfg.window_secs),
        Err(e) => {
            // Fail open: the counting store being down is not a reason to
            // reject traffic.
            tracing::warn!(scope = scope.as_str(), "Rate limit store unavailable, failing open: {e}");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admits_up_to_and_including_the_ceiling() {
        assert!(decide(1, 5, 0, 60).is_ok());
        assert!(decide(5, 5, 0, 60).is_ok());
        assert!(decide(6, 5, 0, 60).is_err());
    }

    #[test]
    fn rejection_carries_time_to_window_end() {
        // 10 seconds into a 60-second window → 50s until reset.
        let err = decide(100, 5, 130, 60).unwrap_err();
        match err {
            CampusError::RateLimited { retry_after_ms } => assert_eq!(retry_after_ms, 50_000),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn key_changes_when_the_window_rolls_over() {
        let a = counter_key(RateScope::General, "u1", 59, 60);
        let b = counter_key(RateScope::General, "u1", 60, 60);
        assert_ne!(a, b);
        // Same window, same key.
        assert_eq!(a, counter_key(RateScope::General, "u1", 1, 60));
    }

    #[test]
    fn scopes_count_independently() {
        let general = counter_key(RateScope::General, "u1", 0, 60);
        let ai = counter_key(RateScope::Ai, "u1", 0, 60);
        assert_ne!(general, ai);
    }

    #[test]
    fn ceilings_follow_scope() {
        let cfg = RateLimitConfig {
            window_secs: 60,
            general_max: 300,
            ai_max: 10,
            webhook_max: 60,
        };
        assert_eq!(RateScope::General.ceiling(&cfg), 300);
        assert_eq!(RateScope::Ai.ceiling(&cfg), 10);
        assert_eq!(RateScope::Webhook.ceiling(&cfg), 60);
    }
}
