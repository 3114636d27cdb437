//! Redis helpers — rate-limit counters and backplane publishing.

use redis::AsyncCommands;
use redis::aio::ConnectionManager;

/// Publish to a Redis channel (cross-process room event distribution).
pub async fn publish(
    conn: &mut ConnectionManager,
    channel: &str,
    message: &str,
) -> Result<(), redis::RedisError> {
    conn.publish(channel, message).await
}

/// Increment a counter, setting the expiry on first hit (rate limiting).
pub async fn incr_expire(
    conn: &mut ConnectionManager,
    key: &str,
    ttl_secs: u64,
) -> Result<i64, redis::RedisError> {
    let count: i64 = conn.incr(key, 1).await?;
    if count == 1 {
        let _: () = conn.expire(key, ttl_secs as i64).await?;
    }
    Ok(count)
}
