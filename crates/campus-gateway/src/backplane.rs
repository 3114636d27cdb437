//! Shared publish/subscribe backplane.
//!
//! Room broadcasts never go through a purely in-process emitter: once more
//! than one gateway process serves the user base, two members of the same
//! channel can sit on different processes and still must see each other's
//! messages and typing events. Any process publishes; every subscribed
//! process delivers to its local connections.
//!
//! [`RedisBackplane`] is the production implementation (Redis PUBLISH plus a
//! pump task feeding a local broadcast channel). [`LocalBackplane`] serves
//! single-process deployments and tests.

use async_trait::async_trait;
use campus_common::room_event::RoomEvent;
use futures_util::StreamExt;
use tokio::sync::broadcast;

/// Redis channel all gateway processes publish and subscribe on.
const BACKPLANE_CHANNEL: &str = "campus.rooms";

/// Capacity of the local delivery stream per process.
const LOCAL_BUFFER: usize = 10_000;

#[async_trait]
pub trait Backplane: Send + Sync {
    /// Publish a room event to every gateway process, this one included.
    async fn publish(&self, event: RoomEvent) -> anyhow::Result<()>;

    /// Subscribe to the local delivery stream of this process.
    fn subscribe(&self) -> broadcast::Receiver<RoomEvent>;
}

/// In-process backplane: a tokio broadcast channel, nothing else.
pub struct LocalBackplane {
    tx: broadcast::Sender<RoomEvent>,
}

impl LocalBackplane {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(LOCAL_BUFFER);
        Self { tx }
    }
}

impl Default for LocalBackplane {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Backplane for LocalBackplane {
    async fn publish(&self, event: RoomEvent) -> anyhow::Result<()> {
        // No receivers is fine — nobody is connected to this process.
        let _ = self.tx.send(event);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<RoomEvent> {
        self.tx.subscribe()
    }
}

/// Redis pub/sub backplane for multi-process deployments.
pub struct RedisBackplane {
    conn: redis::aio::ConnectionManager,
    local: broadcast::Sender<RoomEvent>,
}

impl RedisBackplane {
    /// Connect and start the subscriber pump. The pump re-subscribes with a
    /// short backoff if the pub/sub connection drops.
    pub async fn connect(url: &str) -> anyhow::Result<Self> {
        let client = redis::Client::open(url)?;
        let conn = redis::aio::ConnectionManager::new(client.clone()).await?;
        let (local, _) = broadcast::channel(LOCAL_BUFFER);

        let pump_tx = local.clone();
        tokio::spawn(async move {
            loop {
                match client.get_async_pubsub().await {
                    Ok(mut pubsub) => {
                        if let Err(e) = pubsub.subscribe(BACKPLANE_CHANNEL).await {
                            tracing::warn!("Backplane subscribe failed: {e}");
                        } else {
                            tracing::info!("Backplane subscribed to {BACKPLANE_CHANNEL}");
                            let mut stream = pubsub.on_message();
                            while let Some(msg) = stream.next().await {
                                let payload: String = match msg.get_payload() {
                                    Ok(p) => p,
                                    Err(e) => {
                                        tracing::warn!("Backplane payload error: {e}");
                                        continue;
                                    }
                                };
                                match serde_json::from_str::<RoomEvent>(&payload) {
                                    Ok(event) => {
                                        let _ = pump_tx.send(event);
                                    }
                                    Err(e) => {
                                        tracing::warn!("Backplane decode error: {e}");
                                    }
                                }
                            }
                            tracing::warn!("Backplane pub/sub stream ended, reconnecting");
                        }
                    }
                    Err(e) => {
                        tracing::warn!("Backplane connection failed: {e}");
                    }
                }
                tokio::time::sleep(std::time::Duration::from_secs(1)).await;
            }
        });

        Ok(Self { conn, local })
    }
}

#[async_trait]
impl Backplane for RedisBackplane {
    async fn publish(&self, event: RoomEvent) -> anyhow::Result<()> {
        let payload = serde_json::to_string(&event)?;
        let mut conn = self.conn.clone();
        campus_db::redis_pool::publish(&mut conn, BACKPLANE_CHANNEL, &payload).await?;
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<RoomEvent> {
        // Delivery comes through the pump, so publishes from this process
        // arrive here too — exactly once.
        self.local.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[tokio::test]
    async fn local_backplane_fans_out_to_all_subscribers() {
        let bp = LocalBackplane::new();

        // Two subscribers stand in for two gateway processes sharing the bus.
        let mut rx_a = bp.subscribe();
        let mut rx_b = bp.subscribe();

        let channel_id = Uuid::now_v7();
        let author = Uuid::now_v7();
        bp.publish(RoomEvent::new_message(
            channel_id,
            author,
            serde_json::json!({"content": "hello"}),
        ))
        .await
        .unwrap();

        let got_a = rx_a.recv().await.unwrap();
        let got_b = rx_b.recv().await.unwrap();
        assert_eq!(got_a.channel_id, Some(channel_id));
        assert_eq!(got_b.channel_id, Some(channel_id));
        assert_eq!(got_a.data["content"], "hello");
        assert_eq!(got_b.data["content"], "hello");
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_not_an_error() {
        let bp = LocalBackplane::new();
        let event = RoomEvent::user_typing(Uuid::now_v7(), Uuid::now_v7(), true);
        assert!(bp.publish(event).await.is_ok());
    }
}
