//! # campus-gateway
//!
//! Real-time WebSocket gateway for Campus. Handles:
//! - Client connections with authentication
//! - Channel rooms (join/leave, disconnect cleanup)
//! - Message sends with per-frame acks
//! - Typing indicators
//! - Cross-process fan-out via the pub/sub backplane
//!
//! A send is validate → persist → publish: the message is durably appended
//! before anything reaches the backplane, so no other user ever sees a
//! message that wasn't persisted.

pub mod backplane;
pub mod rooms;

use axum::{
    Router,
    extract::{
        State, WebSocketUpgrade,
        ws::{Message as WsMessage, WebSocket},
    },
    response::Response,
    routing::get,
};
use backplane::Backplane;
use campus_common::access;
use campus_common::error::{CampusError, CampusResult};
use campus_common::models::message::{Message, MessageKind, parse_mentions};
use campus_common::models::role::Role;
use campus_common::room_event::RoomEvent;
use campus_common::validation::validate_message_content;
use campus_db::repository::{channels, memberships, messages, roles};
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use rooms::RoomRegistry;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Gateway state shared by every connection on this process.
#[derive(Clone)]
pub struct GatewayState {
    pub db: campus_db::Database,
    /// Shared pub/sub backplane — all room broadcasts go through it so
    /// members connected to other processes see them too.
    pub backplane: Arc<dyn Backplane>,
    pub rooms: Arc<RoomRegistry>,
}

impl GatewayState {
    pub fn new(db: campus_db::Database, backplane: Arc<dyn Backplane>) -> Self {
        Self {
            db,
            backplane,
            rooms: Arc::new(RoomRegistry::new()),
        }
    }
}

/// Client → server frames.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", content = "d")]
pub enum ClientMessage {
    /// Authenticate with a platform access token
    Identify { token: String },

    /// Keepalive ping
    Heartbeat { timestamp: i64 },

    /// Ask to join a channel room (can_read is checked)
    JoinChannel { channel_id: Uuid },

    /// Leave a channel room (always succeeds)
    LeaveChannel { channel_id: Uuid },

    /// Send a message (can_write is checked; acked either way)
    SendMessage {
        channel_id: Uuid,
        content: String,
        reply_to: Option<Uuid>,
        /// Echoed back in the ack so the client can match it up
        nonce: Option<String>,
    },

    /// Ephemeral typing indicator — never persisted
    Typing { channel_id: Uuid, is_typing: bool },
}

/// Server → client frames.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", content = "d")]
pub enum ServerMessage {
    /// Sent immediately on connect to prompt an Identify
    Hello { heartbeat_interval: u64 },

    /// Authentication accepted
    Ready { session_id: Uuid, user_id: Uuid },

    HeartbeatAck { timestamp: i64 },

    /// Token rejected — client must re-identify
    InvalidSession,

    Joined { channel_id: Uuid, room_size: usize },

    Left { channel_id: Uuid },

    /// Send succeeded; carries the persisted message
    MessageAck {
        nonce: Option<String>,
        message: Message,
    },

    /// A request failed; `code` matches the REST error codes
    Error {
        code: String,
        message: String,
        nonce: Option<String>,
    },

    /// A room or user-targeted event (NEW_MESSAGE, USER_TYPING, ...)
    Dispatch {
        event: String,
        data: serde_json::Value,
    },
}

/// Build the gateway WebSocket router.
pub fn build_router(state: GatewayState) -> Router {
    Router::new()
        .route("/gateway", get(ws_handler))
        .with_state(Arc::new(state))
}

/// WebSocket upgrade handler.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<GatewayState>>) -> Response {
    ws.on_upgrade(move |socket| handle_connection(socket, state))
}

/// Authenticated identity of a connection.
#[derive(Debug, Clone)]
struct ConnUser {
    id: Uuid,
    display_name: String,
    global_role: Role,
}

/// Handle a single WebSocket connection.
async fn handle_connection(socket: WebSocket, state: Arc<GatewayState>) {
    let (mut sender, mut receiver) = socket.split();

    let connection_id = Uuid::new_v4();

    // Direct-send channel: receive loop → sender task (acks, Ready, errors)
    let (direct_tx, mut direct_rx) = tokio::sync::mpsc::channel::<ServerMessage>(64);

    // Shared mutable state accessed by both the sender task and the receive loop
    let joined: Arc<RwLock<HashSet<Uuid>>> = Arc::new(RwLock::new(HashSet::new()));
    let authed_user_id: Arc<RwLock<Option<Uuid>>> = Arc::new(RwLock::new(None));

    // Subscribe to the backplane BEFORE spawning tasks so we don't miss events
    let mut events_rx = state.backplane.subscribe();

    let hello = ServerMessage::Hello {
        heartbeat_interval: 45_000,
    };
    if sender
        .send(WsMessage::Text(
            serde_json::to_string(&hello).unwrap().into(),
        ))
        .await
        .is_err()
    {
        return;
    }

    // ── Sender task ──────────────────────────────────────────────────────────
    // Merges backplane events (filtered to this connection's rooms / user)
    // and direct frames onto the single WebSocket sender.
    let joined_clone = joined.clone();
    let uid_clone = authed_user_id.clone();

    let send_task = tokio::spawn(async move {
        loop {
            tokio::select! {
                Ok(event) = events_rx.recv() => {
                    // Only forward events after the client has identified
                    let uid = *uid_clone.read().await;
                    let Some(uid) = uid else { continue };

                    let forward = match event.channel_id {
                        Some(channel_id) => joined_clone.read().await.contains(&channel_id),
                        // User-targeted events (ROLE_UPDATED) need no room
                        None => event.user_id == Some(uid),
                    };
                    if !forward {
                        continue;
                    }

                    let wire = ServerMessage::Dispatch {
                        event: event.event_type,
                        data: event.data,
                    };
                    if sender
                        .send(WsMessage::Text(serde_json::to_string(&wire).unwrap().into()))
                        .await
                        .is_err()
                    {
                        break;
                    }
                }
                Some(direct) = direct_rx.recv() => {
                    if sender
                        .send(WsMessage::Text(serde_json::to_string(&direct).unwrap().into()))
                        .await
                        .is_err()
                    {
                        break;
                    }
                }
                else => break,
            }
        }
    });

    // ── Receive loop ─────────────────────────────────────────────────────────
    let mut user: Option<ConnUser> = None;

    while let Some(Ok(msg)) = receiver.next().await {
        match msg {
            WsMessage::Text(text) => {
                let Ok(frame) = serde_json::from_str::<ClientMessage>(&text) else {
                    continue;
                };
                match frame {
                    ClientMessage::Identify { token } => {
                        let config = campus_common::config::get();
                        match campus_common::auth::validate_token(&token, &config.auth.jwt_secret)
                        {
                            Ok(claims) => {
                                let Ok(uid) = claims.sub.parse::<Uuid>() else {
                                    let _ = direct_tx.send(ServerMessage::InvalidSession).await;
                                    continue;
                                };
                                user = Some(ConnUser {
                                    id: uid,
                                    display_name: claims.display_name,
                                    global_role: claims.global_role,
                                });
                                *authed_user_id.write().await = Some(uid);

                                let _ = direct_tx
                                    .send(ServerMessage::Ready {
                                        session_id: connection_id,
                                        user_id: uid,
                                    })
                                    .await;

                                tracing::info!(connection = %connection_id, user = %uid,
                                    "Gateway READY sent");
                            }
                            Err(_) => {
                                let _ = direct_tx.send(ServerMessage::InvalidSession).await;
                            }
                        }
                    }

                    ClientMessage::Heartbeat { timestamp } => {
                        let _ = direct_tx.send(ServerMessage::HeartbeatAck { timestamp }).await;
                    }

                    ClientMessage::JoinChannel { channel_id } => {
                        let Some(user) = &user else {
                            let _ = direct_tx.send(ServerMessage::InvalidSession).await;
                            continue;
                        };
                        match authorize_read(&state, user, channel_id).await {
                            Ok(()) => {
                                state.rooms.join(connection_id, channel_id).await;
                                joined.write().await.insert(channel_id);
                                let room_size = state.rooms.room_size(channel_id).await;
                                let _ = direct_tx
                                    .send(ServerMessage::Joined {
                                        channel_id,
                                        room_size,
                                    })
                                    .await;
                            }
                            Err(e) => {
                                let _ = direct_tx.send(error_frame(&e, None)).await;
                            }
                        }
                    }

                    ClientMessage::LeaveChannel { channel_id } => {
                        state.rooms.leave(connection_id, channel_id).await;
                        joined.write().await.remove(&channel_id);
                        let _ = direct_tx.send(ServerMessage::Left { channel_id }).await;
                    }

                    ClientMessage::SendMessage {
                        channel_id,
                        content,
                        reply_to,
                        nonce,
                    } => {
                        let Some(user) = &user else {
                            let _ = direct_tx.send(ServerMessage::InvalidSession).await;
                            continue;
                        };
                        match persist_message(&state, user, channel_id, &content, reply_to).await
                        {
                            Ok(message) => {
                                // Persisted first; only now does anyone else see it.
                                let event = RoomEvent::new_message(
                                    channel_id,
                                    user.id,
                                    serde_json::to_value(&message).unwrap_or_default(),
                                );
                                if let Err(e) = state.backplane.publish(event).await {
                                    tracing::error!(message_id = %message.id,
                                        "Backplane publish failed: {e}");
                                }
                                let _ = direct_tx
                                    .send(ServerMessage::MessageAck { nonce, message })
                                    .await;
                            }
                            Err(e) => {
                                let _ = direct_tx.send(error_frame(&e, nonce)).await;
                            }
                        }
                    }

                    ClientMessage::Typing {
                        channel_id,
                        is_typing,
                    } => {
                        let Some(user) = &user else { continue };
                        if !state.rooms.is_joined(connection_id, channel_id).await {
                            continue;
                        }
                        // Room presence is not standing: open-read rooms can
                        // be joined without a membership row. Typing needs
                        // the same standing as sending; best-effort, so a
                        // denial just drops the frame.
                        if authorize_write(&state, user, channel_id).await.is_err() {
                            continue;
                        }
                        let event = RoomEvent::user_typing(channel_id, user.id, is_typing);
                        if let Err(e) = state.backplane.publish(event).await {
                            tracing::debug!("Typing publish failed: {e}");
                        }
                    }
                }
            }
            WsMessage::Close(_) => break,
            _ => {}
        }
    }

    // ── Cleanup ──────────────────────────────────────────────────────────────
    state.rooms.disconnect(connection_id).await;
    send_task.abort();
    tracing::info!(connection = %connection_id, "Client disconnected from gateway");
}

/// can_read check against live store state.
async fn authorize_read(
    state: &GatewayState,
    user: &ConnUser,
    channel_id: Uuid,
) -> CampusResult<()> {
    let channel = channels::find_by_id(&state.db.pg, channel_id)
        .await?
        .ok_or(CampusError::NotFound {
            resource: "Channel".into(),
        })?;
    let membership = memberships::find(&state.db.pg, user.id, channel_id).await?;
    let grants = roles::list_for_user(&state.db.pg, user.id).await?;
    access::can_read(
        user.id,
        user.global_role,
        &grants,
        &channel,
        membership.as_ref(),
        Utc::now(),
    )
}

/// can_write check against live store state.
async fn authorize_write(
    state: &GatewayState,
    user: &ConnUser,
    channel_id: Uuid,
) -> CampusResult<()> {
    let channel = channels::find_by_id(&state.db.pg, channel_id)
        .await?
        .ok_or(CampusError::NotFound {
            resource: "Channel".into(),
        })?;
    let membership = memberships::find(&state.db.pg, user.id, channel_id).await?;
    let grants = roles::list_for_user(&state.db.pg, user.id).await?;
    access::can_write(
        user.id,
        user.global_role,
        &grants,
        &channel,
        membership.as_ref(),
        Utc::now(),
    )
}

/// Validate and durably append a message. Returns the persisted row.
async fn persist_message(
    state: &GatewayState,
    user: &ConnUser,
    channel_id: Uuid,
    content: &str,
    reply_to: Option<Uuid>,
) -> CampusResult<Message> {
    let config = campus_common::config::get();
    validate_message_content(content, config.limits.max_message_length)?;

    authorize_write(state, user, channel_id).await?;

    let mentions = parse_mentions(content);
    let message = messages::create_message(
        &state.db.pg,
        campus_common::id::generate_id(),
        channel_id,
        user.id,
        &user.display_name,
        content,
        MessageKind::Text,
        &mentions,
        reply_to,
    )
    .await?;

    tracing::debug!(message_id = %message.id, channel_id = %channel_id,
        author = %user.id, "Message persisted");
    Ok(message)
}

/// Convert an error into a wire frame without leaking internals.
fn error_frame(err: &CampusError, nonce: Option<String>) -> ServerMessage {
    let message = match err {
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
    ServerMessage::Error {
        code: err.error_code().to_string(),
        message,
        nonce,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_frames_round_trip() {
        let channel_id = Uuid::now_v7();
        let frame = ClientMessage::SendMessage {
            channel_id,
            content: "hello".into(),
            reply_to: None,
            nonce: Some("n1".into()),
        };
        let wire = serde_json::to_string(&frame).unwrap();
        assert!(wire.contains("\"op\":\"SendMessage\""));
        let back: ClientMessage = serde_json::from_str(&wire).unwrap();
        match back {
            ClientMessage::SendMessage {
                channel_id: c,
                content,
                nonce,
                ..
            } => {
                assert_eq!(c, channel_id);
                assert_eq!(content, "hello");
                assert_eq!(nonce.as_deref(), Some("n1"));
            }
            other => panic!("unexpected frame: {other:?}"),
        }
    }

    #[test]
    fn join_frame_parses_from_raw_json() {
        let channel_id = Uuid::now_v7();
        let raw = format!(r#"{{"op":"JoinChannel","d":{{"channel_id":"{channel_id}"}}}}"#);
        let frame: ClientMessage = serde_json::from_str(&raw).unwrap();
        assert!(matches!(frame, ClientMessage::JoinChannel { channel_id: c } if c == channel_id));
    }

    #[test]
    fn error_frame_hides_internal_details() {
        let err = CampusError::Internal(anyhow::anyhow!("secret connection string"));
        let frame = error_frame(&err, None);
        match frame {
            ServerMessage::Error { code, message, .. } => {
                assert_eq!(code, "INTERNAL_ERROR");
                assert!(!message.contains("secret"));
            }
            other => panic!("unexpected frame: {other:?}"),
        }
    }

    #[test]
    fn error_frame_carries_ban_code_and_nonce() {
        let err = CampusError::Banned {
            reason: Some("spam".into()),
            expires_at: None,
        };
        let frame = error_frame(&err, Some("n7".into()));
        match frame {
            ServerMessage::Error { code, nonce, .. } => {
                assert_eq!(code, "BANNED");
                assert_eq!(nonce.as_deref(), Some("n7"));
            }
            other => panic!("unexpected frame: {other:?}"),
        }
    }
}
