//! Axum upgrade handler for the real-time in-app transport. Unlike a
//! connect-time-authenticated socket, a client here connects anonymously and
//! must send an `authenticate` frame before anything else is accepted.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    extract::State,
    response::IntoResponse,
};
use chrono::Duration;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use uuid::Uuid;

use crate::domain::mirror::MirrorSummary;
use crate::domain::tracking::DeliveryHistoryEntry;
use crate::metrics::WsMessageMetrics;
use crate::metrics::{WS_CONNECTIONS_CLOSED, WS_CONNECTIONS_OPENED, WS_CONNECTION_DURATION};
use crate::queue::ChannelFamily;
use crate::server::AppState;

use super::connection::ConnectionHandle;
use super::message::{ClientMessage, OutboundMessage, ServerMessage};

/// Grace period a freshly-opened connection has to send `authenticate`
/// before it is dropped.
const AUTH_TIMEOUT: StdDuration = StdDuration::from_secs(10);

#[derive(Debug, Deserialize)]
pub struct WsQuery {}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();
    let connection_id = Uuid::new_v4();

    let user_id = match authenticate(&mut sender, &mut receiver, &state).await {
        Some(user_id) => user_id,
        None => return,
    };

    let (tx, mut rx) = tokio::sync::mpsc::channel::<OutboundMessage>(128);
    let handle = Arc::new(ConnectionHandle::new(connection_id, user_id.clone(), tx));

    if let Some(previous) = state.connection_manager.register(handle.clone()) {
        let _ = previous
            .send(OutboundMessage::Typed(ServerMessage::AuthError {
                message: "replaced by a new session".to_string(),
            }))
            .await;
    }

    WS_CONNECTIONS_OPENED.inc();
    let connected_at = std::time::Instant::now();

    if state.session_store.is_enabled() {
        let session = crate::cluster::SessionInfo {
            connection_id,
            user_id: user_id.clone(),
            tenant_id: String::new(),
            server_id: state.session_store.server_id().to_string(),
            connected_at: chrono::Utc::now().timestamp(),
            channels: vec![],
        };
        if let Err(e) = state.session_store.register_session(&session).await {
            tracing::warn!(error = %e, "failed to register cluster session");
        }
    }

    flush_pending(&handle, &state, &user_id).await;

    let send_task = {
        let handle = handle.clone();
        tokio::spawn(async move {
            while let Some(msg) = rx.recv().await {
                let text = match msg.into_text() {
                    Ok(t) => t,
                    Err(e) => {
                        tracing::warn!(error = %e, "failed to serialize outbound socket message");
                        continue;
                    }
                };
                if sender.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
            let _ = handle;
        })
    };

    while let Some(Ok(msg)) = receiver.next().await {
        handle.touch();
        match msg {
            Message::Text(text) => handle_client_message(&text, &handle, &state).await,
            Message::Ping(_) | Message::Pong(_) => {}
            Message::Close(_) => break,
            Message::Binary(_) => {}
        }
    }

    send_task.abort();
    state.connection_manager.unregister(connection_id);
    if state.session_store.is_enabled() {
        let _ = state.session_store.unregister_session(connection_id).await;
    }
    WS_CONNECTIONS_CLOSED.inc();
    WS_CONNECTION_DURATION.observe(connected_at.elapsed().as_secs_f64());
}

/// Reads frames until an `authenticate` message validates, or `AUTH_TIMEOUT`
/// elapses, whichever comes first.
async fn authenticate(
    sender: &mut futures::stream::SplitSink<WebSocket, Message>,
    receiver: &mut futures::stream::SplitStream<WebSocket>,
    state: &AppState,
) -> Option<String> {
    let deadline = tokio::time::sleep(AUTH_TIMEOUT);
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = &mut deadline => {
                return None;
            }
            frame = receiver.next() => {
                let Some(Ok(Message::Text(text))) = frame else {
                    return None;
                };
                let Ok(ClientMessage::Authenticate { user_id, session_token }) =
                    serde_json::from_str::<ClientMessage>(&text)
                else {
                    continue;
                };

                match state.jwt_validator.validate(&session_token) {
                    Ok(claims) if claims.user_id() == user_id => {
                        let reply = ServerMessage::AuthSuccess { user_id: user_id.clone() };
                        if send_one(sender, &reply).await.is_err() {
                            return None;
                        }
                        return Some(user_id);
                    }
                    _ => {
                        let reply = ServerMessage::AuthError {
                            message: "invalid session token".to_string(),
                        };
                        let _ = send_one(sender, &reply).await;
                    }
                }
            }
        }
    }
}

async fn send_one(
    sender: &mut futures::stream::SplitSink<WebSocket, Message>,
    msg: &ServerMessage,
) -> Result<(), axum::Error> {
    let text = msg.to_json().unwrap_or_default();
    sender.send(Message::Text(text.into())).await
}

async fn handle_client_message(text: &str, handle: &Arc<ConnectionHandle>, state: &AppState) {
    let Ok(msg) = serde_json::from_str::<ClientMessage>(text) else {
        return;
    };

    match msg {
        ClientMessage::Authenticate { .. } => {
            // Already authenticated; a second attempt is a no-op.
        }
        ClientMessage::Ack {
            notification_id,
            received,
        } => {
            WsMessageMetrics::record_received("notification:ack");
            crate::metrics::AckMetrics::record_received();
            tracing::debug!(%notification_id, received, "client acknowledged notification");
        }
        ClientMessage::MarkRead { notification_ids } => {
            WsMessageMetrics::record_received("notification:markRead");
            if let Err(e) = state
                .store
                .mark_read(&handle.user_id, &notification_ids)
                .await
            {
                tracing::warn!(error = %e, "failed to mark notifications read");
            }
            let _ = handle
                .send(OutboundMessage::Typed(ServerMessage::MarkedRead {
                    notification_ids,
                }))
                .await;
        }
        ClientMessage::Ping => {
            WsMessageMetrics::record_received("ping");
            let _ = handle.send(OutboundMessage::Typed(ServerMessage::Pong)).await;
        }
    }
}

/// On-connect flush: deliver every still-pending in-app notification for
/// this user that arrived while they were offline.
async fn flush_pending(handle: &Arc<ConnectionHandle>, state: &AppState, user_id: &str) {
    match state.store.pending_for_user(user_id).await {
        Ok(pending) => {
            for mut notification in pending {
                let envelope = super::message::PushEnvelope {
                    id: notification.id,
                    event_type: notification.event_type.as_str().to_string(),
                    title: notification.title.clone(),
                    message: notification.message.clone(),
                    data: notification.data.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
                    timestamp: notification.created_at,
                    priority: notification.priority,
                };
                if handle
                    .send(OutboundMessage::Typed(ServerMessage::Notification(envelope)))
                    .await
                    .is_err()
                {
                    break;
                }

                let now = chrono::Utc::now();
                let socket_id = handle.id.to_string();
                notification.mark_delivered(socket_id.clone(), now);
                notification.delivery_history.push(DeliveryHistoryEntry {
                    attempt: notification.attempts,
                    timestamp: now,
                    status: "delivered".to_string(),
                    socket_id: Some(socket_id),
                    delivery_method: "flush_on_connect".to_string(),
                    queue: notification.current_queue_name.clone(),
                });
                if let Err(e) = state.store.update_in_app(&notification).await {
                    tracing::error!(error = %e, tracking_id = %notification.id, "failed to persist in-app record delivered via connect-flush");
                }

                let summary = MirrorSummary {
                    status: "delivered".to_string(),
                    attempts: notification.attempts,
                    last_attempt_at: Some(now),
                    delivered_at: Some(now),
                    failed_at: None,
                    failure_reason: None,
                    queue_job_id: Some(notification.current_queue_name.clone()),
                    notification_id: Some(notification.id),
                    delivery_history: notification.delivery_history.clone(),
                };
                if let Err(e) = state
                    .store
                    .upsert_mirror(
                        crate::workers::mirror_entity_type(ChannelFamily::InApp),
                        &notification.id.to_string(),
                        &summary,
                    )
                    .await
                {
                    tracing::warn!(error = %e, tracking_id = %notification.id, "failed to update in-app mirror summary after connect-flush");
                }
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, user_id = %user_id, "failed to load pending in-app notifications on connect");
        }
    }
}

#[allow(unused)]
fn _assert_duration_is_chrono(_: Duration) {}
