//! Wire protocol for the real-time in-app transport: the inbound frames a
//! client may send after connecting, and the outbound frames the server
//! pushes in response or on delivery.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::domain::Priority;

/// Frames a connected client may send. Every connection starts unauthenticated
/// and must send `Authenticate` before anything else is accepted.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientMessage {
    Authenticate {
        user_id: String,
        session_token: String,
    },
    #[serde(rename = "notification:ack")]
    Ack {
        notification_id: Uuid,
        received: bool,
    },
    #[serde(rename = "notification:markRead")]
    MarkRead {
        notification_ids: Vec<Uuid>,
    },
    Ping,
}

/// A single in-app notification as pushed over the socket.
#[derive(Debug, Clone, Serialize)]
pub struct PushEnvelope {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub event_type: String,
    pub title: String,
    pub message: String,
    pub data: serde_json::Map<String, Value>,
    pub timestamp: DateTime<Utc>,
    pub priority: Priority,
}

/// Frames the server sends to a connected client.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerMessage {
    #[serde(rename = "auth:success")]
    AuthSuccess { user_id: String },
    #[serde(rename = "auth:error")]
    AuthError { message: String },
    #[serde(rename = "notification:new")]
    Notification(PushEnvelope),
    #[serde(rename = "notification:broadcast")]
    Broadcast(PushEnvelope),
    #[serde(rename = "notifications:markedRead")]
    MarkedRead { notification_ids: Vec<Uuid> },
    Pong,
}

impl ServerMessage {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// What actually gets pushed down a connection's outbound channel: either a
/// typed message that is serialized lazily, or a payload pre-serialized once
/// and fanned out to many recipients (a broadcast) without re-encoding per
/// connection.
#[derive(Debug, Clone)]
pub enum OutboundMessage {
    Typed(ServerMessage),
    PreSerialized(std::sync::Arc<str>),
}

impl OutboundMessage {
    pub fn into_text(self) -> Result<String, serde_json::Error> {
        match self {
            OutboundMessage::Typed(msg) => msg.to_json(),
            OutboundMessage::PreSerialized(s) => Ok(s.to_string()),
        }
    }

    pub fn pre_serialize(msg: &ServerMessage) -> Result<Self, serde_json::Error> {
        Ok(OutboundMessage::PreSerialized(std::sync::Arc::from(
            msg.to_json()?.as_str(),
        )))
    }
}

impl From<ServerMessage> for OutboundMessage {
    fn from(msg: ServerMessage) -> Self {
        OutboundMessage::Typed(msg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authenticate_deserializes_from_camel_case() {
        let raw = r#"{"type":"authenticate","userId":"u1","sessionToken":"tok"}"#;
        let msg: ClientMessage = serde_json::from_str(raw).unwrap();
        match msg {
            ClientMessage::Authenticate {
                user_id,
                session_token,
            } => {
                assert_eq!(user_id, "u1");
                assert_eq!(session_token, "tok");
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn mark_read_round_trips_ids() {
        let id = Uuid::new_v4();
        let raw = format!(
            r#"{{"type":"notification:markRead","notificationIds":["{id}"]}}"#
        );
        let msg: ClientMessage = serde_json::from_str(&raw).unwrap();
        match msg {
            ClientMessage::MarkRead { notification_ids } => {
                assert_eq!(notification_ids, vec![id]);
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn server_message_tags_match_wire_names() {
        let msg = ServerMessage::AuthError {
            message: "bad token".into(),
        };
        let json = msg.to_json().unwrap();
        assert!(json.contains(r#""type":"auth:error""#));
    }

    #[test]
    fn pre_serialized_outbound_skips_reencoding() {
        let msg = ServerMessage::Pong;
        let pre = OutboundMessage::pre_serialize(&msg).unwrap();
        let text = pre.into_text().unwrap();
        assert_eq!(text, r#"{"type":"pong"}"#);
    }
}
