//! WebSocket message envelopes, exchanged once `/ws` has upgraded.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Client → server envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientMessage {
    pub id: String,
    pub r#type: ClientMessageKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    pub timestamp: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientMessageKind {
    Authenticate,
    Ping,
    Subscribe,
    Unsubscribe,
    MarkAsRead,
    MarkAsDelivered,
    TypingStart,
    TypingStop,
    PresenceUpdate,
    PresenceQuery,
    CallOffer,
    CallAnswer,
    CallIce,
    CallHangup,
}

/// Server → client envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerMessage {
    pub id: String,
    pub r#type: ServerMessageKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    pub timestamp: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServerMessageKind {
    ConnectionAck,
    AuthSuccess,
    AuthFailed,
    Subscribed,
    Unsubscribed,
    NewMessage,
    MessageEdited,
    MessageDeleted,
    MessageDelivered,
    MessageRead,
    TypingStart,
    TypingStop,
    PresenceUpdate,
    CallOffer,
    CallAnswer,
    CallIce,
    CallEnded,
    Pong,
    Error,
}

impl ServerMessage {
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        kind: ServerMessageKind,
        payload: Option<Value>,
        timestamp: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            r#type: kind,
            request_id: None,
            payload,
            timestamp: timestamp.into(),
        }
    }

    #[must_use]
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    #[must_use]
    pub fn connection_ack(id: impl Into<String>, client_id: &str, timestamp: impl Into<String>) -> Self {
        let timestamp = timestamp.into();
        Self::new(
            id,
            ServerMessageKind::ConnectionAck,
            Some(serde_json::json!({
                "status": "connected",
                "client_id": client_id,
                "timestamp": timestamp,
            })),
            timestamp,
        )
    }

    #[must_use]
    pub fn error(id: impl Into<String>, code: &str, message: &str, timestamp: impl Into<String>) -> Self {
        Self::new(
            id,
            ServerMessageKind::Error,
            Some(serde_json::json!({ "code": code, "message": message })),
            timestamp,
        )
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_message_kind_serializes_snake_case() {
        let kind = ClientMessageKind::MarkAsRead;
        let json = serde_json::to_value(kind).unwrap();
        assert_eq!(json, "mark_as_read");
    }

    #[test]
    fn server_message_kind_round_trips() {
        for kind in [
            ServerMessageKind::ConnectionAck,
            ServerMessageKind::AuthFailed,
            ServerMessageKind::CallEnded,
        ] {
            let json = serde_json::to_value(kind).unwrap();
            let back: ServerMessageKind = serde_json::from_value(json).unwrap();
            assert_eq!(back, kind);
        }
    }

    #[test]
    fn connection_ack_carries_client_id() {
        let msg = ServerMessage::connection_ack("evt-1", "client-abc", "2026-01-01T00:00:00Z");
        let payload = msg.payload.unwrap();
        assert_eq!(payload["client_id"], "client-abc");
        assert_eq!(payload["status"], "connected");
    }
}
