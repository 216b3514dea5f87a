//! Message and delivery-receipt data model.

use {
    serde::{Deserialize, Serialize},
    serde_json::{Map, Value},
    uuid::Uuid,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    Sent,
    Delivered,
    Read,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_user_id: Uuid,
    pub parent_message_id: Option<Uuid>,
    pub content: String,
    pub message_type: String,
    pub status: MessageStatus,
    #[serde(default)]
    pub mentions: Vec<Uuid>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    pub is_edited: bool,
    pub is_deleted: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryRecord {
    pub message_id: Uuid,
    pub recipient_user_id: Uuid,
    pub delivered_at: Option<i64>,
    pub read_at: Option<i64>,
}

/// Request to create a new message, as received from the gateway/websocket layer.
#[derive(Debug, Clone, Deserialize)]
pub struct SendMessageRequest {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_user_id: Uuid,
    pub parent_message_id: Option<Uuid>,
    pub content: String,
    pub message_type: String,
    #[serde(default)]
    pub mentions: Vec<Uuid>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl Message {
    /// Materializes a message from a send request. Empty `mentions`/`metadata`
    /// are normalized to empty collections rather than left absent.
    #[must_use]
    pub fn from_request(req: SendMessageRequest, now: i64) -> Self {
        Self {
            id: req.id,
            conversation_id: req.conversation_id,
            sender_user_id: req.sender_user_id,
            parent_message_id: req.parent_message_id,
            content: req.content,
            message_type: req.message_type,
            status: MessageStatus::Sent,
            mentions: req.mentions,
            metadata: req.metadata,
            is_edited: false,
            is_deleted: false,
            created_at: now,
            updated_at: now,
        }
    }
}
