//! Persistence boundary for the dispatcher.
//!
//! The dispatcher only ever talks to storage through this trait. Swapping
//! the backing database means implementing [`MessageStore`]; nothing in
//! [`crate::dispatcher`] changes.

use {async_trait::async_trait, uuid::Uuid};

use moltis_common::Result;

use crate::model::{DeliveryRecord, Message};

#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn persist_message(&self, message: &Message) -> Result<()>;
    async fn get_message(&self, message_id: Uuid) -> Result<Option<Message>>;
    async fn update_message(&self, message: &Message) -> Result<()>;

    /// Participants of a conversation, excluding no one. Callers subtract
    /// the sender themselves where that matters.
    async fn conversation_participants(&self, conversation_id: Uuid) -> Result<Vec<Uuid>>;

    async fn set_conversation_last_message(
        &self,
        conversation_id: Uuid,
        message_id: Uuid,
    ) -> Result<()>;

    async fn create_delivery_records(&self, records: &[DeliveryRecord]) -> Result<()>;

    /// Returns `true` the first time a recipient's delivery is recorded,
    /// `false` on a repeat call — callers use this to notify the sender at
    /// most once per status change.
    async fn mark_delivered(&self, message_id: Uuid, recipient_user_id: Uuid, at: i64)
    -> Result<bool>;
    async fn mark_read(&self, message_id: Uuid, recipient_user_id: Uuid, at: i64)
    -> Result<bool>;

    async fn increment_unread(&self, user_id: Uuid, conversation_id: Uuid) -> Result<()>;
    async fn reset_unread(&self, user_id: Uuid, conversation_id: Uuid) -> Result<()>;
}

/// In-memory store used by tests and for local development without a
/// database configured.
pub mod memory {
    use std::{collections::HashMap, sync::RwLock};

    use super::{DeliveryRecord, Message, MessageStore, Result, Uuid, async_trait};

    #[derive(Default)]
    pub struct InMemoryMessageStore {
        messages: RwLock<HashMap<Uuid, Message>>,
        participants: RwLock<HashMap<Uuid, Vec<Uuid>>>,
        last_message: RwLock<HashMap<Uuid, Uuid>>,
        deliveries: RwLock<Vec<DeliveryRecord>>,
        unread: RwLock<HashMap<(Uuid, Uuid), u64>>,
    }

    impl InMemoryMessageStore {
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        pub fn set_participants(&self, conversation_id: Uuid, participants: Vec<Uuid>) {
            self.participants
                .write()
                .unwrap_or_else(|e| e.into_inner())
                .insert(conversation_id, participants);
        }

        pub fn unread_count(&self, user_id: Uuid, conversation_id: Uuid) -> u64 {
            *self
                .unread
                .read()
                .unwrap_or_else(|e| e.into_inner())
                .get(&(user_id, conversation_id))
                .unwrap_or(&0)
        }

        pub fn deliveries_for(&self, message_id: Uuid) -> Vec<DeliveryRecord> {
            self.deliveries
                .read()
                .unwrap_or_else(|e| e.into_inner())
                .iter()
                .filter(|d| d.message_id == message_id)
                .cloned()
                .collect()
        }
    }

    #[async_trait]
    impl MessageStore for InMemoryMessageStore {
        async fn persist_message(&self, message: &Message) -> Result<()> {
            self.messages
                .write()
                .unwrap_or_else(|e| e.into_inner())
                .insert(message.id, message.clone());
            Ok(())
        }

        async fn get_message(&self, message_id: Uuid) -> Result<Option<Message>> {
            Ok(self
                .messages
                .read()
                .unwrap_or_else(|e| e.into_inner())
                .get(&message_id)
                .cloned())
        }

        async fn update_message(&self, message: &Message) -> Result<()> {
            self.messages
                .write()
                .unwrap_or_else(|e| e.into_inner())
                .insert(message.id, message.clone());
            Ok(())
        }

        async fn conversation_participants(&self, conversation_id: Uuid) -> Result<Vec<Uuid>> {
            Ok(self
                .participants
                .read()
                .unwrap_or_else(|e| e.into_inner())
                .get(&conversation_id)
                .cloned()
                .unwrap_or_default())
        }

        async fn set_conversation_last_message(
            &self,
            conversation_id: Uuid,
            message_id: Uuid,
        ) -> Result<()> {
            self.last_message
                .write()
                .unwrap_or_else(|e| e.into_inner())
                .insert(conversation_id, message_id);
            Ok(())
        }

        async fn create_delivery_records(&self, records: &[DeliveryRecord]) -> Result<()> {
            self.deliveries
                .write()
                .unwrap_or_else(|e| e.into_inner())
                .extend_from_slice(records);
            Ok(())
        }

        async fn mark_delivered(
            &self,
            message_id: Uuid,
            recipient_user_id: Uuid,
            at: i64,
        ) -> Result<bool> {
            let mut deliveries = self.deliveries.write().unwrap_or_else(|e| e.into_inner());
            let Some(record) = deliveries
                .iter_mut()
                .find(|d| d.message_id == message_id && d.recipient_user_id == recipient_user_id)
            else {
                return Ok(false);
            };
            if record.delivered_at.is_some() {
                return Ok(false);
            }
            record.delivered_at = Some(at);
            Ok(true)
        }

        async fn mark_read(
            &self,
            message_id: Uuid,
            recipient_user_id: Uuid,
            at: i64,
        ) -> Result<bool> {
            let mut deliveries = self.deliveries.write().unwrap_or_else(|e| e.into_inner());
            let Some(record) = deliveries
                .iter_mut()
                .find(|d| d.message_id == message_id && d.recipient_user_id == recipient_user_id)
            else {
                return Ok(false);
            };
            record.delivered_at.get_or_insert(at);
            if record.read_at.is_some() {
                return Ok(false);
            }
            record.read_at = Some(at);
            Ok(true)
        }

        async fn increment_unread(&self, user_id: Uuid, conversation_id: Uuid) -> Result<()> {
            *self
                .unread
                .write()
                .unwrap_or_else(|e| e.into_inner())
                .entry((user_id, conversation_id))
                .or_insert(0) += 1;
            Ok(())
        }

        async fn reset_unread(&self, user_id: Uuid, conversation_id: Uuid) -> Result<()> {
            self.unread
                .write()
                .unwrap_or_else(|e| e.into_inner())
                .insert((user_id, conversation_id), 0);
            Ok(())
        }
    }
}
