//! Message send/edit/delete orchestration and WebSocket fan-out.
//!
//! This is the only place that sequences persistence, hub delivery, and
//! offline notification for a message; everything else in this crate is a
//! building block it wires together.

use std::sync::Arc;

use {
    serde_json::{Value, json},
    tracing::error,
    uuid::Uuid,
};

use moltis_common::{Error, Result};
use moltis_hub::Hub;
use moltis_protocol::ws::{ServerMessage, ServerMessageKind};

use crate::{
    circuit::CircuitBreaker,
    model::{DeliveryRecord, Message, SendMessageRequest},
    notify::NotificationSink,
    retry,
    store::MessageStore,
};

pub struct Dispatcher {
    hub: Hub,
    store: Arc<dyn MessageStore>,
    notifier: Arc<dyn NotificationSink>,
    breaker: CircuitBreaker,
}

impl Dispatcher {
    #[must_use]
    pub fn new(
        hub: Hub,
        store: Arc<dyn MessageStore>,
        notifier: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            hub,
            store,
            notifier,
            breaker: CircuitBreaker::new(),
        }
    }

    /// Persists a message and fans it out to every other participant.
    ///
    /// Recipients currently connected get it over the hub immediately;
    /// everyone else gets handed to the offline notification sink. Updating
    /// the conversation's `last_message_id` and creating delivery rows
    /// happens in the background, after the caller already has their
    /// acknowledgement.
    pub async fn send_message(&self, req: SendMessageRequest) -> Result<Message> {
        if self.breaker.is_open() {
            return Err(Error::upstream_unavailable(
                "message store circuit is open",
            ));
        }

        let participants = self.load_participants(req.conversation_id).await?;
        if !participants.contains(&req.sender_user_id) {
            return Err(Error::unauthorized(
                "sender is not a participant of this conversation",
            ));
        }

        let message = Message::from_request(req, unix_now());
        self.persist_with_breaker(&message).await?;

        let recipients = self.fan_out_participants(message.conversation_id, message.sender_user_id).await;

        self.spawn_background_bookkeeping(&message, recipients.clone());
        self.fan_out_new_message(&message, &recipients).await;

        Ok(message)
    }

    async fn persist_with_breaker(&self, message: &Message) -> Result<()> {
        let store = Arc::clone(&self.store);
        let to_persist = message.clone();
        let result = retry::retry("persist_message", move || {
            let store = Arc::clone(&store);
            let message = to_persist.clone();
            async move { store.persist_message(&message).await }
        })
        .await;
        match &result {
            Ok(()) => self.breaker.record_success(),
            Err(_) => self.breaker.record_failure(),
        }
        result
    }

    /// Loads a conversation's participants, propagating storage failures —
    /// used where the caller can't safely proceed without an authoritative
    /// list (authorization checks).
    async fn load_participants(&self, conversation_id: Uuid) -> Result<Vec<Uuid>> {
        self.store.conversation_participants(conversation_id).await
    }

    /// Loads a conversation's participants for fan-out, excluding `exclude`.
    /// A storage failure here is non-fatal: the write already succeeded, so
    /// this degrades to "delivered to nobody" rather than failing the call.
    async fn fan_out_participants(&self, conversation_id: Uuid, exclude: Uuid) -> Vec<Uuid> {
        match self.store.conversation_participants(conversation_id).await {
            Ok(participants) => participants.into_iter().filter(|u| *u != exclude).collect(),
            Err(err) => {
                error!(
                    %conversation_id,
                    error = %err,
                    "failed to load participants for fan-out, delivering to nobody"
                );
                Vec::new()
            },
        }
    }

    /// Loads a conversation's full participant list, unfiltered. Used where
    /// the sender is excluded at the hub via `send_to_users`'s own
    /// `exclude_user_ids` rather than by trimming the list beforehand.
    async fn all_participants(&self, conversation_id: Uuid) -> Vec<Uuid> {
        match self.store.conversation_participants(conversation_id).await {
            Ok(participants) => participants,
            Err(err) => {
                error!(
                    %conversation_id,
                    error = %err,
                    "failed to load participants for fan-out, delivering to nobody"
                );
                Vec::new()
            },
        }
    }

    fn spawn_background_bookkeeping(&self, message: &Message, recipients: Vec<Uuid>) {
        let store = Arc::clone(&self.store);
        let conversation_id = message.conversation_id;
        let message_id = message.id;
        tokio::spawn(async move {
            if let Err(err) = store
                .set_conversation_last_message(conversation_id, message_id)
                .await
            {
                error!(%conversation_id, error = %err, "failed to update conversation last message");
            }
            let records: Vec<DeliveryRecord> = recipients
                .iter()
                .map(|&recipient_user_id| DeliveryRecord {
                    message_id,
                    recipient_user_id,
                    delivered_at: None,
                    read_at: None,
                })
                .collect();
            if !records.is_empty() {
                if let Err(err) = store.create_delivery_records(&records).await {
                    error!(%conversation_id, error = %err, "failed to create delivery records");
                }
            }
        });
    }

    async fn fan_out_new_message(&self, message: &Message, recipients: &[Uuid]) {
        let timestamp = iso_now(message.created_at);
        let payload = server_payload(
            ServerMessageKind::NewMessage,
            json!({ "message": message }),
            &timestamp,
        );

        for &recipient in recipients {
            let delivered = self.hub.is_user_online(recipient).await
                && self.hub.send_to_user(recipient, payload.clone()).await > 0;

            if delivered {
                if let Err(err) = self
                    .store
                    .mark_delivered(message.id, recipient, unix_now())
                    .await
                {
                    error!(message_id = %message.id, recipient_user_id = %recipient, error = %err, "failed to record delivery");
                }
            } else {
                self.notifier
                    .notify_offline(
                        recipient,
                        json!({
                            "conversation_id": message.conversation_id,
                            "sender_id": message.sender_user_id,
                            "content": message.content,
                            "message_type": message.message_type,
                            "timestamp": timestamp,
                        }),
                    )
                    .await;
            }

            if let Err(err) = self
                .store
                .increment_unread(recipient, message.conversation_id)
                .await
            {
                error!(recipient_user_id = %recipient, error = %err, "failed to increment unread counter");
            }
        }
    }

    /// Only the sender may edit their own message, and only while it hasn't
    /// been deleted. Broadcasts `message_edited` to every other participant.
    pub async fn edit_message(
        &self,
        message_id: Uuid,
        editor_user_id: Uuid,
        content: String,
    ) -> Result<Message> {
        let mut message = self
            .store
            .get_message(message_id)
            .await?
            .ok_or_else(|| Error::not_found("message not found"))?;
        if message.sender_user_id != editor_user_id {
            return Err(Error::unauthorized("only the sender may edit this message"));
        }
        if message.is_deleted {
            return Err(Error::conflict("cannot edit a deleted message"));
        }

        message.content = content;
        message.is_edited = true;
        message.updated_at = unix_now();
        self.store.update_message(&message).await?;

        let recipients = self.all_participants(message.conversation_id).await;
        let timestamp = iso_now(message.updated_at);
        let payload = server_payload(
            ServerMessageKind::MessageEdited,
            json!({ "message": message }),
            &timestamp,
        );
        self.hub.send_to_users(recipients, payload, vec![message.sender_user_id]).await;

        Ok(message)
    }

    /// Only the sender may delete their own message. Marks it deleted rather
    /// than removing the row, and broadcasts `message_deleted`.
    pub async fn delete_message(&self, message_id: Uuid, requester_user_id: Uuid) -> Result<()> {
        let mut message = self
            .store
            .get_message(message_id)
            .await?
            .ok_or_else(|| Error::not_found("message not found"))?;
        if message.sender_user_id != requester_user_id {
            return Err(Error::unauthorized(
                "only the sender may delete this message",
            ));
        }

        message.is_deleted = true;
        message.updated_at = unix_now();
        self.store.update_message(&message).await?;

        let recipients = self.all_participants(message.conversation_id).await;
        let timestamp = iso_now(message.updated_at);
        let payload = server_payload(
            ServerMessageKind::MessageDeleted,
            json!({
                "message_id": message_id,
                "conversation_id": message.conversation_id,
            }),
            &timestamp,
        );
        self.hub.send_to_users(recipients, payload, vec![message.sender_user_id]).await;

        Ok(())
    }

    /// Records delivery and tells the sender, but only the first time —
    /// repeat delivery receipts for the same recipient are a no-op.
    pub async fn mark_delivered(&self, message_id: Uuid, recipient_user_id: Uuid) -> Result<()> {
        let newly_delivered = self
            .store
            .mark_delivered(message_id, recipient_user_id, unix_now())
            .await?;
        if !newly_delivered {
            return Ok(());
        }
        if let Some(message) = self.store.get_message(message_id).await? {
            self.notify_status_change(
                &message,
                ServerMessageKind::MessageDelivered,
                recipient_user_id,
            )
            .await;
        }
        Ok(())
    }

    /// Records a read receipt and resets the reader's unread counter for the
    /// conversation. Like [`Self::mark_delivered`], the sender is notified
    /// only on the first read.
    pub async fn mark_read(&self, message_id: Uuid, recipient_user_id: Uuid) -> Result<()> {
        let newly_read = self
            .store
            .mark_read(message_id, recipient_user_id, unix_now())
            .await?;
        let message = self.store.get_message(message_id).await?;
        if let Some(message) = &message {
            self.store
                .reset_unread(recipient_user_id, message.conversation_id)
                .await?;
        }
        if !newly_read {
            return Ok(());
        }
        if let Some(message) = message {
            self.notify_status_change(&message, ServerMessageKind::MessageRead, recipient_user_id)
                .await;
        }
        Ok(())
    }

    async fn notify_status_change(
        &self,
        message: &Message,
        kind: ServerMessageKind,
        recipient_user_id: Uuid,
    ) {
        let timestamp = iso_now(unix_now());
        let payload = server_payload(
            kind,
            json!({ "message_id": message.id, "user_id": recipient_user_id }),
            &timestamp,
        );
        self.hub.send_to_user(message.sender_user_id, payload).await;
    }

    /// Broadcasts a typing indicator. Purely transient: nothing is
    /// persisted, and a dropped frame just means the indicator never shows
    /// up, which the next keystroke will correct.
    pub async fn set_typing(&self, conversation_id: Uuid, user_id: Uuid, is_typing: bool) {
        let recipients = self.all_participants(conversation_id).await;
        let kind = if is_typing {
            ServerMessageKind::TypingStart
        } else {
            ServerMessageKind::TypingStop
        };
        let timestamp = iso_now(unix_now());
        let payload = server_payload(
            kind,
            json!({ "conversation_id": conversation_id, "user_id": user_id, "is_typing": is_typing }),
            &timestamp,
        );
        self.hub.send_to_users(recipients, payload, vec![user_id]).await;
    }
}

fn server_payload(kind: ServerMessageKind, body: Value, timestamp: &str) -> Value {
    serde_json::to_value(ServerMessage::new(
        Uuid::new_v4().to_string(),
        kind,
        Some(body),
        timestamp,
    ))
    .unwrap_or(Value::Null)
}

fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}

fn iso_now(unix_secs: i64) -> String {
    chrono::DateTime::from_timestamp(unix_secs, 0)
        .unwrap_or_else(chrono::Utc::now)
        .to_rfc3339()
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use moltis_hub::Hub;

    use super::*;
    use crate::{model::SendMessageRequest, notify::test_support::RecordingNotificationSink, store::memory::InMemoryMessageStore};

    fn make_dispatcher() -> (Dispatcher, Arc<InMemoryMessageStore>, Arc<RecordingNotificationSink>) {
        let store = Arc::new(InMemoryMessageStore::new());
        let notifier = Arc::new(RecordingNotificationSink::default());
        let hub = Hub::spawn(8);
        let dispatcher = Dispatcher::new(
            hub,
            Arc::clone(&store) as Arc<dyn MessageStore>,
            Arc::clone(&notifier) as Arc<dyn NotificationSink>,
        );
        (dispatcher, store, notifier)
    }

    fn send_request(conversation_id: Uuid, sender_user_id: Uuid) -> SendMessageRequest {
        SendMessageRequest {
            id: Uuid::new_v4(),
            conversation_id,
            sender_user_id,
            parent_message_id: None,
            content: "hello".to_string(),
            message_type: "text".to_string(),
            mentions: Vec::new(),
            metadata: serde_json::Map::new(),
        }
    }

    #[tokio::test]
    async fn send_message_rejects_non_participant() {
        let (dispatcher, store, _notifier) = make_dispatcher();
        let conversation_id = Uuid::new_v4();
        let sender = Uuid::new_v4();
        store.set_participants(conversation_id, vec![Uuid::new_v4()]);

        let err = dispatcher
            .send_message(send_request(conversation_id, sender))
            .await
            .unwrap_err();
        assert_eq!(err.kind, moltis_common::ErrorKind::Unauthorized);
    }

    #[tokio::test]
    async fn send_message_notifies_offline_recipient_and_increments_unread() {
        let (dispatcher, store, notifier) = make_dispatcher();
        let conversation_id = Uuid::new_v4();
        let sender = Uuid::new_v4();
        let recipient = Uuid::new_v4();
        store.set_participants(conversation_id, vec![sender, recipient]);

        let message = dispatcher
            .send_message(send_request(conversation_id, sender))
            .await
            .unwrap();

        assert_eq!(store.unread_count(recipient, conversation_id), 1);
        assert_eq!(notifier.events.lock().unwrap().len(), 1);
        assert_eq!(notifier.events.lock().unwrap()[0].0, recipient);
        assert!(!message.is_edited);
    }

    #[tokio::test]
    async fn edit_message_rejects_non_sender() {
        let (dispatcher, store, _notifier) = make_dispatcher();
        let conversation_id = Uuid::new_v4();
        let sender = Uuid::new_v4();
        let other = Uuid::new_v4();
        store.set_participants(conversation_id, vec![sender, other]);
        let message = dispatcher
            .send_message(send_request(conversation_id, sender))
            .await
            .unwrap();

        let err = dispatcher
            .edit_message(message.id, other, "edited".to_string())
            .await
            .unwrap_err();
        assert_eq!(err.kind, moltis_common::ErrorKind::Unauthorized);
    }

    #[tokio::test]
    async fn mark_read_resets_unread_and_is_idempotent() {
        let (dispatcher, store, _notifier) = make_dispatcher();
        let conversation_id = Uuid::new_v4();
        let sender = Uuid::new_v4();
        let recipient = Uuid::new_v4();
        store.set_participants(conversation_id, vec![sender, recipient]);
        let message = dispatcher
            .send_message(send_request(conversation_id, sender))
            .await
            .unwrap();
        assert_eq!(store.unread_count(recipient, conversation_id), 1);

        dispatcher.mark_read(message.id, recipient).await.unwrap();
        assert_eq!(store.unread_count(recipient, conversation_id), 0);

        // second call is a no-op, not an error
        dispatcher.mark_read(message.id, recipient).await.unwrap();
        assert_eq!(store.deliveries_for(message.id).len(), 1);
    }
}
