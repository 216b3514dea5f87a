#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use moltis_dispatcher::{Dispatcher, MessageStore, NotificationSink, SendMessageRequest};
use moltis_dispatcher::store::memory::InMemoryMessageStore;
use moltis_hub::{Hub, OutboundFrame};
use serde_json::{Value, json};
use uuid::Uuid;

/// Records every offline notification handed to it, for assertions.
/// A standalone double rather than the crate's own test-only sink, since
/// `#[cfg(test)]` items aren't visible to an external integration test.
#[derive(Default)]
struct RecordingNotificationSink {
    events: Mutex<Vec<(Uuid, Value)>>,
}

#[async_trait]
impl NotificationSink for RecordingNotificationSink {
    async fn notify_offline(&self, recipient_user_id: Uuid, payload: Value) {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((recipient_user_id, payload));
    }
}

fn send_request(conversation_id: Uuid, sender_user_id: Uuid) -> SendMessageRequest {
    SendMessageRequest {
        id: Uuid::new_v4(),
        conversation_id,
        sender_user_id,
        parent_message_id: None,
        content: "hey".to_string(),
        message_type: "text".to_string(),
        mentions: Vec::new(),
        metadata: serde_json::Map::new(),
    }
}

#[tokio::test]
async fn sender_excluded_online_gets_frame_offline_gets_notification() {
    let hub = Hub::spawn(5);
    let store = Arc::new(InMemoryMessageStore::new());
    let notifier = Arc::new(RecordingNotificationSink::default());
    let dispatcher = Dispatcher::new(
        hub.clone(),
        Arc::clone(&store) as Arc<dyn MessageStore>,
        Arc::clone(&notifier) as Arc<dyn NotificationSink>,
    );

    let conversation_id = Uuid::new_v4();
    let sender = Uuid::new_v4();
    let online_recipient = Uuid::new_v4();
    let offline_recipient = Uuid::new_v4();
    store.set_participants(
        conversation_id,
        vec![sender, online_recipient, offline_recipient],
    );

    let mut online_client = hub
        .register(
            online_recipient,
            "device-a".into(),
            "ios".into(),
            json!({}),
        )
        .await
        .unwrap();

    let message = dispatcher
        .send_message(send_request(conversation_id, sender))
        .await
        .unwrap();

    // Online recipient gets the frame over the hub; sender is never sent to.
    let frame = online_client.outbox.try_recv().unwrap();
    let OutboundFrame::Text(text) = frame else {
        panic!("expected a text frame");
    };
    let parsed: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(parsed["type"], "new_message");
    assert_eq!(parsed["payload"]["message"]["id"], message.id.to_string());

    // Offline recipient is handed to the notification sink instead.
    let events = notifier.events.lock().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].0, offline_recipient);
    assert_eq!(events[0].1["conversation_id"], conversation_id.to_string());
    drop(events);

    // Unread counters and delivery rows cover both non-sender participants,
    // never the sender.
    // Background bookkeeping is spawned; give it a beat to land.
    tokio::task::yield_now().await;
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;

    assert_eq!(store.unread_count(online_recipient, conversation_id), 1);
    assert_eq!(store.unread_count(offline_recipient, conversation_id), 1);

    let deliveries = store.deliveries_for(message.id);
    assert_eq!(deliveries.len(), 2);
    assert!(
        deliveries
            .iter()
            .any(|d| d.recipient_user_id == online_recipient)
    );
    assert!(
        deliveries
            .iter()
            .any(|d| d.recipient_user_id == offline_recipient)
    );
    assert!(
        !deliveries
            .iter()
            .any(|d| d.recipient_user_id == sender)
    );
}

#[tokio::test]
async fn typing_indicator_reaches_other_participants_not_the_typer() {
    let hub = Hub::spawn(5);
    let store = Arc::new(InMemoryMessageStore::new());
    let notifier = Arc::new(RecordingNotificationSink::default());
    let dispatcher = Dispatcher::new(
        hub.clone(),
        Arc::clone(&store) as Arc<dyn MessageStore>,
        Arc::clone(&notifier) as Arc<dyn NotificationSink>,
    );

    let conversation_id = Uuid::new_v4();
    let typer = Uuid::new_v4();
    let watcher = Uuid::new_v4();
    store.set_participants(conversation_id, vec![typer, watcher]);

    let mut typer_client = hub
        .register(typer, "d1".into(), "ios".into(), json!({}))
        .await
        .unwrap();
    let mut watcher_client = hub
        .register(watcher, "d2".into(), "ios".into(), json!({}))
        .await
        .unwrap();

    dispatcher.set_typing(conversation_id, typer, true).await;

    let frame = watcher_client.outbox.try_recv().unwrap();
    let OutboundFrame::Text(text) = frame else {
        panic!("expected a text frame");
    };
    let parsed: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(parsed["type"], "typing_start");

    assert!(typer_client.outbox.try_recv().is_err());
}
