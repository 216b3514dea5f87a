//! Offline notification fan-out.
//!
//! When a recipient has no connected device, the dispatcher doesn't hold
//! the message for later delivery itself — it hands off to whatever
//! downstream system turns this into a push notification or email digest.

use {async_trait::async_trait, serde_json::Value, uuid::Uuid};

#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Emits a "notifications" event keyed by the recipient, carrying
    /// `conversation_id`, `sender_id`, `content`, `message_type`, `timestamp`.
    async fn notify_offline(&self, recipient_user_id: Uuid, payload: Value);
}

/// Sink that only logs. Used when no push/email provider is wired up.
#[derive(Default)]
pub struct LoggingNotificationSink;

#[async_trait]
impl NotificationSink for LoggingNotificationSink {
    async fn notify_offline(&self, recipient_user_id: Uuid, payload: Value) {
        tracing::info!(%recipient_user_id, %payload, "queued offline notification");
        moltis_metrics::counter!(moltis_metrics::dispatcher::NOTIFICATIONS_QUEUED_TOTAL)
            .increment(1);
    }
}

#[cfg(test)]
pub mod test_support {
    use std::sync::Mutex;

    use super::{NotificationSink, Uuid, Value, async_trait};

    #[derive(Default)]
    pub struct RecordingNotificationSink {
        pub events: Mutex<Vec<(Uuid, Value)>>,
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
}
