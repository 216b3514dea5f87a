//! Message send/edit/delete orchestration, delivery tracking, and typing
//! indicators.
//!
//! Persistence goes through [`store::MessageStore`] so the backing database
//! is swappable; transient failures are retried ([`retry`]) and a sustained
//! outage trips [`circuit::CircuitBreaker`] to fail fast. Fan-out to
//! connected clients goes through a [`moltis_hub::Hub`] handle; recipients
//! with no connected device go to [`notify::NotificationSink`] instead.

pub mod circuit;
pub mod dispatcher;
pub mod model;
pub mod notify;
pub mod retry;
pub mod store;

pub use {
    dispatcher::Dispatcher,
    model::{DeliveryRecord, Message, MessageStatus, SendMessageRequest},
    notify::NotificationSink,
    store::MessageStore,
};
