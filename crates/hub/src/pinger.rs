//! Per-client ping ticker.
//!
//! Runs alongside a client's write loop: every `ping_period` it pushes a
//! [`OutboundFrame::Ping`] onto the client's own send queue. It stops on
//! its own once that queue is dropped, so callers don't need to cancel it
//! explicitly on disconnect.

use std::time::Duration;

use tokio::{sync::mpsc::Sender, task::JoinHandle};

use moltis_protocol::DEFAULT_PING_PERIOD_SECS;

use crate::client::OutboundFrame;

pub fn spawn(send_handle: Sender<OutboundFrame>) -> JoinHandle<()> {
    spawn_with_period(send_handle, Duration::from_secs(DEFAULT_PING_PERIOD_SECS))
}

pub fn spawn_with_period(send_handle: Sender<OutboundFrame>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        ticker.tick().await; // first tick fires immediately, skip it
        loop {
            ticker.tick().await;
            match send_handle.try_send(OutboundFrame::Ping) {
                Ok(()) | Err(tokio::sync::mpsc::error::TrySendError::Full(_)) => {},
                Err(tokio::sync::mpsc::error::TrySendError::Closed(_)) => break,
            }
        }
    })
}
