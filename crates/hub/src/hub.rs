//! Public handle to the WebSocket hub.
//!
//! Cloning a [`Hub`] is cheap: it is just a sender into the actor's command
//! channel. The actor itself is spawned once, at startup, by [`Hub::spawn`].

use {serde_json::Value, tokio::sync::{mpsc, oneshot}, uuid::Uuid};

use moltis_protocol::SEND_QUEUE_CAPACITY;

use crate::{
    actor,
    client::{ClientInfo, OutboundFrame},
    command::{Command, RegisterRequest},
    error::{Error, Result},
    state::Stats,
};

const COMMAND_CHANNEL_CAPACITY: usize = 1024;
const SHUTDOWN_DRAIN_SECS: u64 = moltis_protocol::SHUTDOWN_DRAIN_SECS;

#[derive(Clone)]
pub struct Hub {
    tx: mpsc::Sender<Command>,
    max_connections_per_user: usize,
}

/// Handle returned to a caller after a successful [`Hub::register`].
///
/// Owns the receiving end of the client's bounded send queue; the caller's
/// write loop drains it and forwards frames to the real transport.
pub struct RegisteredClient {
    pub client_id: Uuid,
    pub outbox: mpsc::Receiver<OutboundFrame>,
    /// Clone of the client's own send queue, for the ping ticker
    /// ([`crate::pinger::spawn`]) to push pings onto directly.
    pub send_handle: mpsc::Sender<OutboundFrame>,
}

impl Hub {
    /// Spawn the event loop and return a handle to it.
    pub fn spawn(max_connections_per_user: usize) -> Self {
        let (tx, rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        tokio::spawn(actor::run(rx));
        Self {
            tx,
            max_connections_per_user,
        }
    }

    pub async fn register(
        &self,
        user_id: Uuid,
        device_id: String,
        platform: String,
        metadata: Value,
    ) -> Result<RegisteredClient> {
        let (tx, outbox) = mpsc::channel(SEND_QUEUE_CAPACITY);
        let send_handle = tx.clone();
        let (reply, reply_rx) = oneshot::channel();
        self.tx
            .send(Command::Register(RegisterRequest {
                user_id,
                device_id,
                platform,
                metadata,
                max_connections_per_user: self.max_connections_per_user,
                tx,
                reply,
            }))
            .await
            .map_err(|_| Error::ActorGone)?;
        let client_id = reply_rx.await.map_err(|_| Error::ActorGone)??;
        Ok(RegisteredClient {
            client_id,
            outbox,
            send_handle,
        })
    }

    /// Idempotent: unregistering an already-unregistered client is a no-op.
    pub async fn unregister(&self, client_id: Uuid) {
        let (reply, reply_rx) = oneshot::channel();
        if self
            .tx
            .send(Command::Unregister {
                client_id,
                reply: Some(reply),
            })
            .await
            .is_ok()
        {
            let _ = reply_rx.await;
        }
    }

    pub async fn notify_pong(&self, client_id: Uuid) {
        let _ = self.tx.send(Command::Pong { client_id }).await;
    }

    /// Returns the number of clients the payload was enqueued to.
    pub async fn send_to_user(&self, user_id: Uuid, payload: Value) -> usize {
        let (reply, reply_rx) = oneshot::channel();
        if self
            .tx
            .send(Command::SendToUser {
                user_id,
                payload,
                reply,
            })
            .await
            .is_err()
        {
            return 0;
        }
        reply_rx.await.unwrap_or(0)
    }

    /// Sends to every device of every listed user, skipping any user in
    /// `exclude_user_ids`. Excludes by user, not by client.
    pub async fn send_to_users(&self, user_ids: Vec<Uuid>, payload: Value, exclude_user_ids: Vec<Uuid>) -> usize {
        let (reply, reply_rx) = oneshot::channel();
        if self
            .tx
            .send(Command::SendToUsers {
                user_ids,
                payload,
                exclude_user_ids,
                reply,
            })
            .await
            .is_err()
        {
            return 0;
        }
        reply_rx.await.unwrap_or(0)
    }

    /// Sends to every connected client. Excludes by client, not by user.
    pub async fn broadcast_all(&self, payload: Value, exclude_client: Option<Uuid>) -> usize {
        let (reply, reply_rx) = oneshot::channel();
        if self
            .tx
            .send(Command::BroadcastAll {
                payload,
                exclude_client,
                reply,
            })
            .await
            .is_err()
        {
            return 0;
        }
        reply_rx.await.unwrap_or(0)
    }

    pub async fn is_user_online(&self, user_id: Uuid) -> bool {
        let (reply, reply_rx) = oneshot::channel();
        if self
            .tx
            .send(Command::IsUserOnline { user_id, reply })
            .await
            .is_err()
        {
            return false;
        }
        reply_rx.await.unwrap_or(false)
    }

    pub async fn get_user_device_count(&self, user_id: Uuid) -> usize {
        let (reply, reply_rx) = oneshot::channel();
        if self
            .tx
            .send(Command::DeviceCount { user_id, reply })
            .await
            .is_err()
        {
            return 0;
        }
        reply_rx.await.unwrap_or(0)
    }

    pub async fn get_online_users(&self) -> Vec<Uuid> {
        let (reply, reply_rx) = oneshot::channel();
        if self.tx.send(Command::OnlineUsers { reply }).await.is_err() {
            return Vec::new();
        }
        reply_rx.await.unwrap_or_default()
    }

    pub async fn client_info(&self, client_id: Uuid) -> Option<ClientInfo> {
        let (reply, reply_rx) = oneshot::channel();
        self.tx
            .send(Command::ClientInfo { client_id, reply })
            .await
            .ok()?;
        reply_rx.await.ok().flatten()
    }

    pub async fn get_stats(&self) -> Stats {
        let (reply, reply_rx) = oneshot::channel();
        if self.tx.send(Command::Stats { reply }).await.is_err() {
            return Stats {
                total_clients: 0,
                total_users: 0,
            };
        }
        reply_rx.await.unwrap_or(Stats {
            total_clients: 0,
            total_users: 0,
        })
    }

    /// Stops accepting new events and drains every client's send queue,
    /// waiting up to [`SHUTDOWN_DRAIN_SECS`] for the actor to finish.
    /// Calling this a second time is a no-op: the actor is already gone.
    pub async fn shutdown(&self) {
        let (reply, reply_rx) = oneshot::channel();
        if self.tx.send(Command::Shutdown { reply }).await.is_err() {
            return;
        }
        let _ = tokio::time::timeout(
            std::time::Duration::from_secs(SHUTDOWN_DRAIN_SECS),
            reply_rx,
        )
        .await;
    }
}
