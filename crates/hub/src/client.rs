//! Connected client bookkeeping.

use std::time::Instant;

use {serde_json::Value, tokio::sync::mpsc, uuid::Uuid};

/// A frame queued for delivery to a client's write loop.
///
/// The hub speaks in these rather than raw WebSocket frames so it stays
/// independent of whatever HTTP server crate terminates the socket.
#[derive(Debug, Clone)]
pub enum OutboundFrame {
    /// A JSON payload, already serialized.
    Text(String),
    /// A protocol-level ping. The write loop is expected to translate this
    /// into a WebSocket ping frame.
    Ping,
    /// Ask the write loop to close the connection.
    Close,
}

/// Identity and liveness bookkeeping the hub keeps for one connection.
#[derive(Debug)]
pub struct ConnectedClient {
    pub client_id: Uuid,
    pub user_id: Uuid,
    pub device_id: String,
    pub platform: String,
    pub connected_at: Instant,
    pub last_pong: Instant,
    pub metadata: Value,
    pub(crate) tx: mpsc::Sender<OutboundFrame>,
}

impl ConnectedClient {
    /// Non-blocking enqueue onto this client's bounded send queue.
    ///
    /// Returns `false` if the queue is full or the client's write loop has
    /// gone away, in which case the caller should treat the client as dead.
    pub(crate) fn try_send(&self, frame: OutboundFrame) -> bool {
        self.tx.try_send(frame).is_ok()
    }
}

/// Public, read-only view of a connected client handed back from queries.
#[derive(Debug, Clone)]
pub struct ClientInfo {
    pub client_id: Uuid,
    pub user_id: Uuid,
    pub device_id: String,
    pub platform: String,
    pub connected_at: Instant,
    pub last_pong: Instant,
}

impl From<&ConnectedClient> for ClientInfo {
    fn from(c: &ConnectedClient) -> Self {
        Self {
            client_id: c.client_id,
            user_id: c.user_id,
            device_id: c.device_id.clone(),
            platform: c.platform.clone(),
            connected_at: c.connected_at,
            last_pong: c.last_pong,
        }
    }
}
