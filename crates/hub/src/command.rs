//! Messages accepted by the hub's event loop.
//!
//! Every mutation of the connection table flows through this channel so
//! the table itself never needs a lock: only the actor task touches it.

use {serde_json::Value, tokio::sync::oneshot, uuid::Uuid};

use crate::{
    client::ClientInfo,
    error::Result,
    state::Stats,
};

pub struct RegisterRequest {
    pub user_id: Uuid,
    pub device_id: String,
    pub platform: String,
    pub metadata: Value,
    pub max_connections_per_user: usize,
    pub tx: tokio::sync::mpsc::Sender<crate::client::OutboundFrame>,
    pub reply: oneshot::Sender<Result<Uuid>>,
}

pub enum Command {
    Register(RegisterRequest),
    Unregister {
        client_id: Uuid,
        reply: Option<oneshot::Sender<()>>,
    },
    Pong {
        client_id: Uuid,
    },
    SendToUser {
        user_id: Uuid,
        payload: Value,
        reply: oneshot::Sender<usize>,
    },
    SendToUsers {
        user_ids: Vec<Uuid>,
        payload: Value,
        exclude_user_ids: Vec<Uuid>,
        reply: oneshot::Sender<usize>,
    },
    BroadcastAll {
        payload: Value,
        exclude_client: Option<Uuid>,
        reply: oneshot::Sender<usize>,
    },
    IsUserOnline {
        user_id: Uuid,
        reply: oneshot::Sender<bool>,
    },
    DeviceCount {
        user_id: Uuid,
        reply: oneshot::Sender<usize>,
    },
    OnlineUsers {
        reply: oneshot::Sender<Vec<Uuid>>,
    },
    ClientInfo {
        client_id: Uuid,
        reply: oneshot::Sender<Option<ClientInfo>>,
    },
    Stats {
        reply: oneshot::Sender<Stats>,
    },
    Cleanup,
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}
