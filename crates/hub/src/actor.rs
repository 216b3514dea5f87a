//! The hub's single-reasoner event loop.
//!
//! Every index mutation and fan-out decision happens inside this task.
//! External callers never see the connection table directly; they send a
//! [`Command`] and, for queries, await a reply over a oneshot channel.

use std::time::{Duration, Instant};

use {
    tokio::sync::mpsc,
    tracing::{debug, info, warn},
    uuid::Uuid,
};

use moltis_protocol::{CLEANUP_TICK_SECS, PONG_STALE_SECS};

use crate::{
    client::{ConnectedClient, OutboundFrame},
    command::Command,
    state::HubState,
};

pub async fn run(mut rx: mpsc::Receiver<Command>) {
    let mut state = HubState::new();
    let mut cleanup = tokio::time::interval(Duration::from_secs(CLEANUP_TICK_SECS));
    cleanup.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cleanup.tick() => evict_stale(&mut state),
            cmd = rx.recv() => {
                match cmd {
                    Some(cmd) => {
                        if matches!(cmd, Command::Shutdown { .. }) {
                            handle(&mut state, cmd);
                            break;
                        }
                        handle(&mut state, cmd);
                    }
                    None => break,
                }
            }
        }
    }
    // Drain: close every remaining client's send queue.
    for client_id in state.all_client_ids() {
        if let Some(client) = state.get(client_id) {
            let _ = client.try_send(OutboundFrame::Close);
        }
    }
    info!("hub event loop stopped");
}

fn handle(state: &mut HubState, cmd: Command) {
    match cmd {
        Command::Register(req) => {
            let count = state.device_count(req.user_id);
            if count >= req.max_connections_per_user {
                let _ = req.tx.try_send(OutboundFrame::Text(
                    serde_json::json!({
                        "type": "error",
                        "payload": { "code": "too_many_connections", "message": "device limit reached" }
                    })
                    .to_string(),
                ));
                let _ = req.tx.try_send(OutboundFrame::Close);
                let _ = req.reply.send(Err(crate::error::Error::TooManyConnections {
                    user_id: req.user_id,
                    max: req.max_connections_per_user,
                }));
                return;
            }
            let client_id = Uuid::new_v4();
            let now = Instant::now();
            state.insert(ConnectedClient {
                client_id,
                user_id: req.user_id,
                device_id: req.device_id,
                platform: req.platform,
                connected_at: now,
                last_pong: now,
                metadata: req.metadata,
                tx: req.tx,
            });
            moltis_metrics::counter!(moltis_metrics::websocket::CONNECTIONS_TOTAL).increment(1);
            moltis_metrics::gauge!(moltis_metrics::websocket::CONNECTIONS_ACTIVE)
                .set(state.stats().total_clients as f64);
            let _ = req.reply.send(Ok(client_id));
        },
        Command::Unregister { client_id, reply } => {
            if let Some(client) = state.remove(client_id) {
                let _ = client.try_send(OutboundFrame::Close);
                moltis_metrics::gauge!(moltis_metrics::websocket::CONNECTIONS_ACTIVE)
                    .set(state.stats().total_clients as f64);
            }
            if let Some(reply) = reply {
                let _ = reply.send(());
            }
        },
        Command::Pong { client_id } => {
            if let Some(client) = state.get_mut(client_id) {
                client.last_pong = Instant::now();
            }
        },
        Command::SendToUser {
            user_id,
            payload,
            reply,
        } => {
            let json = payload.to_string();
            let mut delivered = 0usize;
            let mut dead = Vec::new();
            for client_id in state.clients_for_user(user_id) {
                if let Some(client) = state.get(client_id) {
                    if client.try_send(OutboundFrame::Text(json.clone())) {
                        delivered += 1;
                    } else {
                        warn!(%client_id, %user_id, "send queue full, dropping client");
                        moltis_metrics::counter!(moltis_metrics::websocket::SEND_QUEUE_OVERFLOW_TOTAL)
                            .increment(1);
                        dead.push(client_id);
                    }
                }
            }
            for client_id in dead {
                if let Some(client) = state.remove(client_id) {
                    let _ = client.try_send(OutboundFrame::Close);
                }
            }
            let _ = reply.send(delivered);
        },
        Command::SendToUsers {
            user_ids,
            payload,
            exclude_user_ids,
            reply,
        } => {
            let json = payload.to_string();
            let mut delivered = 0usize;
            let mut dead = Vec::new();
            for user_id in user_ids {
                if exclude_user_ids.contains(&user_id) {
                    continue;
                }
                for client_id in state.clients_for_user(user_id) {
                    if let Some(client) = state.get(client_id) {
                        if client.try_send(OutboundFrame::Text(json.clone())) {
                            delivered += 1;
                        } else {
                            dead.push(client_id);
                        }
                    }
                }
            }
            for client_id in dead {
                if let Some(client) = state.remove(client_id) {
                    let _ = client.try_send(OutboundFrame::Close);
                }
            }
            let _ = reply.send(delivered);
        },
        Command::BroadcastAll {
            payload,
            exclude_client,
            reply,
        } => {
            let json = payload.to_string();
            let mut delivered = 0usize;
            let mut dead = Vec::new();
            for client_id in state.all_client_ids() {
                if Some(client_id) == exclude_client {
                    continue;
                }
                if let Some(client) = state.get(client_id) {
                    if client.try_send(OutboundFrame::Text(json.clone())) {
                        delivered += 1;
                    } else {
                        dead.push(client_id);
                    }
                }
            }
            for client_id in dead {
                if let Some(client) = state.remove(client_id) {
                    let _ = client.try_send(OutboundFrame::Close);
                }
            }
            let _ = reply.send(delivered);
        },
        Command::IsUserOnline { user_id, reply } => {
            let _ = reply.send(state.is_user_online(user_id));
        },
        Command::DeviceCount { user_id, reply } => {
            let _ = reply.send(state.device_count(user_id));
        },
        Command::OnlineUsers { reply } => {
            let _ = reply.send(state.online_users());
        },
        Command::ClientInfo { client_id, reply } => {
            let _ = reply.send(state.client_info(client_id));
        },
        Command::Stats { reply } => {
            let _ = reply.send(state.stats());
        },
        Command::Cleanup => evict_stale(state),
        Command::Shutdown { reply } => {
            let _ = reply.send(());
        },
    }
}

fn evict_stale(state: &mut HubState) {
    let stale_after = Duration::from_secs(PONG_STALE_SECS);
    let now = Instant::now();
    let stale = state.stale_clients(stale_after, now);
    for client_id in &stale {
        debug!(%client_id, "evicting stale client");
        if let Some(client) = state.remove(*client_id) {
            let _ = client.try_send(OutboundFrame::Close);
        }
    }
    if !stale.is_empty() {
        moltis_metrics::counter!(moltis_metrics::websocket::STALE_EVICTIONS_TOTAL)
            .increment(stale.len() as u64);
        moltis_metrics::gauge!(moltis_metrics::websocket::CONNECTIONS_ACTIVE)
            .set(state.stats().total_clients as f64);
    }
}
