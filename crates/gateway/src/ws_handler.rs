//! `/ws` upgrade and the per-connection read/write loop.
//!
//! Credential verification is an external collaborator (§1 non-goal): by
//! the time a request reaches this handler, an upstream auth layer has
//! already resolved the bearer token to a user id and attached it as the
//! `x-authenticated-user-id` header. This handler only consumes that id.

use axum::{
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    http::HeaderMap,
    response::{IntoResponse, Response},
};
use futures::SinkExt;
use tracing::{debug, warn};
use uuid::Uuid;

use moltis_common::Error;
use moltis_protocol::{
    MAX_PAYLOAD_BYTES, ServerMessage, ServerMessageKind,
    ws::{ClientMessage, ClientMessageKind},
};

use crate::{error::ApiError, state::AppState};

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name)?.to_str().ok()
}

pub async fn upgrade(State(state): State<AppState>, headers: HeaderMap, ws: WebSocketUpgrade) -> Response {
    let Some(user_id) = header_str(&headers, "x-authenticated-user-id").and_then(|v| Uuid::parse_str(v).ok()) else {
        return ApiError(Error::unauthorized("missing or invalid authenticated user id")).into_response();
    };
    let device_id = header_str(&headers, "x-device-id").unwrap_or("unknown").to_string();
    let platform = header_str(&headers, "x-platform").unwrap_or("unknown").to_string();
    let app_version = header_str(&headers, "x-app-version").map(str::to_string);

    ws.max_message_size(MAX_PAYLOAD_BYTES)
        .on_upgrade(move |socket| handle_socket(socket, state, user_id, device_id, platform, app_version))
}

async fn handle_socket(mut socket: WebSocket, state: AppState, user_id: Uuid, device_id: String, platform: String, app_version: Option<String>) {
    let metadata = serde_json::json!({ "app_version": app_version });
    let registered = match state.hub.register(user_id, device_id.clone(), platform, metadata).await {
        Ok(client) => client,
        Err(e) => {
            debug!(%user_id, error = %e, "websocket registration refused");
            let _ = socket.close().await;
            return;
        },
    };
    let client_id = registered.client_id;
    let mut outbox = registered.outbox;
    let send_handle = registered.send_handle;

    let ack = ServerMessage::connection_ack(Uuid::new_v4().to_string(), &client_id.to_string(), iso_now());
    if let Ok(payload) = serde_json::to_string(&ack) {
        let _ = send_handle.try_send(moltis_hub::OutboundFrame::Text(payload));
    }

    let ping_ticker = moltis_hub::pinger::spawn(send_handle.clone());

    loop {
        tokio::select! {
            biased;
            frame = outbox.recv() => {
                let Some(frame) = frame else { break };
                let outcome = match frame {
                    moltis_hub::OutboundFrame::Text(text) => socket.send(Message::Text(text.into())).await,
                    moltis_hub::OutboundFrame::Ping => socket.send(Message::Ping(Vec::new().into())).await,
                    moltis_hub::OutboundFrame::Close => break,
                };
                if outcome.is_err() {
                    break;
                }
            }
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        if let Err(e) = handle_client_message(&state, client_id, user_id, &text).await {
                            warn!(%user_id, error = %e.message, "failed to handle inbound ws message");
                        }
                    }
                    Some(Ok(Message::Pong(_))) => state.hub.notify_pong(client_id).await,
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(Message::Binary(_) | Message::Ping(_))) => {}
                    Some(Err(_)) => break,
                }
            }
        }
    }

    let _ = socket.close().await;
    ping_ticker.abort();
    state.hub.unregister(client_id).await;
}

async fn handle_client_message(state: &AppState, client_id: Uuid, user_id: Uuid, text: &str) -> Result<(), Error> {
    let msg: ClientMessage = serde_json::from_str(text).map_err(|e| Error::validation(format!("invalid client message: {e}")))?;

    match msg.r#type {
        ClientMessageKind::Ping => {
            state.hub.notify_pong(client_id).await;
            let pong = ServerMessage::new(Uuid::new_v4().to_string(), ServerMessageKind::Pong, None, iso_now());
            state.hub.send_to_user(user_id, serde_json::to_value(pong).unwrap_or_default()).await;
        },
        ClientMessageKind::Authenticate => {
            let ack = ServerMessage::new(Uuid::new_v4().to_string(), ServerMessageKind::AuthSuccess, None, iso_now());
            state.hub.send_to_user(user_id, serde_json::to_value(ack).unwrap_or_default()).await;
        },
        ClientMessageKind::MarkAsDelivered => {
            let message_id = payload_uuid(&msg, "message_id")?;
            state.dispatcher.mark_delivered(message_id, user_id).await?;
        },
        ClientMessageKind::MarkAsRead => {
            let message_id = payload_uuid(&msg, "message_id")?;
            state.dispatcher.mark_read(message_id, user_id).await?;
        },
        ClientMessageKind::TypingStart => {
            let conversation_id = payload_uuid(&msg, "conversation_id")?;
            state.dispatcher.set_typing(conversation_id, user_id, true).await;
        },
        ClientMessageKind::TypingStop => {
            let conversation_id = payload_uuid(&msg, "conversation_id")?;
            state.dispatcher.set_typing(conversation_id, user_id, false).await;
        },
        ClientMessageKind::PresenceQuery => {
            let target = payload_uuid(&msg, "user_id")?;
            let online = state.hub.is_user_online(target).await;
            let reply = ServerMessage::new(
                Uuid::new_v4().to_string(),
                ServerMessageKind::PresenceUpdate,
                Some(serde_json::json!({ "user_id": target, "online": online })),
                iso_now(),
            );
            state.hub.send_to_user(user_id, serde_json::to_value(reply).unwrap_or_default()).await;
        },
        // Subscribe/Unsubscribe/PresenceUpdate have no additional durable
        // state in this data model (§3 names no subscription record); they
        // are acknowledged for wire-protocol completeness and nothing more.
        ClientMessageKind::Subscribe => ack_kind(state, user_id, ServerMessageKind::Subscribed).await,
        ClientMessageKind::Unsubscribe => ack_kind(state, user_id, ServerMessageKind::Unsubscribed).await,
        ClientMessageKind::PresenceUpdate => {},
        // Call signaling is point-to-point: relay the envelope verbatim to
        // the named target user, reusing the hub's per-user fan-out rather
        // than inventing a separate signaling channel.
        ClientMessageKind::CallOffer => relay_call(state, &msg, ServerMessageKind::CallOffer).await?,
        ClientMessageKind::CallAnswer => relay_call(state, &msg, ServerMessageKind::CallAnswer).await?,
        ClientMessageKind::CallIce => relay_call(state, &msg, ServerMessageKind::CallIce).await?,
        ClientMessageKind::CallHangup => relay_call(state, &msg, ServerMessageKind::CallEnded).await?,
    }
    Ok(())
}

async fn ack_kind(state: &AppState, user_id: Uuid, kind: ServerMessageKind) {
    let ack = ServerMessage::new(Uuid::new_v4().to_string(), kind, None, iso_now());
    state.hub.send_to_user(user_id, serde_json::to_value(ack).unwrap_or_default()).await;
}

async fn relay_call(state: &AppState, msg: &ClientMessage, kind: ServerMessageKind) -> Result<(), Error> {
    let target = payload_uuid(msg, "target_user_id")?;
    let relayed = ServerMessage::new(Uuid::new_v4().to_string(), kind, msg.payload.clone(), iso_now());
    state.hub.send_to_user(target, serde_json::to_value(relayed).unwrap_or_default()).await;
    Ok(())
}

fn payload_uuid(msg: &ClientMessage, field: &str) -> Result<Uuid, Error> {
    msg.payload
        .as_ref()
        .and_then(|p| p.get(field))
        .and_then(|v| v.as_str())
        .and_then(|s| Uuid::parse_str(s).ok())
        .ok_or_else(|| Error::validation(format!("missing or invalid payload.{field}")))
}

fn iso_now() -> String {
    chrono::Utc::now().to_rfc3339()
}
