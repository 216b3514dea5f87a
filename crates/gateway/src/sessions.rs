//! Internal session-establishment endpoint.
//!
//! Credential verification itself is an external collaborator; by the time
//! a request reaches here, the upstream auth service has already confirmed
//! the user's identity and is only asking the gateway to mint or reuse a
//! device-bound session via [`moltis_tokens::SessionManager`].

use axum::{Json, extract::State, response::IntoResponse};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use moltis_tokens::{DeviceInfo, IpInfo, LoginRequest, SessionType};

use crate::{error::ApiError, state::AppState};

#[derive(Debug, Deserialize)]
pub struct LoginBody {
    pub user_id: Uuid,
    pub device_id: String,
    pub device_info: DeviceInfo,
    #[serde(default)]
    pub ip_info: IpInfo,
    pub session_type: SessionType,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub session_id: Uuid,
    pub session_token: String,
    pub refresh_token: String,
    pub device_fingerprint: String,
    pub expires_at: i64,
    pub reused: bool,
}

pub async fn login(State(state): State<AppState>, Json(body): Json<LoginBody>) -> Result<impl IntoResponse, ApiError> {
    let req = LoginRequest {
        user_id: body.user_id,
        device_id: body.device_id,
        device_info: body.device_info,
        ip_info: body.ip_info,
        session_type: body.session_type,
    };
    let outcome = state.sessions.login(req, chrono::Utc::now().timestamp())?;
    Ok(Json(LoginResponse {
        session_id: outcome.session.session_id,
        session_token: outcome.session.session_token,
        refresh_token: outcome.session.refresh_token,
        device_fingerprint: outcome.session.device_fingerprint,
        expires_at: outcome.session.expires_at,
        reused: outcome.reused,
    }))
}
