//! Session records and the login/reuse decision.
//!
//! A session is keyed by `(user_id, device_fingerprint)`. Logging in again
//! from the same device reuses the existing session rather than minting a
//! new one; a different device for the same user always gets its own.

use std::{
    collections::HashMap,
    sync::RwLock,
};

use {
    serde::{Deserialize, Serialize},
    uuid::Uuid,
};

use moltis_common::{Error, Result};

use crate::{fingerprint, jwt::JwtIssuer, token};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionType {
    Web,
    Mobile,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub os: String,
    pub os_version: Option<String>,
    pub app_version: Option<String>,
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IpInfo {
    pub ip: String,
    pub country: Option<String>,
    pub city: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub session_id: Uuid,
    pub user_id: Uuid,
    pub session_token: String,
    pub refresh_token: String,
    pub device_fingerprint: String,
    pub device_info: DeviceInfo,
    pub ip_info: IpInfo,
    pub expires_at: i64,
    pub session_type: SessionType,
    #[serde(default)]
    pub push_tokens: Vec<String>,
}

impl SessionRecord {
    #[must_use]
    pub fn is_expired(&self, now: i64) -> bool {
        now >= self.expires_at
    }
}

pub struct LoginRequest {
    pub user_id: Uuid,
    pub device_id: String,
    pub device_info: DeviceInfo,
    pub ip_info: IpInfo,
    pub session_type: SessionType,
}

pub struct LoginOutcome {
    pub session: SessionRecord,
    pub reused: bool,
}

/// In-process session store. A production deployment would back this with
/// a shared keystore; the key invariant (one active session per
/// `(user_id, device_fingerprint)`) lives here regardless of backend.
pub struct SessionManager {
    sessions: RwLock<HashMap<(Uuid, String), SessionRecord>>,
    jwt: JwtIssuer,
    session_ttl_secs: i64,
}

impl SessionManager {
    #[must_use]
    pub fn new(jwt: JwtIssuer, session_ttl_secs: i64) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            jwt,
            session_ttl_secs,
        }
    }

    /// Finds or creates a session for this device, reusing it when a
    /// non-expired one already exists for the same `(user_id, fingerprint)`
    /// pair (the intended per-device-reuse behavior: a different device
    /// never collides with, or evicts, another device's session).
    pub fn login(&self, req: LoginRequest, now: i64) -> Result<LoginOutcome> {
        let device_fingerprint = fingerprint::compute(
            &req.device_id,
            &req.device_info.os,
            &req.device_info.name,
        );
        let key = (req.user_id, device_fingerprint.clone());

        {
            let sessions = self
                .sessions
                .read()
                .map_err(|_| Error::internal("session store lock poisoned"))?;
            if let Some(existing) = sessions.get(&key) {
                if !existing.is_expired(now) {
                    moltis_metrics::counter!(moltis_metrics::session::REUSED_TOTAL).increment(1);
                    return Ok(LoginOutcome {
                        session: existing.clone(),
                        reused: true,
                    });
                }
            }
        }

        let session_id = Uuid::new_v4();
        let issued = self.jwt.issue(&req.user_id.to_string(), now)?;
        let session = SessionRecord {
            session_id,
            user_id: req.user_id,
            session_token: token::mint(&req.user_id.to_string()),
            refresh_token: issued.refresh_token,
            device_fingerprint,
            device_info: req.device_info,
            ip_info: req.ip_info,
            expires_at: now + self.session_ttl_secs,
            session_type: req.session_type,
            push_tokens: Vec::new(),
        };

        self.sessions
            .write()
            .map_err(|_| Error::internal("session store lock poisoned"))?
            .insert(key, session.clone());

        moltis_metrics::counter!(moltis_metrics::session::CREATED_TOTAL).increment(1);
        moltis_metrics::counter!(moltis_metrics::session::TOKENS_ISSUED_TOTAL).increment(1);
        let _ = issued.access_token; // handed to the caller via session_token/refresh_token pair
        Ok(LoginOutcome {
            session,
            reused: false,
        })
    }

    pub fn get(&self, session_id: Uuid) -> Option<SessionRecord> {
        self.sessions
            .read()
            .ok()?
            .values()
            .find(|s| s.session_id == session_id)
            .cloned()
    }

    pub fn revoke(&self, session_id: Uuid) -> bool {
        let Ok(mut sessions) = self.sessions.write() else {
            return false;
        };
        let key = sessions
            .iter()
            .find(|(_, s)| s.session_id == session_id)
            .map(|(k, _)| k.clone());
        match key {
            Some(key) => sessions.remove(&key).is_some(),
            None => false,
        }
    }

    pub fn active_count(&self) -> usize {
        self.sessions.read().map(|s| s.len()).unwrap_or(0)
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> SessionManager {
        let jwt = JwtIssuer::new(b"test-secret", "moltis-gateway", "moltis-clients", 900, 2_592_000);
        SessionManager::new(jwt, 86_400)
    }

    fn login_req(user_id: Uuid, device_id: &str) -> LoginRequest {
        LoginRequest {
            user_id,
            device_id: device_id.to_string(),
            device_info: DeviceInfo {
                os: "ios".into(),
                os_version: None,
                app_version: None,
                name: "Alice's iPhone".into(),
            },
            ip_info: IpInfo::default(),
            session_type: SessionType::Mobile,
        }
    }

    #[test]
    fn logging_in_twice_from_the_same_device_reuses_the_session() {
        let manager = manager();
        let user = Uuid::new_v4();

        let first = manager.login(login_req(user, "device-1"), 1_000).unwrap();
        assert!(!first.reused);

        let second = manager.login(login_req(user, "device-1"), 1_050).unwrap();
        assert!(second.reused);
        assert_eq!(first.session.session_id, second.session.session_id);
        assert_eq!(first.session.session_token, second.session.session_token);
    }

    #[test]
    fn different_devices_for_the_same_user_get_different_sessions() {
        let manager = manager();
        let user = Uuid::new_v4();

        let phone = manager.login(login_req(user, "device-1"), 1_000).unwrap();
        let laptop = manager.login(login_req(user, "device-2"), 1_000).unwrap();

        assert_ne!(phone.session.session_id, laptop.session.session_id);
        assert_ne!(
            phone.session.device_fingerprint,
            laptop.session.device_fingerprint
        );
        assert_eq!(manager.active_count(), 2);
    }

    #[test]
    fn expired_session_is_replaced_not_reused() {
        let manager = manager();
        let user = Uuid::new_v4();

        let first = manager.login(login_req(user, "device-1"), 1_000).unwrap();
        let second = manager
            .login(login_req(user, "device-1"), 1_000 + 86_400 + 1)
            .unwrap();

        assert!(!second.reused);
        assert_ne!(first.session.session_id, second.session.session_id);
    }
}
