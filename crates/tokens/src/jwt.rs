//! Access/refresh JWT issuance.
//!
//! The session manager owns minting these; verifying them on the way into
//! a protected endpoint is someone else's job (the gateway's upstream auth
//! middleware). Here we only ever sign.

use {
    jsonwebtoken::{EncodingKey, Header, encode},
    serde::{Deserialize, Serialize},
};

use moltis_common::{Error, Result};

#[derive(Clone)]
pub struct JwtIssuer {
    encoding_key: EncodingKey,
    issuer: String,
    audience: String,
    access_token_ttl_secs: i64,
    refresh_token_ttl_secs: i64,
}

impl std::fmt::Debug for JwtIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtIssuer")
            .field("encoding_key", &"<redacted>")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("access_token_ttl_secs", &self.access_token_ttl_secs)
            .field("refresh_token_ttl_secs", &self.refresh_token_ttl_secs)
            .finish()
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    iss: String,
    aud: String,
    sub: String,
    iat: i64,
    exp: i64,
    user_id: String,
}

pub struct IssuedTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub access_expires_at: i64,
    pub refresh_expires_at: i64,
}

impl JwtIssuer {
    #[must_use]
    pub fn new(
        secret: &[u8],
        issuer: impl Into<String>,
        audience: impl Into<String>,
        access_token_ttl_secs: i64,
        refresh_token_ttl_secs: i64,
    ) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            issuer: issuer.into(),
            audience: audience.into(),
            access_token_ttl_secs,
            refresh_token_ttl_secs,
        }
    }

    /// Issues a fresh access/refresh pair for `user_id`, stamped at `issued_at`
    /// (Unix seconds). Both carry `iss`/`aud`/`exp = issued_at + ttl` and a
    /// `user_id` claim so downstream services don't need a session lookup
    /// just to know whose request this is.
    pub fn issue(&self, user_id: &str, issued_at: i64) -> Result<IssuedTokens> {
        let access_expires_at = issued_at + self.access_token_ttl_secs;
        let refresh_expires_at = issued_at + self.refresh_token_ttl_secs;

        let access_token = self.sign(user_id, issued_at, access_expires_at)?;
        let refresh_token = self.sign(user_id, issued_at, refresh_expires_at)?;

        Ok(IssuedTokens {
            access_token,
            refresh_token,
            access_expires_at,
            refresh_expires_at,
        })
    }

    fn sign(&self, user_id: &str, issued_at: i64, expires_at: i64) -> Result<String> {
        let claims = Claims {
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            sub: user_id.to_string(),
            iat: issued_at,
            exp: expires_at,
            user_id: user_id.to_string(),
        };
        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| Error::internal(format!("failed to sign jwt: {e}")))
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issue_stamps_expirations_relative_to_issued_at() {
        let issuer = JwtIssuer::new(b"test-secret", "moltis-gateway", "moltis-clients", 900, 2_592_000);
        let tokens = issuer.issue("user-1", 1_000).unwrap();
        assert_eq!(tokens.access_expires_at, 1_900);
        assert_eq!(tokens.refresh_expires_at, 2_593_000);
        assert_ne!(tokens.access_token, tokens.refresh_token);
    }
}
