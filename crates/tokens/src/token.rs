//! Opaque session token minting.
//!
//! The token is not a JWT: it carries no decodable claims, only enough
//! entropy plus a binding hash to make it infeasible to forge or replay
//! against a different user. The access/refresh tokens handed to clients
//! for API authorization are separate, real JWTs (see [`crate::jwt`]).

use {base64::Engine, rand::RngCore, sha2::{Digest, Sha256}};

const NONCE_LEN: usize = 32;

/// Mints a 64-byte opaque token: 32 random bytes concatenated with
/// `SHA-256(nonce || user_id)`, base64url-encoded without padding.
#[must_use]
pub fn mint(user_id: &str) -> String {
    let mut nonce = [0u8; NONCE_LEN];
    rand::rng().fill_bytes(&mut nonce);
    mint_with_nonce(&nonce, user_id)
}

fn mint_with_nonce(nonce: &[u8; NONCE_LEN], user_id: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(nonce);
    hasher.update(user_id.as_bytes());
    let binding = hasher.finalize();

    let mut raw = Vec::with_capacity(NONCE_LEN + binding.len());
    raw.extend_from_slice(nonce);
    raw.extend_from_slice(&binding);

    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mint_produces_distinct_tokens_for_the_same_user() {
        let a = mint("user-1");
        let b = mint("user-1");
        assert_ne!(a, b, "random nonce should make tokens unique per call");
    }

    #[test]
    fn minted_token_has_no_padding() {
        let token = mint("user-1");
        assert!(!token.contains('='));
    }
}
