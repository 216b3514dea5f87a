//! Hop-by-hop header stripping and forwarded-for bookkeeping.
//!
//! Grounded on the client-ip resolution order in the teacher's
//! `request_throttle.rs` (`X-Real-IP` / `X-Forwarded-For` / peer address).

use std::net::SocketAddr;

use http::{HeaderMap, HeaderName, HeaderValue};

/// §4.1: stripped from both the forwarded request and the returned response.
pub const HOP_BY_HOP: &[&str] = &[
    "connection",
    "proxy-connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Removes the fixed hop-by-hop set, plus each token named inside an
/// inbound `Connection` header value (e.g. `Connection: foo, Upgrade`
/// also removes a header literally named `foo`).
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let extra_tokens: Vec<String> = headers
        .get(http::header::CONNECTION)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(',').map(|t| t.trim().to_ascii_lowercase()).collect())
        .unwrap_or_default();

    for name in HOP_BY_HOP {
        headers.remove(*name);
    }
    for token in extra_tokens {
        if let Ok(name) = HeaderName::try_from(token.as_str()) {
            headers.remove(name);
        }
    }
}

/// First present of `X-Real-IP`, the existing `X-Forwarded-For`, else the
/// transport peer's IP.
#[must_use]
pub fn resolve_client_ip(headers: &HeaderMap, peer: SocketAddr) -> String {
    if let Some(ip) = header_str(headers, "x-real-ip") {
        return ip.to_string();
    }
    if let Some(xff) = header_str(headers, "x-forwarded-for") {
        if let Some(first) = xff.split(',').next() {
            return first.trim().to_string();
        }
    }
    peer.ip().to_string()
}

/// Appends the resolved client ip to `X-Forwarded-For`, creating it if absent.
pub fn extend_forwarded_for(headers: &mut HeaderMap, client_ip: &str) {
    let existing = header_str(headers, "x-forwarded-for").map(str::to_string);
    let value = match existing {
        Some(existing) => format!("{existing}, {client_ip}"),
        None => client_ip.to_string(),
    };
    if let Ok(header_value) = HeaderValue::from_str(&value) {
        headers.insert(HeaderName::from_static("x-forwarded-for"), header_value);
    }
}

/// Rewrites `Host` to the upstream's host:port.
pub fn set_upstream_host(headers: &mut HeaderMap, upstream_host: &str) {
    if let Ok(value) = HeaderValue::from_str(upstream_host) {
        headers.insert(http::header::HOST, value);
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name)?.to_str().ok()
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_token_headers_are_removed() {
        let mut headers = HeaderMap::new();
        headers.insert(http::header::CONNECTION, HeaderValue::from_static("foo, Upgrade"));
        headers.insert(HeaderName::from_static("foo"), HeaderValue::from_static("bar"));
        headers.insert(http::header::UPGRADE, HeaderValue::from_static("websocket"));
        strip_hop_by_hop(&mut headers);
        assert!(!headers.contains_key(http::header::CONNECTION));
        assert!(!headers.contains_key("foo"));
        assert!(!headers.contains_key(http::header::UPGRADE));
    }

    #[test]
    fn client_ip_prefers_x_real_ip() {
        let mut headers = HeaderMap::new();
        headers.insert(HeaderName::from_static("x-real-ip"), HeaderValue::from_static("1.2.3.4"));
        let peer: SocketAddr = "9.9.9.9:1234".parse().unwrap();
        assert_eq!(resolve_client_ip(&headers, peer), "1.2.3.4");
    }

    #[test]
    fn client_ip_falls_back_to_peer() {
        let headers = HeaderMap::new();
        let peer: SocketAddr = "9.9.9.9:1234".parse().unwrap();
        assert_eq!(resolve_client_ip(&headers, peer), "9.9.9.9");
    }
}
