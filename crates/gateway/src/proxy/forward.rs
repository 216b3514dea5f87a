//! Forwards a request to the selected upstream address with a per-service
//! timeout. Upstream failures never leak past this boundary: they come back
//! as `upstream_unavailable`, matching §4.1's "never surfaced" rule.

use std::time::Duration;

use http::{HeaderMap, Method};
use moltis_common::{Error, Result};
use moltis_config::schema::UpstreamProtocol;

pub struct ForwardRequest {
    pub method: Method,
    pub path_and_query: String,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

pub struct ForwardResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

fn base_url(protocol: UpstreamProtocol, address: &str) -> String {
    if address.contains("://") {
        return address.to_string();
    }
    let scheme = match protocol {
        UpstreamProtocol::Https => "https",
        UpstreamProtocol::Http | UpstreamProtocol::Grpc => "http",
    };
    format!("{scheme}://{address}")
}

pub async fn forward(
    client: &reqwest::Client,
    protocol: UpstreamProtocol,
    address: &str,
    req: ForwardRequest,
    timeout: Duration,
) -> Result<ForwardResponse> {
    let url = format!("{}{}", base_url(protocol, address), req.path_and_query);
    let builder = client.request(req.method, &url).headers(req.headers).body(req.body);

    let response = tokio::time::timeout(timeout, builder.send())
        .await
        .map_err(|_| Error::timeout(format!("upstream {address} did not respond within {timeout:?}")))?
        .map_err(|e| Error::upstream_unavailable(format!("upstream {address} unreachable: {e}")))?;

    let status = response.status().as_u16();
    let headers = response.headers().clone();
    let body = response
        .bytes()
        .await
        .map_err(|e| Error::upstream_unavailable(format!("reading upstream body: {e}")))?
        .to_vec();

    Ok(ForwardResponse { status, headers, body })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_defaults_to_http_scheme() {
        assert_eq!(base_url(UpstreamProtocol::Http, "localhost:9001"), "http://localhost:9001");
    }

    #[test]
    fn base_url_respects_https() {
        assert_eq!(base_url(UpstreamProtocol::Https, "localhost:9001"), "https://localhost:9001");
    }

    #[test]
    fn base_url_preserves_explicit_scheme() {
        assert_eq!(base_url(UpstreamProtocol::Http, "https://example.com"), "https://example.com");
    }
}
