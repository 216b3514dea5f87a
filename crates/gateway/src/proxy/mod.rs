//! Reverse-proxy path: route resolution, policy enforcement, forwarding,
//! and response normalization.

pub mod breaker;
pub mod envelope_rewrite;
pub mod forward;
pub mod headers;
pub mod loadbalance;
pub mod ratelimit;
pub mod route;

use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{ConnectInfo, Request, State},
    response::{IntoResponse, Response},
};
use http::{HeaderValue, StatusCode};
use tracing::{error, warn};

use moltis_common::Error;

use crate::{error::ApiError, state::AppState};

/// Registered as the router's fallback: every request that doesn't match a
/// built-in endpoint (`/health*`, `/ws`, `/metrics`) is resolved against
/// the configured route groups and proxied.
pub async fn proxy_handler(State(state): State<AppState>, ConnectInfo(peer): ConnectInfo<std::net::SocketAddr>, request: Request) -> Response {
    let start = Instant::now();
    let path = request.uri().path().to_string();
    let method = request.method().clone();

    let route_match = {
        let routes = &state.config.router_groups;
        route::resolve(routes, &path, &method)
    };

    let route = match route_match {
        route::RouteMatch::NotFound => {
            moltis_metrics::counter!(moltis_metrics::gateway::PROXY_ROUTE_NOT_FOUND_TOTAL).increment(1);
            return ApiError(Error::not_found(format!("no route for {path}"))).into_response();
        },
        route::RouteMatch::MethodNotAllowed => {
            moltis_metrics::counter!(moltis_metrics::gateway::PROXY_METHOD_NOT_ALLOWED_TOTAL).increment(1);
            return ApiError(Error::validation(format!("method {method} not allowed for {path}")).with_code("method_not_allowed"))
                .into_response();
        },
        route::RouteMatch::Found { route, forward_path } => (route.clone(), forward_path),
    };
    let (route, forward_path) = route;

    let Some(service) = state.config.services.get(&route.service).cloned() else {
        error!(service = %route.service, "route references unknown service after validation");
        return ApiError(Error::internal("route misconfiguration")).into_response();
    };

    if let Some(limit) = state.rate_limit_rule(&route.prefix) {
        let key = format!("{}:{}", route.prefix, peer.ip());
        if !state.rate_limiter.check(&key, &limit) {
            moltis_metrics::counter!(moltis_metrics::gateway::RATE_LIMIT_REJECTIONS_TOTAL).increment(1);
            let mut resp = ApiError(Error::rate_limited("too many requests")).into_response();
            resp.headers_mut().insert("retry-after", HeaderValue::from_static("30"));
            *resp.status_mut() = StatusCode::TOO_MANY_REQUESTS;
            return resp;
        }
    }

    let breaker = state.breaker_for(&route.service, &service.circuit_breaker);
    if !breaker.admit() {
        return service_unavailable_response();
    }

    let client_ip = headers::resolve_client_ip(request.headers(), peer);
    let (parts, body) = request.into_parts();
    let body_bytes = match axum::body::to_bytes(body, state.config.server.max_body_bytes).await {
        Ok(b) => b,
        Err(_) => {
            return ApiError(Error::validation("request body exceeds the configured limit")).into_response();
        },
    };

    let mut forward_headers = parts.headers.clone();
    headers::strip_hop_by_hop(&mut forward_headers);
    headers::extend_forwarded_for(&mut forward_headers, &client_ip);

    let addresses = &service.addresses;
    let Some(address) = state.load_balance.pick(&route.service, service.load_balancer_strategy, addresses) else {
        error!(service = %route.service, "service has no configured addresses");
        return ApiError(Error::internal("service misconfiguration")).into_response();
    };
    headers::set_upstream_host(&mut forward_headers, address);

    let path_and_query = match parts.uri.query() {
        Some(q) => format!("{forward_path}?{q}"),
        None => forward_path,
    };

    state.load_balance.begin_request(&route.service, address);
    let result = forward::forward(
        &state.http_client,
        service.protocol,
        address,
        forward::ForwardRequest {
            method,
            path_and_query,
            headers: forward_headers,
            body: body_bytes.to_vec(),
        },
        Duration::from_secs(service.timeout_secs),
    )
    .await;
    state.load_balance.end_request(&route.service, address);

    let upstream = match result {
        Ok(resp) => {
            breaker.record_success();
            resp
        },
        Err(err) => {
            breaker.record_failure();
            warn!(service = %route.service, error = %err.message, "upstream request failed");
            return service_unavailable_response();
        },
    };

    moltis_metrics::counter!(moltis_metrics::gateway::PROXY_REQUESTS_TOTAL).increment(1);
    moltis_metrics::histogram!(moltis_metrics::gateway::PROXY_UPSTREAM_DURATION_SECONDS).record(start.elapsed().as_secs_f64());

    build_response(upstream, start.elapsed())
}

fn service_unavailable_response() -> Response {
    let mut resp = ApiError(Error::upstream_unavailable("upstream service is unavailable, retry shortly")).into_response();
    resp.headers_mut().insert("retry-after", HeaderValue::from_static("30"));
    resp
}

fn build_response(upstream: forward::ForwardResponse, elapsed: Duration) -> Response {
    let is_json = upstream
        .headers
        .get(http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.contains("application/json"));

    let body_bytes = if is_json {
        envelope_rewrite::rewrite(&upstream.body, elapsed)
    } else {
        upstream.body
    };

    let mut response_headers = upstream.headers;
    headers::strip_hop_by_hop(&mut response_headers);
    response_headers.remove(http::header::CONTENT_LENGTH);
    response_headers.insert(http::header::CONTENT_LENGTH, HeaderValue::from(body_bytes.len()));

    let status = StatusCode::from_u16(upstream.status).unwrap_or(StatusCode::BAD_GATEWAY);
    let mut response = Response::new(Body::from(body_bytes));
    *response.status_mut() = status;
    *response.headers_mut() = response_headers;
    response
}

pub use loadbalance::LoadBalanceState;
