#![allow(clippy::unwrap_used, clippy::expect_used)]
//! End-to-end proxy behavior: header rewriting, envelope duration_ms
//! rewriting, method rejection, and circuit-breaker tripping.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use axum::{Json, Router, routing::get};
use http::HeaderMap;
use tokio::net::TcpListener;

use moltis_config::schema::{
    CircuitBreakerConfig, GatewayConfig, HealthCheckConfig, LoadBalanceStrategy, RouteGroup,
    ServerConfig, ServiceDescriptor, UpstreamProtocol,
};
use moltis_dispatcher::{Dispatcher, notify::LoggingNotificationSink, store::memory::InMemoryMessageStore};
use moltis_gateway::{server, state::AppState};
use moltis_hub::Hub;
use moltis_tokens::{SessionManager, jwt::JwtIssuer};

fn test_sessions() -> Arc<SessionManager> {
    let jwt = JwtIssuer::new(b"test-secret", "gateway-tests", "moltis-clients", 900, 2_592_000);
    Arc::new(SessionManager::new(jwt, 86_400))
}

fn test_dispatcher(hub: Hub) -> Arc<Dispatcher> {
    Arc::new(Dispatcher::new(hub, Arc::new(InMemoryMessageStore::new()), Arc::new(LoggingNotificationSink)))
}

async fn spawn_upstream() -> SocketAddr {
    async fn ping(headers: HeaderMap) -> Json<serde_json::Value> {
        Json(serde_json::json!({
            "success": true,
            "data": { "echoed_connection": headers.get("connection").is_some() },
            "metadata": { "duration": "0s", "duration_ms": 0.0 },
        }))
    }
    let app = Router::new().route("/ping", get(ping));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app.into_make_service()).await.unwrap();
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    addr
}

async fn spawn_gateway(config: GatewayConfig) -> SocketAddr {
    let hub = Hub::spawn(8);
    let state = AppState::new(
        config,
        hub.clone(),
        test_dispatcher(hub),
        test_sessions(),
        moltis_metrics::init_metrics(moltis_metrics::MetricsRecorderConfig::default()).unwrap(),
        0,
    );
    let router = server::build_router(state);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router.into_make_service_with_connect_info::<SocketAddr>()).await.unwrap();
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    addr
}

fn base_config(upstream: SocketAddr) -> GatewayConfig {
    let mut config = GatewayConfig {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            ..ServerConfig::default()
        },
        ..GatewayConfig::default()
    };
    config.router_groups.push(RouteGroup {
        name: "svc".to_string(),
        prefix: "/svc".to_string(),
        service: "svc".to_string(),
        methods: ["GET"].into_iter().map(str::to_string).collect(),
        transform: true,
    });
    config.services.insert("svc".to_string(), service_descriptor(upstream.to_string()));
    config
}

fn service_descriptor(address: String) -> ServiceDescriptor {
    ServiceDescriptor {
        protocol: UpstreamProtocol::Http,
        addresses: vec![address],
        timeout_secs: 10,
        retry_attempts: 0,
        load_balancer_strategy: LoadBalanceStrategy::default(),
        health_check: HealthCheckConfig::default(),
        circuit_breaker: CircuitBreakerConfig::default(),
    }
}

#[tokio::test]
async fn proxy_forward_strips_hop_by_hop_headers_and_rewrites_duration() {
    let upstream = spawn_upstream().await;
    let gateway = spawn_gateway(base_config(upstream)).await;

    let client = reqwest::Client::new();
    let resp = client
        .get(format!("http://{gateway}/svc/ping?q=1"))
        .header("connection", "foo, upgrade")
        .header("x-real-ip", "1.2.3.4")
        .send()
        .await
        .unwrap();

    assert!(resp.status().is_success());
    assert!(resp.headers().get("connection").is_none());
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["echoed_connection"], false);
    assert!(body["metadata"]["duration_ms"].as_f64().unwrap() >= 0.0);
}

#[tokio::test]
async fn disallowed_method_returns_405() {
    let upstream = spawn_upstream().await;
    let gateway = spawn_gateway(base_config(upstream)).await;

    let client = reqwest::Client::new();
    let resp = client.post(format!("http://{gateway}/svc/ping")).send().await.unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::METHOD_NOT_ALLOWED);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn unknown_route_returns_404() {
    let upstream = spawn_upstream().await;
    let gateway = spawn_gateway(base_config(upstream)).await;

    let client = reqwest::Client::new();
    let resp = client.get(format!("http://{gateway}/nope")).send().await.unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn three_consecutive_failures_trip_the_breaker_and_short_circuit() {
    // Nothing is listening on this port, so every forward attempt fails fast.
    let dead_upstream: SocketAddr = "127.0.0.1:1".parse().unwrap();
    let mut config = base_config(dead_upstream);
    config.services.get_mut("svc").unwrap().circuit_breaker = CircuitBreakerConfig {
        failure_threshold: 3,
        failure_ratio: 0.6,
        min_requests: 1,
        open_duration_secs: 30,
        half_open_requests: 1,
    };
    config.services.get_mut("svc").unwrap().timeout_secs = 1;
    let gateway = spawn_gateway(config).await;

    let client = reqwest::Client::new();
    for _ in 0..3 {
        let resp = client.get(format!("http://{gateway}/svc/ping")).send().await.unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::SERVICE_UNAVAILABLE);
    }

    // The breaker is now open: a fourth request is refused without the
    // gateway attempting to reach the (still dead) upstream again.
    let resp = client.get(format!("http://{gateway}/svc/ping")).send().await.unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::SERVICE_UNAVAILABLE);
    assert!(resp.headers().get("retry-after").is_some());
}

#[tokio::test]
async fn health_endpoints_respond() {
    let upstream = spawn_upstream().await;
    let gateway = spawn_gateway(base_config(upstream)).await;

    let client = reqwest::Client::new();
    let live = client.get(format!("http://{gateway}/health/live")).send().await.unwrap();
    assert_eq!(live.status(), reqwest::StatusCode::OK);

    let health = client.get(format!("http://{gateway}/health")).send().await.unwrap();
    assert!(health.status().is_success() || health.status() == reqwest::StatusCode::SERVICE_UNAVAILABLE);
}
