//! Router assembly and the middleware stack.
//!
//! Grounded on the teacher's `apply_middleware_stack`/`build_cors_layer`
//! layering order; narrowed to this gateway's three concerns (proxy,
//! websocket upgrade, health) instead of the teacher's auth/chat/voice
//! surface.

use std::time::Duration;

use axum::{
    Router,
    extract::State,
    http::{HeaderName, HeaderValue, Request, header},
    response::IntoResponse,
    routing::{get, post},
};
use tower_http::{
    catch_panic::CatchPanicLayer,
    compression::CompressionLayer,
    cors::{AllowOrigin, Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    sensitive_headers::SetSensitiveHeadersLayer,
    set_header::SetResponseHeaderLayer,
    trace::{DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::{health, metrics_middleware, proxy, sessions, state::AppState, ws_handler};

fn build_cors_layer(allowed_origins: &[String]) -> CorsLayer {
    if allowed_origins.is_empty() {
        return CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);
    }
    let origins: Vec<HeaderValue> = allowed_origins.iter().filter_map(|o| HeaderValue::from_str(o).ok()).collect();
    CorsLayer::new().allow_origin(AllowOrigin::list(origins)).allow_methods(Any).allow_headers(Any)
}

/// Layer order (outermost → innermost for requests):
/// 1. `CatchPanicLayer` — converts handler panics to 500s
/// 2. `SetSensitiveHeadersLayer` — marks Authorization/Cookie as redacted
/// 3. `SetRequestIdLayer` — generates x-request-id before tracing
/// 4. `TraceLayer` — logs requests with redacted headers and the request id
/// 5. `CorsLayer` — handles preflight
/// 6. `PropagateRequestIdLayer` — copies x-request-id to the response
/// 7. extra response headers from config, then the fixed security set
/// 8. `RequestBodyLimitLayer` — rejects oversized bodies
/// 9. `CompressionLayer` (innermost)
fn apply_middleware_stack(router: Router<AppState>, state: &AppState) -> Router<AppState> {
    let cors = build_cors_layer(&state.config.security.cors_allowed_origins);

    let mut router = router
        .layer(CompressionLayer::new())
        .layer(RequestBodyLimitLayer::new(state.config.server.max_body_bytes))
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("x-content-type-options"),
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("x-frame-options"),
            HeaderValue::from_static("deny"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("referrer-policy"),
            HeaderValue::from_static("strict-origin-when-cross-origin"),
        ));

    for (name, value) in &state.config.security.extra_headers {
        if let (Ok(name), Ok(value)) = (HeaderName::try_from(name.as_str()), HeaderValue::from_str(value)) {
            router = router.layer(SetResponseHeaderLayer::overriding(name, value));
        }
    }

    let trace = TraceLayer::new_for_http()
        .make_span_with(|request: &Request<_>| {
            let request_id = request.headers().get("x-request-id").and_then(|v| v.to_str().ok()).unwrap_or("-").to_owned();
            tracing::info_span!("http_request", method = %request.method(), uri = %request.uri(), request_id = %request_id)
        })
        .on_request(DefaultOnRequest::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    router
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(cors)
        .layer(trace)
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(SetSensitiveHeadersLayer::new([header::AUTHORIZATION, header::COOKIE, header::SET_COOKIE]))
        .layer(CatchPanicLayer::new())
}

async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        state.metrics_handle.render(),
    )
}

/// Builds the full router, wired to `state`. Shared by the production
/// binary and integration tests.
pub fn build_router(state: AppState) -> Router {
    let router = Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::live))
        .route("/health/ready", get(health::ready))
        .route("/metrics", get(metrics_handler))
        .route("/ws", get(ws_handler::upgrade))
        .route("/internal/sessions/login", post(sessions::login))
        .fallback(proxy::proxy_handler)
        .layer(axum::middleware::from_fn_with_state(state.clone(), metrics_middleware::track));

    apply_middleware_stack(router, &state).with_state(state)
}

/// Waits for Ctrl+C or, on Unix, `SIGTERM`.
#[allow(clippy::expect_used)] // Startup fail-fast: signal handlers must install.
async fn shutdown_signal() {
    let ctrl_c = async { tokio::signal::ctrl_c().await.expect("failed to install ctrl-c handler") };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install sigterm handler")
            .recv()
            .await;
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}

/// Serves `router` on `listener` until a shutdown signal arrives, then waits
/// up to `drain_timeout` for in-flight requests before returning. The hub's
/// own connections are drained separately by the caller, since they live
/// outside axum's own graceful-shutdown bookkeeping.
pub async fn serve(listener: tokio::net::TcpListener, router: Router, drain_timeout: Duration) -> std::io::Result<()> {
    let server = axum::serve(listener, router.into_make_service_with_connect_info::<std::net::SocketAddr>())
        .with_graceful_shutdown(shutdown_signal());

    match tokio::time::timeout(drain_timeout, async move { server.await }).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!("graceful shutdown exceeded drain timeout, forcing exit");
            Ok(())
        },
    }
}
