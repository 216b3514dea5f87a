//! Gateway binary: loads config, validates it, and serves C1/C2 together —
//! the hub lives in the same process since the WebSocket upgrade happens on
//! this gateway's `/ws` route.

use std::{sync::Arc, time::Duration};

use moltis_dispatcher::{
    Dispatcher,
    notify::LoggingNotificationSink,
    store::memory::InMemoryMessageStore,
};
use moltis_gateway::{server, state::AppState};
use moltis_hub::Hub;
use moltis_tokens::{SessionManager, jwt::JwtIssuer};

/// No route in this gateway accepts a direct WS connection from more than
/// this many devices per user; not part of the configured schema, since the
/// hub's own per-user cap is an operational safety valve rather than a
/// tunable a deployer is expected to reach for.
const MAX_CONNECTIONS_PER_USER: usize = 8;

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let config = moltis_config::discover_and_load_gateway();

    moltis_common::logging::init(&format!("info,{}=debug", env!("CARGO_PKG_NAME").replace('-', "_")));

    let validation = moltis_config::validate::validate_gateway(&config);
    for diagnostic in &validation.diagnostics {
        tracing::warn!(category = diagnostic.category, path = %diagnostic.path, severity = %diagnostic.severity, "{}", diagnostic.message);
    }
    if validation.has_errors() {
        tracing::error!("configuration failed validation, refusing to start");
        return std::process::ExitCode::FAILURE;
    }

    let metrics_handle = match moltis_metrics::init_metrics(moltis_metrics::MetricsRecorderConfig {
        enabled: config.monitoring.metrics_enabled,
        prefix: Some("moltis_gateway".to_string()),
        global_labels: Vec::new(),
    }) {
        Ok(handle) => handle,
        Err(e) => {
            tracing::error!(error = %e, "failed to initialize metrics");
            return std::process::ExitCode::FAILURE;
        },
    };

    let hub = Hub::spawn(MAX_CONNECTIONS_PER_USER);

    let store = Arc::new(InMemoryMessageStore::new());
    let notifier = Arc::new(LoggingNotificationSink);
    let dispatcher = Arc::new(Dispatcher::new(hub.clone(), store, notifier));

    let jwt_secret = std::env::var(format!("{}_JWT_SECRET", config.service.env_prefix)).unwrap_or_else(|_| {
        tracing::warn!("no JWT signing secret configured in the environment, using an ephemeral one");
        uuid::Uuid::new_v4().to_string()
    });
    let jwt = JwtIssuer::new(jwt_secret.as_bytes(), &config.service.name, "moltis-clients", 900, 2_592_000);
    let sessions = Arc::new(SessionManager::new(jwt, 86_400));

    let started_at = chrono::Utc::now().timestamp();
    let state = AppState::new(config.clone(), hub.clone(), dispatcher, sessions, metrics_handle, started_at);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(%addr, error = %e, "failed to bind listener");
            return std::process::ExitCode::FAILURE;
        },
    };
    tracing::info!(%addr, service = %config.service.name, version = %config.service.version, "gateway listening");

    let router = server::build_router(state);
    let drain_timeout = Duration::from_secs(config.shutdown.shutdown_timeout_secs.max(config.shutdown.drain_timeout_secs));
    if let Err(e) = server::serve(listener, router, drain_timeout).await {
        tracing::error!(error = %e, "server exited with an error");
        return std::process::ExitCode::FAILURE;
    }

    hub.shutdown().await;
    tracing::info!("gateway shut down cleanly");
    std::process::ExitCode::SUCCESS
}
