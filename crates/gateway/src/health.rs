//! `/health`, `/health/live`, `/health/ready`.
//!
//! Each named check's result is cached for 5 s so a burst of probes (load
//! balancers tend to poll aggressively) doesn't hammer upstreams.

use std::{
    collections::HashMap,
    sync::Mutex,
    time::{Duration, Instant},
};

use axum::{Json, extract::State, response::IntoResponse};
use http::StatusCode;
use serde::Serialize;

use crate::state::AppState;

const CACHE_TTL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    pub status: CheckStatus,
    pub response_time_ms: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

struct CachedCheck {
    result: CheckResult,
    at: Instant,
}

/// Keyed by check name (one per configured service). `Mutex` over a map is
/// fine here: checks run on a 5 s cadence, never on the request hot path
/// for proxied traffic.
#[derive(Default)]
pub struct HealthCache {
    checks: Mutex<HashMap<String, CachedCheck>>,
}

impl HealthCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: CheckStatus,
    pub service: String,
    pub version: String,
    pub uptime: u64,
    pub checks: HashMap<String, CheckResult>,
}

async fn run_check(state: &AppState, name: &str, path: &str, address: &str, timeout: Duration) -> CheckResult {
    let start = Instant::now();
    let url = format!("http://{address}{path}");
    let outcome = tokio::time::timeout(timeout, state.http_client.get(&url).send()).await;
    let elapsed = start.elapsed().as_secs_f64() * 1000.0;
    match outcome {
        Ok(Ok(resp)) if resp.status().is_success() => CheckResult {
            status: CheckStatus::Healthy,
            response_time_ms: elapsed,
            error: None,
        },
        Ok(Ok(resp)) => CheckResult {
            status: CheckStatus::Degraded,
            response_time_ms: elapsed,
            error: Some(format!("upstream returned {}", resp.status())),
        },
        Ok(Err(e)) => CheckResult {
            status: CheckStatus::Unhealthy,
            response_time_ms: elapsed,
            error: Some(e.to_string()),
        },
        Err(_) => {
            let _ = name;
            CheckResult {
                status: CheckStatus::Unhealthy,
                response_time_ms: elapsed,
                error: Some("timed out".to_string()),
            }
        },
    }
}

async fn collect_checks(state: &AppState) -> HashMap<String, CheckResult> {
    let mut results = HashMap::new();
    for (name, service) in &state.config.services {
        let Some(path) = service.health_check.path.as_deref() else {
            continue;
        };
        let Some(address) = service.addresses.first() else {
            continue;
        };

        let cached = {
            let cache = state.health.checks.lock().unwrap_or_else(|e| e.into_inner());
            cache
                .get(name)
                .filter(|c| c.at.elapsed() < CACHE_TTL)
                .map(|c| c.result.clone())
        };

        let result = match cached {
            Some(result) => result,
            None => {
                let result = run_check(state, name, path, address, Duration::from_secs(service.health_check.timeout_secs)).await;
                let mut cache = state.health.checks.lock().unwrap_or_else(|e| e.into_inner());
                cache.insert(
                    name.clone(),
                    CachedCheck {
                        result: result.clone(),
                        at: Instant::now(),
                    },
                );
                result
            },
        };
        results.insert(name.clone(), result);
    }
    results
}

fn aggregate_status(checks: &HashMap<String, CheckResult>) -> CheckStatus {
    if checks.values().any(|c| matches!(c.status, CheckStatus::Unhealthy)) {
        CheckStatus::Unhealthy
    } else if checks.values().any(|c| matches!(c.status, CheckStatus::Degraded)) {
        CheckStatus::Degraded
    } else {
        CheckStatus::Healthy
    }
}

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let checks = collect_checks(&state).await;
    let status = aggregate_status(&checks);
    let http_status = match status {
        CheckStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        CheckStatus::Healthy | CheckStatus::Degraded => StatusCode::OK,
    };
    let body = HealthResponse {
        status,
        service: state.config.service.name.clone(),
        version: state.config.service.version.clone(),
        uptime: (chrono::Utc::now().timestamp() - state.started_at).max(0) as u64,
        checks,
    };
    (http_status, Json(body))
}

pub async fn live() -> impl IntoResponse {
    StatusCode::OK
}

pub async fn ready(State(state): State<AppState>) -> impl IntoResponse {
    let checks = collect_checks(&state).await;
    if checks.values().all(|c| matches!(c.status, CheckStatus::Healthy)) {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}
