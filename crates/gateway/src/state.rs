//! Shared, process-wide state handed to every handler via axum's
//! `State` extractor. Grounded on the teacher's `GatewayState` pattern
//! (Arc-wrapped fields, `RwLock`-guarded maps, small helper methods) but
//! drastically narrowed: no chat/voice/agent/node-registry fields, since
//! none of that is part of this gateway's scope.

use std::sync::Arc;

use dashmap::DashMap;

use moltis_config::schema::{CircuitBreakerConfig, GatewayConfig, RateLimitRule};
use moltis_dispatcher::Dispatcher;
use moltis_hub::Hub;
use moltis_metrics::MetricsHandle;
use moltis_tokens::SessionManager;

use crate::{
    health::HealthCache,
    proxy::{breaker::CircuitBreaker, loadbalance::LoadBalanceState, ratelimit::MemoryLimiter},
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub http_client: reqwest::Client,
    pub hub: Hub,
    pub dispatcher: Arc<Dispatcher>,
    pub sessions: Arc<SessionManager>,
    pub health: Arc<HealthCache>,
    breakers: Arc<DashMap<String, Arc<CircuitBreaker>>>,
    pub rate_limiter: Arc<MemoryLimiter>,
    pub load_balance: Arc<LoadBalanceState>,
    pub metrics_handle: MetricsHandle,
    pub started_at: i64,
}

impl AppState {
    #[must_use]
    pub fn new(
        config: GatewayConfig,
        hub: Hub,
        dispatcher: Arc<Dispatcher>,
        sessions: Arc<SessionManager>,
        metrics_handle: MetricsHandle,
        started_at: i64,
    ) -> Self {
        Self {
            config: Arc::new(config),
            http_client: reqwest::Client::new(),
            hub,
            dispatcher,
            sessions,
            health: Arc::new(HealthCache::new()),
            breakers: Arc::new(DashMap::new()),
            rate_limiter: Arc::new(MemoryLimiter::new()),
            load_balance: Arc::new(LoadBalanceState::new()),
            metrics_handle,
            started_at,
        }
    }

    /// Returns this service's breaker, creating it from `config` the first
    /// time it's asked for. A service's breaker config can't change without
    /// a restart, so the first caller's config wins for the process lifetime.
    pub fn breaker_for(&self, service: &str, config: &CircuitBreakerConfig) -> Arc<CircuitBreaker> {
        Arc::clone(
            self.breakers
                .entry(service.to_string())
                .or_insert_with(|| Arc::new(CircuitBreaker::new(config.clone())))
                .value(),
        )
    }

    /// Looks up the rate-limit rule for a route prefix, falling back to the
    /// global rule. Returns `None` when rate limiting is disabled entirely.
    #[must_use]
    pub fn rate_limit_rule(&self, prefix: &str) -> Option<RateLimitRule> {
        if !self.config.ratelimit.enabled {
            return None;
        }
        self.config
            .ratelimit
            .per_route
            .get(prefix)
            .or(self.config.ratelimit.global.as_ref())
            .cloned()
    }
}
