//! Gateway and auth-service configuration schemas.
//!
//! Field names and section names follow the YAML layout documented for
//! operators: `service, server, services, router_groups, ratelimit,
//! security, loadbalance, monitoring, discovery, shutdown` for the gateway,
//! and `service, server, database, cache, auth, security, logging, email,
//! observability, shutdown, features` for the auth service. Every
//! `Default` impl here is filled in by [`crate::validate::validate_gateway`]
//! / [`crate::validate::validate_auth`] rather than rejecting a config that
//! merely omits optional sections.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

// ── Gateway config ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default)]
    pub service: ServiceIdentity,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub services: HashMap<String, ServiceDescriptor>,
    #[serde(default)]
    pub router_groups: Vec<RouteGroup>,
    #[serde(default)]
    pub ratelimit: RateLimitConfig,
    #[serde(default)]
    pub security: SecurityConfig,
    #[serde(default)]
    pub loadbalance: LoadBalanceConfig,
    #[serde(default)]
    pub monitoring: MonitoringConfig,
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    #[serde(default)]
    pub shutdown: ShutdownConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            service: ServiceIdentity::default(),
            server: ServerConfig::default(),
            services: HashMap::new(),
            router_groups: Vec::new(),
            ratelimit: RateLimitConfig::default(),
            security: SecurityConfig::default(),
            loadbalance: LoadBalanceConfig::default(),
            monitoring: MonitoringConfig::default(),
            discovery: DiscoveryConfig::default(),
            shutdown: ShutdownConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceIdentity {
    #[serde(default = "default_service_name")]
    pub name: String,
    #[serde(default = "default_version")]
    pub version: String,
    /// Prefix used when resolving `LoadFromEnv`-style overrides for this
    /// service. Parameterized per service rather than hardcoded, since a
    /// shared constant here previously leaked one service's prefix into
    /// another's environment lookups.
    #[serde(default = "default_service_name_upper")]
    pub env_prefix: String,
}

impl Default for ServiceIdentity {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            version: default_version(),
            env_prefix: default_service_name_upper(),
        }
    }
}

fn default_service_name() -> String {
    "gateway".to_string()
}

fn default_service_name_upper() -> String {
    "GATEWAY".to_string()
}

fn default_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_read_timeout_secs")]
    pub read_timeout_secs: u64,
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            read_timeout_secs: default_read_timeout_secs(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_read_timeout_secs() -> u64 {
    30
}
fn default_max_body_bytes() -> usize {
    10 * 1024 * 1024
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpstreamProtocol {
    Http,
    Https,
    Grpc,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceDescriptor {
    #[serde(default = "default_protocol")]
    pub protocol: UpstreamProtocol,
    pub addresses: Vec<String>,
    #[serde(default = "default_service_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    #[serde(default)]
    pub load_balancer_strategy: LoadBalanceStrategy,
    #[serde(default)]
    pub health_check: HealthCheckConfig,
    #[serde(default)]
    pub circuit_breaker: CircuitBreakerConfig,
}

fn default_protocol() -> UpstreamProtocol {
    UpstreamProtocol::Http
}
fn default_service_timeout_secs() -> u64 {
    10
}
fn default_retry_attempts() -> u32 {
    0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckConfig {
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default = "default_health_check_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_health_check_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            path: None,
            interval_secs: default_health_check_interval_secs(),
            timeout_secs: default_health_check_timeout_secs(),
        }
    }
}

fn default_health_check_interval_secs() -> u64 {
    30
}
fn default_health_check_timeout_secs() -> u64 {
    5
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    #[serde(default = "default_breaker_threshold")]
    pub failure_threshold: u32,
    #[serde(default = "default_breaker_ratio")]
    pub failure_ratio: f64,
    #[serde(default = "default_breaker_min_requests")]
    pub min_requests: u32,
    #[serde(default = "default_breaker_open_secs")]
    pub open_duration_secs: u64,
    #[serde(default = "default_breaker_half_open_requests")]
    pub half_open_requests: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_breaker_threshold(),
            failure_ratio: default_breaker_ratio(),
            min_requests: default_breaker_min_requests(),
            open_duration_secs: default_breaker_open_secs(),
            half_open_requests: default_breaker_half_open_requests(),
        }
    }
}

fn default_breaker_threshold() -> u32 {
    3
}
fn default_breaker_ratio() -> f64 {
    0.6
}
fn default_breaker_min_requests() -> u32 {
    3
}
fn default_breaker_open_secs() -> u64 {
    30
}
fn default_breaker_half_open_requests() -> u32 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteGroup {
    pub name: String,
    pub prefix: String,
    pub service: String,
    #[serde(default = "default_methods")]
    pub methods: BTreeSet<String>,
    #[serde(default)]
    pub transform: bool,
}

fn default_methods() -> BTreeSet<String> {
    ["GET", "POST", "PUT", "PATCH", "DELETE", "OPTIONS"]
        .into_iter()
        .map(String::from)
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateLimitStrategy {
    #[default]
    TokenBucket,
    SlidingWindow,
    FixedWindow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RateLimitStore {
    #[default]
    Memory,
    Redis,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitRule {
    pub requests: u64,
    pub window_secs: u64,
    #[serde(default)]
    pub strategy: RateLimitStrategy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub store: RateLimitStore,
    #[serde(default)]
    pub redis_address: Option<String>,
    #[serde(default)]
    pub global: Option<RateLimitRule>,
    #[serde(default)]
    pub per_route: HashMap<String, RateLimitRule>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            store: RateLimitStore::default(),
            redis_address: None,
            global: None,
            per_route: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    #[serde(default)]
    pub cors_allowed_origins: Vec<String>,
    #[serde(default)]
    pub extra_headers: HashMap<String, String>,
    #[serde(default)]
    pub tls_enabled: bool,
    #[serde(default)]
    pub tls_cert_path: Option<String>,
    #[serde(default)]
    pub tls_key_path: Option<String>,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            cors_allowed_origins: Vec::new(),
            extra_headers: HashMap::new(),
            tls_enabled: false,
            tls_cert_path: None,
            tls_key_path: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadBalanceStrategy {
    #[default]
    RoundRobin,
    Random,
    LeastConn,
    Weighted,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoadBalanceConfig {
    #[serde(default)]
    pub strategy: LoadBalanceStrategy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    #[serde(default = "default_true")]
    pub metrics_enabled: bool,
    #[serde(default = "default_sample_rate")]
    pub trace_sample_rate: f64,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: default_true(),
            trace_sample_rate: default_sample_rate(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_sample_rate() -> f64 {
    0.1
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    #[serde(default)]
    pub r#static: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShutdownConfig {
    #[serde(default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,
    #[serde(default = "default_drain_timeout_secs")]
    pub drain_timeout_secs: u64,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            shutdown_timeout_secs: default_shutdown_timeout_secs(),
            drain_timeout_secs: default_drain_timeout_secs(),
        }
    }
}

fn default_shutdown_timeout_secs() -> u64 {
    30
}
fn default_drain_timeout_secs() -> u64 {
    10
}

// ── Auth-service config ──────────────────────────────────────────────────────
//
// Credential verification itself is an external collaborator; this schema
// only covers the sections an operator configures around session/token
// issuance (TTLs, storage, observability) so the auth service's config file
// validates under the same loader as the gateway's.

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthServiceConfig {
    #[serde(default)]
    pub service: ServiceIdentity,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub auth: SessionPolicyConfig,
    #[serde(default)]
    pub security: SecurityConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub email: EmailConfig,
    #[serde(default)]
    pub observability: MonitoringConfig,
    #[serde(default)]
    pub shutdown: ShutdownConfig,
    #[serde(default)]
    pub features: HashMap<String, bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub url: String,
    #[serde(default = "default_max_open_conns")]
    pub max_open_conns: u32,
    #[serde(default = "default_max_idle_conns")]
    pub max_idle_conns: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_open_conns: default_max_open_conns(),
            max_idle_conns: default_max_idle_conns(),
        }
    }
}

fn default_database_url() -> String {
    "sqlite://moltis.db".to_string()
}
fn default_max_open_conns() -> u32 {
    10
}
fn default_max_idle_conns() -> u32 {
    5
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default)]
    pub redis_address: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionPolicyConfig {
    #[serde(default = "default_access_token_ttl_secs")]
    pub access_token_ttl_secs: u64,
    #[serde(default = "default_refresh_token_ttl_secs")]
    pub refresh_token_ttl_secs: u64,
    #[serde(default = "default_session_ttl_secs")]
    pub session_ttl_secs: u64,
    #[serde(default = "default_issuer")]
    pub issuer: String,
    #[serde(default = "default_audience")]
    pub audience: String,
}

impl Default for SessionPolicyConfig {
    fn default() -> Self {
        Self {
            access_token_ttl_secs: default_access_token_ttl_secs(),
            refresh_token_ttl_secs: default_refresh_token_ttl_secs(),
            session_ttl_secs: default_session_ttl_secs(),
            issuer: default_issuer(),
            audience: default_audience(),
        }
    }
}

fn default_access_token_ttl_secs() -> u64 {
    900
}
fn default_refresh_token_ttl_secs() -> u64 {
    30 * 24 * 3600
}
fn default_session_ttl_secs() -> u64 {
    7 * 24 * 3600
}
fn default_issuer() -> String {
    "moltis-gateway".to_string()
}
fn default_audience() -> String {
    "moltis-clients".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmailConfig {
    #[serde(default)]
    pub smtp_address: Option<String>,
    #[serde(default)]
    pub from_address: Option<String>,
}
