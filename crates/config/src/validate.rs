//! Configuration validation.
//!
//! Rejects structurally invalid configs (bad methods, dangling service
//! references, duplicate prefixes, inconsistent timeouts); everything else
//! missing is already filled in by the schema's `Default` impls during
//! deserialization, per the "defaults, don't fail" policy.

use crate::schema::{AuthServiceConfig, GatewayConfig};

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
            Self::Info => write!(f, "info"),
        }
    }
}

/// A single validation diagnostic.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Category, e.g. "route", "service-ref", "tls", "rate-limit".
    pub category: &'static str,
    /// Dotted path, e.g. "router_groups[2].prefix".
    pub path: String,
    pub message: String,
}

impl Diagnostic {
    fn error(category: &'static str, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            category,
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Result of validating a configuration file.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
}

impl ValidationResult {
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    fn push(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }
}

const VALID_METHODS: &[&str] = &["GET", "POST", "PUT", "PATCH", "DELETE", "OPTIONS", "HEAD"];

/// Validate a gateway config. Structural errors (bad method, unknown
/// service reference, duplicate prefix, inconsistent timeouts, TLS without
/// cert/key, sample rate out of range) are reported as [`Severity::Error`].
#[must_use]
pub fn validate_gateway(config: &GatewayConfig) -> ValidationResult {
    let mut result = ValidationResult::default();

    let mut seen_prefixes: std::collections::HashMap<&str, usize> = std::collections::HashMap::new();
    for (i, route) in config.router_groups.iter().enumerate() {
        if let Some(prior) = seen_prefixes.insert(route.prefix.as_str(), i) {
            result.push(Diagnostic::error(
                "route",
                format!("router_groups[{i}].prefix"),
                format!(
                    "duplicate route prefix {:?} (also used by router_groups[{prior}])",
                    route.prefix
                ),
            ));
        }

        for method in &route.methods {
            if !VALID_METHODS.contains(&method.as_str()) {
                result.push(Diagnostic::error(
                    "route",
                    format!("router_groups[{i}].methods"),
                    format!("invalid HTTP method {method:?}"),
                ));
            }
        }

        if !config.services.contains_key(&route.service) {
            result.push(Diagnostic::error(
                "service-ref",
                format!("router_groups[{i}].service"),
                format!("route {:?} references unknown service {:?}", route.name, route.service),
            ));
        }
    }

    for (name, service) in &config.services {
        if service.addresses.is_empty() {
            result.push(Diagnostic::error(
                "service",
                format!("services.{name}.addresses"),
                "service must declare at least one address",
            ));
        }
        let hc = &service.health_check;
        if hc.timeout_secs >= hc.interval_secs {
            result.push(Diagnostic::error(
                "service",
                format!("services.{name}.health_check"),
                format!(
                    "health check timeout ({}) must be less than interval ({})",
                    hc.timeout_secs, hc.interval_secs
                ),
            ));
        }
    }

    if config.shutdown.drain_timeout_secs > config.shutdown.shutdown_timeout_secs {
        result.push(Diagnostic::error(
            "shutdown",
            "shutdown.drain_timeout_secs",
            format!(
                "drain timeout ({}) must not exceed shutdown timeout ({})",
                config.shutdown.drain_timeout_secs, config.shutdown.shutdown_timeout_secs
            ),
        ));
    }

    validate_tls(&config.security, &mut result);
    validate_sample_rate(config.monitoring.trace_sample_rate, &mut result);

    if config.ratelimit.store == crate::schema::RateLimitStore::Redis
        && config.ratelimit.redis_address.is_none()
    {
        result.push(Diagnostic::error(
            "rate-limit",
            "ratelimit.redis_address",
            "redis-backed rate limiting requires ratelimit.redis_address",
        ));
    }

    result
}

/// Validate an auth-service config.
#[must_use]
pub fn validate_auth(config: &AuthServiceConfig) -> ValidationResult {
    let mut result = ValidationResult::default();

    if config.shutdown.drain_timeout_secs > config.shutdown.shutdown_timeout_secs {
        result.push(Diagnostic::error(
            "shutdown",
            "shutdown.drain_timeout_secs",
            format!(
                "drain timeout ({}) must not exceed shutdown timeout ({})",
                config.shutdown.drain_timeout_secs, config.shutdown.shutdown_timeout_secs
            ),
        ));
    }

    validate_tls(&config.security, &mut result);
    validate_sample_rate(config.observability.trace_sample_rate, &mut result);

    if config.auth.access_token_ttl_secs == 0 {
        result.push(Diagnostic::error(
            "auth",
            "auth.access_token_ttl_secs",
            "access token TTL must be greater than zero",
        ));
    }

    result
}

fn validate_tls(security: &crate::schema::SecurityConfig, result: &mut ValidationResult) {
    if security.tls_enabled
        && (security.tls_cert_path.is_none() || security.tls_key_path.is_none())
    {
        result.push(Diagnostic::error(
            "tls",
            "security.tls_enabled",
            "TLS is enabled but tls_cert_path and/or tls_key_path is missing",
        ));
    }
}

fn validate_sample_rate(rate: f64, result: &mut ValidationResult) {
    if !(0.0..=1.0).contains(&rate) {
        result.push(Diagnostic::error(
            "monitoring",
            "monitoring.trace_sample_rate",
            format!("sample rate {rate} is outside [0, 1]"),
        ));
    }
}
