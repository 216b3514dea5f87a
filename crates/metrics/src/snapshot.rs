//! Metrics snapshot for internal API consumption.
//!
//! This module provides a way to get metrics data as structured JSON
//! for display in an operator dashboard, separate from the Prometheus text format.

use {
    serde::{Deserialize, Serialize},
    std::collections::HashMap,
};

/// Type of metric
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricType {
    Counter,
    Gauge,
    Histogram,
}

/// A single metric value with its labels
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricSnapshot {
    /// The metric name
    pub name: String,
    /// The metric type
    #[serde(rename = "type")]
    pub metric_type: MetricType,
    /// Labels attached to this metric
    pub labels: HashMap<String, String>,
    /// The current value (for counters and gauges)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    /// Histogram data (if applicable)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub histogram: Option<HistogramSnapshot>,
    /// Human-readable description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Histogram bucket and summary data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistogramSnapshot {
    /// Total count of observations
    pub count: u64,
    /// Sum of all observed values
    pub sum: f64,
    /// Bucket boundaries and their cumulative counts
    pub buckets: Vec<HistogramBucket>,
    /// Calculated percentiles
    pub percentiles: PercentilesSnapshot,
}

/// A single histogram bucket
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistogramBucket {
    /// Upper bound of this bucket (exclusive, except +Inf)
    pub le: f64,
    /// Cumulative count of observations <= le
    pub count: u64,
}

/// Pre-calculated percentiles for histograms
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PercentilesSnapshot {
    pub p50: f64,
    pub p90: f64,
    pub p95: f64,
    pub p99: f64,
}

/// A complete snapshot of all metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Timestamp when the snapshot was taken (Unix millis)
    pub timestamp: u64,
    /// All metric values
    pub metrics: Vec<MetricSnapshot>,
    /// Metrics grouped by category
    pub categories: MetricCategories,
}

/// Metrics organized by category for easier UI consumption
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricCategories {
    pub http: CategoryMetrics,
    pub gateway: GatewayCategoryMetrics,
    pub websocket: CategoryMetrics,
    pub dispatcher: CategoryMetrics,
    pub session: CategoryMetrics,
    pub system: SystemMetrics,
}

/// Generic category metrics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CategoryMetrics {
    /// Total requests/operations
    pub total: u64,
    /// Error count
    pub errors: u64,
    /// Currently active/in-flight
    pub active: u64,
    /// Average duration in seconds
    pub avg_duration_seconds: Option<f64>,
    /// P99 duration in seconds
    pub p99_duration_seconds: Option<f64>,
}

/// Gateway proxy-specific metrics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GatewayCategoryMetrics {
    /// Total proxied requests
    pub proxy_requests_total: u64,
    /// Requests rejected for method mismatch
    pub method_not_allowed_total: u64,
    /// Requests with no matching route
    pub route_not_found_total: u64,
    /// Rate limit rejections
    pub rate_limit_rejections_total: u64,
    /// Circuit breaker trips to open
    pub circuit_breaker_open_total: u64,
    /// Breakdown by upstream service name
    pub by_service: HashMap<String, CategoryMetrics>,
}

/// System-level metrics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SystemMetrics {
    /// Uptime in seconds
    pub uptime_seconds: f64,
    /// Number of connected websocket clients
    pub connected_clients: u64,
    /// Active sessions
    pub active_sessions: u64,
    /// Build version
    pub version: Option<String>,
}

impl MetricsSnapshot {
    /// Create a new empty snapshot
    #[must_use]
    pub fn new() -> Self {
        Self {
            timestamp: std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_millis() as u64)
                .unwrap_or(0),
            metrics: Vec::new(),
            categories: MetricCategories::default(),
        }
    }

    /// Parse Prometheus text format into a structured snapshot.
    ///
    /// This is a best-effort parser that extracts metric values from
    /// Prometheus exposition format.
    #[must_use]
    pub fn from_prometheus_text(text: &str) -> Self {
        let mut snapshot = Self::new();

        for line in text.lines() {
            let line = line.trim();

            // Skip comments and empty lines
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            // Parse metric line: name{labels} value
            if let Some(metric) = parse_prometheus_line(line) {
                // Update category aggregates
                update_categories(&mut snapshot.categories, &metric);
                snapshot.metrics.push(metric);
            }
        }

        snapshot
    }
}

impl Default for MetricsSnapshot {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse a single Prometheus metric line
fn parse_prometheus_line(line: &str) -> Option<MetricSnapshot> {
    // Format: metric_name{label1="value1",label2="value2"} value
    // or: metric_name value

    let (name_and_labels, value_str) = line.rsplit_once(' ')?;
    let value: f64 = value_str.parse().ok()?;

    let (name, labels) = if let Some(brace_start) = name_and_labels.find('{') {
        let name = &name_and_labels[..brace_start];
        let labels_str = name_and_labels
            .get(brace_start + 1..name_and_labels.len() - 1)
            .unwrap_or("");
        let labels = parse_labels(labels_str);
        (name, labels)
    } else {
        (name_and_labels, HashMap::new())
    };

    // Determine metric type from name suffix
    let metric_type = if name.ends_with("_total") || name.ends_with("_count") {
        MetricType::Counter
    } else if name.ends_with("_bucket") || name.ends_with("_sum") {
        // These are histogram components, skip for now
        return None;
    } else {
        MetricType::Gauge
    };

    Some(MetricSnapshot {
        name: name.to_string(),
        metric_type,
        labels,
        value: Some(value),
        histogram: None,
        description: None,
    })
}

/// Parse Prometheus label format: key1="value1",key2="value2"
fn parse_labels(labels_str: &str) -> HashMap<String, String> {
    let mut labels = HashMap::new();

    if labels_str.is_empty() {
        return labels;
    }

    // Simple parser - doesn't handle escaped quotes in values
    for part in labels_str.split(',') {
        if let Some((key, value)) = part.split_once('=') {
            let value = value.trim_matches('"');
            labels.insert(key.to_string(), value.to_string());
        }
    }

    labels
}

/// Update category aggregates based on a metric
fn update_categories(categories: &mut MetricCategories, metric: &MetricSnapshot) {
    let name = &metric.name;
    let value = metric.value.unwrap_or(0.0) as u64;

    // HTTP ingress metrics
    if name.starts_with("moltis_http_requests_total") {
        categories.http.total += value;
    } else if name.starts_with("moltis_http_requests_in_flight") {
        categories.http.active = value;
    }
    // Gateway proxy metrics
    else if name.starts_with("moltis_gateway_proxy_requests_total") {
        categories.gateway.proxy_requests_total += value;
        if let Some(service) = metric.labels.get("service") {
            categories
                .gateway
                .by_service
                .entry(service.clone())
                .or_default()
                .total += value;
        }
    } else if name.starts_with("moltis_gateway_proxy_method_not_allowed_total") {
        categories.gateway.method_not_allowed_total += value;
    } else if name.starts_with("moltis_gateway_proxy_route_not_found_total") {
        categories.gateway.route_not_found_total += value;
    } else if name.starts_with("moltis_gateway_rate_limit_rejections_total") {
        categories.gateway.rate_limit_rejections_total += value;
    } else if name.starts_with("moltis_gateway_circuit_breaker_open_total") {
        categories.gateway.circuit_breaker_open_total += value;
        if let Some(service) = metric.labels.get("service") {
            categories
                .gateway
                .by_service
                .entry(service.clone())
                .or_default()
                .errors += value;
        }
    }
    // WebSocket hub metrics
    else if name.starts_with("moltis_websocket_connections_total") {
        categories.websocket.total += value;
    } else if name.starts_with("moltis_websocket_connections_active") {
        categories.websocket.active = value;
        categories.system.connected_clients = value;
    } else if name.starts_with("moltis_websocket_send_queue_overflow_total")
        || name.starts_with("moltis_websocket_stale_evictions_total")
    {
        categories.websocket.errors += value;
    }
    // Dispatcher metrics
    else if name.starts_with("moltis_dispatcher_messages_sent_total") {
        categories.dispatcher.total += value;
    } else if name.starts_with("moltis_dispatcher_circuit_breaker_open_total") {
        categories.dispatcher.errors += value;
    }
    // Session metrics
    else if name.starts_with("moltis_sessions_created_total")
        || name.starts_with("moltis_sessions_reused_total")
    {
        categories.session.total += value;
    } else if name.starts_with("moltis_sessions_active") {
        categories.session.active = value;
        categories.system.active_sessions = value;
    }
    // System metrics
    else if name.starts_with("moltis_uptime_seconds") {
        categories.system.uptime_seconds = metric.value.unwrap_or(0.0);
    } else if name.starts_with("moltis_connected_clients") {
        categories.system.connected_clients = value;
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_prometheus_line_simple() {
        let metric = parse_prometheus_line("moltis_http_requests_total 42").unwrap();
        assert_eq!(metric.name, "moltis_http_requests_total");
        assert_eq!(metric.value, Some(42.0));
        assert!(metric.labels.is_empty());
    }

    #[test]
    fn test_parse_prometheus_line_with_labels() {
        let metric =
            parse_prometheus_line(r#"moltis_http_requests_total{method="GET",status="200"} 100"#)
                .unwrap();
        assert_eq!(metric.name, "moltis_http_requests_total");
        assert_eq!(metric.value, Some(100.0));
        assert_eq!(metric.labels.get("method"), Some(&"GET".to_string()));
        assert_eq!(metric.labels.get("status"), Some(&"200".to_string()));
    }

    #[test]
    fn test_snapshot_from_prometheus_text() {
        let text = r#"
# HELP moltis_http_requests_total Total HTTP requests
# TYPE moltis_http_requests_total counter
moltis_http_requests_total{method="GET"} 100
moltis_http_requests_total{method="POST"} 50
moltis_gateway_proxy_requests_total{service="chat-api"} 25
"#;

        let snapshot = MetricsSnapshot::from_prometheus_text(text);
        assert_eq!(snapshot.metrics.len(), 3);
        assert_eq!(snapshot.categories.http.total, 150);
        assert_eq!(snapshot.categories.gateway.proxy_requests_total, 25);
        assert_eq!(
            snapshot.categories.gateway.by_service["chat-api"].total,
            25
        );
    }

    #[test]
    fn test_snapshot_tracks_websocket_and_session_categories() {
        let text = r#"
moltis_websocket_connections_active 7
moltis_sessions_active 4
moltis_dispatcher_messages_sent_total 12
"#;
        let snapshot = MetricsSnapshot::from_prometheus_text(text);
        assert_eq!(snapshot.categories.websocket.active, 7);
        assert_eq!(snapshot.categories.system.connected_clients, 7);
        assert_eq!(snapshot.categories.session.active, 4);
        assert_eq!(snapshot.categories.system.active_sessions, 4);
        assert_eq!(snapshot.categories.dispatcher.total, 12);
    }
}
