//! Metric name and label definitions.
//!
//! Centralizing these as constants keeps metric names consistent between
//! the component that records them and whatever dashboard queries them.

/// HTTP request metrics (gateway ingress).
pub mod http {
    pub const REQUESTS_TOTAL: &str = "moltis_http_requests_total";
    pub const REQUEST_DURATION_SECONDS: &str = "moltis_http_request_duration_seconds";
    pub const REQUESTS_IN_FLIGHT: &str = "moltis_http_requests_in_flight";
    pub const REQUEST_BYTES_TOTAL: &str = "moltis_http_request_bytes_total";
    pub const RESPONSE_BYTES_TOTAL: &str = "moltis_http_response_bytes_total";
}

/// Gateway proxy metrics (routing, rate limiting, circuit breakers).
pub mod gateway {
    pub const PROXY_REQUESTS_TOTAL: &str = "moltis_gateway_proxy_requests_total";
    pub const PROXY_UPSTREAM_DURATION_SECONDS: &str =
        "moltis_gateway_proxy_upstream_duration_seconds";
    pub const PROXY_METHOD_NOT_ALLOWED_TOTAL: &str =
        "moltis_gateway_proxy_method_not_allowed_total";
    pub const PROXY_ROUTE_NOT_FOUND_TOTAL: &str = "moltis_gateway_proxy_route_not_found_total";
    pub const RATE_LIMIT_REJECTIONS_TOTAL: &str = "moltis_gateway_rate_limit_rejections_total";
    pub const CIRCUIT_BREAKER_OPEN_TOTAL: &str = "moltis_gateway_circuit_breaker_open_total";
    pub const CIRCUIT_BREAKER_STATE: &str = "moltis_gateway_circuit_breaker_state";
}

/// WebSocket hub metrics.
pub mod websocket {
    pub const CONNECTIONS_TOTAL: &str = "moltis_websocket_connections_total";
    pub const CONNECTIONS_ACTIVE: &str = "moltis_websocket_connections_active";
    pub const MESSAGES_RECEIVED_TOTAL: &str = "moltis_websocket_messages_received_total";
    pub const MESSAGES_SENT_TOTAL: &str = "moltis_websocket_messages_sent_total";
    pub const MESSAGE_DURATION_SECONDS: &str = "moltis_websocket_message_duration_seconds";
    pub const SEND_QUEUE_OVERFLOW_TOTAL: &str = "moltis_websocket_send_queue_overflow_total";
    pub const STALE_EVICTIONS_TOTAL: &str = "moltis_websocket_stale_evictions_total";
}

/// Message dispatcher metrics.
pub mod dispatcher {
    pub const MESSAGES_SENT_TOTAL: &str = "moltis_dispatcher_messages_sent_total";
    pub const MESSAGES_FANNED_OUT_TOTAL: &str = "moltis_dispatcher_messages_fanned_out_total";
    pub const NOTIFICATIONS_QUEUED_TOTAL: &str = "moltis_dispatcher_notifications_queued_total";
    pub const PERSIST_DURATION_SECONDS: &str = "moltis_dispatcher_persist_duration_seconds";
    pub const PERSIST_RETRIES_TOTAL: &str = "moltis_dispatcher_persist_retries_total";
    pub const CIRCUIT_BREAKER_OPEN_TOTAL: &str = "moltis_dispatcher_circuit_breaker_open_total";
}

/// Session/token metrics.
pub mod session {
    pub const CREATED_TOTAL: &str = "moltis_sessions_created_total";
    pub const REUSED_TOTAL: &str = "moltis_sessions_reused_total";
    pub const ACTIVE: &str = "moltis_sessions_active";
    pub const TOKENS_ISSUED_TOTAL: &str = "moltis_session_tokens_issued_total";
}

/// Config loading metrics.
pub mod config {
    pub const LOAD_DURATION_SECONDS: &str = "moltis_config_load_duration_seconds";
    pub const PARSE_ERRORS_TOTAL: &str = "moltis_config_parse_errors_total";
    pub const VALIDATION_ERRORS_TOTAL: &str = "moltis_config_validation_errors_total";
}

/// Common/shared metrics.
pub mod common {
    pub const ERRORS_TOTAL: &str = "moltis_errors_total";
    pub const VALIDATION_FAILURES_TOTAL: &str = "moltis_validation_failures_total";
}

/// System/runtime metrics.
pub mod system {
    pub const UPTIME_SECONDS: &str = "moltis_uptime_seconds";
    pub const BUILD_INFO: &str = "moltis_build_info";
    pub const CONNECTED_CLIENTS: &str = "moltis_connected_clients";
}

/// Common label keys used across metrics.
pub mod labels {
    pub const ENDPOINT: &str = "endpoint";
    pub const METHOD: &str = "method";
    pub const STATUS: &str = "status";
    pub const SERVICE: &str = "service";
    pub const ERROR_TYPE: &str = "error_type";
    pub const OPERATION: &str = "operation";
    pub const STRATEGY: &str = "strategy";
}

/// Standard histogram buckets for different metric types.
pub mod buckets {
    use once_cell::sync::Lazy;

    /// HTTP request duration buckets (seconds). Covers 1ms to 60s.
    pub static HTTP_DURATION: Lazy<Vec<f64>> = Lazy::new(|| {
        vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0,
        ]
    });

    /// WebSocket message handling duration buckets (seconds).
    pub static WS_MESSAGE_DURATION: Lazy<Vec<f64>> =
        Lazy::new(|| vec![0.0001, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0]);

    /// Persistence call duration buckets (seconds). Covers 1ms to 5s.
    pub static PERSIST_DURATION: Lazy<Vec<f64>> =
        Lazy::new(|| vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.0, 5.0]);

    /// Queue size buckets. Covers 1 to 10000.
    pub static QUEUE_SIZE: Lazy<Vec<f64>> = Lazy::new(|| {
        vec![
            1.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 5000.0, 10000.0,
        ]
    });
}
