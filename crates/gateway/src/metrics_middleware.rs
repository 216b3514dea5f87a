//! HTTP request metrics middleware.
//!
//! Grounded on the teacher's `metrics_middleware.rs` path-normalization
//! idiom, but unconditional rather than `#[cfg(feature = "metrics")]`:
//! observability is ambient here, not an optional extra.

use std::time::Instant;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::state::AppState;

/// Replaces UUID and purely-numeric path segments with `{id}` so a path
/// like `/svc/users/3fa9-.../messages` becomes a single low-cardinality
/// label instead of one time series per id.
fn normalize_path(path: &str) -> String {
    path.split('/')
        .map(|segment| if segment.is_empty() || !looks_like_id(segment) { segment } else { "{id}" })
        .collect::<Vec<_>>()
        .join("/")
}

fn looks_like_id(segment: &str) -> bool {
    let is_uuid = segment.len() == 36 && uuid::Uuid::parse_str(segment).is_ok();
    let is_numeric = !segment.is_empty() && segment.chars().all(|c| c.is_ascii_digit());
    is_uuid || is_numeric
}

pub async fn track(State(_state): State<AppState>, request: Request, next: Next) -> Response {
    let method = request.method().to_string();
    let path = normalize_path(request.uri().path());
    let start = Instant::now();

    moltis_metrics::gauge!(moltis_metrics::http::REQUESTS_IN_FLIGHT).increment(1.0);
    let response = next.run(request).await;
    moltis_metrics::gauge!(moltis_metrics::http::REQUESTS_IN_FLIGHT).decrement(1.0);

    let status = response.status().as_u16().to_string();
    moltis_metrics::counter!(
        moltis_metrics::http::REQUESTS_TOTAL,
        "method" => method,
        "path" => path,
        "status" => status
    )
    .increment(1);
    moltis_metrics::histogram!(moltis_metrics::http::REQUEST_DURATION_SECONDS).record(start.elapsed().as_secs_f64());

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uuid_segments_are_normalized() {
        let id = uuid::Uuid::new_v4().to_string();
        assert_eq!(normalize_path(&format!("/svc/users/{id}/messages")), "/svc/users/{id}/messages");
    }

    #[test]
    fn numeric_segments_are_normalized() {
        assert_eq!(normalize_path("/svc/orders/1234"), "/svc/orders/{id}");
    }

    #[test]
    fn non_id_segments_are_left_alone() {
        assert_eq!(normalize_path("/svc/orders/pending"), "/svc/orders/pending");
    }
}
