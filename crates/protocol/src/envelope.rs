//! The `{success, message, data, error, metadata}` HTTP response envelope.
//!
//! Proxied upstream responses carry this shape too; the gateway decodes it
//! only to rewrite the two duration fields in `metadata`, leaving every
//! other field — known or not — untouched. [`Metadata::extra`] is what
//! makes that possible: fields the gateway doesn't know about round-trip
//! through serde's flatten instead of being silently dropped.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
    pub metadata: Metadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl ErrorBody {
    #[must_use]
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }
}

/// `duration`/`duration_ms` are the two fields the gateway rewrites; every
/// other key present on the wire is preserved verbatim via `extra`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metadata {
    /// Human-readable duration, e.g. `"123.4ms"` (`{:?}` on a `Duration`).
    pub duration: String,
    /// Microsecond-precision milliseconds. Intentionally not an integer —
    /// see the duration-rewrite note in the proxy response rewriter.
    pub duration_ms: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl Metadata {
    #[must_use]
    pub fn from_elapsed(elapsed: Duration) -> Self {
        Self {
            duration: format!("{elapsed:?}"),
            duration_ms: elapsed.as_secs_f64() * 1000.0,
            request_id: None,
            correlation_id: None,
            timestamp: None,
            extra: serde_json::Map::new(),
        }
    }

    /// Overwrite only `duration`/`duration_ms`, leaving every other field as-is.
    pub fn rewrite_duration(&mut self, elapsed: Duration) {
        self.duration = format!("{elapsed:?}");
        self.duration_ms = elapsed.as_secs_f64() * 1000.0;
    }
}

impl ResponseEnvelope {
    #[must_use]
    pub fn ok(data: Value, elapsed: Duration) -> Self {
        Self {
            success: true,
            message: None,
            data: Some(data),
            error: None,
            metadata: Metadata::from_elapsed(elapsed),
        }
    }

    #[must_use]
    pub fn err(error: ErrorBody, elapsed: Duration) -> Self {
        Self {
            success: false,
            message: None,
            data: None,
            error: Some(error),
            metadata: Metadata::from_elapsed(elapsed),
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_ms_is_microsecond_precision_not_integer() {
        let elapsed = Duration::from_micros(1_234);
        let meta = Metadata::from_elapsed(elapsed);
        assert!((meta.duration_ms - 1.234).abs() < 1e-9);
    }

    #[test]
    fn unknown_metadata_fields_round_trip() {
        let json = serde_json::json!({
            "duration": "1ms",
            "duration_ms": 1.0,
            "trace_id": "abc123",
        });
        let meta: Metadata = serde_json::from_value(json).unwrap();
        assert_eq!(meta.extra.get("trace_id").unwrap(), "abc123");
        let back = serde_json::to_value(&meta).unwrap();
        assert_eq!(back["trace_id"], "abc123");
    }

    #[test]
    fn rewrite_duration_preserves_extra_fields() {
        let mut meta = Metadata::from_elapsed(Duration::from_millis(5));
        meta.extra.insert("trace_id".into(), Value::String("xyz".into()));
        meta.rewrite_duration(Duration::from_millis(10));
        assert!((meta.duration_ms - 10.0).abs() < 1e-6);
        assert_eq!(meta.extra.get("trace_id").unwrap(), "xyz");
    }
}
