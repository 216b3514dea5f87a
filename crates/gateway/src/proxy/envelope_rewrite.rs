//! Rewrites `metadata.duration`/`metadata.duration_ms` on proxied JSON
//! envelopes, leaving every other field untouched.

use std::time::Duration;

use moltis_protocol::ResponseEnvelope;

/// Returns the rewritten body, or the original bytes unchanged if the body
/// doesn't decode as the envelope (§4.1: "on any decode/encode error the
/// original body is passed through unmodified").
#[must_use]
pub fn rewrite(body: &[u8], elapsed: Duration) -> Vec<u8> {
    let Ok(mut envelope) = serde_json::from_slice::<ResponseEnvelope>(body) else {
        return body.to_vec();
    };
    envelope.metadata.rewrite_duration(elapsed);
    serde_json::to_vec(&envelope).unwrap_or_else(|_| body.to_vec())
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rewrites_duration_fields_preserving_extras() {
        let body = br#"{"success":true,"metadata":{"duration":"0s","duration_ms":0,"trace_id":"abc"}}"#;
        let out = rewrite(body, Duration::from_millis(5));
        let parsed: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert!((parsed["metadata"]["duration_ms"].as_f64().unwrap() - 5.0).abs() < 0.5);
        assert_eq!(parsed["metadata"]["trace_id"], "abc");
    }

    #[test]
    fn non_envelope_body_passes_through_unchanged() {
        let body = br#"{"not":"an envelope"}"#;
        let out = rewrite(body, Duration::from_millis(5));
        assert_eq!(out, body);
    }
}
