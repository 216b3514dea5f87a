//! Wire formats shared by the gateway, the WebSocket hub, and the dispatcher.
//!
//! All communication uses JSON. Two distinct shapes exist:
//! - the HTTP response envelope (`ResponseEnvelope`), used for non-proxy
//!   JSON responses and rewritten in-flight by the gateway on proxied ones;
//! - the WebSocket message envelope (`ClientMessage` / `ServerMessage`),
//!   exchanged once a connection has been upgraded.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub mod envelope;
pub mod ws;

pub use envelope::{ErrorBody, Metadata, ResponseEnvelope};
pub use ws::{ClientMessage, ClientMessageKind, ServerMessage, ServerMessageKind};

// ── Constants ────────────────────────────────────────────────────────────────

/// Maximum accepted WebSocket frame payload, in bytes.
pub const MAX_PAYLOAD_BYTES: usize = 524_288; // 512 KiB

/// Per-client outbound send queue capacity (§4.2 backpressure contract).
pub const SEND_QUEUE_CAPACITY: usize = 256;

/// Default interval between server-initiated WS pings.
pub const DEFAULT_PING_PERIOD_SECS: u64 = 54;

/// A client whose last pong is older than this is considered stale and evicted.
pub const PONG_STALE_SECS: u64 = 90;

/// Interval of the hub's stale-client cleanup ticker.
pub const CLEANUP_TICK_SECS: u64 = 30;

/// Reader inactivity deadline, refreshed on every inbound pong.
pub const DEFAULT_READ_DEADLINE_SECS: u64 = 60;

/// Window the hub waits for client write loops to drain on shutdown.
pub const SHUTDOWN_DRAIN_SECS: u64 = 10;

/// Opaque JSON blob with no further structure assumed by the protocol layer.
pub type Payload = Value;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_is_plain_json_value() {
        let p: Payload = serde_json::json!({"a": 1});
        assert_eq!(p["a"], 1);
    }
}
