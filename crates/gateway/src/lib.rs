//! Front-door reverse proxy and WebSocket upgrade point.
//!
//! The gateway owns nothing business-specific: it resolves a route, enforces
//! per-route policy (method allow-list, rate limits, circuit breaker), and
//! either forwards to an upstream service ([`proxy`]) or upgrades the
//! connection and hands it to [`moltis_hub::Hub`] ([`ws_handler`]).
//! Authentication is an external collaborator — this crate only consumes an
//! already-resolved user id, it never verifies credentials itself.

pub mod error;
pub mod health;
pub mod metrics_middleware;
pub mod proxy;
pub mod server;
pub mod sessions;
pub mod state;
pub mod ws_handler;

pub use error::ApiError;
pub use state::AppState;
