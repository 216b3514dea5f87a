//! WebSocket connection registry and fan-out engine.
//!
//! The hub keeps two views of the same connection table (by client, by
//! user) in sync by routing every mutation through a single actor task —
//! see [`actor::run`]. Callers never touch the table directly; they get a
//! cheap, cloneable [`Hub`] handle instead.
//!
//! Liveness (ping cadence, pong tracking, stale eviction) and backpressure
//! (bounded per-client queues, drop-client-not-message on overflow) are
//! hub-internal; callers only see connect/disconnect and fan-out.

pub mod actor;
pub mod client;
pub mod command;
pub mod error;
pub mod hub;
pub mod pinger;
pub mod state;

pub use {
    client::{ClientInfo, OutboundFrame},
    error::{Error, Result},
    hub::{Hub, RegisteredClient},
    state::Stats,
};
