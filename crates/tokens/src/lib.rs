//! Session token issuance and device fingerprinting.
//!
//! Three concerns, kept in separate modules because they have different
//! trust boundaries: [`fingerprint`] is pure and deterministic, [`token`]
//! mints opaque session tokens, and [`jwt`] signs the access/refresh JWTs
//! handed to API callers. [`session`] ties them together behind the
//! per-device reuse policy.

pub mod fingerprint;
pub mod jwt;
pub mod session;
pub mod token;

pub use session::{DeviceInfo, IpInfo, LoginOutcome, LoginRequest, SessionManager, SessionRecord, SessionType};
