//! Shared types, error taxonomy, and observability bootstrap used across the
//! gateway workspace.

pub mod error;
pub mod logging;

pub use error::{Error, ErrorKind, Result};
