//! Configuration loading, validation, and env substitution.
//!
//! Config files: `moltis-gateway.yaml` / `moltis-auth.yaml` (also accepts
//! `.yml`, `.toml`, `.json`). Searched in `./` then `~/.config/moltis/`.
//!
//! `${VAR}` / `${VAR:default}` placeholders are expanded recursively
//! through every string, array, and map in the parsed value tree before
//! the config is deserialized into its typed schema.

pub mod env_subst;
pub mod error;
pub mod loader;
pub mod schema;
pub mod validate;

pub use {
    error::{ConfigError, Result},
    loader::{
        config_dir, discover_and_load_auth, discover_and_load_gateway, load_auth_config,
        load_gateway_config,
    },
    schema::{AuthServiceConfig, GatewayConfig, RouteGroup, ServiceDescriptor},
    validate::{Diagnostic, Severity, ValidationResult, validate_auth, validate_gateway},
};
