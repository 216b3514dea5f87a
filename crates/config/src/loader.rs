//! Config discovery, parsing, and env-substitution.
//!
//! YAML is the primary format (`moltis-gateway.yaml`); TOML and JSON are
//! accepted too, dispatched by file extension. Every format is parsed into
//! a `serde_json::Value` first so [`crate::env_subst::substitute_value`]
//! can run uniformly before the final typed deserialization.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::{
    env_subst::substitute_value,
    error::{ConfigError, Result},
    schema::{AuthServiceConfig, GatewayConfig},
    validate::{validate_auth, validate_gateway},
};

/// Filenames checked in order; YAML first per the documented config layout.
const GATEWAY_FILENAMES: &[&str] = &[
    "moltis-gateway.yaml",
    "moltis-gateway.yml",
    "moltis-gateway.toml",
    "moltis-gateway.json",
];

const AUTH_FILENAMES: &[&str] = &[
    "moltis-auth.yaml",
    "moltis-auth.yml",
    "moltis-auth.toml",
    "moltis-auth.json",
];

fn read_and_substitute(path: &Path) -> Result<serde_json::Value> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;
    let mut value = parse_value(&raw, path)?;
    substitute_value(&mut value);
    Ok(value)
}

fn parse_value(raw: &str, path: &Path) -> Result<serde_json::Value> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("yaml");
    match ext {
        "yaml" | "yml" => serde_yaml::from_str(raw).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            format: "yaml",
            source: Box::new(e),
        }),
        "toml" => {
            let v: toml::Value = toml::from_str(raw).map_err(|e| ConfigError::Parse {
                path: path.display().to_string(),
                format: "toml",
                source: Box::new(e),
            })?;
            serde_json::to_value(v).map_err(|e| ConfigError::Parse {
                path: path.display().to_string(),
                format: "toml",
                source: Box::new(e),
            })
        }
        "json" => serde_json::from_str(raw).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            format: "json",
            source: Box::new(e),
        }),
        other => Err(ConfigError::UnsupportedFormat(other.to_string())),
    }
}

/// Load and validate the gateway config at `path`.
pub fn load_gateway_config(path: &Path) -> Result<GatewayConfig> {
    let value = read_and_substitute(path)?;
    let config: GatewayConfig =
        serde_json::from_value(value).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            format: "schema",
            source: Box::new(e),
        })?;
    let result = validate_gateway(&config);
    if result.has_errors() {
        let messages: Vec<String> = result
            .diagnostics
            .into_iter()
            .map(|d| format!("{} [{}]: {}", d.path, d.category, d.message))
            .collect();
        return Err(ConfigError::Invalid(messages.join("; ")));
    }
    Ok(config)
}

/// Load and validate the auth-service config at `path`.
pub fn load_auth_config(path: &Path) -> Result<AuthServiceConfig> {
    let value = read_and_substitute(path)?;
    let config: AuthServiceConfig =
        serde_json::from_value(value).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            format: "schema",
            source: Box::new(e),
        })?;
    let result = validate_auth(&config);
    if result.has_errors() {
        let messages: Vec<String> = result
            .diagnostics
            .into_iter()
            .map(|d| format!("{} [{}]: {}", d.path, d.category, d.message))
            .collect();
        return Err(ConfigError::Invalid(messages.join("; ")));
    }
    Ok(config)
}

fn find_config_file(filenames: &[&str]) -> Option<PathBuf> {
    for name in filenames {
        let p = PathBuf::from(name);
        if p.exists() {
            return Some(p);
        }
    }
    if let Some(dirs) = directories::ProjectDirs::from("", "", "moltis") {
        let config_dir = dirs.config_dir();
        for name in filenames {
            let p = config_dir.join(name);
            if p.exists() {
                return Some(p);
            }
        }
    }
    None
}

/// Discover and load the gateway config from standard locations, falling
/// back to schema defaults (themselves already validated) if none is found.
pub fn discover_and_load_gateway() -> GatewayConfig {
    match find_config_file(GATEWAY_FILENAMES) {
        Some(path) => {
            debug!(path = %path.display(), "loading gateway config");
            match load_gateway_config(&path) {
                Ok(cfg) => cfg,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "failed to load gateway config, using defaults");
                    GatewayConfig::default()
                }
            }
        }
        None => {
            debug!("no gateway config file found, using defaults");
            GatewayConfig::default()
        }
    }
}

/// Discover and load the auth-service config from standard locations.
pub fn discover_and_load_auth() -> AuthServiceConfig {
    match find_config_file(AUTH_FILENAMES) {
        Some(path) => {
            debug!(path = %path.display(), "loading auth config");
            match load_auth_config(&path) {
                Ok(cfg) => cfg,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "failed to load auth config, using defaults");
                    AuthServiceConfig::default()
                }
            }
        }
        None => {
            debug!("no auth config file found, using defaults");
            AuthServiceConfig::default()
        }
    }
}

/// Returns the user-global config directory (`~/.config/moltis/`).
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "moltis").map(|d| d.config_dir().to_path_buf())
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yaml_env_placeholder_is_substituted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("moltis-gateway.yaml");
        std::fs::write(
            &path,
            r#"
service:
  name: gateway
server:
  port: 9000
services:
  svc:
    addresses: ["${UPSTREAM_HOST:localhost}:9001"]
router_groups:
  - name: svc
    prefix: /svc
    service: svc
    methods: [GET]
"#,
        )
        .unwrap();
        let config = load_gateway_config(&path).unwrap();
        assert_eq!(
            config.services.get("svc").unwrap().addresses[0],
            "localhost:9001"
        );
    }

    #[test]
    fn invalid_config_reports_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("moltis-gateway.yaml");
        std::fs::write(
            &path,
            r#"
router_groups:
  - name: svc
    prefix: /svc
    service: missing
    methods: [GET]
"#,
        )
        .unwrap();
        let err = load_gateway_config(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }
}
