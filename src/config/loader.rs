//! Configuration loading from disk and environment.

use std::fs;
use std::io;
use std::path::Path;
use std::str::FromStr;

use crate::config::schema::{BackendConfig, GatewayConfig};
use crate::config::validation::{validate_config, ValidationError};

/// Environment variable naming the config file.
pub const CONFIG_PATH_ENV: &str = "GATEWAY_CONFIG";

/// Config file used when nothing else is specified.
pub const DEFAULT_CONFIG_PATH: &str = "gateway.toml";

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load configuration from `path`, the process environment and defaults.
///
/// A missing file is not an error: defaults plus environment apply.
pub fn load_config(path: &Path) -> Result<GatewayConfig, ConfigError> {
    load_config_with(path, |key| std::env::var(key).ok())
}

/// Same as [`load_config`] with an explicit environment lookup.
pub fn load_config_with<F>(path: &Path, env: F) -> Result<GatewayConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = match fs::read_to_string(path) {
        Ok(content) => parse_config(&content)?,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            tracing::info!(path = %path.display(), "Config file not found, using defaults");
            GatewayConfig::default()
        }
        Err(e) => return Err(ConfigError::Io(e)),
    };

    apply_env_overrides(&mut config, &env);

    if config.backends.is_empty() {
        let url = env("GATEWAY_DEFAULT_BACKEND").unwrap_or_else(|| "http://localhost:3000".to_string());
        tracing::info!(url = %url, "No backends configured, using default backend");
        config.backends.push(BackendConfig {
            name: "default".to_string(),
            url,
            weight: 100,
            health: "/health".to_string(),
        });
    }

    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Parse TOML text into a configuration without validating it.
pub fn parse_config(content: &str) -> Result<GatewayConfig, ConfigError> {
    Ok(toml::from_str(content)?)
}

/// Apply `GATEWAY_*` overrides on top of file values.
pub fn apply_env_overrides<F>(config: &mut GatewayConfig, env: &F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(address) = env("GATEWAY_ADDRESS") {
        config.server.address = address;
    }
    override_num(env, "GATEWAY_READ_TIMEOUT", &mut config.server.read_timeout_secs);
    override_num(env, "GATEWAY_WRITE_TIMEOUT", &mut config.server.write_timeout_secs);
    override_num(env, "GATEWAY_IDLE_TIMEOUT", &mut config.server.idle_timeout_secs);
    override_num(env, "GATEWAY_RATE_LIMIT", &mut config.rate_limit.requests_per_minute);
    override_num(env, "GATEWAY_BURST_SIZE", &mut config.rate_limit.burst_size);
    if let Some(level) = env("GATEWAY_LOG_LEVEL") {
        config.observability.log_level = level;
    }
    if let Some(algorithm) = env("GATEWAY_ALGORITHM") {
        config.load_balancer.algorithm = algorithm;
    }
}

fn override_num<F, T>(env: &F, key: &str, slot: &mut T)
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    if let Some(raw) = env(key) {
        match raw.trim().parse() {
            Ok(value) => *slot = value,
            Err(_) => tracing::warn!(key, value = %raw, "Ignoring unparseable environment override"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const SAMPLE: &str = r#"
        [server]
        address = "127.0.0.1:9000"
        write_timeout_secs = 10

        [[backends]]
        name = "api-1"
        url = "http://10.0.0.1:3000"
        weight = 75

        [[backends]]
        name = "api-2"
        url = "http://10.0.0.2:3000"
        weight = 25
        health = "/ready"

        [rate_limit]
        requests_per_minute = 600

        [load_balancer]
        algorithm = "weighted_round_robin"
    "#;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_parse_applies_defaults() {
        let config = parse_config(SAMPLE).unwrap();
        assert_eq!(config.server.address, "127.0.0.1:9000");
        assert_eq!(config.server.write_timeout_secs, 10);
        assert_eq!(config.server.read_timeout_secs, 30);
        assert_eq!(config.backends.len(), 2);
        assert_eq!(config.backends[0].health, "/health");
        assert_eq!(config.backends[1].health, "/ready");
        assert_eq!(config.rate_limit.requests_per_minute, 600);
        assert_eq!(config.rate_limit.burst_size, 10);
        assert_eq!(config.load_balancer.algorithm, "weighted_round_robin");
        assert_eq!(config.health_check.interval_secs, 30);
        assert_eq!(config.health_check.timeout_secs, 5);
    }

    #[test]
    fn test_env_overrides_file_values() {
        let mut config = parse_config(SAMPLE).unwrap();
        let env = env_of(&[
            ("GATEWAY_ADDRESS", "0.0.0.0:7000"),
            ("GATEWAY_RATE_LIMIT", "60"),
            ("GATEWAY_BURST_SIZE", "not-a-number"),
            ("GATEWAY_ALGORITHM", "random"),
        ]);
        apply_env_overrides(&mut config, &env);

        assert_eq!(config.server.address, "0.0.0.0:7000");
        assert_eq!(config.rate_limit.requests_per_minute, 60);
        assert_eq!(config.rate_limit.burst_size, 10);
        assert_eq!(config.load_balancer.algorithm, "random");
    }

    #[test]
    fn test_missing_file_uses_default_backend() {
        let path = Path::new("/nonexistent/gateway.toml");
        let config = load_config_with(path, env_of(&[("GATEWAY_DEFAULT_BACKEND", "http://svc:8000")])).unwrap();

        assert_eq!(config.backends.len(), 1);
        assert_eq!(config.backends[0].name, "default");
        assert_eq!(config.backends[0].url, "http://svc:8000");
        assert_eq!(config.backends[0].weight, 100);
    }

    #[test]
    fn test_malformed_file_is_rejected() {
        let err = parse_config("[server\naddress = 1").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
