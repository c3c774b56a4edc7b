//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::{GatewayConfig, LimiterConfig, ProviderConfig};
use crate::config::validation::{validate_config, ValidationError};

/// Prefix shared by every environment override.
pub const ENV_PREFIX: &str = "GATEWAY_";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {var}: {message}")]
    Env { var: String, message: String },

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

/// Non-fatal findings from loading, reported once logging is up.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigWarning {
    #[error("identity provider partially configured; session relay will run degraded")]
    PartialProvider,
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config: GatewayConfig = toml::from_str(&content)?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Resolve the effective configuration at process start.
///
/// Reads the optional file, layers `GATEWAY_*` variables from the process
/// environment on top, then validates the result. Runs before logging is
/// initialized, so warnings are returned rather than logged.
pub fn load_with_env(
    path: Option<&Path>,
) -> Result<(GatewayConfig, Vec<ConfigWarning>), ConfigError> {
    let mut config = match path {
        Some(path) => {
            let content = fs::read_to_string(path)?;
            toml::from_str(&content)?
        }
        None => GatewayConfig::default(),
    };

    let warnings = apply_env_overrides(&mut config, std::env::vars())?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok((config, warnings))
}

/// Apply `GATEWAY_*` overrides from the given variables.
///
/// Recognized keys:
/// - `GATEWAY_BIND_ADDRESS`, `GATEWAY_ENVIRONMENT`, `GATEWAY_LOG_LEVEL`
/// - `GATEWAY_PROVIDER_URL`, `GATEWAY_PROVIDER_KEY`
/// - `GATEWAY_UPSTREAM_URL`
/// - `GATEWAY_LIMIT_<NAME>=<limit>/<window_ms>` (name lowercased)
///
/// A provider is only configured when both URL and key end up non-empty;
/// anything less leaves the session relay degraded.
pub fn apply_env_overrides<I>(
    config: &mut GatewayConfig,
    vars: I,
) -> Result<Vec<ConfigWarning>, ConfigError>
where
    I: IntoIterator<Item = (String, String)>,
{
    let mut warnings = Vec::new();
    let mut provider_url = config.provider.as_ref().map(|p| p.url.clone());
    let mut provider_key = config.provider.as_ref().map(|p| p.api_key.clone());

    for (var, value) in vars {
        let Some(key) = var.strip_prefix(ENV_PREFIX) else {
            continue;
        };

        match key {
            "BIND_ADDRESS" => config.listener.bind_address = value,
            "ENVIRONMENT" => {
                config.environment = value
                    .parse()
                    .map_err(|message| ConfigError::Env { var: var.clone(), message })?;
            }
            "LOG_LEVEL" => config.observability.log_level = value,
            "PROVIDER_URL" => provider_url = Some(value),
            "PROVIDER_KEY" => provider_key = Some(value),
            "UPSTREAM_URL" => {
                config.upstream.url = if value.trim().is_empty() { None } else { Some(value) };
            }
            other => {
                if let Some(name) = other.strip_prefix("LIMIT_") {
                    let limiter: LimiterConfig = value
                        .parse()
                        .map_err(|message| ConfigError::Env { var: var.clone(), message })?;
                    config.limiters.insert(name.to_ascii_lowercase(), limiter);
                }
            }
        }
    }

    config.provider = match (provider_url, provider_key) {
        (Some(url), Some(api_key)) if !url.trim().is_empty() && !api_key.trim().is_empty() => {
            Some(ProviderConfig { url, api_key })
        }
        (None, None) => None,
        _ => {
            warnings.push(ConfigWarning::PartialProvider);
            None
        }
    };

    Ok(warnings)
}
