//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Root configuration for the edge gateway.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Deployment environment; controls cookie `Secure` flags.
    pub environment: Environment,

    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Request hardening settings.
    pub security: SecurityConfig,

    /// Anti-forgery token settings.
    pub csrf: CsrfConfig,

    /// Rate limiter instances keyed by operation class.
    pub limiters: LimitersConfig,

    /// Expired rate-limit record sweep.
    pub sweep: SweepConfig,

    /// Identity provider connection. `None` degrades the session relay.
    pub provider: Option<ProviderConfig>,

    /// Session cookie settings for the auth relay.
    pub session: SessionConfig,

    /// Protection rules mapping requests to limiters and CSRF checks.
    pub routes: Vec<RouteConfig>,

    /// Application server that receives requests once they pass the gateway.
    pub upstream: UpstreamConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            environment: Environment::default(),
            listener: ListenerConfig::default(),
            timeouts: TimeoutConfig::default(),
            security: SecurityConfig::default(),
            csrf: CsrfConfig::default(),
            limiters: default_limiters(),
            sweep: SweepConfig::default(),
            provider: None,
            session: SessionConfig::default(),
            routes: Vec::new(),
            upstream: UpstreamConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl GatewayConfig {
    /// Whether cookies should carry the `Secure` attribute.
    pub fn secure_cookies(&self) -> bool {
        self.environment == Environment::Production
    }
}

/// Deployment environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Production,
    Development,
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Ok(Environment::Production),
            "development" | "dev" => Ok(Environment::Development),
            other => Err(format!("unknown environment '{}'", other)),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,

    /// Upper bound on a single identity provider call in milliseconds.
    pub provider_ms: u64,

    /// Upper bound on a forwarded upstream call in seconds.
    pub upstream_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_secs: 30,
            provider_ms: 5_000,
            upstream_secs: 20,
        }
    }
}

/// Security hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Maximum body size in bytes.
    pub max_body_size: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_body_size: 2 * 1024 * 1024, // 2MB
        }
    }
}

/// Anti-forgery token configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CsrfConfig {
    /// Cookie holding the server-side copy.
    pub cookie_name: String,

    /// Header the client echoes the token in.
    pub header_name: String,

    /// Token lifetime in seconds.
    pub ttl_secs: u64,
}

impl Default for CsrfConfig {
    fn default() -> Self {
        Self {
            cookie_name: "csrf_token".to_string(),
            header_name: "x-csrf-token".to_string(),
            ttl_secs: 24 * 60 * 60,
        }
    }
}

/// Window and ceiling for one limiter instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct LimiterConfig {
    /// Fixed window length in milliseconds.
    pub window_ms: u64,

    /// Requests allowed per window.
    pub limit: u32,
}

impl LimiterConfig {
    pub const fn new(limit: u32, window_ms: u64) -> Self {
        Self { window_ms, limit }
    }
}

impl std::str::FromStr for LimiterConfig {
    type Err = String;

    /// Parses the `<limit>/<window_ms>` shorthand used by environment overrides.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (limit, window) = s
            .split_once('/')
            .ok_or_else(|| format!("expected '<limit>/<window_ms>', got '{}'", s))?;
        let limit = limit
            .trim()
            .parse()
            .map_err(|e| format!("invalid limit '{}': {}", limit, e))?;
        let window_ms = window
            .trim()
            .parse()
            .map_err(|e| format!("invalid window '{}': {}", window, e))?;
        Ok(Self { window_ms, limit })
    }
}

/// Named limiter instances. Ordered so startup logs are stable.
pub type LimitersConfig = BTreeMap<String, LimiterConfig>;

/// Default operation classes protected by the gateway.
pub fn default_limiters() -> LimitersConfig {
    let mut limiters = BTreeMap::new();
    limiters.insert("auth".to_string(), LimiterConfig::new(5, 15 * 60 * 1000));
    limiters.insert("forms".to_string(), LimiterConfig::new(10, 60 * 1000));
    limiters.insert("messages".to_string(), LimiterConfig::new(30, 60 * 1000));
    limiters
}

/// Sweep task configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SweepConfig {
    /// Interval between sweeps in seconds.
    pub interval_secs: u64,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self { interval_secs: 300 }
    }
}

/// Identity provider endpoint and credentials.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProviderConfig {
    /// Base URL of the identity provider (e.g., "https://project.example.co").
    pub url: String,

    /// Public API key sent with every provider call.
    pub api_key: String,
}

/// Session cookie configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Cookie holding the access token.
    pub access_cookie: String,

    /// Cookie holding the refresh token.
    pub refresh_cookie: String,

    /// Access cookie lifetime when the provider does not report one.
    pub access_max_age_secs: u64,

    /// Refresh cookie lifetime.
    pub refresh_max_age_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            access_cookie: "sb-access-token".to_string(),
            refresh_cookie: "sb-refresh-token".to_string(),
            access_max_age_secs: 60 * 60,
            refresh_max_age_secs: 7 * 24 * 60 * 60,
        }
    }
}

/// Protection rule for a class of requests.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouteConfig {
    /// Rule identifier for logging/metrics.
    pub name: String,

    /// Host header to match (exact match).
    #[serde(default)]
    pub host: Option<String>,

    /// Path prefix to match.
    #[serde(default)]
    pub path_prefix: Option<String>,

    /// Limiter instance applied to matching requests.
    #[serde(default)]
    pub limiter: Option<String>,

    /// Require a valid anti-forgery token on mutating methods.
    #[serde(default)]
    pub csrf: bool,

    /// Rule priority (higher = checked first).
    #[serde(default)]
    pub priority: u32,
}

/// Upstream application server.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Base URL requests are forwarded to (e.g., "http://127.0.0.1:3000").
    pub url: Option<String>,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
