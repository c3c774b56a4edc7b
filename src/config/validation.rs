//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check referential integrity (routes reference existing limiters)
//! - Validate value ranges (timeouts > 0, windows > 0, addresses parse)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use axum::http::HeaderName;
use thiserror::Error;

use crate::config::schema::GatewayConfig;
use crate::security::cookies::is_cookie_name;

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("listener.bind_address '{0}' is not a socket address")]
    InvalidBindAddress(String),

    #[error("observability.metrics_address '{0}' is not a socket address")]
    InvalidMetricsAddress(String),

    #[error("limiter '{name}' must have a non-zero {field}")]
    ZeroLimiterField { name: String, field: &'static str },

    #[error("route '{route}' references unknown limiter '{limiter}'")]
    UnknownLimiter { route: String, limiter: String },

    #[error("route '{0}' is defined more than once")]
    DuplicateRoute(String),

    #[error("{field} must be greater than zero")]
    ZeroValue { field: &'static str },

    #[error("{field} '{value}' is not a valid URL")]
    InvalidUrl { field: &'static str, value: String },

    #[error("upstream.url '{0}' must use the http scheme")]
    UnsupportedUpstreamScheme(String),

    #[error("csrf.header_name '{0}' is not a valid header name")]
    InvalidHeaderName(String),

    #[error("{field} '{value}' is not a valid cookie name")]
    InvalidCookieName { field: &'static str, value: String },
}

/// Check a parsed configuration for semantic errors.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress(
            config.listener.bind_address.clone(),
        ));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidMetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    for (name, limiter) in &config.limiters {
        if limiter.limit == 0 {
            errors.push(ValidationError::ZeroLimiterField {
                name: name.clone(),
                field: "limit",
            });
        }
        if limiter.window_ms == 0 {
            errors.push(ValidationError::ZeroLimiterField {
                name: name.clone(),
                field: "window_ms",
            });
        }
    }

    let mut seen = HashSet::new();
    for route in &config.routes {
        if !seen.insert(route.name.as_str()) {
            errors.push(ValidationError::DuplicateRoute(route.name.clone()));
        }
        if let Some(limiter) = &route.limiter {
            if !config.limiters.contains_key(limiter) {
                errors.push(ValidationError::UnknownLimiter {
                    route: route.name.clone(),
                    limiter: limiter.clone(),
                });
            }
        }
    }

    let positive = [
        ("timeouts.request_secs", config.timeouts.request_secs),
        ("timeouts.provider_ms", config.timeouts.provider_ms),
        ("timeouts.upstream_secs", config.timeouts.upstream_secs),
        ("sweep.interval_secs", config.sweep.interval_secs),
        ("csrf.ttl_secs", config.csrf.ttl_secs),
    ];
    for (field, value) in positive {
        if value == 0 {
            errors.push(ValidationError::ZeroValue { field });
        }
    }

    if HeaderName::from_bytes(config.csrf.header_name.as_bytes()).is_err() {
        errors.push(ValidationError::InvalidHeaderName(
            config.csrf.header_name.clone(),
        ));
    }

    let cookie_names = [
        ("csrf.cookie_name", &config.csrf.cookie_name),
        ("session.access_cookie", &config.session.access_cookie),
        ("session.refresh_cookie", &config.session.refresh_cookie),
    ];
    for (field, value) in cookie_names {
        if !is_cookie_name(value) {
            errors.push(ValidationError::InvalidCookieName {
                field,
                value: value.clone(),
            });
        }
    }

    if let Some(provider) = &config.provider {
        if url::Url::parse(&provider.url).is_err() {
            errors.push(ValidationError::InvalidUrl {
                field: "provider.url",
                value: provider.url.clone(),
            });
        }
    }

    if let Some(upstream) = &config.upstream.url {
        match url::Url::parse(upstream) {
            Ok(url) if url.scheme() != "http" => {
                errors.push(ValidationError::UnsupportedUpstreamScheme(upstream.clone()));
            }
            Ok(_) => {}
            Err(_) => errors.push(ValidationError::InvalidUrl {
                field: "upstream.url",
                value: upstream.clone(),
            }),
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
