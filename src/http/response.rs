//! Mapping gateway decisions to HTTP responses.
//!
//! Security components return typed decisions; this module is the one place
//! that turns them into status codes, JSON bodies and headers.

use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::security::cookies::CookieError;
use crate::security::rate_limit::RateLimitDecision;

pub const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
pub const X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

/// Rejections produced by the gateway itself.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("rate limit exceeded")]
    RateLimited {
        decision: RateLimitDecision,
        retry_after_secs: u64,
    },

    #[error("invalid anti-forgery token")]
    InvalidCsrfToken,

    #[error("no upstream configured")]
    NoUpstream,

    #[error("upstream unavailable")]
    UpstreamUnavailable,

    #[error("upstream timed out")]
    UpstreamTimeout,

    #[error("cookie rejected: {0}")]
    Cookie(#[from] CookieError),
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            GatewayError::InvalidCsrfToken => StatusCode::FORBIDDEN,
            GatewayError::NoUpstream | GatewayError::UpstreamUnavailable => StatusCode::BAD_GATEWAY,
            GatewayError::UpstreamTimeout => StatusCode::GATEWAY_TIMEOUT,
            GatewayError::Cookie(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            GatewayError::RateLimited { .. } => "rate_limited",
            GatewayError::InvalidCsrfToken => "invalid_csrf_token",
            GatewayError::NoUpstream => "no_upstream",
            GatewayError::UpstreamUnavailable => "upstream_unavailable",
            GatewayError::UpstreamTimeout => "upstream_timeout",
            GatewayError::Cookie(_) => "internal_error",
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            GatewayError::RateLimited {
                decision,
                retry_after_secs,
            } => {
                let body = json!({
                    "error": "rate_limited",
                    "remaining": 0,
                    "reset_at": decision.reset_at,
                    "retry_after": retry_after_secs,
                });
                let mut response = (status, Json(body)).into_response();
                add_rate_limit_headers(response.headers_mut(), &decision);
                response
                    .headers_mut()
                    .insert(axum::http::header::RETRY_AFTER, HeaderValue::from(retry_after_secs));
                response
            }
            other => (status, Json(json!({ "error": other.code() }))).into_response(),
        }
    }
}

/// Attach `x-ratelimit-*` headers describing a decision.
pub fn add_rate_limit_headers(headers: &mut HeaderMap, decision: &RateLimitDecision) {
    headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(decision.limit));
    headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(decision.remaining));
    headers.insert(X_RATELIMIT_RESET, HeaderValue::from(decision.reset_at));
}
