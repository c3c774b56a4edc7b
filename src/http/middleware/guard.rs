//! Request guard: rate limit, then anti-forgery check.
//!
//! Runs in front of forwarded traffic. Only mutating methods on requests
//! matching a protection rule are checked; everything else passes through.

use std::net::SocketAddr;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Method, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::http::request::request_id;
use crate::http::response::{add_rate_limit_headers, GatewayError};
use crate::http::server::AppState;
use crate::observability::metrics;
use crate::security::client_id;
use crate::security::cookies::{CookieAdapter, CookieJar};

/// Name of the protection rule that matched, for downstream logging.
#[derive(Debug, Clone)]
pub struct MatchedRule(pub String);

pub fn is_mutating(method: &Method) -> bool {
    matches!(
        *method,
        Method::POST | Method::PUT | Method::PATCH | Method::DELETE
    )
}

pub async fn guard_middleware(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    if !is_mutating(request.method()) {
        return next.run(request).await;
    }

    let Some(rule) = state.rules.match_request(&request) else {
        return next.run(request).await;
    };
    let rule_name = rule.name.clone();
    let limiter = rule.limiter.clone();
    let csrf_required = rule.csrf;

    let request_id = request_id(request.headers()).to_string();

    // 1. Rate limit
    let mut allowed_decision = None;
    if let Some(limiter) = limiter.as_deref() {
        let peer = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        let client = client_id::resolve(request.headers(), peer);
        let decision = state.limiters.check(limiter, &client);

        if !decision.allowed {
            tracing::debug!(
                request_id = %request_id,
                rule = %rule_name,
                limiter = %limiter,
                client = %client,
                reset_at = decision.reset_at,
                "Rate limit exceeded"
            );
            metrics::record_rate_limited(limiter);
            let retry_after_secs = decision.retry_after_secs(state.limiters.now_ms());
            return GatewayError::RateLimited {
                decision,
                retry_after_secs,
            }
            .into_response();
        }
        allowed_decision = Some(decision);
    }

    // 2. Anti-forgery token
    if csrf_required {
        let cookies = CookieJar::from_headers(request.headers());
        let header = request
            .headers()
            .get(state.csrf.header_name())
            .and_then(|v| v.to_str().ok());
        let cookie = cookies.get(state.csrf.cookie_name());

        if !state.csrf.validate(cookie, header) {
            let reason = match (cookie, header) {
                (None, _) => "missing_cookie",
                (_, None) => "missing_header",
                _ => "mismatch",
            };
            tracing::info!(
                request_id = %request_id,
                rule = %rule_name,
                reason,
                "Rejected request with invalid anti-forgery token"
            );
            metrics::record_csrf_rejected(reason);
            return GatewayError::InvalidCsrfToken.into_response();
        }
    }

    request.extensions_mut().insert(MatchedRule(rule_name));
    let mut response = next.run(request).await;
    if let Some(decision) = allowed_decision {
        add_rate_limit_headers(response.headers_mut(), &decision);
    }
    response
}

/// Count responses by status.
pub async fn track_status(request: Request<Body>, next: Next) -> Response {
    let response = next.run(request).await;
    metrics::record_request(response.status().as_u16());
    response
}
