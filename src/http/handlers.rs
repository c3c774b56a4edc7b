//! Endpoints answered by the gateway itself.
//!
//! - `GET /api/csrf`: mint an anti-forgery token
//! - `POST /api/auth/session`: relay an identity-provider session event
//! - `GET /health`: liveness and wiring summary

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, HeaderValue},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::http::request::request_id;
use crate::http::response::GatewayError;
use crate::http::server::AppState;
use crate::observability::metrics;
use crate::security::cookies::CookieJar;
use crate::session::event::{EventKind, RelayReason, RelayResponse, RelayResult, SessionEventPayload};

/// Mint a fresh token: cookie copy in `Set-Cookie`, client copy in the body.
pub async fn mint_csrf(State(state): State<AppState>) -> Response {
    let mut jar = CookieJar::new();
    let token = match state.csrf.mint(&mut jar) {
        Ok(token) => token,
        Err(e) => {
            tracing::error!(error = %e, "Failed to set anti-forgery cookie");
            return GatewayError::from(e).into_response();
        }
    };
    metrics::record_csrf_minted();

    let mut response = Json(json!({ "token": token })).into_response();
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    jar.apply(response.headers_mut());
    response
}

/// Relay a session event. Always answers 200; failures are in the body.
pub async fn session_event(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let request_id = request_id(&headers).to_string();

    let payload: SessionEventPayload = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::info!(request_id = %request_id, error = %e, "Malformed session event");
            metrics::record_relay("unknown", RelayReason::InvalidPayload.as_str());
            return relay_response(None, RelayResult::failed(RelayReason::InvalidPayload), None);
        }
    };

    let Some(event) = payload.into_event() else {
        tracing::info!(request_id = %request_id, "Unknown session event");
        metrics::record_relay("unknown", RelayReason::UnknownEvent.as_str());
        return relay_response(None, RelayResult::failed(RelayReason::UnknownEvent), None);
    };

    let kind = event.kind();
    let mut jar = CookieJar::from_headers(&headers);
    let result = state.relay.apply(event, &mut jar).await;
    relay_response(Some(kind), result, Some(jar))
}

fn relay_response(event: Option<EventKind>, result: RelayResult, jar: Option<CookieJar>) -> Response {
    let mut response = Json(RelayResponse::new(event, result)).into_response();
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    if let Some(jar) = jar {
        jar.apply(response.headers_mut());
    }
    response
}

pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "provider_configured": state.relay.is_configured(),
        "upstream_configured": state.upstream.is_some(),
        "limiters": state.limiters.names(),
        "protection_rules": state.rules.len(),
    }))
}
