//! Forwarding accepted requests to the upstream application.
//!
//! # Design Decisions
//! - Bodies are streamed, never buffered
//! - Hop-by-hop headers are stripped in both directions
//! - The peer address is appended to `X-Forwarded-For`
//! - No retries: mutating requests are not idempotent

use std::net::SocketAddr;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{header, uri::PathAndQuery, HeaderMap, HeaderName, HeaderValue, Request, Uri},
    response::{IntoResponse, Response},
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};

use crate::http::request::request_id;
use crate::http::response::GatewayError;
use crate::http::server::AppState;
use crate::security::client_id::X_FORWARDED_FOR;

const HOP_BY_HOP: [HeaderName; 7] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::UPGRADE,
];

/// Upstream application server reached over plain HTTP.
#[derive(Clone)]
pub struct Upstream {
    base: Uri,
    client: Client<HttpConnector, Body>,
    timeout: Duration,
}

impl std::fmt::Debug for Upstream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Upstream")
            .field("base", &self.base)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Upstream {
    pub fn new(base: Uri, timeout: Duration) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self {
            base,
            client,
            timeout,
        }
    }

    /// Map an inbound URI onto the upstream, keeping path and query.
    pub fn target_uri(&self, inbound: &Uri) -> Option<Uri> {
        let base_path = self.base.path().trim_end_matches('/');
        let path_and_query = inbound
            .path_and_query()
            .map(PathAndQuery::as_str)
            .unwrap_or("/");
        let joined = format!("{}{}", base_path, path_and_query);

        let mut parts = self.base.clone().into_parts();
        parts.path_and_query = Some(joined.parse().ok()?);
        Uri::from_parts(parts).ok()
    }
}

/// Fallback handler: forward everything the gateway does not answer itself.
pub async fn forward_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    match forward(&state, request).await {
        Ok(response) => response,
        Err(e) => e.into_response(),
    }
}

async fn forward(state: &AppState, request: Request<Body>) -> Result<Response, GatewayError> {
    let upstream = state.upstream.as_ref().ok_or(GatewayError::NoUpstream)?;
    let request_id = request_id(request.headers()).to_string();
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);

    let (mut parts, body) = request.into_parts();
    let uri = upstream.target_uri(&parts.uri).ok_or_else(|| {
        tracing::warn!(request_id = %request_id, uri = %parts.uri, "Cannot map request onto upstream");
        GatewayError::UpstreamUnavailable
    })?;

    strip_hop_by_hop(&mut parts.headers);
    if let Some(peer) = peer {
        append_forwarded_for(&mut parts.headers, peer);
    }

    tracing::debug!(request_id = %request_id, method = %parts.method, upstream = %uri, "Forwarding request");

    parts.uri = uri;
    let outbound = Request::from_parts(parts, body);

    match tokio::time::timeout(upstream.timeout, upstream.client.request(outbound)).await {
        Ok(Ok(response)) => {
            let (mut parts, body) = response.into_parts();
            strip_hop_by_hop(&mut parts.headers);
            Ok(Response::from_parts(parts, Body::new(body)))
        }
        Ok(Err(e)) => {
            tracing::error!(request_id = %request_id, error = %e, "Upstream error");
            Err(GatewayError::UpstreamUnavailable)
        }
        Err(_) => {
            tracing::error!(request_id = %request_id, "Upstream timed out");
            Err(GatewayError::UpstreamTimeout)
        }
    }
}

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in HOP_BY_HOP.iter() {
        headers.remove(name);
    }
}

fn append_forwarded_for(headers: &mut HeaderMap, peer: SocketAddr) {
    let ip = peer.ip().to_string();
    let value = match headers.get(X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
        Some(existing) if !existing.trim().is_empty() => format!("{}, {}", existing, ip),
        _ => ip,
    };
    if let Ok(value) = HeaderValue::from_str(&value) {
        headers.insert(X_FORWARDED_FOR, value);
    }
}
