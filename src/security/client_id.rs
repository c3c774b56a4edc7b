//! Client identifier resolution for rate-limit keys.
//!
//! The identifier is a coarse abuse key, not an identity: clients behind the
//! same NAT or proxy share one. Forwarding headers are trusted as-is; the
//! gateway must sit behind a reverse proxy that strips or rewrites them.

use std::net::SocketAddr;

use axum::http::HeaderMap;

/// Proxy-forwarded client chain.
pub const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Single-address header set by some proxies.
pub const X_REAL_IP: &str = "x-real-ip";

/// Identifier used when nothing better is known.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Derive the rate-limit key for a request.
///
/// Order: first `X-Forwarded-For` entry, `X-Real-IP`, the peer address, then
/// [`UNKNOWN_CLIENT`].
pub fn resolve(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    if let Some(forwarded) = header_str(headers, X_FORWARDED_FOR)
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        return forwarded.to_string();
    }

    if let Some(real) = header_str(headers, X_REAL_IP)
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        return real.to_string();
    }

    peer.map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}
