//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{to_bytes, Body},
    extract::State,
    http::{HeaderMap, Request, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use edge_gateway::config::{GatewayConfig, ProviderConfig, RouteConfig};
use edge_gateway::lifecycle::Shutdown;
use edge_gateway::HttpServer;
use serde_json::json;
use tokio::net::TcpListener;

/// Token the mock provider accepts.
pub const VALID_ACCESS_TOKEN: &str = "valid-access-token";

/// Bind an ephemeral port and serve `router` on it.
pub async fn serve(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    addr
}

/// Upstream that echoes what it received as JSON.
pub async fn start_echo_upstream() -> SocketAddr {
    async fn echo(request: Request<Body>) -> impl IntoResponse {
        let (parts, body) = request.into_parts();
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned)
        };
        let body = to_bytes(body, usize::MAX).await.unwrap_or_default();
        Json(json!({
            "method": parts.method.as_str(),
            "path": parts.uri.path(),
            "query": parts.uri.query(),
            "x_forwarded_for": header("x-forwarded-for"),
            "x_request_id": header("x-request-id"),
            "body": String::from_utf8_lossy(&body),
        }))
    }

    serve(Router::new().fallback(echo)).await
}

/// Upstream that answers after `delay`.
pub async fn start_slow_upstream(delay: Duration) -> SocketAddr {
    let router = Router::new().fallback(move || async move {
        tokio::time::sleep(delay).await;
        "late"
    });
    serve(router).await
}

/// Call counters of the mock identity provider.
#[derive(Debug, Default)]
pub struct ProviderCalls {
    pub user: AtomicU32,
    pub logout: AtomicU32,
}

impl ProviderCalls {
    pub fn user(&self) -> u32 {
        self.user.load(Ordering::SeqCst)
    }

    pub fn logout(&self) -> u32 {
        self.logout.load(Ordering::SeqCst)
    }
}

/// Identity provider accepting only [`VALID_ACCESS_TOKEN`].
pub async fn start_mock_provider() -> (SocketAddr, Arc<ProviderCalls>) {
    async fn user(State(calls): State<Arc<ProviderCalls>>, headers: HeaderMap) -> impl IntoResponse {
        calls.user.fetch_add(1, Ordering::SeqCst);
        if bearer(&headers) == Some(VALID_ACCESS_TOKEN) {
            (StatusCode::OK, Json(json!({ "id": "user-1" }))).into_response()
        } else {
            (StatusCode::UNAUTHORIZED, Json(json!({ "msg": "invalid JWT" }))).into_response()
        }
    }

    async fn logout(State(calls): State<Arc<ProviderCalls>>) -> StatusCode {
        calls.logout.fetch_add(1, Ordering::SeqCst);
        StatusCode::NO_CONTENT
    }

    let calls = Arc::new(ProviderCalls::default());
    let router = Router::new()
        .route("/auth/v1/user", get(user))
        .route("/auth/v1/logout", post(logout))
        .with_state(calls.clone());
    (serve(router).await, calls)
}

fn bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

/// Development-mode config with one protected route per limiter.
pub fn test_config() -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.environment = edge_gateway::config::Environment::Development;
    config.listener.bind_address = "127.0.0.1:0".into();
    config.routes = vec![
        protected_route("login", "/api/login", "auth"),
        protected_route("contact", "/api/contact", "forms"),
        protected_route("messages", "/api/messages", "messages"),
    ];
    config
}

pub fn protected_route(name: &str, prefix: &str, limiter: &str) -> RouteConfig {
    RouteConfig {
        name: name.into(),
        host: None,
        path_prefix: Some(prefix.into()),
        limiter: Some(limiter.into()),
        csrf: true,
        priority: 10,
    }
}

pub fn with_provider(mut config: GatewayConfig, addr: SocketAddr) -> GatewayConfig {
    config.provider = Some(ProviderConfig {
        url: format!("http://{}", addr),
        api_key: "anon-key".into(),
    });
    config
}

/// A running gateway; dropping it does not stop the server, `stop` does.
pub struct TestGateway {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    handle: tokio::task::JoinHandle<Result<(), std::io::Error>>,
}

impl TestGateway {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn stop(self) {
        self.shutdown.trigger();
        let _ = tokio::time::timeout(Duration::from_secs(5), self.handle).await;
    }
}

pub async fn start_gateway(config: GatewayConfig) -> TestGateway {
    let listener = TcpListener::bind(&config.listener.bind_address).await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let server = HttpServer::new(config);
    let handle = tokio::spawn(server.run(listener, shutdown.subscribe()));
    TestGateway {
        addr,
        shutdown,
        handle,
    }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

/// `name=value` pairs of every `Set-Cookie` header.
pub fn set_cookies(response: &reqwest::Response) -> Vec<String> {
    response
        .headers()
        .get_all("set-cookie")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(str::to_owned)
        .collect()
}

/// Mint a token; returns `(cookie pair, token)`.
pub async fn mint(client: &reqwest::Client, gateway: &TestGateway) -> (String, String) {
    let res = client.get(gateway.url("/api/csrf")).send().await.unwrap();
    assert_eq!(res.status(), 200);
    let cookie = set_cookies(&res)
        .into_iter()
        .next()
        .and_then(|c| c.split(';').next().map(str::to_owned))
        .unwrap();
    let body: serde_json::Value = res.json().await.unwrap();
    (cookie, body["token"].as_str().unwrap().to_owned())
}
