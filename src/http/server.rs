//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Build shared state from validated configuration
//! - Create the Axum router with gateway endpoints and the forwarding fallback
//! - Wire up middleware (tracing, limits, request ID, guard)
//! - Run the rate-limit sweeper alongside the server
//! - Serve until the shutdown signal fires

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{limit::RequestBodyLimitLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::GatewayConfig;
use crate::http::forward::{forward_handler, Upstream};
use crate::http::handlers;
use crate::http::middleware::{guard_middleware, track_status};
use crate::http::request::{make_request_span, propagate_request_id_layer, set_request_id_layer};
use crate::routing::ProtectionRules;
use crate::security::csrf::CsrfManager;
use crate::security::rate_limit::{RateLimitSweeper, RateLimiters};
use crate::session::relay::SessionRelay;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub limiters: Arc<RateLimiters>,
    pub csrf: Arc<CsrfManager>,
    pub relay: Arc<SessionRelay>,
    pub rules: Arc<ProtectionRules>,
    pub upstream: Option<Upstream>,
}

impl AppState {
    /// Wire every component from configuration.
    pub fn from_config(config: GatewayConfig) -> Self {
        let limiters = Arc::new(RateLimiters::from_config(&config.limiters));
        Self::with_limiters(config, limiters)
    }

    /// Like [`AppState::from_config`] but with caller-supplied limiters,
    /// e.g. driven by a manual clock.
    pub fn with_limiters(config: GatewayConfig, limiters: Arc<RateLimiters>) -> Self {
        let csrf = Arc::new(CsrfManager::new(config.csrf.clone(), config.secure_cookies()));
        let relay = Arc::new(SessionRelay::from_config(&config));
        let rules = Arc::new(ProtectionRules::from_config(&config.routes));

        let upstream = config.upstream.url.as_deref().and_then(|url| match url.parse() {
            Ok(base) => Some(Upstream::new(
                base,
                Duration::from_secs(config.timeouts.upstream_secs),
            )),
            Err(e) => {
                tracing::error!(url = %url, error = %e, "Invalid upstream URL; forwarding disabled");
                None
            }
        });

        Self {
            config: Arc::new(config),
            limiters,
            csrf,
            relay,
            rules,
            upstream,
        }
    }
}

/// HTTP server for the gateway.
pub struct HttpServer {
    router: Router,
    state: AppState,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: GatewayConfig) -> Self {
        Self::with_state(AppState::from_config(config))
    }

    pub fn with_state(state: AppState) -> Self {
        let router = Self::build_router(state.clone());
        Self { router, state }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    pub fn build_router(state: AppState) -> Router {
        let request_timeout = Duration::from_secs(state.config.timeouts.request_secs);
        let max_body_size = state.config.security.max_body_size;

        let forwarded = Router::new()
            .fallback(forward_handler)
            .layer(middleware::from_fn_with_state(state.clone(), guard_middleware));

        Router::new()
            .route("/api/csrf", get(handlers::mint_csrf))
            .route("/api/auth/session", post(handlers::session_event))
            .route("/health", get(handlers::health))
            .merge(forwarded)
            .with_state(state)
            .layer(middleware::from_fn(track_status))
            .layer(TimeoutLayer::new(request_timeout))
            .layer(RequestBodyLimitLayer::new(max_body_size))
            .layer(propagate_request_id_layer())
            .layer(TraceLayer::new_for_http().make_span_with(make_request_span))
            .layer(set_request_id_layer())
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Run the server until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            limiters = ?self.state.limiters.names(),
            protection_rules = self.state.rules.len(),
            provider_configured = self.state.relay.is_configured(),
            upstream_configured = self.state.upstream.is_some(),
            "HTTP server starting"
        );

        let sweeper = RateLimitSweeper::new(
            self.state.limiters.clone(),
            Duration::from_secs(self.state.config.sweep.interval_secs),
        );
        let sweeper_shutdown = shutdown.resubscribe();
        let sweeper_task = tokio::spawn(async move {
            sweeper.run(sweeper_shutdown).await;
        });

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received; draining connections");
            })
            .await?;

        let _ = sweeper_task.await;
        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
