//! Edge security gateway library.
//!
//! Fronts a web application with anti-forgery tokens, fixed-window rate
//! limiting and an auth session relay, then forwards accepted traffic.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod routing;
pub mod security;
pub mod session;

pub use config::schema::GatewayConfig;
pub use http::{AppState, HttpServer};
pub use lifecycle::Shutdown;
