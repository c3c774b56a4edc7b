//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, layers)
//!     → request.rs (request ID, span)
//!     → handlers.rs (gateway-owned endpoints)
//!       or middleware/guard.rs (rate limit, anti-forgery) → forward.rs (upstream)
//!     → response.rs (rejections → status, JSON, headers)
//!     → Send to client
//! ```

pub mod forward;
pub mod handlers;
pub mod middleware;
pub mod request;
pub mod response;
pub mod server;

pub use request::X_REQUEST_ID;
pub use response::GatewayError;
pub use server::{AppState, HttpServer};
