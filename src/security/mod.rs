//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming mutating request:
//!     → client_id.rs (derive the rate-limit key)
//!     → rate_limit.rs (per-class fixed window check)
//!     → csrf.rs (double-submit token check)
//!     → Pass to upstream
//! ```
//!
//! # Design Decisions
//! - Components return typed decisions; HTTP mapping lives in `http::response`
//! - Fail closed on forgery checks
//! - Cookies are only touched through `cookies::CookieAdapter`

pub mod client_id;
pub mod cookies;
pub mod csrf;
pub mod rate_limit;

pub use cookies::{Cookie, CookieAdapter, CookieJar, SameSite};
pub use csrf::CsrfManager;
pub use rate_limit::{RateLimitDecision, RateLimiter, RateLimiters};
