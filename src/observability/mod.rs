//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured logging with fields for machine parsing
//! - Request ID flows through every log line of a request
//! - Expected rejections (rate limit, CSRF) are counted, not logged as errors

pub mod logging;
pub mod metrics;
