//! Protection rule subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (host, path)
//!     → router.rs (rule lookup)
//!     → matcher.rs (evaluate match conditions)
//!     → Return: matched ProtectionRule or None
//!
//! Rule Compilation (at startup):
//!     RouteConfig[]
//!     → Sort by priority
//!     → Compile matchers
//!     → Freeze as immutable ProtectionRules
//! ```
//!
//! # Design Decisions
//! - Rules compiled at startup, immutable at runtime
//! - Deterministic: same input always matches same rule
//! - First match wins (ordered by priority)

pub mod matcher;
pub mod router;

pub use router::{ProtectionRule, ProtectionRules};
