//! Request middleware.

pub mod guard;

pub use guard::{guard_middleware, is_mutating, track_status, MatchedRule};
