//! Auth session relay subsystem.
//!
//! # Data Flow
//! ```text
//! Client identity state machine transition
//!     → POST /api/auth/session (http::handlers)
//!     → event.rs (payload → AuthSessionEvent)
//!     → relay.rs (validate tokens, call provider with timeout)
//!     → provider.rs (identity provider REST calls)
//!     → session cookies written/cleared on the response
//! ```
//!
//! # Design Decisions
//! - Best-effort synchronization: every outcome is a `RelayResult`
//! - Missing provider configuration degrades instead of failing startup
//! - Provider calls run detached so client aborts do not cancel them

pub mod event;
pub mod provider;
pub mod relay;

pub use event::{AuthSessionEvent, EventKind, RelayReason, RelayResponse, RelayResult, SessionTokens};
pub use provider::{HttpSessionProvider, ProviderError, SessionProvider};
pub use relay::SessionRelay;
