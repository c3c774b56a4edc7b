//! Identity-provider lifecycle events and relay outcomes.

use serde::{Deserialize, Serialize};

/// Serialize a fieldless enum as its `as_str()` name and deserialize through
/// its `parse()`, so each enum has a single name table.
macro_rules! wire_name_serde {
    ($ty:ty) => {
        impl Serialize for $ty {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let name = String::deserialize(deserializer)?;
                <$ty>::parse(&name).ok_or_else(|| {
                    let expected: Vec<&str> = <$ty>::ALL.iter().map(|v| v.as_str()).collect();
                    serde::de::Error::custom(format!(
                        "unknown name '{}', expected one of {}",
                        name,
                        expected.join(", ")
                    ))
                })
            }
        }
    };
}

/// Tokens carried by sign-in and refresh events. Empty strings count as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionTokens {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
}

impl SessionTokens {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: Some(access_token.into()),
            refresh_token: Some(refresh_token.into()),
        }
    }

    /// Both tokens, if both are present and non-empty.
    pub fn complete(&self) -> Option<(&str, &str)> {
        let access = self.access_token.as_deref().filter(|t| !t.is_empty())?;
        let refresh = self.refresh_token.as_deref().filter(|t| !t.is_empty())?;
        Some((access, refresh))
    }
}

/// A client-observed identity-provider transition. Consumed once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthSessionEvent {
    SignedIn(SessionTokens),
    TokenRefreshed(SessionTokens),
    SignedOut,
}

impl AuthSessionEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            AuthSessionEvent::SignedIn(_) => EventKind::SignedIn,
            AuthSessionEvent::TokenRefreshed(_) => EventKind::TokenRefreshed,
            AuthSessionEvent::SignedOut => EventKind::SignedOut,
        }
    }

    pub fn as_str(&self) -> &'static str {
        self.kind().as_str()
    }
}

/// Wire name of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    SignedIn,
    SignedOut,
    TokenRefreshed,
}

impl EventKind {
    pub const ALL: [EventKind; 3] = [EventKind::SignedIn, EventKind::SignedOut, EventKind::TokenRefreshed];

    /// The one mapping between variants and wire names; serde goes through it.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::SignedIn => "SIGNED_IN",
            EventKind::SignedOut => "SIGNED_OUT",
            EventKind::TokenRefreshed => "TOKEN_REFRESHED",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == name)
    }
}

wire_name_serde!(EventKind);

/// JSON body accepted by the relay endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionEventPayload {
    pub event: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

impl SessionEventPayload {
    /// Convert to an event; `None` for an unrecognized event name.
    pub fn into_event(self) -> Option<AuthSessionEvent> {
        let tokens = SessionTokens {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
        };
        match EventKind::parse(&self.event)? {
            EventKind::SignedIn => Some(AuthSessionEvent::SignedIn(tokens)),
            EventKind::TokenRefreshed => Some(AuthSessionEvent::TokenRefreshed(tokens)),
            EventKind::SignedOut => Some(AuthSessionEvent::SignedOut),
        }
    }
}

/// Why a relay call did not complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayReason {
    MissingTokens,
    InvalidTokens,
    ProviderUnconfigured,
    ProviderError,
    ProviderTimeout,
    InvalidPayload,
    UnknownEvent,
    CookieWriteFailed,
}

impl RelayReason {
    pub const ALL: [RelayReason; 8] = [
        RelayReason::MissingTokens,
        RelayReason::InvalidTokens,
        RelayReason::ProviderUnconfigured,
        RelayReason::ProviderError,
        RelayReason::ProviderTimeout,
        RelayReason::InvalidPayload,
        RelayReason::UnknownEvent,
        RelayReason::CookieWriteFailed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RelayReason::MissingTokens => "missing_tokens",
            RelayReason::InvalidTokens => "invalid_tokens",
            RelayReason::ProviderUnconfigured => "provider_unconfigured",
            RelayReason::ProviderError => "provider_error",
            RelayReason::ProviderTimeout => "provider_timeout",
            RelayReason::InvalidPayload => "invalid_payload",
            RelayReason::UnknownEvent => "unknown_event",
            RelayReason::CookieWriteFailed => "cookie_write_failed",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|reason| reason.as_str() == name)
    }
}

wire_name_serde!(RelayReason);

/// Outcome of applying one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayResult {
    pub ok: bool,
    pub reason: Option<RelayReason>,
}

impl RelayResult {
    pub fn ok() -> Self {
        Self { ok: true, reason: None }
    }

    pub fn failed(reason: RelayReason) -> Self {
        Self {
            ok: false,
            reason: Some(reason),
        }
    }
}

/// JSON body returned by the relay endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayResponse {
    pub ok: bool,
    pub event: Option<EventKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<RelayReason>,
}

impl RelayResponse {
    pub fn new(event: Option<EventKind>, result: RelayResult) -> Self {
        Self {
            ok: result.ok,
            event,
            reason: result.reason,
        }
    }
}
