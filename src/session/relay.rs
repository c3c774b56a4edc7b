//! Server-side auth session relay.
//!
//! Keeps the server-readable session cookies in step with the identity
//! provider state the client observes. Stateless between calls: the only
//! durable effect of an event is the cookies it writes or clears.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time;

use crate::config::schema::{GatewayConfig, SessionConfig};
use crate::observability::metrics;
use crate::security::cookies::{is_cookie_value, Cookie, CookieAdapter, CookieError, SameSite};
use crate::session::event::{AuthSessionEvent, RelayReason, RelayResult, SessionTokens};
use crate::session::provider::{EstablishedSession, HttpSessionProvider, ProviderError, SessionProvider};

/// Applies identity-provider events to session cookies.
pub struct SessionRelay {
    provider: Option<Arc<dyn SessionProvider>>,
    session: SessionConfig,
    secure: bool,
    timeout: Duration,
}

impl SessionRelay {
    pub fn new(
        provider: Option<Arc<dyn SessionProvider>>,
        session: SessionConfig,
        secure: bool,
        timeout: Duration,
    ) -> Self {
        Self {
            provider,
            session,
            secure,
            timeout,
        }
    }

    /// Build the relay from configuration. Never fails: a missing or
    /// unusable provider leaves the relay degraded.
    pub fn from_config(config: &GatewayConfig) -> Self {
        let timeout = Duration::from_millis(config.timeouts.provider_ms);
        let provider = config.provider.as_ref().and_then(|provider| {
            match HttpSessionProvider::new(provider, timeout) {
                Ok(client) => Some(Arc::new(client) as Arc<dyn SessionProvider>),
                Err(e) => {
                    tracing::error!(error = %e, "Identity provider client unavailable; session relay degraded");
                    None
                }
            }
        });

        if provider.is_none() {
            tracing::warn!("Identity provider not configured; session relay will report provider_unconfigured");
        }

        Self::new(provider, config.session.clone(), config.secure_cookies(), timeout)
    }

    pub fn is_configured(&self) -> bool {
        self.provider.is_some()
    }

    /// Apply one event, writing cookies through `cookies`. Never errors.
    pub async fn apply(&self, event: AuthSessionEvent, cookies: &mut dyn CookieAdapter) -> RelayResult {
        let name = event.as_str();

        let result = match &self.provider {
            None => RelayResult::failed(RelayReason::ProviderUnconfigured),
            Some(provider) => match event {
                AuthSessionEvent::SignedOut => self.sign_out(provider, cookies).await,
                AuthSessionEvent::SignedIn(tokens) | AuthSessionEvent::TokenRefreshed(tokens) => {
                    self.establish(provider, tokens, cookies).await
                }
            },
        };

        match result.reason {
            None => {
                tracing::debug!(event = name, "Session relay applied");
                metrics::record_relay(name, "ok");
            }
            Some(reason @ (RelayReason::MissingTokens | RelayReason::InvalidTokens)) => {
                tracing::info!(event = name, reason = reason.as_str(), "Session relay not applied");
                metrics::record_relay(name, reason.as_str());
            }
            Some(reason) => {
                tracing::warn!(event = name, reason = reason.as_str(), "Session relay degraded");
                metrics::record_relay(name, reason.as_str());
            }
        }

        result
    }

    async fn sign_out(
        &self,
        provider: &Arc<dyn SessionProvider>,
        cookies: &mut dyn CookieAdapter,
    ) -> RelayResult {
        let access_token = cookies
            .get(&self.session.access_cookie)
            .filter(|t| !t.is_empty())
            .map(str::to_owned);

        let mut cleared = true;
        for name in [&self.session.access_cookie, &self.session.refresh_cookie] {
            if let Err(e) = cookies.set(Cookie::removal(name.as_str()).secure(self.secure)) {
                tracing::error!(error = %e, "Session cookie could not be cleared");
                cleared = false;
            }
        }

        let revoked = match access_token {
            None => Ok(()),
            Some(access_token) => {
                let provider = provider.clone();
                self.detached(async move { provider.sign_out(&access_token).await })
                    .await
            }
        };

        match (cleared, revoked) {
            (false, _) => RelayResult::failed(RelayReason::CookieWriteFailed),
            (true, Ok(())) => RelayResult::ok(),
            (true, Err(reason)) => RelayResult::failed(reason),
        }
    }

    async fn establish(
        &self,
        provider: &Arc<dyn SessionProvider>,
        tokens: SessionTokens,
        cookies: &mut dyn CookieAdapter,
    ) -> RelayResult {
        let Some((access, refresh)) = tokens.complete() else {
            return RelayResult::failed(RelayReason::MissingTokens);
        };
        // Tokens end up verbatim in Set-Cookie; anything outside the
        // cookie-octet set could smuggle attributes.
        if !is_cookie_value(access) || !is_cookie_value(refresh) {
            return RelayResult::failed(RelayReason::InvalidTokens);
        }
        let (access, refresh) = (access.to_owned(), refresh.to_owned());

        let provider = provider.clone();
        match self
            .detached(async move { provider.establish(&access, &refresh).await })
            .await
        {
            Ok(session) => match self.write_session(&session, cookies) {
                Ok(()) => RelayResult::ok(),
                Err(e) => {
                    tracing::error!(error = %e, "Session cookies not written");
                    RelayResult::failed(RelayReason::CookieWriteFailed)
                }
            },
            Err(reason) => RelayResult::failed(reason),
        }
    }

    /// Write both session cookies, or neither.
    fn write_session(
        &self,
        session: &EstablishedSession,
        cookies: &mut dyn CookieAdapter,
    ) -> Result<(), CookieError> {
        let access_max_age = session.expires_in.unwrap_or(self.session.access_max_age_secs);
        let access = self.session_cookie(&self.session.access_cookie, &session.access_token, access_max_age);
        let refresh = self.session_cookie(
            &self.session.refresh_cookie,
            &session.refresh_token,
            self.session.refresh_max_age_secs,
        );
        access.validate()?;
        refresh.validate()?;
        cookies.set(access)?;
        cookies.set(refresh)
    }

    fn session_cookie(&self, name: &str, value: &str, max_age: u64) -> Cookie {
        Cookie::new(name, value)
            .http_only(true)
            .secure(self.secure)
            .same_site(SameSite::Lax)
            .max_age(max_age)
    }

    /// Run a provider call on its own task under the relay timeout.
    ///
    /// The task is not cancelled when the caller goes away or the timeout
    /// fires; it settles on its own.
    async fn detached<T, F>(&self, call: F) -> Result<T, RelayReason>
    where
        T: Send + 'static,
        F: Future<Output = Result<T, ProviderError>> + Send + 'static,
    {
        let handle = tokio::spawn(call);
        match time::timeout(self.timeout, handle).await {
            Ok(Ok(Ok(value))) => Ok(value),
            Ok(Ok(Err(e))) if e.is_timeout() => {
                tracing::warn!(error = %e, "Identity provider call timed out");
                Err(RelayReason::ProviderTimeout)
            }
            Ok(Ok(Err(e))) => {
                tracing::warn!(error = %e, "Identity provider call failed");
                Err(RelayReason::ProviderError)
            }
            Ok(Err(e)) => {
                tracing::error!(error = %e, "Identity provider task aborted");
                Err(RelayReason::ProviderError)
            }
            Err(_) => {
                tracing::warn!(timeout_ms = self.timeout.as_millis() as u64, "Identity provider call timed out");
                Err(RelayReason::ProviderTimeout)
            }
        }
    }
}
