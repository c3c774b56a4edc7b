//! Anti-forgery tokens using the double-submit cookie pattern.
//!
//! The server copy lives in an HttpOnly, SameSite=Strict cookie. The client
//! receives the raw token in the mint response body and echoes it back in a
//! header; a cross-origin page can neither read the body nor the cookie.

use rand::rngs::OsRng;
use rand::RngCore;
use subtle::ConstantTimeEq;

use crate::config::schema::CsrfConfig;
use crate::security::cookies::{Cookie, CookieAdapter, CookieError, SameSite};

/// Random bytes per token (256 bits).
pub const TOKEN_BYTES: usize = 32;

/// Mints and validates anti-forgery tokens.
#[derive(Debug, Clone)]
pub struct CsrfManager {
    config: CsrfConfig,
    secure: bool,
}

impl CsrfManager {
    /// `secure` controls the cookie's `Secure` attribute (on in production).
    pub fn new(config: CsrfConfig, secure: bool) -> Self {
        Self { config, secure }
    }

    pub fn cookie_name(&self) -> &str {
        &self.config.cookie_name
    }

    pub fn header_name(&self) -> &str {
        &self.config.header_name
    }

    /// Generate a token, store it in the outgoing cookie and return it.
    pub fn mint(&self, cookies: &mut dyn CookieAdapter) -> Result<String, CookieError> {
        let token = generate_token();
        cookies.set(
            Cookie::new(self.config.cookie_name.clone(), token.clone())
                .http_only(true)
                .secure(self.secure)
                .same_site(SameSite::Strict)
                .max_age(self.config.ttl_secs),
        )?;
        Ok(token)
    }

    /// Compare the cookie copy with the submitted copy. Fails closed.
    pub fn validate(&self, cookie_value: Option<&str>, header_value: Option<&str>) -> bool {
        validate(cookie_value, header_value)
    }
}

/// Hex-encoded token from the OS CSPRNG.
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// True iff both values are present, non-empty and byte-for-byte equal.
///
/// Length is not secret; the byte comparison runs in constant time.
pub fn validate(cookie_value: Option<&str>, header_value: Option<&str>) -> bool {
    let (Some(cookie), Some(header)) = (cookie_value, header_value) else {
        return false;
    };
    if cookie.is_empty() || header.is_empty() || cookie.len() != header.len() {
        return false;
    }
    cookie.as_bytes().ct_eq(header.as_bytes()).into()
}
