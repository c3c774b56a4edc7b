//! Cookie adapter shared by the CSRF manager and the session relay.
//!
//! The adapter is owned by the request/response exchange and lent to a
//! component for the duration of a single request. Reads see the cookies the
//! client sent plus any writes already made during this request; writes are
//! collected and turned into `Set-Cookie` headers on the response.

use std::collections::HashMap;
use std::fmt;

use axum::http::{header, HeaderMap, HeaderValue};
use thiserror::Error;

/// A cookie the adapter refused to queue.
///
/// Values are never echoed: they may be credentials.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CookieError {
    #[error("'{0}' is not a valid cookie name")]
    InvalidName(String),

    #[error("cookie '{0}' has a value outside the cookie-octet set")]
    InvalidValue(String),

    #[error("cookie '{0}' has an invalid path")]
    InvalidPath(String),
}

/// RFC 6265 `cookie-octet`: visible ASCII minus `"`, `,`, `;` and `\`.
fn is_cookie_octet(b: u8) -> bool {
    matches!(b, 0x21 | 0x23..=0x2B | 0x2D..=0x3A | 0x3C..=0x5B | 0x5D..=0x7E)
}

/// RFC 7230 `tchar`, the alphabet of cookie names.
fn is_token_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b)
}

/// True if `value` can be sent verbatim as a cookie value. Empty is allowed.
pub fn is_cookie_value(value: &str) -> bool {
    value.bytes().all(is_cookie_octet)
}

/// True if `name` is a non-empty token.
pub fn is_cookie_name(name: &str) -> bool {
    !name.is_empty() && name.bytes().all(is_token_char)
}

/// `SameSite` cookie attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

impl SameSite {
    pub fn as_str(&self) -> &'static str {
        match self {
            SameSite::Strict => "Strict",
            SameSite::Lax => "Lax",
            SameSite::None => "None",
        }
    }
}

/// An outgoing cookie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub path: String,
    pub max_age_secs: Option<u64>,
    pub http_only: bool,
    pub secure: bool,
    pub same_site: SameSite,
}

impl Cookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            path: "/".to_string(),
            max_age_secs: None,
            http_only: true,
            secure: true,
            same_site: SameSite::Lax,
        }
    }

    /// A cookie that instructs the client to drop `name`.
    pub fn removal(name: impl Into<String>) -> Self {
        Self::new(name, "").max_age(0)
    }

    pub fn max_age(mut self, secs: u64) -> Self {
        self.max_age_secs = Some(secs);
        self
    }

    pub fn http_only(mut self, http_only: bool) -> Self {
        self.http_only = http_only;
        self
    }

    pub fn secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    pub fn same_site(mut self, same_site: SameSite) -> Self {
        self.same_site = same_site;
        self
    }

    pub fn is_removal(&self) -> bool {
        self.max_age_secs == Some(0)
    }

    /// Check that the cookie renders to a single well-formed `Set-Cookie`.
    pub fn validate(&self) -> Result<(), CookieError> {
        if !is_cookie_name(&self.name) {
            return Err(CookieError::InvalidName(self.name.clone()));
        }
        if !is_cookie_value(&self.value) {
            return Err(CookieError::InvalidValue(self.name.clone()));
        }
        if !self.path.starts_with('/') || self.path.bytes().any(|b| b == b';' || !(0x20..0x7F).contains(&b)) {
            return Err(CookieError::InvalidPath(self.name.clone()));
        }
        Ok(())
    }
}

impl fmt::Display for Cookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}; Path={}", self.name, self.value, self.path)?;
        if let Some(max_age) = self.max_age_secs {
            write!(f, "; Max-Age={}", max_age)?;
        }
        if self.http_only {
            write!(f, "; HttpOnly")?;
        }
        if self.secure {
            write!(f, "; Secure")?;
        }
        write!(f, "; SameSite={}", self.same_site.as_str())
    }
}

/// Read/write access to the cookies of one request/response exchange.
pub trait CookieAdapter: Send {
    /// Current value of a cookie, if any.
    fn get(&self, name: &str) -> Option<&str>;

    /// Queue a cookie on the response. Malformed cookies are refused, never
    /// queued.
    fn set(&mut self, cookie: Cookie) -> Result<(), CookieError>;

    /// Queue removal of a cookie on the response.
    fn remove(&mut self, name: &str) -> Result<(), CookieError> {
        self.set(Cookie::removal(name))
    }
}

/// Default adapter: request cookies in, `Set-Cookie` headers out.
#[derive(Debug, Default, Clone)]
pub struct CookieJar {
    current: HashMap<String, String>,
    writes: Vec<Cookie>,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse every `Cookie` header of a request.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let mut jar = Self::new();
        for value in headers.get_all(header::COOKIE) {
            let Ok(raw) = value.to_str() else {
                continue;
            };
            for pair in raw.split(';') {
                if let Some((name, value)) = pair.trim().split_once('=') {
                    let name = name.trim();
                    if !name.is_empty() {
                        jar.current
                            .entry(name.to_string())
                            .or_insert_with(|| value.trim().to_string());
                    }
                }
            }
        }
        jar
    }

    /// Cookies written during this exchange, in order.
    pub fn writes(&self) -> &[Cookie] {
        &self.writes
    }

    /// Append the queued writes as `Set-Cookie` headers.
    pub fn apply(self, headers: &mut HeaderMap) {
        for cookie in self.writes {
            match HeaderValue::from_str(&cookie.to_string()) {
                Ok(value) => {
                    headers.append(header::SET_COOKIE, value);
                }
                Err(_) => {
                    tracing::warn!(cookie = %cookie.name, "Dropping cookie with invalid characters");
                }
            }
        }
    }
}

impl CookieAdapter for CookieJar {
    fn get(&self, name: &str) -> Option<&str> {
        self.current.get(name).map(String::as_str)
    }

    fn set(&mut self, cookie: Cookie) -> Result<(), CookieError> {
        cookie.validate()?;
        if cookie.is_removal() {
            self.current.remove(&cookie.name);
        } else {
            self.current.insert(cookie.name.clone(), cookie.value.clone());
        }
        self.writes.push(cookie);
        Ok(())
    }
}
