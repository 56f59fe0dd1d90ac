//! Session cookie handling.
//!
//! The cookie carries the session token and nothing else. A missing or
//! unparseable cookie is the same as no session.

use std::time::Duration;

use axum::http::header::{self, HeaderMap, HeaderValue};
use rollcall::SessionToken;

/// Name of the session cookie.
pub const COOKIE_NAME: &str = "rollcall_session";

/// How session cookies are written.
#[derive(Debug, Clone, Copy)]
pub struct CookieSettings {
    pub secure: bool,
    pub max_age: Duration,
}

impl CookieSettings {
    /// `Set-Cookie` value establishing `token`.
    pub fn issue(&self, token: &SessionToken) -> HeaderValue {
        self.build(&token.to_hex(), self.max_age.as_secs())
    }

    /// `Set-Cookie` value expiring the session cookie.
    pub fn clear(&self) -> HeaderValue {
        self.build("", 0)
    }

    fn build(&self, value: &str, max_age: u64) -> HeaderValue {
        let mut cookie = format!(
            "{}={}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}",
            COOKIE_NAME, value, max_age
        );
        if self.secure {
            cookie.push_str("; Secure");
        }
        // Hex and fixed attributes only, always a valid header value.
        HeaderValue::from_str(&cookie).unwrap_or_else(|_| HeaderValue::from_static(""))
    }
}

/// The session token from the request's `Cookie` headers, if any.
pub fn session_token(headers: &HeaderMap) -> Option<SessionToken> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == COOKIE_NAME)
        .and_then(|(_, value)| SessionToken::from_hex(value).ok())
}
