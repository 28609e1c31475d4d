//! Cross-site request forgery protection (double-submit cookie).
//!
//! The CSRF token lives in a cookie readable by the browser (`XSRF-TOKEN`,
//! deliberately not HttpOnly) and must be echoed back in the `X-XSRF-TOKEN`
//! header on state-changing requests to enforced paths. Scheduler-invoked
//! trigger endpoints and the management console sub-path are exempted by the
//! route access policy.

use axum::http::{HeaderMap, Method};
use subtle::ConstantTimeEq;

use crate::auth::token::generate_secret;

/// Cookie carrying the CSRF token, readable by browser scripts.
pub const CSRF_COOKIE: &str = "XSRF-TOKEN";

/// Header the client echoes the CSRF token back in.
pub const CSRF_HEADER: &str = "X-XSRF-TOKEN";

/// Issue a fresh CSRF token.
pub fn issue_token() -> String {
    generate_secret()
}

/// Safe methods never require a CSRF token.
pub fn is_safe_method(method: &Method) -> bool {
    matches!(
        *method,
        Method::GET | Method::HEAD | Method::OPTIONS | Method::TRACE
    )
}

/// Check the double-submit pair: header token must match the cookie token.
pub fn tokens_match(headers: &HeaderMap) -> bool {
    let cookie = match crate::auth::session::cookie_value(headers, CSRF_COOKIE) {
        Some(value) => value,
        None => return false,
    };
    let header = match headers.get(CSRF_HEADER).and_then(|v| v.to_str().ok()) {
        Some(value) => value,
        None => return false,
    };

    cookie.len() == header.len() && bool::from(cookie.as_bytes().ct_eq(header.as_bytes()))
}
