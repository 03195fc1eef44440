//! Defines functions for handing the session and anti-forgery tokens to the client as cookies.

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use time::{Duration, OffsetDateTime};

use crate::auth::{CsrfToken, csrf::CSRF_COOKIE, token::SESSION_DURATION};

/// The name of the http-only cookie holding the session token.
pub const SESSION_COOKIE: &str = "auth_token";

/// How the auth cookies are built.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CookiePolicy {
    /// Whether cookies are only sent over HTTPS.
    pub secure: bool,
    /// How long the cookies last, which should match the session token lifetime.
    pub duration: Duration,
}

impl Default for CookiePolicy {
    fn default() -> Self {
        Self {
            secure: true,
            duration: SESSION_DURATION,
        }
    }
}

fn build_cookie(
    name: &'static str,
    value: String,
    http_only: bool,
    policy: &CookiePolicy,
) -> Cookie<'static> {
    Cookie::build((name, value))
        .path("/")
        .max_age(policy.duration)
        .expires(OffsetDateTime::now_utc() + policy.duration)
        .http_only(http_only)
        .same_site(SameSite::Lax)
        .secure(policy.secure)
        .build()
}

/// Add the session token cookie (http-only) and the anti-forgery cookie
/// (readable by client scripts) to `jar`.
pub fn set_auth_cookies(
    jar: CookieJar,
    session_token: &str,
    csrf_token: &CsrfToken,
    policy: &CookiePolicy,
) -> CookieJar {
    jar.add(build_cookie(
        SESSION_COOKIE,
        session_token.to_owned(),
        true,
        policy,
    ))
    .add(build_cookie(
        CSRF_COOKIE,
        csrf_token.to_string(),
        false,
        policy,
    ))
}

/// Replace only the anti-forgery cookie in `jar`.
pub fn set_csrf_cookie(jar: CookieJar, csrf_token: &CsrfToken, policy: &CookiePolicy) -> CookieJar {
    jar.add(build_cookie(
        CSRF_COOKIE,
        csrf_token.to_string(),
        false,
        policy,
    ))
}

/// Set both auth cookies to an invalid value with a max age of zero, which
/// should delete them on the client side.
pub fn invalidate_auth_cookies(jar: CookieJar, policy: &CookiePolicy) -> CookieJar {
    let expired = CookiePolicy {
        secure: policy.secure,
        duration: Duration::ZERO,
    };

    let mut session_cookie = build_cookie(SESSION_COOKIE, "deleted".to_owned(), true, &expired);
    session_cookie.set_expires(OffsetDateTime::UNIX_EPOCH);
    let mut csrf_cookie = build_cookie(CSRF_COOKIE, "deleted".to_owned(), false, &expired);
    csrf_cookie.set_expires(OffsetDateTime::UNIX_EPOCH);

    jar.add(session_cookie).add(csrf_cookie)
}
