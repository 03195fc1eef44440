//! Session authentication: password handling, signed session tokens, the
//! double-submit anti-forgery token and the middleware that checks them.

mod cookie;
mod csrf;
mod log_in;
mod middleware;
mod password;
mod register_user;
mod token;

use axum::{
    Json,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::ErrorKind;

pub use cookie::{
    CookiePolicy, SESSION_COOKIE, invalidate_auth_cookies, set_auth_cookies, set_csrf_cookie,
};
pub use csrf::{CSRF_COOKIE, CSRF_HEADER, CsrfToken, validate_csrf};
pub use log_in::{get_csrf_token, log_in, log_out};
pub use middleware::{auth_guard, authenticate};
pub use password::{MIN_PASSWORD_LENGTH, PasswordHash, ValidatedPassword, meets_strength_policy};
pub use register_user::register_user;
pub use token::{Claims, ISSUER, SESSION_DURATION, SessionKeys, TokenError, issue_token, verify_token};

/// Why a request could not be tied to a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SessionFailure {
    #[error("no session token was provided")]
    MissingToken,
    #[error(transparent)]
    Token(#[from] TokenError),
}

/// Why a mutating request failed the anti-forgery check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CsrfFailure {
    #[error("the anti-forgery cookie is missing")]
    MissingCookie,
    #[error("the anti-forgery header is missing")]
    MissingHeader,
    #[error("the anti-forgery cookie and header do not match")]
    Mismatch,
}

/// A request rejected by the auth guard.
///
/// The specific reason is logged but not sent to the client, every failure of
/// the same kind gets the same response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("unauthenticated: {0}")]
    Unauthenticated(SessionFailure),
    #[error("forbidden: {0}")]
    Forbidden(CsrfFailure),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        tracing::warn!("Rejected request: {self}");

        let (kind, message) = match self {
            AuthError::Unauthenticated(_) => (
                ErrorKind::Unauthenticated,
                "invalid or missing authorization token",
            ),
            AuthError::Forbidden(_) => (ErrorKind::Forbidden, "invalid CSRF token"),
        };

        (
            kind.status_code(),
            Json(json!({
                "error": kind.message(),
                "message": message,
            })),
        )
            .into_response()
    }
}

#[cfg(test)]
mod auth_error_tests {
    use axum::{http::StatusCode, response::IntoResponse};

    use super::{AuthError, CsrfFailure, SessionFailure, TokenError};

    #[test]
    fn unauthenticated_uses_401() {
        for failure in [
            SessionFailure::MissingToken,
            SessionFailure::Token(TokenError::Malformed),
            SessionFailure::Token(TokenError::SignatureInvalid),
            SessionFailure::Token(TokenError::Expired),
        ] {
            let response = AuthError::Unauthenticated(failure).into_response();

            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        }
    }

    #[test]
    fn forbidden_uses_403() {
        let response = AuthError::Forbidden(CsrfFailure::Mismatch).into_response();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn reason_is_kept_for_logging() {
        let error = AuthError::Unauthenticated(SessionFailure::Token(TokenError::Expired));

        assert_eq!(error.to_string(), "unauthenticated: session token has expired");
    }
}
