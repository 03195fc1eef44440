//! Authentication middleware that verifies the session token and the anti-forgery token.

use axum::{
    extract::{Request, State},
    http::{HeaderMap, Method, header::AUTHORIZATION},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::CookieJar;
use time::OffsetDateTime;

use crate::auth::{
    AuthError, Claims, CsrfFailure, SessionFailure, SessionKeys,
    csrf::{CSRF_COOKIE, CSRF_HEADER, validate_csrf},
    token::{TokenError, verify_token},
};

/// Extract the session token from the `Authorization` header, with or without a `Bearer ` prefix.
fn get_session_token(headers: &HeaderMap) -> Result<&str, SessionFailure> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or(SessionFailure::MissingToken)?
        .to_str()
        .map_err(|_| SessionFailure::Token(TokenError::Malformed))?;

    let token = value.strip_prefix("Bearer ").unwrap_or(value).trim();

    if token.is_empty() {
        Err(SessionFailure::MissingToken)
    } else {
        Ok(token)
    }
}

/// Check the double-submit anti-forgery token.
fn check_csrf(headers: &HeaderMap) -> Result<(), CsrfFailure> {
    let jar = CookieJar::from_headers(headers);
    let cookie = jar.get(CSRF_COOKIE).ok_or(CsrfFailure::MissingCookie)?;
    let header = headers
        .get(CSRF_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or(CsrfFailure::MissingHeader)?;

    if validate_csrf(cookie.value(), header) {
        Ok(())
    } else {
        Err(CsrfFailure::Mismatch)
    }
}

/// Decide whether a request may reach a protected handler.
///
/// The session token is verified first, so an unauthenticated request is
/// always rejected as such even if its anti-forgery token is also bad. Safe
/// methods (GET, HEAD, OPTIONS, TRACE) skip the anti-forgery check.
///
/// # Errors
///
/// - [AuthError::Unauthenticated] if the session token is missing or fails verification.
/// - [AuthError::Forbidden] if the method is mutating and the anti-forgery
///   cookie or header is missing, or they differ.
pub fn authenticate(
    method: &Method,
    headers: &HeaderMap,
    keys: &SessionKeys,
    now: OffsetDateTime,
) -> Result<Claims, AuthError> {
    let token = get_session_token(headers).map_err(AuthError::Unauthenticated)?;
    let claims = verify_token(token, keys, now)
        .map_err(|error| AuthError::Unauthenticated(SessionFailure::Token(error)))?;

    if !method.is_safe() {
        check_csrf(headers).map_err(AuthError::Forbidden)?;
    }

    Ok(claims)
}

/// Middleware function that guards the protected routes.
///
/// The user ID from the session token is placed into the request and the
/// request is executed normally if the checks pass, otherwise a 401 or 403
/// JSON response is returned.
///
/// **Note**: Route handlers can use the function argument `Extension(user_id): Extension<UserID>` to receive the user ID.
pub async fn auth_guard(
    State(keys): State<SessionKeys>,
    mut request: Request,
    next: Next,
) -> Response {
    let claims = match authenticate(
        request.method(),
        request.headers(),
        &keys,
        OffsetDateTime::now_utc(),
    ) {
        Ok(claims) => claims,
        Err(error) => return error.into_response(),
    };

    request.extensions_mut().insert(claims.sub);

    next.run(request).await
}

#[cfg(test)]
mod authenticate_tests {
    use axum::http::{HeaderMap, HeaderValue, Method, header::AUTHORIZATION, header::COOKIE};
    use time::{Duration, OffsetDateTime};

    use crate::{
        auth::{
            AuthError, CsrfFailure, SessionFailure, SessionKeys, TokenError, issue_token,
        },
        user::UserID,
    };

    use super::authenticate;

    fn keys() -> SessionKeys {
        SessionKeys::from_secret(b"middleware-test-secret")
    }

    fn headers_with_token(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        );
        headers
    }

    #[test]
    fn get_without_csrf_cookie_succeeds() {
        let now = OffsetDateTime::now_utc();
        let token = issue_token(UserID::new(3), &keys(), now).unwrap();

        let claims = authenticate(&Method::GET, &headers_with_token(&token), &keys(), now).unwrap();

        assert_eq!(claims.sub, UserID::new(3));
    }

    #[test]
    fn delete_without_csrf_cookie_is_forbidden() {
        let now = OffsetDateTime::now_utc();
        let token = issue_token(UserID::new(3), &keys(), now).unwrap();

        let result = authenticate(&Method::DELETE, &headers_with_token(&token), &keys(), now);

        assert_eq!(result, Err(AuthError::Forbidden(CsrfFailure::MissingCookie)));
    }

    #[test]
    fn patch_is_treated_as_mutating() {
        let now = OffsetDateTime::now_utc();
        let token = issue_token(UserID::new(3), &keys(), now).unwrap();

        let result = authenticate(&Method::PATCH, &headers_with_token(&token), &keys(), now);

        assert_eq!(result, Err(AuthError::Forbidden(CsrfFailure::MissingCookie)));
    }

    #[test]
    fn post_with_cookie_but_no_header_is_forbidden() {
        let now = OffsetDateTime::now_utc();
        let token = issue_token(UserID::new(3), &keys(), now).unwrap();
        let mut headers = headers_with_token(&token);
        headers.insert(COOKIE, HeaderValue::from_static("csrf_token=abc"));

        let result = authenticate(&Method::POST, &headers, &keys(), now);

        assert_eq!(result, Err(AuthError::Forbidden(CsrfFailure::MissingHeader)));
    }

    #[test]
    fn post_with_matching_cookie_and_header_succeeds() {
        let now = OffsetDateTime::now_utc();
        let token = issue_token(UserID::new(3), &keys(), now).unwrap();
        let mut headers = headers_with_token(&token);
        headers.insert(COOKIE, HeaderValue::from_static("csrf_token=abc"));
        headers.insert("x-csrf-token", HeaderValue::from_static("abc"));

        let result = authenticate(&Method::POST, &headers, &keys(), now);

        assert!(result.is_ok());
    }

    #[test]
    fn post_with_mismatched_csrf_is_forbidden() {
        let now = OffsetDateTime::now_utc();
        let token = issue_token(UserID::new(3), &keys(), now).unwrap();
        let mut headers = headers_with_token(&token);
        headers.insert(COOKIE, HeaderValue::from_static("csrf_token=abc"));
        headers.insert("x-csrf-token", HeaderValue::from_static("abd"));

        let result = authenticate(&Method::POST, &headers, &keys(), now);

        assert_eq!(result, Err(AuthError::Forbidden(CsrfFailure::Mismatch)));
    }

    #[test]
    fn missing_token_is_unauthenticated_before_csrf_is_checked() {
        let result = authenticate(
            &Method::DELETE,
            &HeaderMap::new(),
            &keys(),
            OffsetDateTime::now_utc(),
        );

        assert_eq!(
            result,
            Err(AuthError::Unauthenticated(SessionFailure::MissingToken))
        );
    }

    #[test]
    fn empty_bearer_is_missing_token() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer "));

        let result = authenticate(&Method::GET, &headers, &keys(), OffsetDateTime::now_utc());

        assert_eq!(
            result,
            Err(AuthError::Unauthenticated(SessionFailure::MissingToken))
        );
    }

    #[test]
    fn token_without_bearer_prefix_is_accepted() {
        let now = OffsetDateTime::now_utc();
        let token = issue_token(UserID::new(5), &keys(), now).unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(&token).unwrap());

        let claims = authenticate(&Method::GET, &headers, &keys(), now).unwrap();

        assert_eq!(claims.sub, UserID::new(5));
    }

    #[test]
    fn expired_token_is_unauthenticated() {
        let issued_at = OffsetDateTime::now_utc() - Duration::days(8);
        let token = issue_token(UserID::new(3), &keys(), issued_at).unwrap();

        let result = authenticate(
            &Method::GET,
            &headers_with_token(&token),
            &keys(),
            OffsetDateTime::now_utc(),
        );

        assert_eq!(
            result,
            Err(AuthError::Unauthenticated(SessionFailure::Token(
                TokenError::Expired
            )))
        );
    }

    #[test]
    fn session_cookie_alone_is_not_accepted() {
        let now = OffsetDateTime::now_utc();
        let token = issue_token(UserID::new(3), &keys(), now).unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_str(&format!("auth_token={token}")).unwrap(),
        );

        let result = authenticate(&Method::GET, &headers, &keys(), now);

        assert_eq!(
            result,
            Err(AuthError::Unauthenticated(SessionFailure::MissingToken))
        );
    }
}
