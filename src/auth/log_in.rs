//! This file defines the handlers for logging in and out and for rotating the
//! anti-forgery token.

use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, State, rejection::JsonRejection},
};
use axum_extra::extract::CookieJar;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use time::OffsetDateTime;

use crate::{
    AppState, Error,
    auth::{
        CookiePolicy, CsrfToken, PasswordHash, SessionKeys, invalidate_auth_cookies,
        issue_token, set_auth_cookies, set_csrf_cookie,
    },
    user::{UserProfile, get_user_by_email},
};

/// A bcrypt hash at the default cost that unknown emails are verified against,
/// so that rejecting them takes as long as rejecting a wrong password.
const UNKNOWN_USER_HASH: &str = "$2b$12$Gwf0uvxH3L7JLfo0CC/NCOoijK2vQ/wbgP.LeNup8vj6gg31IiFkm";

/// The state needed to perform a login.
#[derive(Debug, Clone)]
pub struct LoginState {
    /// The keys for signing session tokens.
    pub session_keys: SessionKeys,
    /// How the auth cookies are built.
    pub cookie_policy: CookiePolicy,
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for LoginState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            session_keys: state.session_keys.clone(),
            cookie_policy: state.cookie_policy,
            db_connection: state.db_connection.clone(),
        }
    }
}

/// The credentials sent by the client to log in.
#[derive(Clone, Deserialize)]
pub struct LogInData {
    pub email: String,
    pub password: String,
}

/// The body returned on a successful log-in.
#[derive(Debug, Serialize)]
pub struct LogInResponse {
    /// The signed session token, to be sent back as a bearer token.
    pub token: String,
    /// The anti-forgery token, also set as a cookie.
    pub csrf_token: CsrfToken,
    /// The profile of the user that logged in.
    pub data: UserProfile,
}

/// Handler for log-in requests.
///
/// On success the session and anti-forgery cookies are set and both tokens are
/// returned in the body along with the user's profile.
///
/// # Errors
///
/// This function will return an error in a few situations.
/// - The email is not registered or the password is not correct. Both cases
///   get the same [Error::InvalidCredentials] response.
/// - An internal error occurred when verifying the password or creating the tokens.
pub async fn log_in(
    State(state): State<LoginState>,
    jar: CookieJar,
    user_data: Result<Json<LogInData>, JsonRejection>,
) -> Result<(CookieJar, Json<LogInResponse>), Error> {
    let Json(user_data) =
        user_data.map_err(|rejection| Error::InvalidInput(rejection.body_text()))?;

    let user = {
        let connection = state
            .db_connection
            .lock()
            .map_err(|_| Error::DatabaseLockError)?;

        match get_user_by_email(&user_data.email, &connection) {
            Ok(user) => Some(user),
            Err(Error::NotFound) => None,
            Err(error) => return Err(error),
        }
    };

    let password_hash = match &user {
        Some(user) => user.password_hash.clone(),
        None => PasswordHash::new_unchecked(UNKNOWN_USER_HASH),
    };
    let is_password_valid =
        tokio::task::spawn_blocking(move || password_hash.verify(&user_data.password))
            .await?
            .map_err(|error| Error::HashingError(error.to_string()))?;

    let user = match user {
        Some(user) if is_password_valid => user,
        Some(user) => {
            tracing::info!("Failed log-in attempt for user {}", user.id);
            return Err(Error::InvalidCredentials);
        }
        None => return Err(Error::InvalidCredentials),
    };

    let token = issue_token(user.id, &state.session_keys, OffsetDateTime::now_utc())?;
    let csrf_token = CsrfToken::generate()?;
    let jar = set_auth_cookies(jar, &token, &csrf_token, &state.cookie_policy);

    tracing::info!("User {} logged in", user.id);

    Ok((
        jar,
        Json(LogInResponse {
            token,
            csrf_token,
            data: UserProfile::from(&user),
        }),
    ))
}

/// Invalidate the auth cookies.
///
/// Session tokens are stateless, so a copy of the token held elsewhere stays
/// valid until it expires.
pub async fn log_out(State(state): State<LoginState>, jar: CookieJar) -> (CookieJar, Json<Value>) {
    (
        invalidate_auth_cookies(jar, &state.cookie_policy),
        Json(json!({ "message": "logged out successfully" })),
    )
}

/// Issue a fresh anti-forgery token as a cookie and in the body.
///
/// # Errors
///
/// Returns [Error::RngFailure] if the token could not be generated.
pub async fn get_csrf_token(
    State(state): State<LoginState>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<Value>), Error> {
    let csrf_token = CsrfToken::generate()?;
    let jar = set_csrf_cookie(jar, &csrf_token, &state.cookie_policy);

    Ok((
        jar,
        Json(json!({
            "message": "CSRF token set",
            "csrf_token": csrf_token,
        })),
    ))
}
