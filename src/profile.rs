//! Defines the endpoints for viewing, updating and deleting the current user.

use std::sync::{Arc, Mutex};

use axum::{
    Extension, Json,
    extract::{FromRef, State, rejection::JsonRejection},
};
use axum_extra::extract::CookieJar;
use rusqlite::Connection;
use serde_json::{Value, json};
use time::OffsetDateTime;

use crate::{
    AppState, Error,
    auth::{CookiePolicy, invalidate_auth_cookies},
    user::{UserID, UserProfile, UserUpdate, delete_user, get_user_by_id, update_user},
};

/// The state needed to manage the current user's profile.
#[derive(Debug, Clone)]
pub struct ProfileState {
    /// Used to clear the auth cookies once the account is deleted.
    pub cookie_policy: CookiePolicy,
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for ProfileState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            cookie_policy: state.cookie_policy,
            db_connection: state.db_connection.clone(),
        }
    }
}

/// Respond with the profile of the logged-in user.
pub async fn get_profile(
    State(state): State<ProfileState>,
    Extension(user_id): Extension<UserID>,
) -> Result<Json<Value>, Error> {
    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    let user = get_user_by_id(user_id, &connection)?;

    Ok(Json(json!({ "data": UserProfile::from(&user) })))
}

/// Change the name and/or email of the logged-in user.
///
/// Only `name` and `email` are accepted, any other field is rejected.
pub async fn update_profile(
    State(state): State<ProfileState>,
    Extension(user_id): Extension<UserID>,
    update: Result<Json<UserUpdate>, JsonRejection>,
) -> Result<Json<Value>, Error> {
    let Json(update) = update.map_err(|rejection| Error::InvalidInput(rejection.body_text()))?;

    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    let user = update_user(user_id, update, OffsetDateTime::now_utc(), &connection)?;

    Ok(Json(json!({
        "message": "profile updated successfully",
        "data": UserProfile::from(&user),
    })))
}

/// Delete the logged-in user along with all of their transactions and clear
/// the auth cookies.
pub async fn delete_profile(
    State(state): State<ProfileState>,
    Extension(user_id): Extension<UserID>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<Value>), Error> {
    {
        let connection = state
            .db_connection
            .lock()
            .map_err(|_| Error::DatabaseLockError)?;

        delete_user(user_id, &connection)?;
    }

    tracing::info!("Deleted user {user_id}");

    Ok((
        invalidate_auth_cookies(jar, &state.cookie_policy),
        Json(json!({ "message": "user deleted successfully" })),
    ))
}
