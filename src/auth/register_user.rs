//! The handler for registering a new user.

use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, State, rejection::JsonRejection},
    http::StatusCode,
};
use rusqlite::Connection;
use serde::Deserialize;
use serde_json::{Value, json};
use time::OffsetDateTime;

use crate::{
    AppState, Error,
    auth::{PasswordHash, ValidatedPassword},
    user::{UserProfile, create_user, parse_email, parse_name},
};

/// The state needed for creating a new user.
#[derive(Debug, Clone)]
pub struct RegistrationState {
    /// The bcrypt cost for hashing the new password.
    pub password_cost: u32,
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for RegistrationState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            password_cost: state.password_cost,
            db_connection: state.db_connection.clone(),
        }
    }
}

/// The data for registering a new user.
#[derive(Clone, Deserialize)]
pub struct RegisterData {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// Create a new user and respond with their profile.
///
/// The name and email are checked before the password is hashed so that
/// invalid requests fail fast.
///
/// # Errors
///
/// Returns a 400 error if the body is malformed, the name or email is invalid,
/// the password is too weak, or the email is already registered.
pub async fn register_user(
    State(state): State<RegistrationState>,
    user_data: Result<Json<RegisterData>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), Error> {
    let Json(user_data) =
        user_data.map_err(|rejection| Error::InvalidInput(rejection.body_text()))?;

    parse_name(&user_data.name)?;
    parse_email(&user_data.email)?;
    let password = ValidatedPassword::new(&user_data.password)?;

    let cost = state.password_cost;
    let password_hash =
        tokio::task::spawn_blocking(move || PasswordHash::new(password, cost)).await??;

    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    let user = create_user(
        &user_data.name,
        &user_data.email,
        password_hash,
        OffsetDateTime::now_utc(),
        &connection,
    )?;

    tracing::info!("Registered user {}", user.id);

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "user registered successfully",
            "data": UserProfile::from(&user),
        })),
    ))
}
