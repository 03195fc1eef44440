//! Implements a struct that holds the state of the REST server.

use std::sync::{Arc, Mutex};

use axum::extract::FromRef;
use rusqlite::Connection;

use crate::{
    Error,
    auth::{CookiePolicy, PasswordHash, SessionKeys},
    db::initialize,
};

/// The state of the REST server.
#[derive(Debug, Clone)]
pub struct AppState {
    /// The keys for signing and verifying session tokens.
    pub session_keys: SessionKeys,

    /// How the session and anti-forgery cookies are built.
    pub cookie_policy: CookiePolicy,

    /// The bcrypt cost used when hashing new passwords.
    pub password_cost: u32,

    /// The database connection
    pub db_connection: Arc<Mutex<Connection>>,
}

impl AppState {
    /// Create a new [AppState] with a SQLite database connection.
    ///
    /// This function will initialize the database by adding the tables for the domain models.
    /// `session_secret` is used to sign session tokens and must not be empty.
    ///
    /// # Errors
    /// Returns an error if the secret is empty or the database cannot be initialized.
    pub fn new(
        db_connection: Connection,
        session_secret: &str,
        cookie_policy: CookiePolicy,
    ) -> Result<Self, Error> {
        if session_secret.is_empty() {
            return Err(Error::EmptySecret);
        }

        initialize(&db_connection)?;

        Ok(Self {
            session_keys: SessionKeys::from_secret(session_secret.as_bytes()),
            cookie_policy,
            password_cost: PasswordHash::DEFAULT_COST,
            db_connection: Arc::new(Mutex::new(db_connection)),
        })
    }

    /// Use `cost` when hashing passwords instead of the default.
    pub fn with_password_cost(mut self, cost: u32) -> Self {
        self.password_cost = cost;
        self
    }
}

// This lets the auth guard extract only the session keys.
impl FromRef<AppState> for SessionKeys {
    fn from_ref(state: &AppState) -> Self {
        state.session_keys.clone()
    }
}
