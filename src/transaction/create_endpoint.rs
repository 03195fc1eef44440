//! Defines the endpoint for creating a new transaction.

use std::sync::{Arc, Mutex};

use axum::{
    Extension, Json,
    extract::{FromRef, State, rejection::JsonRejection},
    http::StatusCode,
};
use rusqlite::Connection;
use serde_json::{Value, json};
use time::OffsetDateTime;

use crate::{
    AppState, Error,
    transaction::{TransactionBuilder, create_transaction},
    user::UserID,
};

/// The state needed for creating a transaction.
#[derive(Debug, Clone)]
pub struct CreateTransactionState {
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for CreateTransactionState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// A route handler for creating a new transaction owned by the logged-in user.
///
/// The owner always comes from the session, a `user_id` in the body is rejected.
pub async fn create_transaction_endpoint(
    State(state): State<CreateTransactionState>,
    Extension(user_id): Extension<UserID>,
    builder: Result<Json<TransactionBuilder>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), Error> {
    let Json(builder) = builder.map_err(|rejection| Error::InvalidInput(rejection.body_text()))?;

    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    let transaction =
        create_transaction(user_id, builder, OffsetDateTime::now_utc(), &connection)?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "transaction added successfully",
            "transaction": transaction,
        })),
    ))
}
