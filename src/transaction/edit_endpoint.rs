//! Defines the endpoint for updating a transaction.

use std::sync::{Arc, Mutex};

use axum::{
    Extension, Json,
    extract::{
        FromRef, Path, State,
        rejection::{JsonRejection, PathRejection},
    },
};
use rusqlite::Connection;
use serde_json::{Value, json};
use time::OffsetDateTime;

use crate::{
    AppState, Error,
    transaction::{TransactionId, TransactionUpdate, update_transaction},
    user::UserID,
};

/// The state needed to edit a transaction.
#[derive(Debug, Clone)]
pub struct EditTransactionState {
    /// The database connection for managing transactions.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for EditTransactionState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// A route handler for updating a transaction owned by the logged-in user.
///
/// Only amount, type, category, description and note may be changed.
pub async fn edit_transaction_endpoint(
    State(state): State<EditTransactionState>,
    Extension(user_id): Extension<UserID>,
    transaction_id: Result<Path<TransactionId>, PathRejection>,
    update: Result<Json<TransactionUpdate>, JsonRejection>,
) -> Result<Json<Value>, Error> {
    let Path(transaction_id) =
        transaction_id.map_err(|rejection| Error::InvalidInput(rejection.body_text()))?;
    let Json(update) = update.map_err(|rejection| Error::InvalidInput(rejection.body_text()))?;

    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    let transaction = update_transaction(
        transaction_id,
        user_id,
        update,
        OffsetDateTime::now_utc(),
        &connection,
    )?;

    Ok(Json(json!({
        "message": "transaction updated successfully",
        "transaction": transaction,
    })))
}
