//! Defines the endpoint for fetching a single transaction.

use std::sync::{Arc, Mutex};

use axum::{
    Extension, Json,
    extract::{FromRef, Path, State, rejection::PathRejection},
};
use rusqlite::Connection;
use serde_json::{Value, json};

use crate::{
    AppState, Error,
    transaction::{TransactionId, get_owned_transaction},
    user::UserID,
};

/// The state needed to fetch a transaction.
#[derive(Debug, Clone)]
pub struct ViewTransactionState {
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for ViewTransactionState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// A route handler for fetching a transaction owned by the logged-in user.
///
/// Responds with 403 if the transaction belongs to someone else and 404 if it
/// does not exist.
pub async fn get_transaction_endpoint(
    State(state): State<ViewTransactionState>,
    Extension(user_id): Extension<UserID>,
    transaction_id: Result<Path<TransactionId>, PathRejection>,
) -> Result<Json<Value>, Error> {
    let Path(transaction_id) =
        transaction_id.map_err(|rejection| Error::InvalidInput(rejection.body_text()))?;

    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    let transaction = get_owned_transaction(transaction_id, user_id, &connection)?;

    Ok(Json(json!({ "data": transaction })))
}

#[cfg(test)]
mod get_transaction_endpoint_tests {
    use axum::{Router, http::StatusCode, routing::get};
    use serde_json::{Value, json};
    use time::OffsetDateTime;

    use crate::{
        AppState,
        endpoints::{self, format_endpoint},
        test_utils::{TestSession, get_protected_server, get_test_state, insert_test_user},
        transaction::{Transaction, TransactionType, create_transaction},
    };

    use super::get_transaction_endpoint;

    fn routes() -> Router<AppState> {
        Router::new().route(endpoints::TRANSACTION, get(get_transaction_endpoint))
    }

    #[tokio::test]
    async fn owner_can_get_transaction() {
        let state = get_test_state();
        let alice = insert_test_user(&state, "alice@example.com");
        let transaction = create_transaction(
            alice,
            Transaction::build(9.99, TransactionType::Expense, "music").note("vinyl"),
            OffsetDateTime::now_utc(),
            &state.db_connection.lock().unwrap(),
        )
        .unwrap();
        let session = TestSession::new(&state, alice);
        let server = get_protected_server(routes(), state);

        let response = session
            .authorize(server.get(&format_endpoint(endpoints::TRANSACTION, transaction.id)))
            .await;

        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["data"]["id"], json!(transaction.id));
        assert_eq!(body["data"]["note"], json!("vinyl"));
    }

    #[tokio::test]
    async fn other_users_transaction_is_forbidden() {
        let state = get_test_state();
        let alice = insert_test_user(&state, "alice@example.com");
        let mallory = insert_test_user(&state, "mallory@example.com");
        let transaction = create_transaction(
            alice,
            Transaction::build(9.99, TransactionType::Expense, "music"),
            OffsetDateTime::now_utc(),
            &state.db_connection.lock().unwrap(),
        )
        .unwrap();
        let session = TestSession::new(&state, mallory);
        let server = get_protected_server(routes(), state);

        let response = session
            .authorize(server.get(&format_endpoint(endpoints::TRANSACTION, transaction.id)))
            .await;

        response.assert_status(StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn missing_transaction_is_not_found() {
        let state = get_test_state();
        let alice = insert_test_user(&state, "alice@example.com");
        let session = TestSession::new(&state, alice);
        let server = get_protected_server(routes(), state);

        let response = session
            .authorize(server.get(&format_endpoint(endpoints::TRANSACTION, 42)))
            .await;

        response.assert_status(StatusCode::NOT_FOUND);
        let body: Value = response.json();
        assert_eq!(body["error"], json!("resource not found"));
    }

    #[tokio::test]
    async fn non_numeric_id_is_json_bad_request() {
        let state = get_test_state();
        let alice = insert_test_user(&state, "alice@example.com");
        let session = TestSession::new(&state, alice);
        let server = get_protected_server(routes(), state);

        let response = session
            .authorize(server.get("/api/v1/transactions/not-a-number"))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        assert_eq!(body["error"], json!("invalid input"));
        assert!(body["message"].is_string());
    }
}
