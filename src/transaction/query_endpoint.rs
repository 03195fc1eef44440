//! Defines the endpoints for listing and searching the logged-in user's transactions.

use std::sync::{Arc, Mutex};

use axum::{
    Extension, Json,
    extract::{FromRef, State},
};
use axum_extra::extract::{Query, QueryRejection};
use rusqlite::Connection;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::{
    AppState, Error,
    transaction::{
        query::{Pagination, TransactionQuery},
        sql::query_transactions,
    },
    user::UserID,
};

/// The state needed for listing transactions.
#[derive(Debug, Clone)]
pub struct QueryTransactionsState {
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for QueryTransactionsState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// The raw query parameters for listing transactions.
///
/// `category` may be repeated, e.g. `?category=food&category=rent`. `limit`
/// and `offset` are kept as strings so that bad values fall back to the
/// defaults instead of failing the request.
#[derive(Debug, Default, Deserialize)]
pub struct QueryParams {
    #[serde(default)]
    pub search: String,
    #[serde(default)]
    pub category: Vec<String>,
    #[serde(default)]
    pub order: String,
    pub limit: Option<String>,
    pub offset: Option<String>,
}

impl QueryParams {
    fn into_query(self, owner: UserID) -> TransactionQuery {
        TransactionQuery::build(
            owner,
            &self.search,
            &self.category,
            &self.order,
            Pagination::from_params(self.limit.as_deref(), self.offset.as_deref()),
        )
    }
}

/// A route handler that lists one page of the logged-in user's transactions.
///
/// Accepts the same parameters as [query_transactions_endpoint].
pub async fn list_transactions_endpoint(
    state: State<QueryTransactionsState>,
    user_id: Extension<UserID>,
    params: Result<Query<QueryParams>, QueryRejection>,
) -> Result<Json<Value>, Error> {
    query_transactions_endpoint(state, user_id, params).await
}

/// A route handler that searches, filters, sorts and paginates the logged-in
/// user's transactions.
pub async fn query_transactions_endpoint(
    State(state): State<QueryTransactionsState>,
    Extension(user_id): Extension<UserID>,
    params: Result<Query<QueryParams>, QueryRejection>,
) -> Result<Json<Value>, Error> {
    let Query(params) =
        params.map_err(|rejection| Error::InvalidInput(rejection.body_text()))?;
    let query = params.into_query(user_id);

    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    let transactions = query_transactions(&query, &connection)?;

    Ok(Json(json!({ "data": transactions })))
}
