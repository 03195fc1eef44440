//! Application router configuration with protected and unprotected route definitions.

use axum::{
    Json, Router,
    http::{
        HeaderName, HeaderValue, Method,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    middleware,
    routing::{get, post},
};
use serde_json::{Value, json};
use tower_http::cors::CorsLayer;

use crate::{
    AppState,
    auth::{CSRF_HEADER, auth_guard, get_csrf_token, log_in, log_out, register_user},
    endpoints,
    profile::{delete_profile, get_profile, update_profile},
    transaction::{
        create_transaction_endpoint, delete_transaction_endpoint, edit_transaction_endpoint,
        get_transaction_endpoint, list_transactions_endpoint, query_transactions_endpoint,
    },
};

/// Return a router with all the app's routes.
///
/// Cross-origin requests are only allowed from `allowed_origins`, with
/// credentials, so that a browser client on another origin can use the cookies.
pub fn build_router(state: AppState, allowed_origins: &[HeaderValue]) -> Router {
    let unprotected_routes = Router::new()
        .route(endpoints::HEALTH, get(get_health))
        .route(endpoints::REGISTER, post(register_user))
        .route(endpoints::LOG_IN, post(log_in));

    let protected_routes = Router::new()
        .route(endpoints::LOG_OUT, post(log_out))
        .route(endpoints::CSRF_TOKEN, get(get_csrf_token))
        .route(
            endpoints::PROFILE,
            get(get_profile).put(update_profile).delete(delete_profile),
        )
        .route(
            endpoints::TRANSACTIONS,
            get(list_transactions_endpoint).post(create_transaction_endpoint),
        )
        .route(
            endpoints::TRANSACTIONS_QUERY,
            get(query_transactions_endpoint),
        )
        .route(
            endpoints::TRANSACTION,
            get(get_transaction_endpoint)
                .put(edit_transaction_endpoint)
                .delete(delete_transaction_endpoint),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_guard));

    protected_routes
        .merge(unprotected_routes)
        .layer(cors_layer(allowed_origins))
        .with_state(state)
}

fn cors_layer(allowed_origins: &[HeaderValue]) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(allowed_origins.to_vec())
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            AUTHORIZATION,
            CONTENT_TYPE,
            HeaderName::from_static(CSRF_HEADER),
        ])
        .allow_credentials(true)
}

/// Check that the server is up.
async fn get_health() -> Json<Value> {
    Json(json!({ "status": "success", "message": "pong" }))
}
