//! The API endpoint URIs.
//!
//! For endpoints that take a parameter, e.g., '/api/v1/transactions/{transaction_id}', use [format_endpoint].

/// The prefix shared by every API route.
pub const API_PREFIX: &str = "/api/v1";

/// Health check.
pub const HEALTH: &str = "/api/v1/";
/// The route for registering a new user.
pub const REGISTER: &str = "/api/v1/register";
/// The route for logging in a user.
pub const LOG_IN: &str = "/api/v1/login";
/// The route for the client to log out the current user.
pub const LOG_OUT: &str = "/api/v1/logout";
/// The route to view, update and delete the current user.
pub const PROFILE: &str = "/api/v1/profile";
/// The route for getting a fresh anti-forgery token.
pub const CSRF_TOKEN: &str = "/api/v1/csrf-token";
/// The route to create and list transactions.
pub const TRANSACTIONS: &str = "/api/v1/transactions";
/// The route to search, filter and sort transactions.
pub const TRANSACTIONS_QUERY: &str = "/api/v1/transactions-query";
/// The route to access a single transaction.
pub const TRANSACTION: &str = "/api/v1/transactions/{transaction_id}";

/// Replace the parameter in `endpoint_path` with `id`.
///
/// A parameter starts with a left brace and ends with the next right brace,
/// e.g. '{transaction_id}'. Only the first parameter is replaced.
///
/// If no parameter is found in `endpoint_path`, the function returns the
/// original `endpoint_path`.
pub fn format_endpoint(endpoint_path: &str, id: i64) -> String {
    let Some(param_start) = endpoint_path.find('{') else {
        return endpoint_path.to_owned();
    };

    let param_end = endpoint_path[param_start..]
        .find('}')
        .map(|offset| param_start + offset + 1)
        .unwrap_or(endpoint_path.len());

    format!(
        "{}{id}{}",
        &endpoint_path[..param_start],
        &endpoint_path[param_end..]
    )
}
