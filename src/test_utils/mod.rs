#![allow(missing_docs)]

use axum::{Router, middleware};
use axum_extra::extract::cookie::Cookie;
use axum_test::{TestRequest, TestServer};
use rusqlite::Connection;
use time::OffsetDateTime;

use crate::{
    AppState,
    auth::{CSRF_COOKIE, CSRF_HEADER, CookiePolicy, CsrfToken, PasswordHash, auth_guard, issue_token},
    user::{UserID, create_user},
};

pub(crate) fn get_test_state() -> AppState {
    AppState::new(
        Connection::open_in_memory().expect("Could not open in-memory SQLite database"),
        "test-session-secret",
        CookiePolicy::default(),
    )
    .expect("Could not create app state")
    .with_password_cost(4)
}

/// Insert a user with a dummy password hash.
pub(crate) fn insert_test_user(state: &AppState, email: &str) -> UserID {
    let connection = state.db_connection.lock().unwrap();

    create_user(
        "Test",
        email,
        PasswordHash::new_unchecked("not-a-real-hash"),
        OffsetDateTime::now_utc(),
        &connection,
    )
    .expect("Could not create test user")
    .id
}

/// Serve `routes` behind the auth guard.
pub(crate) fn get_protected_server(routes: Router<AppState>, state: AppState) -> TestServer {
    let app = routes
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_guard))
        .with_state(state);

    TestServer::try_new(app).expect("Could not create test server.")
}

/// The credentials a logged-in client sends with each request.
#[derive(Debug, Clone)]
pub(crate) struct TestSession {
    pub bearer: String,
    pub csrf_token: String,
}

impl TestSession {
    pub(crate) fn new(state: &AppState, user_id: UserID) -> Self {
        let token = issue_token(user_id, &state.session_keys, OffsetDateTime::now_utc())
            .expect("Could not issue session token");

        Self {
            bearer: format!("Bearer {token}"),
            csrf_token: CsrfToken::generate().unwrap().to_string(),
        }
    }

    /// Add the bearer token and both copies of the anti-forgery token to `request`.
    pub(crate) fn authorize(&self, request: TestRequest) -> TestRequest {
        request
            .add_header("Authorization", self.bearer.clone())
            .add_cookie(Cookie::new(CSRF_COOKIE, self.csrf_token.clone()))
            .add_header(CSRF_HEADER, self.csrf_token.clone())
    }
}
