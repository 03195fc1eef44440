//! Defines the app level error type and its conversion to JSON error responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

/// The broad category of an [Error], used to pick the HTTP status and the
/// client-facing error message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing, invalid or expired proof of identity.
    Unauthenticated,
    /// The caller is authenticated but may not perform the operation.
    Forbidden,
    /// The request was malformed or failed validation.
    InvalidInput,
    /// The requested resource does not exist.
    NotFound,
    /// Something went wrong on the server.
    Internal,
}

impl ErrorKind {
    /// The HTTP status code for this kind of error.
    pub fn status_code(self) -> StatusCode {
        match self {
            ErrorKind::Unauthenticated => StatusCode::UNAUTHORIZED,
            ErrorKind::Forbidden => StatusCode::FORBIDDEN,
            ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The short, generic message sent in the `error` field of a response.
    pub fn message(self) -> &'static str {
        match self {
            ErrorKind::Unauthenticated => "unauthorized access",
            ErrorKind::Forbidden => "forbidden access",
            ErrorKind::InvalidInput => "invalid input",
            ErrorKind::NotFound => "resource not found",
            ErrorKind::Internal => "internal server error",
        }
    }
}

/// The errors that may occur in the application.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// The email and password combination did not match a registered user.
    #[error("invalid email or password")]
    InvalidCredentials,

    /// The password does not satisfy the password strength policy.
    #[error(
        "password must be at least 8 characters and contain an uppercase letter, \
        a lowercase letter, a digit and a symbol"
    )]
    TooWeak,

    /// The string is not a valid email address.
    #[error("\"{0}\" is not a valid email address")]
    InvalidEmail(String),

    /// An empty string was used for a user's name.
    #[error("name cannot be empty")]
    EmptyName,

    /// The email is already used by another account.
    #[error("user already exists")]
    DuplicateEmail,

    /// The transaction amount was NaN or infinite.
    #[error("amount must be a finite number")]
    InvalidAmount,

    /// An update request did not set any fields.
    #[error("no updates provided")]
    EmptyUpdate,

    /// The request body or parameters could not be understood.
    #[error("{0}")]
    InvalidInput(String),

    /// An unexpected error occurred with the underlying hashing library.
    ///
    /// The error string should only be logged for debugging on the server.
    /// When communicating with the application client this error should be
    /// replaced with a general error type indicating an internal server error.
    #[error("hashing failed: {0}")]
    HashingError(String),

    /// A session token could not be signed.
    #[error("could not create session token: {0}")]
    TokenCreation(String),

    /// The operating system's entropy source could not be read.
    #[error("could not read from the random number generator: {0}")]
    RngFailure(String),

    /// The requested resource was not found.
    ///
    /// Internally, this error may occur when a query returns no rows.
    #[error("the requested resource could not be found")]
    NotFound,

    /// The resource exists but belongs to another user.
    #[error("the resource belongs to another user")]
    Forbidden,

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),

    /// Could not acquire the database lock
    #[error("could not acquire the database lock")]
    DatabaseLockError,

    /// A blocking task panicked or was cancelled.
    #[error("background task failed: {0}")]
    TaskFailed(String),

    /// The server was configured with an empty session secret.
    #[error("the session secret cannot be empty")]
    EmptySecret,
}

impl Error {
    /// Classify the error for the client.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidCredentials => ErrorKind::Unauthenticated,
            Error::TooWeak
            | Error::InvalidEmail(_)
            | Error::EmptyName
            | Error::DuplicateEmail
            | Error::InvalidAmount
            | Error::EmptyUpdate
            | Error::InvalidInput(_) => ErrorKind::InvalidInput,
            Error::NotFound => ErrorKind::NotFound,
            Error::Forbidden => ErrorKind::Forbidden,
            Error::HashingError(_)
            | Error::TokenCreation(_)
            | Error::RngFailure(_)
            | Error::SqlError(_)
            | Error::DatabaseLockError
            | Error::TaskFailed(_)
            | Error::EmptySecret => ErrorKind::Internal,
        }
    }
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error {
                    code: _,
                    extended_code: rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE,
                },
                Some(ref desc),
            ) if desc.ends_with("user.email") => Error::DuplicateEmail,
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(value: tokio::task::JoinError) -> Self {
        Error::TaskFailed(value.to_string())
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let kind = self.kind();

        // Internal errors are not intended to be shown to the client.
        let message = match kind {
            ErrorKind::Internal => {
                tracing::error!("An unexpected error occurred: {}", self);
                "An unexpected error occurred, check the server logs for more details.".to_owned()
            }
            _ => self.to_string(),
        };

        let body = Json(json!({
            "error": kind.message(),
            "message": message,
        }));

        (kind.status_code(), body).into_response()
    }
}
