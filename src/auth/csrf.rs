//! Anti-forgery tokens for the double-submit cookie pattern.
//!
//! A token is handed to the client as a readable cookie and in the response
//! body. Mutating requests must echo the cookie value in the [CSRF_HEADER]
//! header. Nothing is stored on the server.

use std::fmt::Display;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::{TryRngCore, rngs::OsRng};
use serde::Serialize;

use crate::Error;

/// The name of the cookie holding the anti-forgery token.
pub const CSRF_COOKIE: &str = "csrf_token";

/// The header mutating requests must copy the anti-forgery cookie into.
pub const CSRF_HEADER: &str = "x-csrf-token";

/// The number of random bytes in a token, before encoding.
const TOKEN_BYTES: usize = 32;

/// An unguessable, base64url-encoded anti-forgery token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CsrfToken(String);

impl CsrfToken {
    /// Generate a token from the operating system's entropy source.
    ///
    /// # Errors
    ///
    /// Returns [Error::RngFailure] if the entropy source cannot be read.
    /// There is no fallback to a weaker generator.
    pub fn generate() -> Result<Self, Error> {
        let mut bytes = [0u8; TOKEN_BYTES];
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|error| Error::RngFailure(error.to_string()))?;

        Ok(Self(URL_SAFE_NO_PAD.encode(bytes)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for CsrfToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Check that the cookie and header copies of the token are identical.
///
/// The comparison takes the same time for any two values of equal length.
pub fn validate_csrf(cookie_value: &str, header_value: &str) -> bool {
    let a = cookie_value.as_bytes();
    let b = header_value.as_bytes();

    if a.len() != b.len() {
        return false;
    }

    let mut difference = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        difference |= x ^ y;
    }

    difference == 0
}
