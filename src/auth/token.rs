//! Issues and verifies the signed session tokens (JWTs) that replace server-side sessions.

use std::fmt::Debug;

use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, crypto, decode, encode,
    errors::ErrorKind,
};
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

use crate::{Error, user::UserID};

/// The value of the `iss` claim in every session token.
pub const ISSUER: &str = "expensetracker";

/// How long a session token is valid for after it is issued.
pub const SESSION_DURATION: Duration = Duration::days(7);

/// The length of an HS256 signature encoded as unpadded base64url.
const SIGNATURE_LENGTH: usize = 43;

mod user_id_string {
    //! Serializes a [UserID] as a string since the JWT `sub` claim must be a string.
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::user::UserID;

    pub fn serialize<S>(user_id: &UserID, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&user_id.to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<UserID, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse::<i64>()
            .map(UserID::new)
            .map_err(serde::de::Error::custom)
    }
}

/// The contents of a session token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// The user the token was issued to.
    #[serde(with = "user_id_string")]
    pub sub: UserID,
    /// Who issued the token, always [ISSUER].
    pub iss: String,
    /// When the token was issued, in seconds since the Unix epoch.
    pub iat: i64,
    /// When the token expires, in seconds since the Unix epoch.
    pub exp: i64,
}

impl Claims {
    /// Create claims for `user_id` issued at `now` that expire after [SESSION_DURATION].
    pub fn new(user_id: UserID, now: OffsetDateTime) -> Self {
        Self {
            sub: user_id,
            iss: ISSUER.to_owned(),
            iat: now.unix_timestamp(),
            exp: (now + SESSION_DURATION).unix_timestamp(),
        }
    }
}

/// The reasons a session token may be rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    /// The token could not be parsed or its claims are not ours.
    #[error("malformed session token")]
    Malformed,
    /// The token was not signed with the server's secret.
    #[error("session token signature is invalid")]
    SignatureInvalid,
    /// The token's expiry is in the past.
    #[error("session token has expired")]
    Expired,
}

/// The keys for signing and verifying session tokens, derived from the server secret.
///
/// The secret is read once at startup. Changing it invalidates every token
/// that has been issued.
#[derive(Clone)]
pub struct SessionKeys {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl SessionKeys {
    /// Create the signing and verification keys from `secret`.
    pub fn from_secret(secret: &[u8]) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
        }
    }
}

impl Debug for SessionKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SessionKeys { .. }")
    }
}

/// Sign a new session token for `user_id` that is valid from `now` for [SESSION_DURATION].
///
/// # Errors
///
/// Returns [Error::TokenCreation] if the claims could not be encoded.
pub fn issue_token(
    user_id: UserID,
    keys: &SessionKeys,
    now: OffsetDateTime,
) -> Result<String, Error> {
    let claims = Claims::new(user_id, now);

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &keys.encoding_key,
    )
    .map_err(|error| Error::TokenCreation(error.to_string()))
}

/// Split `token` into its signed message (`header.payload`) and signature.
///
/// Returns `None` unless the token has three non-empty base64url segments and
/// a signature of the length HS256 produces.
fn split_token(token: &str) -> Option<(&str, &str)> {
    let is_segment = |segment: &str| {
        !segment.is_empty()
            && segment
                .bytes()
                .all(|byte| byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_')
    };

    let (message, signature) = token.rsplit_once('.')?;
    let (header, payload) = message.split_once('.')?;

    (is_segment(header)
        && is_segment(payload)
        && is_segment(signature)
        && signature.len() == SIGNATURE_LENGTH)
        .then_some((message, signature))
}

/// Check that `token` was signed with `keys` and has not expired as of `now`.
///
/// The signature is checked over the raw header and payload before either is
/// decoded, so altering any character of a well-formed token is reported as
/// an invalid signature.
///
/// # Errors
///
/// - [TokenError::Malformed] if the token does not have the shape of an HS256
///   JWT, or its signed contents use another algorithm or have a missing or
///   unexpected issuer, subject or expiry.
/// - [TokenError::SignatureInvalid] if the signature does not match.
/// - [TokenError::Expired] if the expiry is not after `now`.
pub fn verify_token(
    token: &str,
    keys: &SessionKeys,
    now: OffsetDateTime,
) -> Result<Claims, TokenError> {
    let (message, signature) = split_token(token).ok_or(TokenError::Malformed)?;

    let signature_matches = crypto::verify(
        signature,
        message.as_bytes(),
        &keys.decoding_key,
        Algorithm::HS256,
    )
    .unwrap_or(false);

    if !signature_matches {
        return Err(TokenError::SignatureInvalid);
    }

    let mut validation = Validation::new(Algorithm::HS256);
    // Expiry is checked against `now` below rather than the system clock.
    validation.validate_exp = false;
    validation.set_issuer(&[ISSUER]);
    validation.set_required_spec_claims(&["exp", "iss", "sub"]);

    let claims = decode::<Claims>(token, &keys.decoding_key, &validation)
        .map_err(|error| match error.kind() {
            ErrorKind::InvalidSignature => TokenError::SignatureInvalid,
            ErrorKind::ExpiredSignature => TokenError::Expired,
            _ => TokenError::Malformed,
        })?
        .claims;

    if claims.exp <= now.unix_timestamp() {
        return Err(TokenError::Expired);
    }

    Ok(claims)
}

#[cfg(test)]
mod token_tests {
    use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
    use serde_json::json;
    use time::{Duration, OffsetDateTime, macros::datetime};

    use crate::user::UserID;

    use super::{
        Claims, ISSUER, SESSION_DURATION, SessionKeys, TokenError, issue_token, verify_token,
    };

    const SECRET: &[u8] = b"a-secret-only-used-for-testing";

    fn keys() -> SessionKeys {
        SessionKeys::from_secret(SECRET)
    }

    /// Replace the character at `index` with a different base64url character.
    fn alter_char(token: &str, index: usize) -> String {
        let mut chars: Vec<char> = token.chars().collect();
        chars[index] = if chars[index] == 'A' { 'B' } else { 'A' };
        chars.into_iter().collect()
    }

    #[test]
    fn issued_token_round_trips() {
        let now = OffsetDateTime::now_utc();
        let user_id = UserID::new(42);

        let token = issue_token(user_id, &keys(), now).unwrap();
        let claims = verify_token(&token, &keys(), now).unwrap();

        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.iss, ISSUER);
        assert_eq!(claims.iat, now.unix_timestamp());
        assert_eq!(claims.exp, (now + SESSION_DURATION).unix_timestamp());
    }

    #[test]
    fn token_is_valid_until_just_before_expiry() {
        let issued_at = datetime!(2025-06-01 12:00:00 UTC);
        let token = issue_token(UserID::new(1), &keys(), issued_at).unwrap();

        let just_before = issued_at + SESSION_DURATION - Duration::seconds(1);

        assert!(verify_token(&token, &keys(), just_before).is_ok());
    }

    #[test]
    fn token_expires_after_seven_days() {
        let issued_at = datetime!(2025-06-01 12:00:00 UTC);
        let token = issue_token(UserID::new(1), &keys(), issued_at).unwrap();

        assert_eq!(
            verify_token(&token, &keys(), issued_at + SESSION_DURATION),
            Err(TokenError::Expired)
        );
        assert_eq!(
            verify_token(&token, &keys(), issued_at + Duration::days(8)),
            Err(TokenError::Expired)
        );
    }

    #[test]
    fn wrong_secret_is_signature_invalid() {
        let now = OffsetDateTime::now_utc();
        let token = issue_token(UserID::new(1), &keys(), now).unwrap();
        let rotated_keys = SessionKeys::from_secret(b"a-different-secret");

        assert_eq!(
            verify_token(&token, &rotated_keys, now),
            Err(TokenError::SignatureInvalid)
        );
    }

    #[test]
    fn altering_any_character_is_signature_invalid() {
        let now = OffsetDateTime::now_utc();
        let token = issue_token(UserID::new(1), &keys(), now).unwrap();

        for (index, char) in token.char_indices() {
            if char == '.' {
                continue;
            }

            let altered = alter_char(&token, index);

            assert_eq!(
                verify_token(&altered, &keys(), now),
                Err(TokenError::SignatureInvalid),
                "altering character {index} of {token} should invalidate the signature"
            );
        }
    }

    #[test]
    fn extra_or_missing_segments_are_malformed() {
        let now = OffsetDateTime::now_utc();
        let token = issue_token(UserID::new(1), &keys(), now).unwrap();
        let (message, _) = token.rsplit_once('.').unwrap();

        for altered in [format!("{token}.extra"), message.to_owned(), format!("{token}=")] {
            assert_eq!(
                verify_token(&altered, &keys(), now),
                Err(TokenError::Malformed),
                "{altered:?} should be malformed"
            );
        }
    }

    #[test]
    fn garbage_is_malformed() {
        let now = OffsetDateTime::now_utc();

        for token in ["", "not-a-token", "a.b.c", "Bearer"] {
            assert_eq!(
                verify_token(token, &keys(), now),
                Err(TokenError::Malformed),
                "{token:?} should be malformed"
            );
        }
    }

    #[test]
    fn foreign_issuer_is_malformed() {
        let now = OffsetDateTime::now_utc();
        let claims = Claims {
            iss: "someone-else".to_owned(),
            ..Claims::new(UserID::new(1), now)
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(SECRET),
        )
        .unwrap();

        assert_eq!(
            verify_token(&token, &keys(), now),
            Err(TokenError::Malformed)
        );
    }

    #[test]
    fn missing_subject_is_malformed() {
        let now = OffsetDateTime::now_utc();
        let token = encode(
            &Header::new(Algorithm::HS256),
            &json!({
                "iss": ISSUER,
                "iat": now.unix_timestamp(),
                "exp": (now + SESSION_DURATION).unix_timestamp(),
            }),
            &EncodingKey::from_secret(SECRET),
        )
        .unwrap();

        assert_eq!(
            verify_token(&token, &keys(), now),
            Err(TokenError::Malformed)
        );
    }

    #[test]
    fn subject_is_serialized_as_string() {
        let claims = Claims::new(UserID::new(7), datetime!(2025-01-01 00:00:00 UTC));

        let value = serde_json::to_value(&claims).unwrap();

        assert_eq!(value["sub"], json!("7"));
        assert_eq!(value["iss"], json!(ISSUER));
    }
}
