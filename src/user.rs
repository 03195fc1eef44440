//! Code for creating the user table and fetching and updating users in the database.

use std::{fmt::Display, str::FromStr};

use email_address::EmailAddress;
use rusqlite::{Connection, Row, ToSql, params_from_iter};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{Error, auth::PasswordHash};

/// A newtype wrapper for integer user IDs.
///
/// This helps disambiguate user IDs from other types of IDs, leading to better compile time
/// errors.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct UserID(i64);

impl UserID {
    /// Create a new user ID.
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Cast the user ID to a 64 bit integer.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl Display for UserID {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// A registered user of the application.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    /// The user's ID in the application database.
    pub id: UserID,
    /// The user's display name.
    pub name: String,
    /// The address the user logs in with.
    pub email: String,
    /// The user's password hash.
    pub password_hash: PasswordHash,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// The parts of a [User] that may be sent to the client.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserProfile {
    pub id: UserID,
    pub name: String,
    pub email: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// Check that `name` is not blank and return it trimmed.
///
/// # Errors
///
/// Returns [Error::EmptyName] if `name` is empty or only whitespace.
pub fn parse_name(name: &str) -> Result<String, Error> {
    let name = name.trim();

    if name.is_empty() {
        Err(Error::EmptyName)
    } else {
        Ok(name.to_owned())
    }
}

/// Check that `email` is a valid email address and return it trimmed.
///
/// # Errors
///
/// Returns [Error::InvalidEmail] if `email` is not a valid address.
pub fn parse_email(email: &str) -> Result<String, Error> {
    let email = email.trim();

    EmailAddress::from_str(email)
        .map(|address| address.to_string())
        .map_err(|_| Error::InvalidEmail(email.to_owned()))
}

/// A change to a user's profile.
///
/// Only the listed fields may be changed, unknown fields are rejected when
/// deserializing.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
}

/// Create the user table.
///
/// # Errors
///
/// This function will return an error if the SQL query failed.
pub fn create_user_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS user (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                email TEXT UNIQUE NOT NULL,
                password TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
                )",
        (),
    )?;

    Ok(())
}

/// Create and insert a new user into the database.
///
/// `name` and `email` are validated before the user is inserted.
///
/// # Errors
///
/// Returns:
/// - [Error::EmptyName] or [Error::InvalidEmail] if the profile is invalid,
/// - [Error::DuplicateEmail] if the email is already registered,
/// - [Error::SqlError] if an SQL related error occurred.
pub fn create_user(
    name: &str,
    email: &str,
    password_hash: PasswordHash,
    now: OffsetDateTime,
    connection: &Connection,
) -> Result<User, Error> {
    let name = parse_name(name)?;
    let email = parse_email(email)?;

    connection.execute(
        "INSERT INTO user (name, email, password, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?4)",
        (&name, &email, password_hash.as_ref(), now),
    )?;

    let id = UserID::new(connection.last_insert_rowid());

    Ok(User {
        id,
        name,
        email,
        password_hash,
        created_at: now,
        updated_at: now,
    })
}

const SELECT_USER: &str = "SELECT id, name, email, password, created_at, updated_at FROM user";

fn map_user_row(row: &Row) -> Result<User, rusqlite::Error> {
    let raw_password_hash: String = row.get(3)?;

    Ok(User {
        id: UserID::new(row.get(0)?),
        name: row.get(1)?,
        email: row.get(2)?,
        password_hash: PasswordHash::new_unchecked(&raw_password_hash),
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

/// Get the user from the database with an ID equal to `user_id`.
///
/// # Errors
///
/// This function will return an error if:
/// - `user_id` does not belong to a registered user.
/// - there was an error trying to access the store.
pub fn get_user_by_id(user_id: UserID, connection: &Connection) -> Result<User, Error> {
    connection
        .prepare(&format!("{SELECT_USER} WHERE id = :id"))?
        .query_row(&[(":id", &user_id.as_i64())], map_user_row)
        .map_err(|error| error.into())
}

/// Get the user registered with `email`.
///
/// # Errors
///
/// Returns [Error::NotFound] if no user has that email.
pub fn get_user_by_email(email: &str, connection: &Connection) -> Result<User, Error> {
    connection
        .prepare(&format!("{SELECT_USER} WHERE email = :email"))?
        .query_row(&[(":email", email.trim())], map_user_row)
        .map_err(|error| error.into())
}

/// Apply `update` to the user with `user_id` and return the updated user.
///
/// # Errors
///
/// Returns:
/// - [Error::EmptyUpdate] if `update` does not set any fields,
/// - [Error::EmptyName] or [Error::InvalidEmail] if a new value is invalid,
/// - [Error::DuplicateEmail] if the new email belongs to another user,
/// - [Error::NotFound] if the user does not exist.
pub fn update_user(
    user_id: UserID,
    update: UserUpdate,
    now: OffsetDateTime,
    connection: &Connection,
) -> Result<User, Error> {
    let name = update.name.as_deref().map(parse_name).transpose()?;
    let email = update.email.as_deref().map(parse_email).transpose()?;

    let id = user_id.as_i64();
    let mut columns: Vec<&'static str> = Vec::new();
    let mut values: Vec<&dyn ToSql> = Vec::new();

    if let Some(name) = &name {
        columns.push("name");
        values.push(name);
    }
    if let Some(email) = &email {
        columns.push("email");
        values.push(email);
    }

    if columns.is_empty() {
        return Err(Error::EmptyUpdate);
    }

    columns.push("updated_at");
    values.push(&now);
    values.push(&id);

    let assignments = columns
        .iter()
        .enumerate()
        .map(|(index, column)| format!("{column} = ?{}", index + 1))
        .collect::<Vec<_>>()
        .join(", ");
    let query = format!(
        "UPDATE user SET {assignments} WHERE id = ?{}",
        columns.len() + 1
    );

    let rows_affected = connection.execute(&query, params_from_iter(values))?;
    if rows_affected == 0 {
        return Err(Error::NotFound);
    }

    get_user_by_id(user_id, connection)
}

/// Replace the password hash of the user with `user_id`.
///
/// # Errors
///
/// Returns [Error::NotFound] if the user does not exist.
pub fn update_password(
    user_id: UserID,
    password_hash: &PasswordHash,
    now: OffsetDateTime,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "UPDATE user SET password = ?1, updated_at = ?2 WHERE id = ?3",
        (password_hash.as_ref(), now, user_id.as_i64()),
    )?;

    if rows_affected == 0 {
        Err(Error::NotFound)
    } else {
        Ok(())
    }
}

/// Delete the user with `user_id` and, through the foreign key, their transactions.
///
/// # Errors
///
/// Returns [Error::NotFound] if the user does not exist.
pub fn delete_user(user_id: UserID, connection: &Connection) -> Result<(), Error> {
    let rows_affected = connection.execute("DELETE FROM user WHERE id = ?1", [user_id.as_i64()])?;

    if rows_affected == 0 {
        Err(Error::NotFound)
    } else {
        Ok(())
    }
}

/// Get the number of users in the database.
///
/// # Errors
///
/// Returns a [Error::SqlError] if an SQL related error occurred.
pub fn count_users(connection: &Connection) -> Result<u32, Error> {
    connection
        .query_row("SELECT COUNT(id) FROM user;", [], |row| row.get(0))
        .map_err(|error| error.into())
}
