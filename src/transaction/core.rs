//! Defines the core data models and database queries for transactions.

use std::{fmt::Display, str::FromStr};

use rusqlite::{
    Connection, Row, ToSql,
    types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef},
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{Error, transaction::query::Field, user::UserID};

/// The database ID of a transaction.
pub type TransactionId = i64;

// ============================================================================
// MODELS
// ============================================================================

/// Whether money was earned or spent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Income,
    Expense,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Income => "income",
            TransactionType::Expense => "expense",
        }
    }
}

impl Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "income" => Ok(TransactionType::Income),
            "expense" => Ok(TransactionType::Expense),
            other => Err(Error::InvalidInput(format!(
                "\"{other}\" is not a transaction type, expected \"income\" or \"expense\""
            ))),
        }
    }
}

impl ToSql for TransactionType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for TransactionType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value.as_str()? {
            "income" => Ok(TransactionType::Income),
            "expense" => Ok(TransactionType::Expense),
            _ => Err(FromSqlError::InvalidType),
        }
    }
}

/// An expense or income, i.e. an event where money was either spent or earned.
///
/// To create a new `Transaction`, use [Transaction::build].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transaction {
    /// The ID of the transaction.
    pub id: TransactionId,
    /// The user that owns the transaction.
    pub user_id: UserID,
    /// The amount of money spent or earned in this transaction.
    pub amount: f64,
    /// Whether the amount was earned or spent.
    #[serde(rename = "type")]
    pub kind: TransactionType,
    /// The category, stored trimmed and lowercase.
    pub category: String,
    /// A text description of what the transaction was for.
    pub description: String,
    /// Free-form notes.
    pub note: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Transaction {
    /// Create a new transaction.
    ///
    /// Shortcut for [TransactionBuilder] for discoverability.
    pub fn build(amount: f64, kind: TransactionType, category: &str) -> TransactionBuilder {
        TransactionBuilder {
            amount,
            kind,
            category: category.to_owned(),
            description: String::new(),
            note: String::new(),
        }
    }
}

/// Trim and lowercase a category so that equal categories compare equal.
pub fn normalize_category(category: &str) -> String {
    category.trim().to_lowercase()
}

fn parse_amount(amount: f64) -> Result<f64, Error> {
    if amount.is_finite() {
        Ok(amount)
    } else {
        Err(Error::InvalidAmount)
    }
}

fn parse_category(category: &str) -> Result<String, Error> {
    let category = normalize_category(category);

    if category.is_empty() {
        Err(Error::InvalidInput("category cannot be empty".to_owned()))
    } else {
        Ok(category)
    }
}

/// A builder for creating [Transaction] instances.
///
/// Doubles as the request body for creating a transaction.
#[derive(Debug, PartialEq, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransactionBuilder {
    /// The monetary amount of the transaction, must be finite.
    pub amount: f64,

    /// Whether the amount was earned or spent.
    #[serde(rename = "type")]
    pub kind: TransactionType,

    /// The category of the transaction, e.g. "Groceries", "Transport", "Rent".
    ///
    /// Categories are trimmed and lowercased before they are stored.
    pub category: String,

    /// A human-readable description of the transaction.
    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub note: String,
}

impl TransactionBuilder {
    /// Set the description for the transaction.
    pub fn description(mut self, description: &str) -> Self {
        self.description = description.to_owned();
        self
    }

    /// Set the note for the transaction.
    pub fn note(mut self, note: &str) -> Self {
        self.note = note.to_owned();
        self
    }
}

/// A change to a transaction.
///
/// Only the listed fields may be changed, unknown fields such as `user_id`
/// are rejected when deserializing.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransactionUpdate {
    pub amount: Option<f64>,
    #[serde(rename = "type")]
    pub kind: Option<TransactionType>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub note: Option<String>,
}

// ============================================================================
// DATABASE FUNCTIONS
// ============================================================================

/// Create a new transaction owned by `user_id` in the database from a builder.
///
/// # Errors
/// This function will return a:
/// - [Error::InvalidAmount] if the amount is NaN or infinite,
/// - [Error::InvalidInput] if the category is blank,
/// - [Error::NotFound] if `user_id` does not refer to a registered user,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn create_transaction(
    user_id: UserID,
    builder: TransactionBuilder,
    now: OffsetDateTime,
    connection: &Connection,
) -> Result<Transaction, Error> {
    let amount = parse_amount(builder.amount)?;
    let category = parse_category(&builder.category)?;

    let transaction = connection
        .prepare(
            "INSERT INTO \"transaction\"
                (user_id, amount, type, category, description, note, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
             RETURNING id, user_id, amount, type, category, description, note, created_at, updated_at",
        )?
        .query_row(
            (
                user_id.as_i64(),
                amount,
                builder.kind,
                category,
                builder.description.trim(),
                builder.note.trim(),
                now,
            ),
            map_transaction_row,
        )
        .map_err(|error| match error {
            rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error {
                    code: _,
                    extended_code: rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY,
                },
                _,
            ) => Error::NotFound,
            error => error.into(),
        })?;

    Ok(transaction)
}

/// Retrieve a transaction from the database by its `id`.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a valid transaction,
/// - or [Error::SqlError] there is some other SQL error.
pub fn get_transaction(id: TransactionId, connection: &Connection) -> Result<Transaction, Error> {
    let transaction = connection
        .prepare(
            "SELECT id, user_id, amount, type, category, description, note, created_at, updated_at
             FROM \"transaction\" WHERE id = :id",
        )?
        .query_one(&[(":id", &id)], map_transaction_row)?;

    Ok(transaction)
}

/// Retrieve the transaction `id` on behalf of `user_id`.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a valid transaction,
/// - [Error::Forbidden] if the transaction belongs to another user,
/// - or [Error::SqlError] there is some other SQL error.
pub fn get_owned_transaction(
    id: TransactionId,
    user_id: UserID,
    connection: &Connection,
) -> Result<Transaction, Error> {
    let transaction = get_transaction(id, connection)?;

    if transaction.user_id == user_id {
        Ok(transaction)
    } else {
        tracing::warn!(
            "User {user_id} tried to access transaction {id} owned by user {}",
            transaction.user_id
        );
        Err(Error::Forbidden)
    }
}

/// Apply `update` to the transaction `id` owned by `user_id`.
///
/// Column names come from [Field::column], only the values are bound as parameters.
///
/// # Errors
/// This function will return a:
/// - [Error::EmptyUpdate] if `update` does not set any fields,
/// - [Error::InvalidAmount] or [Error::InvalidInput] if a new value is invalid,
/// - [Error::NotFound] if `id` does not refer to a valid transaction,
/// - [Error::Forbidden] if the transaction belongs to another user,
/// - or [Error::SqlError] there is some other SQL error.
pub fn update_transaction(
    id: TransactionId,
    user_id: UserID,
    update: TransactionUpdate,
    now: OffsetDateTime,
    connection: &Connection,
) -> Result<Transaction, Error> {
    let amount = update.amount.map(parse_amount).transpose()?;
    let category = update.category.as_deref().map(parse_category).transpose()?;
    let description = update.description.as_deref().map(str::trim);
    let note = update.note.as_deref().map(str::trim);

    let mut assignments: Vec<(Field, &dyn ToSql)> = Vec::new();

    if let Some(amount) = &amount {
        assignments.push((Field::Amount, amount));
    }
    if let Some(kind) = &update.kind {
        assignments.push((Field::Type, kind));
    }
    if let Some(category) = &category {
        assignments.push((Field::Category, category));
    }
    if let Some(description) = &description {
        assignments.push((Field::Description, description));
    }
    if let Some(note) = &note {
        assignments.push((Field::Note, note));
    }

    if assignments.is_empty() {
        return Err(Error::EmptyUpdate);
    }

    get_owned_transaction(id, user_id, connection)?;

    assignments.push((Field::UpdatedAt, &now));

    let set_clause = assignments
        .iter()
        .enumerate()
        .map(|(index, (field, _))| format!("\"{}\" = ?{}", field.column(), index + 1))
        .collect::<Vec<_>>()
        .join(", ");
    let query = format!(
        "UPDATE \"transaction\" SET {set_clause} WHERE id = ?{}",
        assignments.len() + 1
    );

    let mut values: Vec<&dyn ToSql> = assignments.into_iter().map(|(_, value)| value).collect();
    values.push(&id);

    connection.execute(&query, rusqlite::params_from_iter(values))?;

    get_transaction(id, connection)
}

/// Delete the transaction `id` owned by `user_id`.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a valid transaction,
/// - [Error::Forbidden] if the transaction belongs to another user,
/// - or [Error::SqlError] there is some other SQL error.
pub fn delete_transaction(
    id: TransactionId,
    user_id: UserID,
    connection: &Connection,
) -> Result<(), Error> {
    get_owned_transaction(id, user_id, connection)?;

    connection.execute("DELETE FROM \"transaction\" WHERE id = ?1", [id])?;

    Ok(())
}

/// Get the total number of transactions in the database.
///
/// # Errors
/// This function will return a [Error::SqlError] there is some SQL error.
pub fn count_transactions(connection: &Connection) -> Result<u32, Error> {
    connection
        .query_row("SELECT COUNT(id) FROM \"transaction\";", [], |row| {
            row.get(0)
        })
        .map_err(|error| error.into())
}

/// Create the transaction table in the database.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_transaction_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS \"transaction\" (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                amount REAL NOT NULL,
                type TEXT NOT NULL CHECK (type IN ('income', 'expense')),
                category TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                note TEXT NOT NULL DEFAULT '',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                FOREIGN KEY(user_id) REFERENCES user(id) ON DELETE CASCADE
                )",
        (),
    )?;

    // Listing always filters by owner and usually sorts by creation time.
    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_transaction_user_created
            ON \"transaction\"(user_id, created_at);",
        (),
    )?;

    Ok(())
}

/// Map a database row to a Transaction.
///
/// Expects the columns in the order: id, user_id, amount, type, category,
/// description, note, created_at, updated_at.
pub fn map_transaction_row(row: &Row) -> Result<Transaction, rusqlite::Error> {
    Ok(Transaction {
        id: row.get(0)?,
        user_id: UserID::new(row.get(1)?),
        amount: row.get(2)?,
        kind: row.get(3)?,
        category: row.get(4)?,
        description: row.get(5)?,
        note: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

// ============================================================================
// TESTS
// ============================================================================
