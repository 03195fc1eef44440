//! Translates a [TransactionQuery] into a parameterized SQLite query.
//!
//! Column names only ever come from [Field::column]. Every value from the
//! client is bound as a parameter.

use rusqlite::{Connection, functions::FunctionFlags, params_from_iter, types::Value};

use crate::{
    Error,
    transaction::{
        Transaction, map_transaction_row,
        query::{Direction, Field, FilterSpec, FilterValue, Predicate, TransactionQuery},
    },
};

/// Lowercases text with Unicode rules, unlike SQLite's ASCII-only `lower`.
const UNICODE_LOWER: &str = "unicode_lower";

/// Register the SQL functions that [to_sql] relies on with `connection`.
///
/// # Errors
/// Returns a [rusqlite::Error] if SQLite rejects the function.
pub fn register_functions(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.create_scalar_function(
        UNICODE_LOWER,
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |context| {
            let text = context.get::<Option<String>>(0)?;
            Ok(text.map(|text| text.to_lowercase()))
        },
    )
}

/// SQL text and the values for its numbered parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlQuery {
    pub sql: String,
    pub params: Vec<Value>,
}

fn quoted(field: Field) -> String {
    format!("\"{}\"", field.column())
}

fn bind(value: Value, params: &mut Vec<Value>) -> String {
    params.push(value);
    format!("?{}", params.len())
}

fn to_value(value: &FilterValue) -> Value {
    match value {
        FilterValue::Integer(integer) => Value::Integer(*integer),
        FilterValue::Text(text) => Value::Text(text.clone()),
    }
}

/// Escape the LIKE wildcards in `needle` so it only matches literally.
fn escape_like(needle: &str) -> String {
    let mut escaped = String::with_capacity(needle.len());

    for char in needle.chars() {
        if matches!(char, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(char);
    }

    escaped
}

fn predicate_sql(predicate: &Predicate, params: &mut Vec<Value>) -> String {
    match predicate {
        Predicate::Equals(field, value) => {
            format!("{} = {}", quoted(*field), bind(to_value(value), params))
        }
        Predicate::In(field, values) => {
            let placeholders = values
                .iter()
                .map(|value| bind(to_value(value), params))
                .collect::<Vec<_>>()
                .join(", ");

            format!("{} IN ({placeholders})", quoted(*field))
        }
        Predicate::ContainsIgnoreCase(field, needle) => {
            let pattern = format!("%{}%", escape_like(needle));

            format!(
                "{UNICODE_LOWER}({}) LIKE {} ESCAPE '\\'",
                quoted(*field),
                bind(Value::Text(pattern), params)
            )
        }
        Predicate::AnyOf(predicates) => {
            let clauses = predicates
                .iter()
                .map(|predicate| predicate_sql(predicate, params))
                .collect::<Vec<_>>()
                .join(" OR ");

            format!("({clauses})")
        }
    }
}

fn where_clause(filter: &FilterSpec, params: &mut Vec<Value>) -> String {
    filter
        .predicates()
        .iter()
        .map(|predicate| predicate_sql(predicate, params))
        .collect::<Vec<_>>()
        .join(" AND ")
}

/// Build the SELECT statement for `query`.
pub fn to_sql(query: &TransactionQuery) -> SqlQuery {
    let mut params = Vec::new();

    let where_clause = where_clause(&query.filter, &mut params);

    let order_by = query
        .sort
        .keys()
        .iter()
        .map(|(field, direction)| {
            let direction = match direction {
                Direction::Ascending => "ASC",
                Direction::Descending => "DESC",
            };

            format!("{} {direction}", quoted(*field))
        })
        .collect::<Vec<_>>()
        .join(", ");

    let limit = bind(Value::Integer(i64::from(query.pagination.limit)), &mut params);
    let offset = bind(
        Value::Integer(i64::from(query.pagination.offset)),
        &mut params,
    );

    let sql = format!(
        "SELECT id, user_id, amount, type, category, description, note, created_at, updated_at \
        FROM \"transaction\" \
        WHERE {where_clause} \
        ORDER BY {order_by} \
        LIMIT {limit} OFFSET {offset}"
    );

    SqlQuery { sql, params }
}

/// Run `query` against the transaction table.
///
/// # Errors
/// Returns [Error::SqlError] if the query fails or a row cannot be mapped.
pub fn query_transactions(
    query: &TransactionQuery,
    connection: &Connection,
) -> Result<Vec<Transaction>, Error> {
    let SqlQuery { sql, params } = to_sql(query);

    connection
        .prepare(&sql)?
        .query_map(params_from_iter(params), map_transaction_row)?
        .map(|transaction_result| transaction_result.map_err(Error::from))
        .collect()
}
