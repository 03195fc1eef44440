//! Transaction management for the finance API.
//!
//! This module contains everything related to transactions:
//! - The `Transaction` model and `TransactionBuilder` for creating transactions
//! - Database functions for storing, updating and deleting transactions
//! - The query builder for searching, filtering, sorting and paginating
//!   transactions, and its SQLite adapter
//! - The route handlers for the transaction endpoints

mod core;
mod create_endpoint;
mod delete_endpoint;
mod edit_endpoint;
pub mod query;
mod query_endpoint;
pub mod sql;
mod view_endpoint;

pub use core::{
    Transaction, TransactionBuilder, TransactionId, TransactionType, TransactionUpdate,
    count_transactions, create_transaction, create_transaction_table, delete_transaction,
    get_owned_transaction, get_transaction, map_transaction_row, normalize_category,
    update_transaction,
};
pub use create_endpoint::create_transaction_endpoint;
pub use delete_endpoint::delete_transaction_endpoint;
pub use edit_endpoint::edit_transaction_endpoint;
pub use query_endpoint::{list_transactions_endpoint, query_transactions_endpoint};
pub use view_endpoint::get_transaction_endpoint;
