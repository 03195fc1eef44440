use std::{error::Error, path::Path, process::exit};

use clap::Parser;
use rusqlite::Connection;
use time::{Duration, OffsetDateTime};

use ledger_api::{
    PasswordHash, initialize_db,
    transaction::{Transaction, TransactionType, create_transaction},
    user::create_user,
};

/// A utility for creating a test database for the REST API server of ledger_api.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to save the SQLite database to.
    #[arg(long, short)]
    output_path: String,
}

const DEMO_EMAIL: &str = "demo@example.com";
const DEMO_PASSWORD: &str = "Demo-Passw0rd";

/// Create and populate a database for manual testing.
fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    let output_path = Path::new(&args.output_path);

    match output_path.extension() {
        None => {
            eprintln!("Output path must include a file extension (e.g., 'my_database.db').");
            exit(1);
        }
        Some(extension) if extension.is_empty() => {
            eprintln!("Output path must include a file extension (e.g., 'my_database.db').");
            exit(1);
        }
        _ => {}
    }

    if output_path.is_file() {
        eprintln!("File already exists at {output_path:#?}!");
        exit(1);
    }

    println!("Creating database at {output_path:#?}");
    let conn = Connection::open(output_path)?;

    initialize_db(&conn)?;

    println!("Creating test user {DEMO_EMAIL} with the password {DEMO_PASSWORD}...");

    let now = OffsetDateTime::now_utc();
    let user = create_user(
        "Demo User",
        DEMO_EMAIL,
        PasswordHash::from_raw_password(DEMO_PASSWORD, PasswordHash::DEFAULT_COST)?,
        now,
        &conn,
    )?;

    println!("Creating sample transactions...");

    let samples = [
        (3200.0, TransactionType::Income, "Salary", "Monthly pay"),
        (1450.0, TransactionType::Expense, "Rent", "Apartment"),
        (86.4, TransactionType::Expense, "Groceries", "Weekly shop"),
        (4.5, TransactionType::Expense, "Coffee", "Flat white"),
        (60.0, TransactionType::Expense, "Transport", "Bus pass"),
        (120.0, TransactionType::Income, "Gifts", "Birthday money"),
    ];

    for (days_ago, (amount, kind, category, description)) in samples.into_iter().enumerate() {
        create_transaction(
            user.id,
            Transaction::build(amount, kind, category).description(description),
            now - Duration::days(days_ago as i64),
            &conn,
        )?;
    }

    println!("Success!");

    Ok(())
}
