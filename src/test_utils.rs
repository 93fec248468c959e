//! Shared test utilities for the school ledger.
//!
//! This module provides common helper functions for setting up test databases
//! and creating test records with sensible defaults.

use crate::{
    config::Section,
    core::{
        directory,
        expense::{self, NewExpense},
        inventory::{self, ItemDetails},
        term::{self, TermContext},
    },
    entities,
    errors::Result,
};
use chrono::NaiveDate;
use sea_orm::DatabaseConnection;

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Sets up a database with an active term named "First Term".
/// Returns (db, term) for term-scoped ledger tests.
pub async fn setup_with_term() -> Result<(DatabaseConnection, TermContext)> {
    let db = setup_test_db().await?;
    let term = term::ensure_active_term(&db, "First Term").await?;
    Ok((db, term))
}

/// Creates a term and makes it the active one.
pub async fn open_new_test_term(db: &DatabaseConnection, name: &str) -> Result<TermContext> {
    let model = term::create_term(db, name).await?;
    term::set_active_term(db, model.id).await?;
    Ok(TermContext::from(&model))
}

/// Creates a test student in `class_name`.
pub async fn create_test_student(
    db: &DatabaseConnection,
    name: &str,
    class_name: &str,
) -> Result<entities::person::Model> {
    directory::create_person(db, entities::Population::Student, name, class_name).await
}

/// Creates a test teacher in `class_name`.
pub async fn create_test_teacher(
    db: &DatabaseConnection,
    name: &str,
    class_name: &str,
) -> Result<entities::person::Model> {
    directory::create_person(db, entities::Population::Teacher, name, class_name).await
}

/// Creates a root-level item stocked and priced at a single level.
///
/// # Defaults
/// * `category`: "uniform"
/// * no description, size or parent folder
pub async fn create_test_item(
    db: &DatabaseConnection,
    name: &str,
    level: &str,
    stock: i64,
    price: f64,
) -> Result<entities::inventory_item::Model> {
    let mut details = ItemDetails {
        name: name.to_string(),
        category: "uniform".to_string(),
        ..Default::default()
    };
    details.stock.insert(level.to_string(), stock);
    details.prices.insert(level.to_string(), price);
    inventory::create_item(db, details).await
}

/// Records a single-unit expense of `amount` on `spent_on`.
pub async fn create_test_expense(
    db: &DatabaseConnection,
    term: &TermContext,
    category: &str,
    amount: f64,
    spent_on: NaiveDate,
) -> Result<entities::expense::Model> {
    expense::add_expense(
        db,
        term,
        NewExpense {
            name: format!("{category} purchase"),
            category: category.to_string(),
            description: None,
            quantity: 1.0,
            unit_price: amount,
            total_override: None,
            spent_on,
        },
    )
    .await
}

/// Builds a section from string literals.
pub fn test_section(name: &str, classes: &[&str]) -> Section {
    Section {
        name: name.to_string(),
        classes: classes.iter().map(ToString::to_string).collect(),
    }
}

/// Shorthand for a calendar date; panics on an impossible date.
#[allow(clippy::unwrap_used)]
pub fn test_date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

/// Routes `tracing` output through the test harness. Safe to call repeatedly.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}
