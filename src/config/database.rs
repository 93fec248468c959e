//! Database configuration module.
//!
//! This module handles the `SQLite` database connection and table creation using `SeaORM`.
//! Tables are generated from the entity definitions with
//! `Schema::create_table_from_entity`, so the schema always matches the Rust structs.
//! The one constraint the entities cannot express, uniqueness of a day record per
//! (population, date), is added as an explicit index.

use crate::entities::{
    AppSetting, DailyAttendance, DailyAttendanceColumn, Expense, InventoryItem, InventoryRefund,
    InventoryTransaction, Payment, Person, StudentHolding, Term,
};
use crate::errors::Result;
use sea_orm::sea_query::Index;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, EntityTrait, Schema};
use tracing::{debug, info};

/// Default location of the database when `DATABASE_URL` is not set
pub const DEFAULT_DATABASE_URL: &str = "sqlite://data/school_ledger.sqlite?mode=rwc";

/// Gets the database URL from environment variable or returns default `SQLite` path.
#[must_use]
pub fn get_database_url() -> String {
    std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string())
}

/// Establishes a connection to the `SQLite` database using the `DATABASE_URL` environment variable.
///
/// Falls back to a default local `SQLite` file if no environment variable is set.
pub async fn create_connection() -> Result<DatabaseConnection> {
    let database_url = get_database_url();
    debug!("Connecting to database at {database_url}");
    Database::connect(&database_url).await.map_err(Into::into)
}

async fn create_table_for<C, E>(db: &C, schema: &Schema, entity: E) -> Result<()>
where
    C: ConnectionTrait,
    E: EntityTrait,
{
    let builder = db.get_database_backend();
    let mut statement = schema.create_table_from_entity(entity);
    statement.if_not_exists();
    db.execute(builder.build(&statement)).await?;
    Ok(())
}

/// Creates all necessary database tables using `SeaORM`'s schema generation from entity definitions.
///
/// Safe to run on every start: tables and indexes are only created when missing.
pub async fn create_tables<C>(db: &C) -> Result<()>
where
    C: ConnectionTrait,
{
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    create_table_for(db, &schema, Term).await?;
    create_table_for(db, &schema, AppSetting).await?;
    create_table_for(db, &schema, Person).await?;
    create_table_for(db, &schema, DailyAttendance).await?;
    create_table_for(db, &schema, Payment).await?;
    create_table_for(db, &schema, InventoryItem).await?;
    create_table_for(db, &schema, InventoryTransaction).await?;
    create_table_for(db, &schema, InventoryRefund).await?;
    create_table_for(db, &schema, StudentHolding).await?;
    create_table_for(db, &schema, Expense).await?;

    let day_index = Index::create()
        .name("idx_daily_attendance_population_date")
        .table(DailyAttendance)
        .col(DailyAttendanceColumn::Population)
        .col(DailyAttendanceColumn::Date)
        .unique()
        .if_not_exists()
        .to_owned();
    db.execute(builder.build(&day_index)).await?;

    info!("Database tables ensured.");
    Ok(())
}
