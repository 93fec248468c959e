//! Expense entity - One dated expense line.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Expense database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "expenses")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Term the expense is booked against
    pub term_id: i64,
    /// What was bought
    pub name: String,
    /// Reporting category
    pub category: String,
    /// Optional notes
    pub description: Option<String>,
    /// Quantity, clamped to >= 0
    pub quantity: f64,
    /// Unit price, clamped to >= 0
    pub unit_price: f64,
    /// Line total, never negative
    pub total: f64,
    /// Day the money was spent
    pub spent_on: Date,
    /// When the entry was recorded
    pub created_at: DateTimeUtc,
}

/// Expenses reference terms by id only
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
