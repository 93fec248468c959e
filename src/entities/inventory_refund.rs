//! Inventory refund entity - Logged when a paid checkout is returned or retracted.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Inventory refund database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "inventory_refunds")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Term the refund is booked against
    pub term_id: i64,
    /// Transaction being refunded
    pub transaction_id: i64,
    /// Item refunded
    pub item_id: i64,
    /// Student receiving the refund
    pub student_id: i64,
    /// Stock level
    pub level: String,
    /// Quantity refunded
    pub quantity: i64,
    /// `unit_price * quantity`
    pub amount: f64,
    /// When the refund was logged
    pub created_at: DateTimeUtc,
}

/// Refunds reference transactions by id only
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
