//! Student holding entity - What a student currently has checked out.
//!
//! There is at most one open (not returned) row per (student, item, level); repeat
//! checkouts of the same triple add to its quantity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Student holding database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "student_holdings")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Term of the originating checkout
    pub term_id: i64,
    /// Holding student
    pub student_id: i64,
    /// Item held
    pub item_id: i64,
    /// Item name snapshot
    pub item_name: String,
    /// Stock level
    pub level: String,
    /// Aggregated outstanding quantity
    pub quantity: i64,
    /// Mirrors the paid flag of the checkouts
    pub paid: bool,
    /// Set when a refund was logged on return
    pub refunded: bool,
    /// Set once the aggregated quantity reached zero
    pub returned: bool,
    /// Checkout that opened this holding
    pub transaction_id: i64,
    /// When it was paid
    pub paid_at: Option<DateTimeUtc>,
    /// Last change to the row
    pub updated_at: DateTimeUtc,
}

/// Holdings reference students, items and transactions by id only
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
