//! Inventory transaction entity - One checkout of an item at a level.
//!
//! Once `returned` is set the transaction is terminal.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Action marker written on checkout rows
pub const ACTION_CHECKOUT: &str = "checkout";

/// Inventory transaction database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "inventory_transactions")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Term the checkout happened in
    pub term_id: i64,
    /// Item checked out
    pub item_id: i64,
    /// Item name snapshot
    pub item_name: String,
    /// Stock level the quantity came from
    pub level: String,
    /// Quantity checked out
    pub quantity: i64,
    /// Unit price at checkout time
    pub unit_price: f64,
    /// Receiving student
    pub student_id: i64,
    /// Action marker (`"checkout"`)
    pub action: String,
    /// When the checkout was recorded
    pub created_at: DateTimeUtc,
    /// Items have been handed back
    pub returned: bool,
    /// Checkout has been paid for (free items are paid on creation)
    pub paid: bool,
    /// A refund was logged on return
    pub refunded: bool,
    /// When it was paid
    pub paid_at: Option<DateTimeUtc>,
    /// When it was returned
    pub returned_at: Option<DateTimeUtc>,
}

/// Transactions reference items and students by id only
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
