//! Inventory item entity - Items and folders in one tree.
//!
//! Stock and prices are kept per level (e.g. "JuniorBasic") in JSON columns.

use sea_orm::FromJsonQueryResult;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Stock count per level
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult)]
pub struct LevelStock(pub BTreeMap<String, i64>);

impl LevelStock {
    /// Stock at a level; levels never stocked read as zero
    #[must_use]
    pub fn at(&self, level: &str) -> i64 {
        self.0.get(level).copied().unwrap_or(0)
    }
}

/// Unit price per level
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, FromJsonQueryResult)]
pub struct LevelPrices(pub BTreeMap<String, f64>);

impl LevelPrices {
    /// Price at a level; unpriced levels are free
    #[must_use]
    pub fn at(&self, level: &str) -> f64 {
        self.0.get(level).copied().unwrap_or(0.0)
    }
}

/// Inventory item database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "inventory_items")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Display name
    pub name: String,
    /// Free-form category (e.g. "uniform", "books")
    pub category: String,
    /// Optional longer description
    pub description: Option<String>,
    /// Optional size label
    pub size: Option<String>,
    /// Folders group items and never hold stock
    pub is_folder: bool,
    /// Containing folder, `None` at the root
    pub parent_id: Option<i64>,
    /// Stock per level
    pub stock: LevelStock,
    /// Unit price per level
    pub prices: LevelPrices,
}

/// The tree is expressed through `parent_id` only
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
