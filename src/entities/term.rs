//! Term entity - One academic term.
//!
//! Terms are created and closed by the rollover and are never deleted. Which term
//! is active is tracked separately by the `active_term_id` app setting.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Term database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "terms")]
pub struct Model {
    /// Unique identifier for the term
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Display name (e.g. "2025/2026 First Term")
    pub name: String,
    /// When the term was opened
    pub started_at: DateTimeUtc,
    /// Set once the term has been rolled over
    pub closed: bool,
    /// When the term was closed, if it has been
    pub ended_at: Option<DateTimeUtc>,
}

/// Terms are referenced by id from the ledgers but carry no declared relations
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
