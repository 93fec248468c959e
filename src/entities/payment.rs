//! Payment entity - One fee payment event.
//!
//! Events are append-only. The running total, remaining balance and status are
//! computed at write time and never revisited.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Payment database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "payments")]
pub struct Model {
    /// Unique identifier for the event
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Term the payment belongs to
    pub term_id: i64,
    /// Paying student
    pub student_id: i64,
    /// Student's class at payment time
    pub class_name: String,
    /// Amount paid in this event
    pub amount: f64,
    /// When the payment was recorded
    pub paid_at: DateTimeUtc,
    /// Sum of all (term, student) payments including this one
    pub running_total: f64,
    /// `max(class_fee - running_total, 0)`
    pub remaining: f64,
    /// Status label after this payment ("Paid", "Owing", "Not Paid", "N/A")
    pub status: String,
}

/// Payments reference students and terms by id only
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
