//! Person entity - Students and teachers share one roster table.
//!
//! Identity fields (name, class) belong to directory management. The four
//! attendance counters and `last_counted_term_id` are written only by the
//! attendance ledger.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Which roster a person belongs to. Attendance is kept separately per population.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "lowercase")]
pub enum Population {
    /// Enrolled student
    #[sea_orm(string_value = "student")]
    Student,
    /// Member of staff
    #[sea_orm(string_value = "teacher")]
    Teacher,
}

impl Population {
    /// Lowercase label used in logs and reports
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Student => "student",
            Self::Teacher => "teacher",
        }
    }
}

impl std::fmt::Display for Population {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Person database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "people")]
pub struct Model {
    /// Unique identifier for the person
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Student or teacher
    pub population: Population,
    /// Display name
    pub name: String,
    /// Class/section label (e.g. "JSS 1 A")
    pub class_name: String,
    /// Days marked present, across all terms
    pub lifetime_present: i64,
    /// Days marked absent, across all terms
    pub lifetime_absent: i64,
    /// Days marked present in `last_counted_term_id`
    pub term_present: i64,
    /// Days marked absent in `last_counted_term_id`
    pub term_absent: i64,
    /// Term the term counters belong to; stale values read as zero
    pub last_counted_term_id: Option<i64>,
}

/// People are referenced by id from attendance maps and ledgers
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
