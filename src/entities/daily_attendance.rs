//! Daily attendance entity - One record per calendar day per population.
//!
//! The status map is stored as a JSON column. `present_count` is derived from the
//! map and rewritten on every write.

use super::person::Population;
use chrono::{DateTime, Utc};
use sea_orm::FromJsonQueryResult;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Attendance status of one person on one day
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    /// Marked present
    Present,
    /// Marked absent
    Absent,
}

impl AttendanceStatus {
    /// Lowercase label
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Present => "present",
            Self::Absent => "absent",
        }
    }
}

/// One entry in a day's status map
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceMark {
    /// Present or absent
    pub status: AttendanceStatus,
    /// When the entry was last written
    pub marked_at: DateTime<Utc>,
    /// Class the person was in when marked
    pub class_name: String,
    /// Name snapshot at marking time
    pub name: String,
}

/// Person id → mark for one day
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult)]
pub struct StatusMap(pub BTreeMap<i64, AttendanceMark>);

impl StatusMap {
    /// Number of entries with status present
    #[must_use]
    pub fn present_count(&self) -> i64 {
        let count = self
            .0
            .values()
            .filter(|mark| mark.status == AttendanceStatus::Present)
            .count();
        i64::try_from(count).unwrap_or(i64::MAX)
    }

    /// Current status of a person, if marked
    #[must_use]
    pub fn status_of(&self, person_id: i64) -> Option<AttendanceStatus> {
        self.0.get(&person_id).map(|mark| mark.status)
    }
}

/// Daily attendance database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "daily_attendance")]
pub struct Model {
    /// Unique identifier; (population, date) is unique as well
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Students and teachers keep separate day records
    pub population: Population,
    /// Calendar day (normalized, no time component)
    pub date: Date,
    /// Term that was active when the record was created
    pub term_id: i64,
    /// Status entries keyed by person id
    pub entries: StatusMap,
    /// Cardinality of present entries
    pub present_count: i64,
    /// Last write to the record
    pub updated_at: DateTimeUtc,
}

/// Day records have no declared relations
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
