//! Ledger logic, independent of any user interface.
//!
//! Every operation takes the database connection and, where it is term-scoped, an
//! explicit [`term::TermContext`].

pub mod attendance;
pub mod capability;
pub mod directory;
pub mod expense;
pub mod feed;
pub mod fees;
pub mod inventory;
pub mod rollover;
pub mod term;

use chrono::NaiveDate;

/// Inclusive range of calendar days used to bound ledger queries.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DateRange {
    /// First day included
    pub from: NaiveDate,
    /// Last day included
    pub to: NaiveDate,
}

impl DateRange {
    /// Builds a range, swapping the ends if they arrive reversed.
    #[must_use]
    pub fn new(from: NaiveDate, to: NaiveDate) -> Self {
        if from <= to {
            Self { from, to }
        } else {
            Self { from: to, to: from }
        }
    }

    /// Whether `date` falls inside the range
    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from <= date && date <= self.to
    }
}
