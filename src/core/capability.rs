//! Role-based capability checks.
//!
//! Callers evaluate a [`Capability`] once per operation before invoking a ledger
//! function; the ledgers themselves never check who is calling.

use crate::errors::{Error, Result};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Staff roles.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Role {
    /// Everything, everywhere
    Admin,
    /// Fees, expenses and reports
    Bursar,
    /// Inventory
    Storekeeper,
    /// Attendance for their own sections
    Teacher,
}

impl Role {
    /// Lowercase name as written in configuration
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Bursar => "bursar",
            Self::Storekeeper => "storekeeper",
            Self::Teacher => "teacher",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "admin" => Ok(Self::Admin),
            "bursar" => Ok(Self::Bursar),
            "storekeeper" => Ok(Self::Storekeeper),
            "teacher" => Ok(Self::Teacher),
            other => Err(Error::validation(format!("Unknown role '{other}'"))),
        }
    }
}

/// Operations a caller may ask to perform.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Action {
    /// Read day records
    ViewAttendance,
    /// Mark or bulk-mark attendance
    MarkAttendance,
    /// Add, edit or delete students and teachers
    ManageDirectory,
    /// Record or delete fee payments
    RecordPayment,
    /// Edit items and run checkouts, payments and returns
    ManageInventory,
    /// Record or edit expenses
    RecordExpense,
    /// Read term snapshots and totals
    ViewReports,
    /// Close the term and open the next
    RolloverTerm,
}

/// A role together with the sections it may act on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Capability {
    role: Role,
    /// `None` means every section
    sections: Option<BTreeSet<String>>,
}

impl Capability {
    /// A capability valid in every section.
    #[must_use]
    pub const fn unrestricted(role: Role) -> Self {
        Self {
            role,
            sections: None,
        }
    }

    /// A capability limited to the named sections (case-insensitive).
    pub fn scoped<I, S>(role: Role, sections: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            role,
            sections: Some(
                sections
                    .into_iter()
                    .map(|s| s.as_ref().trim().to_lowercase())
                    .collect(),
            ),
        }
    }

    /// The role
    #[must_use]
    pub const fn role(&self) -> Role {
        self.role
    }

    /// Whether `action` is permitted, in `section` when the action is section-bound.
    #[must_use]
    pub fn allows(&self, action: Action, section: Option<&str>) -> bool {
        role_permits(self.role, action) && self.covers(section)
    }

    /// Like [`Capability::allows`] but as a `Validation` error for the caller to show.
    pub fn require(&self, action: Action, section: Option<&str>) -> Result<()> {
        if self.allows(action, section) {
            Ok(())
        } else {
            Err(Error::validation(format!(
                "A {} may not perform {action:?}{}",
                self.role,
                section.map(|s| format!(" in section '{s}'")).unwrap_or_default()
            )))
        }
    }

    fn covers(&self, section: Option<&str>) -> bool {
        match (self.role, &self.sections, section) {
            (Role::Admin, _, _) | (_, None, _) | (_, _, None) => true,
            (_, Some(allowed), Some(section)) => {
                allowed.contains(&section.trim().to_lowercase())
            }
        }
    }
}

/// The role table, ignoring sections.
#[must_use]
pub const fn role_permits(role: Role, action: Action) -> bool {
    use Action::{
        ManageInventory, MarkAttendance, RecordExpense, RecordPayment, ViewAttendance,
        ViewReports,
    };
    match role {
        Role::Admin => true,
        Role::Bursar => matches!(action, RecordPayment | RecordExpense | ViewReports),
        Role::Storekeeper => matches!(action, ManageInventory),
        Role::Teacher => matches!(action, ViewAttendance | MarkAttendance),
    }
}
