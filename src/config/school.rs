//! School configuration loading from school.toml
//!
//! The class fee table and the section → classes grouping used by bulk attendance
//! marking live here. The binary loads it once at start and hands the pieces to the
//! ledger calls that need them.

use crate::core::fees::FeeSchedule;
use crate::errors::{Error, Result};
use serde::Deserialize;
use std::path::Path;

/// Configuration structure representing the entire school.toml file
#[derive(Debug, Deserialize, Clone)]
pub struct SchoolConfig {
    /// Name printed on reports
    pub school_name: String,
    /// Name of the term opened on first run when none exists
    #[serde(default = "default_term_name")]
    pub default_term_name: String,
    /// Fixed termly fee per class
    #[serde(default)]
    pub fees: Vec<ClassFee>,
    /// Named groups of classes
    #[serde(default)]
    pub sections: Vec<Section>,
}

fn default_term_name() -> String {
    "First Term".to_string()
}

/// Fee for one class
#[derive(Debug, Deserialize, Clone)]
pub struct ClassFee {
    /// Exact class name (e.g. "JSS 1")
    pub class: String,
    /// Termly fee
    pub amount: f64,
}

/// A named group of classes (e.g. "junior" → JSS 1..3)
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct Section {
    /// Section name
    pub name: String,
    /// Classes belonging to the section
    pub classes: Vec<String>,
}

impl SchoolConfig {
    /// Builds the fee lookup table
    #[must_use]
    pub fn fee_schedule(&self) -> FeeSchedule {
        FeeSchedule::from_entries(self.fees.iter().map(|fee| (fee.class.clone(), fee.amount)))
    }

    /// Finds a section by name (case-insensitive)
    #[must_use]
    pub fn section(&self, name: &str) -> Option<&Section> {
        self.sections
            .iter()
            .find(|section| section.name.eq_ignore_ascii_case(name))
    }

    fn validate(self) -> Result<Self> {
        if let Some(fee) = self
            .fees
            .iter()
            .find(|fee| !fee.amount.is_finite() || fee.amount < 0.0)
        {
            return Err(Error::Config {
                message: format!("Fee for class '{}' must be a non-negative number", fee.class),
            });
        }
        if let Some(section) = self.sections.iter().find(|s| s.classes.is_empty()) {
            return Err(Error::Config {
                message: format!("Section '{}' lists no classes", section.name),
            });
        }
        Ok(self)
    }
}

/// Parses a school configuration from TOML text
pub fn parse_config(contents: &str) -> Result<SchoolConfig> {
    let config: SchoolConfig = toml::from_str(contents).map_err(|e| Error::Config {
        message: format!("Failed to parse school config: {e}"),
    })?;
    config.validate()
}

/// Loads the school configuration from a TOML file
///
/// # Errors
/// Returns an error if:
/// - The file cannot be read
/// - The TOML syntax is invalid
/// - A fee is negative or a section has no classes
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<SchoolConfig> {
    let path_ref = path.as_ref();
    tracing::debug!("Loading school configuration from {:?}", path_ref);
    let contents = std::fs::read_to_string(path_ref).map_err(|e| Error::Config {
        message: format!("Failed to read config file {path_ref:?}: {e}"),
    })?;
    parse_config(&contents)
}

/// Loads the school configuration from `SCHOOL_CONFIG`, or ./school.toml when unset
pub fn load_default_config() -> Result<SchoolConfig> {
    let path = std::env::var("SCHOOL_CONFIG").unwrap_or_else(|_| "school.toml".to_string());
    load_config(path)
}
