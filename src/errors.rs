//! Unified error type for the ledger.
//!
//! Every rejection carries enough context for the caller to show a readable
//! message at the point of the triggering action.

use thiserror::Error;

/// All failures surfaced by the ledger and its ambient layers.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration could not be loaded or is inconsistent
    #[error("Configuration error: {message}")]
    Config {
        /// What went wrong
        message: String,
    },

    /// Input rejected before any write (blank name, bad quantity, ...)
    #[error("Validation error: {message}")]
    Validation {
        /// What was wrong with the input
        message: String,
    },

    /// Negative or non-finite monetary amount
    #[error("Invalid amount: {amount}")]
    InvalidAmount {
        /// The rejected amount
        amount: f64,
    },

    /// A fee payment would push the running total past the class fee
    #[error(
        "Payment of {amount:.2} would bring the total to {attempted_total:.2}, above the class fee of {class_fee:.2}"
    )]
    Overpayment {
        /// Amount of the rejected payment
        amount: f64,
        /// Sum of the payments already recorded this term
        prior_total: f64,
        /// Fee for the student's class
        class_fee: f64,
        /// `prior_total + amount`
        attempted_total: f64,
    },

    /// Checkout asked for more than is in stock at a level
    #[error("Insufficient stock for '{item}' ({level}): requested {requested}, available {available}")]
    InsufficientStock {
        /// Item name
        item: String,
        /// Stock level the checkout targeted
        level: String,
        /// Requested quantity
        requested: i64,
        /// Quantity currently in stock
        available: i64,
    },

    /// Referenced record does not exist
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Kind of record (e.g. "person", "item")
        entity: &'static str,
        /// Identifier that was looked up
        id: String,
    },

    /// Folder still has children
    #[error("Folder '{name}' is not empty ({children} children)")]
    NotEmpty {
        /// Folder name
        name: String,
        /// Number of items or folders still referencing it
        children: u64,
    },

    /// Storage failure from the backing database, surfaced as-is
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// I/O failure (config file, export)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Missing or malformed environment variable
    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),

    /// Report rendering failure
    #[error("Formatting error: {0}")]
    Format(#[from] std::fmt::Error),

    /// JSON export failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Shorthand for a [`Error::NotFound`] keyed by a numeric id.
    #[must_use]
    pub fn not_found(entity: &'static str, id: i64) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Shorthand for a [`Error::Validation`].
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
