/// Database configuration and connection management
pub mod database;

/// School configuration (fee table, sections) loaded from school.toml
pub mod school;

pub use school::{ClassFee, SchoolConfig, Section, load_config, load_default_config};
