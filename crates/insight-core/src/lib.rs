//! Shared types for the masterclass insight pipeline: domain models, errors,
//! exclusion rules, CLI settings and display helpers.

pub mod error;
pub mod exclusion;
pub mod formatting;
pub mod models;
pub mod settings;
