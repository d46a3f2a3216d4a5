/// Database configuration and connection management
pub mod database;

/// Ledger settings and seed data loading from config.toml
pub mod ledger;

pub use ledger::{Config, LedgerSettings, ReconcilePolicy};
