//! Ledger configuration loading from config.toml
//!
//! This module loads the `[ledger]` settings (active fiscal year, conflict retry
//! policy, dashboard windows) and the entitlements and appointments used to seed
//! the store. A missing file falls back to the built-in defaults so a fresh
//! checkout boots with the standard three categories.

use crate::errors::{Error, Result};
use crate::models::Category;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::path::Path;

/// Environment variable naming an alternative config file
pub const CONFIG_PATH_ENV: &str = "LEDGER_CONFIG";

/// Configuration structure representing the entire config.toml file
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Runtime behaviour of the ledger and dashboard
    #[serde(default)]
    pub ledger: LedgerSettings,
    /// Entitlements to seed for `ledger.fiscal_year`
    #[serde(default = "default_entitlements")]
    pub entitlements: Vec<EntitlementConfig>,
    /// Appointments to seed
    #[serde(default)]
    pub appointments: Vec<AppointmentConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ledger: LedgerSettings::default(),
            entitlements: default_entitlements(),
            appointments: Vec::new(),
        }
    }
}

/// What a review does to the entitlement's usage
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcilePolicy {
    /// Usage stays consumed whatever the review outcome
    #[default]
    Retain,
    /// Rejection gives the claimed amount back; approving less gives back the difference
    ReleaseOnRejection,
}

/// `[ledger]` table
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LedgerSettings {
    /// Fiscal year whose entitlements are active
    pub fiscal_year: String,
    /// Attempts at a guarded entitlement update before giving up with a conflict
    pub max_attempts: u32,
    /// Base backoff between attempts, multiplied by the attempt number
    pub retry_backoff_ms: u64,
    /// Entitlement handling on claim review
    pub reconcile_policy: ReconcilePolicy,
    /// Number of claims shown as recent activity
    pub recent_activity_limit: usize,
    /// Number of calendar months in the monthly breakdown
    pub monthly_window: usize,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self {
            fiscal_year: "2023-24".to_string(),
            max_attempts: 5,
            retry_backoff_ms: 10,
            reconcile_policy: ReconcilePolicy::Retain,
            recent_activity_limit: 5,
            monthly_window: 6,
        }
    }
}

/// Configuration for a single entitlement
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct EntitlementConfig {
    /// Category the budget covers
    pub category: Category,
    /// Display name
    pub name: String,
    /// What the budget covers
    pub description: String,
    /// Budget cap
    pub total_amount: f64,
    /// Usage already consumed when seeded
    #[serde(default)]
    pub used_amount: f64,
}

/// Configuration for a single appointment
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct AppointmentConfig {
    /// Officer the appointment is for
    pub user_id: i64,
    /// Doctor seen
    pub doctor_name: String,
    /// Doctor's specialization
    pub specialization: String,
    /// Location
    pub location: String,
    /// RFC 3339 timestamp, quoted in TOML
    pub scheduled_at: DateTime<Utc>,
}

fn default_entitlements() -> Vec<EntitlementConfig> {
    vec![
        EntitlementConfig {
            category: Category::Domiciliary,
            name: "Domiciliary".to_string(),
            description: "Regular outpatient expenses and medications".to_string(),
            total_amount: 25_000.0,
            used_amount: 12_500.0,
        },
        EntitlementConfig {
            category: Category::Chronic,
            name: "Chronic".to_string(),
            description: "Long-term medication for chronic conditions".to_string(),
            total_amount: 15_000.0,
            used_amount: 3_250.0,
        },
        EntitlementConfig {
            category: Category::Hospitalization,
            name: "Hospitalization".to_string(),
            description: "Emergency and in-patient treatment".to_string(),
            total_amount: 10_000.0,
            used_amount: 1_800.0,
        },
    ]
}

/// Loads ledger configuration from a TOML file
///
/// # Errors
/// Returns an error if:
/// - The file cannot be read
/// - The TOML syntax is invalid
/// - A category name is unknown
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| Error::Config {
        message: format!("Failed to read config file: {e}"),
    })?;

    parse_config(&contents)
}

/// Parses configuration from TOML text.
pub fn parse_config(contents: &str) -> Result<Config> {
    toml::from_str(contents).map_err(|e| Error::Config {
        message: format!("Failed to parse config.toml: {e}"),
    })
}

/// Loads configuration from `$LEDGER_CONFIG` or `./config.toml`.
///
/// A missing file is not an error: the built-in defaults are returned instead.
pub fn load_default_config() -> Result<Config> {
    let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| "config.toml".to_string());
    if !Path::new(&path).exists() {
        tracing::warn!("No config file at {path}, using built-in entitlements");
        return Ok(Config::default());
    }
    tracing::debug!("Loading configuration from {path}");
    load_config(path)
}
