//! Entitlement entity - One capped budget per category per fiscal year.
//!
//! `used_amount` is only ever written through a guarded increment that also bumps
//! `version`, so concurrent writers detect each other instead of losing updates.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Entitlement database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "entitlements")]
pub struct Model {
    /// Unique identifier for the entitlement
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Category name: `"domiciliary"`, `"chronic"`, or `"hospitalization"`
    pub category: String,
    /// Display name (e.g. "Domiciliary")
    pub name: String,
    /// What the budget covers
    pub description: String,
    /// Budget cap for the fiscal year
    pub total_amount: f64,
    /// Amount consumed by claims so far
    pub used_amount: f64,
    /// Fiscal year label, e.g. `"2023-24"`
    pub fiscal_year: String,
    /// Optimistic concurrency counter
    pub version: i64,
}

/// Entitlements are matched to claims by category, not by foreign key
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
