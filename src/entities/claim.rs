//! Claim entity - A reimbursement request submitted by an officer.
//!
//! Category and status are stored as their lowercase names. Bill metadata is
//! flattened into nullable columns.
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Claim database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "claims")]
pub struct Model {
    /// Unique identifier for the claim
    #[sea_orm(primary_key)]
    pub id: i64,
    /// User who submitted the claim
    pub user_id: i64,
    /// Entitlement category charged
    pub category: String,
    /// What was claimed
    pub description: String,
    /// Claimed amount
    pub amount: f64,
    /// Bill or invoice number
    pub bill_number: Option<String>,
    /// Bill date as printed
    pub bill_date: Option<String>,
    /// Issuing hospital
    pub hospital_name: Option<String>,
    /// Treating doctor
    pub doctor_name: Option<String>,
    /// Patient treated
    pub patient_name: String,
    /// Patient's relationship to the officer
    pub relationship: String,
    /// When the claim was submitted
    pub submission_date: DateTimeUtc,
    /// `"pending"`, `"approved"`, or `"rejected"`
    pub status: String,
    /// Amount approved by the reviewer
    pub approved_amount: Option<f64>,
    /// Reviewer who approved
    pub approved_by: Option<i64>,
    /// When the claim was approved
    pub approved_at: Option<DateTimeUtc>,
    /// Reason given on rejection
    pub rejection_reason: Option<String>,
    /// Reviewer comments
    pub comments: Option<String>,
    /// Amount still held against the entitlement
    pub charged_amount: f64,
    /// Optimistic concurrency counter for the claim row
    pub version: i64,
}

/// Claims reference entitlements by category name, not by foreign key
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
