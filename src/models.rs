//! Framework-agnostic domain types shared by the ledger, the claims service,
//! the dashboard, and both store adapters.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};

/// Medical-expense category an entitlement budgets for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Regular outpatient expenses and medications
    Domiciliary,
    /// Long-term medication for chronic conditions
    Chronic,
    /// Emergency and in-patient treatment
    Hospitalization,
}

impl Category {
    /// All categories in display order
    pub const ALL: [Self; 3] = [Self::Domiciliary, Self::Chronic, Self::Hospitalization];

    /// Lowercase storage/wire name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Domiciliary => "domiciliary",
            Self::Chronic => "chronic",
            Self::Hospitalization => "hospitalization",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "domiciliary" => Ok(Self::Domiciliary),
            "chronic" => Ok(Self::Chronic),
            "hospitalization" => Ok(Self::Hospitalization),
            other => Err(Error::validation(
                "category",
                format!("unknown category '{other}'"),
            )),
        }
    }
}

/// Review state of a claim
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClaimStatus {
    /// Submitted, awaiting review
    Pending,
    /// Accepted by a reviewer
    Approved,
    /// Declined by a reviewer
    Rejected,
}

impl ClaimStatus {
    /// Lowercase storage/wire name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

impl fmt::Display for ClaimStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClaimStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            other => Err(Error::validation(
                "status",
                format!("unknown status '{other}'"),
            )),
        }
    }
}

/// Role supplied by the auth collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    /// Full access, including entitlement overrides and deletion
    Admin,
    /// Regular claimant; sees only their own claims
    Officer,
    /// Reviews claims
    MedicalOfficer,
}

impl Role {
    /// Admins and medical officers may see every claim and change status.
    #[must_use]
    pub const fn can_review(self) -> bool {
        matches!(self, Self::Admin | Self::MedicalOfficer)
    }

    /// Only admins may delete claims or override entitlements.
    #[must_use]
    pub const fn is_admin(self) -> bool {
        matches!(self, Self::Admin)
    }
}

/// Authenticated caller of a ledger operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    /// Authenticated user id
    pub user_id: i64,
    /// Role of that user
    pub role: Role,
}

impl Actor {
    /// Builds an actor from the auth collaborator's session data.
    #[must_use]
    pub const fn new(user_id: i64, role: Role) -> Self {
        Self { user_id, role }
    }
}

/// Budget for one category in one fiscal year
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entitlement {
    /// Unique identifier
    pub id: i64,
    /// Category this budget covers
    pub category: Category,
    /// Display name (e.g. "Domiciliary")
    pub name: String,
    /// What the budget covers
    pub description: String,
    /// Budget cap
    pub total_amount: f64,
    /// Amount consumed by claims; may exceed `total_amount`
    pub used_amount: f64,
    /// Fiscal year label, e.g. `"2023-24"`
    pub fiscal_year: String,
    /// Bumped on every `used_amount` write
    pub version: i64,
}

impl Entitlement {
    /// Remaining budget; negative when over-claimed.
    #[must_use]
    pub fn remaining(&self) -> f64 {
        self.total_amount - self.used_amount
    }
}

/// Administrative revision of an entitlement's budget; `None` keeps the current value
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntitlementUpdate {
    /// New display name
    pub name: Option<String>,
    /// New description
    pub description: Option<String>,
    /// New budget cap
    pub total_amount: Option<f64>,
}

/// Entitlement to be inserted by seeding
#[derive(Debug, Clone, PartialEq)]
pub struct NewEntitlement {
    /// Category this budget covers
    pub category: Category,
    /// Display name
    pub name: String,
    /// What the budget covers
    pub description: String,
    /// Budget cap
    pub total_amount: f64,
    /// Opening usage
    pub used_amount: f64,
    /// Fiscal year label
    pub fiscal_year: String,
}

/// Optional details copied from the bill
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillDetails {
    /// Bill or invoice number
    pub bill_number: Option<String>,
    /// Bill date as printed
    pub bill_date: Option<String>,
    /// Issuing hospital
    pub hospital_name: Option<String>,
    /// Treating doctor
    pub doctor_name: Option<String>,
}

/// Reimbursement request drawn against an entitlement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claim {
    /// Unique identifier
    pub id: i64,
    /// Submitting user
    pub user_id: i64,
    /// Entitlement category charged
    pub category: Category,
    /// What was claimed
    pub description: String,
    /// Claimed amount, always positive
    pub amount: f64,
    /// Optional bill metadata
    pub bill: BillDetails,
    /// Patient treated
    pub patient_name: String,
    /// Patient's relationship to the officer
    pub relationship: String,
    /// When the claim was submitted
    pub submission_date: DateTime<Utc>,
    /// Review state
    pub status: ClaimStatus,
    /// Amount approved by the reviewer
    pub approved_amount: Option<f64>,
    /// Reviewer who approved
    pub approved_by: Option<i64>,
    /// When the claim was approved
    pub approved_at: Option<DateTime<Utc>>,
    /// Reason given on rejection
    pub rejection_reason: Option<String>,
    /// Reviewer comments
    pub comments: Option<String>,
    /// Amount currently held against the entitlement for this claim
    pub charged_amount: f64,
    /// Bumped on every write of the claim row
    pub version: i64,
}

/// Validated claim ready for the ledger
#[derive(Debug, Clone, PartialEq)]
pub struct NewClaim {
    /// Submitting user
    pub user_id: i64,
    /// Entitlement category charged
    pub category: Category,
    /// What was claimed
    pub description: String,
    /// Claimed amount
    pub amount: f64,
    /// Optional bill metadata
    pub bill: BillDetails,
    /// Patient treated
    pub patient_name: String,
    /// Patient's relationship to the officer
    pub relationship: String,
    /// When the claim was submitted
    pub submission_date: DateTime<Utc>,
}

/// Guarded increment of an entitlement's `used_amount`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UsageChange {
    /// Entitlement to update
    pub entitlement_id: i64,
    /// Version read before computing the change
    pub expected_version: i64,
    /// Amount added to `used_amount` (negative releases usage)
    pub delta: f64,
}

impl UsageChange {
    /// Builds a change guarded on the entitlement's current version.
    #[must_use]
    pub const fn against(entitlement: &Entitlement, delta: f64) -> Self {
        Self {
            entitlement_id: entitlement.id,
            expected_version: entitlement.version,
            delta,
        }
    }
}

/// Scheduled medical appointment for a user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    /// Unique identifier
    pub id: i64,
    /// Patient officer
    pub user_id: i64,
    /// Doctor seen
    pub doctor_name: String,
    /// Doctor's specialization
    pub specialization: String,
    /// Where the appointment takes place
    pub location: String,
    /// Date and time of the appointment
    pub scheduled_at: DateTime<Utc>,
}

/// Appointment to be inserted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAppointment {
    /// Patient officer
    pub user_id: i64,
    /// Doctor seen
    pub doctor_name: String,
    /// Doctor's specialization
    pub specialization: String,
    /// Where the appointment takes place
    pub location: String,
    /// Date and time of the appointment
    pub scheduled_at: DateTime<Utc>,
}

/// Calendar month key used by the monthly breakdown
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct MonthKey {
    /// Calendar year
    pub year: i32,
    /// Month number, 1-12
    pub month: u32,
}

impl MonthKey {
    /// Month containing the given date.
    #[must_use]
    pub fn of(date: NaiveDate) -> Self {
        use chrono::Datelike;
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// The month before this one.
    #[must_use]
    pub const fn previous(self) -> Self {
        if self.month == 1 {
            Self {
                year: self.year - 1,
                month: 12,
            }
        } else {
            Self {
                year: self.year,
                month: self.month - 1,
            }
        }
    }
}
