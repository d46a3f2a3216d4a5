//! Claim business logic - submission, visibility, edits, review, and deletion.
//!
//! This is the layer an API handler calls with the authenticated [`Actor`]. It owns
//! form validation and the role/ownership rules, then delegates every entitlement
//! write to the [`Ledger`]:
//! - officers submit claims, see their own, and edit them while pending
//! - admins and medical officers see every claim and review pending ones
//! - only admins delete claims, adjust entitlement usage, or revise budgets

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    core::ledger::{Ledger, ReviewDecision, validate_amount},
    errors::{Error, Result},
    models::{
        Actor, BillDetails, Category, Claim, ClaimStatus, Entitlement, EntitlementUpdate, NewClaim,
    },
    store::LedgerStore,
};

const MIN_DESCRIPTION_LEN: usize = 5;
const MIN_PATIENT_NAME_LEN: usize = 3;

/// Raw claim submission as received from a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimForm {
    /// Category name; must be one of the known categories
    pub category: String,
    /// What is being claimed
    pub description: String,
    /// Claimed amount
    pub amount: f64,
    /// Optional bill metadata
    #[serde(default, flatten)]
    pub bill: BillDetails,
    /// Patient treated
    pub patient_name: String,
    /// Patient's relationship to the officer
    pub relationship: String,
}

impl ClaimForm {
    /// Checks the form and turns it into a claim owned by `user_id`.
    ///
    /// # Errors
    /// `Validation` for an unknown category or too-short text fields,
    /// `InvalidAmount` for a non-positive amount.
    pub fn validate(self, user_id: i64) -> Result<NewClaim> {
        let category: Category = self.category.parse()?;
        let description = require_text("description", &self.description, MIN_DESCRIPTION_LEN)?;
        validate_amount(self.amount)?;
        let patient_name = require_text("patient_name", &self.patient_name, MIN_PATIENT_NAME_LEN)?;
        let relationship = require_text("relationship", &self.relationship, 1)?;

        Ok(NewClaim {
            user_id,
            category,
            description,
            amount: self.amount,
            bill: trim_bill(self.bill),
            patient_name,
            relationship,
            submission_date: Utc::now(),
        })
    }
}

/// Fields an owner may change on a pending claim; `None` keeps the current value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClaimEdit {
    /// New description
    pub description: Option<String>,
    /// New amount (does not re-charge the entitlement)
    pub amount: Option<f64>,
    /// New bill metadata
    pub bill: Option<BillDetails>,
    /// New patient name
    pub patient_name: Option<String>,
    /// New relationship
    pub relationship: Option<String>,
}

fn require_text(field: &'static str, value: &str, min_len: usize) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.chars().count() < min_len {
        return Err(Error::validation(
            field,
            format!("must be at least {min_len} characters"),
        ));
    }
    Ok(trimmed.to_string())
}

fn trim_bill(bill: BillDetails) -> BillDetails {
    let clean = |value: Option<String>| {
        value
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };
    BillDetails {
        bill_number: clean(bill.bill_number),
        bill_date: clean(bill.bill_date),
        hospital_name: clean(bill.hospital_name),
        doctor_name: clean(bill.doctor_name),
    }
}

/// Validates a submission and records it against the matching entitlement.
pub async fn submit_claim<S: LedgerStore>(
    ledger: &Ledger<S>,
    actor: Actor,
    form: ClaimForm,
) -> Result<Claim> {
    let claim = form.validate(actor.user_id)?;
    ledger.record_claim(claim).await
}

/// Claims visible to the actor, newest first.
pub async fn list_claims<S: LedgerStore>(ledger: &Ledger<S>, actor: Actor) -> Result<Vec<Claim>> {
    let mut claims = if actor.role.can_review() {
        ledger.store().claims().await?
    } else {
        ledger.store().claims_for_user(actor.user_id).await?
    };
    claims.sort_by(|a, b| {
        b.submission_date
            .cmp(&a.submission_date)
            .then(b.id.cmp(&a.id))
    });
    Ok(claims)
}

/// A single claim, if the actor may see it.
pub async fn get_claim<S: LedgerStore>(ledger: &Ledger<S>, actor: Actor, id: i64) -> Result<Claim> {
    let claim = ledger
        .store()
        .claim(id)
        .await?
        .ok_or(Error::ClaimNotFound { id })?;

    if !actor.role.can_review() && claim.user_id != actor.user_id {
        return Err(Error::forbidden("claim belongs to another officer"));
    }
    Ok(claim)
}

/// Owner edit of a pending claim.
///
/// Amount changes are stored as-is; the entitlement keeps the originally charged
/// amount, which stays recorded in `charged_amount`. When a review lands between
/// the read and the write, the edit is retried from a fresh read and then refused
/// because the claim is no longer pending.
pub async fn edit_claim<S: LedgerStore>(
    ledger: &Ledger<S>,
    actor: Actor,
    id: i64,
    edit: ClaimEdit,
) -> Result<Claim> {
    let mut attempt = 1;
    loop {
        let claim = get_claim(ledger, actor, id).await?;
        let edited = apply_edit(claim, actor, edit.clone())?;

        let err = match ledger.store().update_claim(edited, None).await {
            Ok(updated) => return Ok(updated),
            Err(e) => e,
        };
        if !ledger.retry_after_conflict(&err, attempt).await {
            return Err(err);
        }
        attempt += 1;
    }
}

fn apply_edit(mut claim: Claim, actor: Actor, edit: ClaimEdit) -> Result<Claim> {
    let id = claim.id;
    if claim.user_id != actor.user_id {
        return Err(Error::forbidden("only the submitting officer can edit a claim"));
    }
    if claim.status != ClaimStatus::Pending {
        return Err(Error::InvalidTransition {
            id,
            status: claim.status,
            action: "edit",
        });
    }

    if let Some(description) = edit.description {
        claim.description = require_text("description", &description, MIN_DESCRIPTION_LEN)?;
    }
    if let Some(amount) = edit.amount {
        validate_amount(amount)?;
        claim.amount = amount;
    }
    if let Some(bill) = edit.bill {
        claim.bill = trim_bill(bill);
    }
    if let Some(patient_name) = edit.patient_name {
        claim.patient_name = require_text("patient_name", &patient_name, MIN_PATIENT_NAME_LEN)?;
    }
    if let Some(relationship) = edit.relationship {
        claim.relationship = require_text("relationship", &relationship, 1)?;
    }
    Ok(claim)
}

/// Approve or reject a pending claim; reviewers only.
pub async fn review_claim<S: LedgerStore>(
    ledger: &Ledger<S>,
    actor: Actor,
    id: i64,
    decision: ReviewDecision,
) -> Result<Claim> {
    if !actor.role.can_review() {
        return Err(Error::forbidden("only admins and medical officers review claims"));
    }
    ledger.review_claim(id, actor.user_id, decision).await
}

/// Removes a claim; admins only. The entitlement is not adjusted.
pub async fn delete_claim<S: LedgerStore>(ledger: &Ledger<S>, actor: Actor, id: i64) -> Result<()> {
    if !actor.role.is_admin() {
        return Err(Error::forbidden("only admins delete claims"));
    }
    if !ledger.store().delete_claim(id).await? {
        return Err(Error::ClaimNotFound { id });
    }
    info!(claim_id = id, admin_id = actor.user_id, "Deleted claim");
    Ok(())
}

/// Administrative override of an entitlement's usage; admins only.
pub async fn adjust_entitlement<S: LedgerStore>(
    ledger: &Ledger<S>,
    actor: Actor,
    id: i64,
    delta: f64,
) -> Result<Entitlement> {
    if !actor.role.is_admin() {
        return Err(Error::forbidden("only admins adjust entitlements"));
    }
    ledger.adjust_entitlement(id, delta).await
}

/// Revises an entitlement's name, description, or budget cap; admins only.
pub async fn update_entitlement<S: LedgerStore>(
    ledger: &Ledger<S>,
    actor: Actor,
    id: i64,
    update: EntitlementUpdate,
) -> Result<Entitlement> {
    if !actor.role.is_admin() {
        return Err(Error::forbidden("only admins revise entitlements"));
    }
    ledger.update_entitlement(id, update).await
}
