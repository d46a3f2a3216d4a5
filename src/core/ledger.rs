//! Entitlement ledger - the sole writer of `used_amount`.
//!
//! Every mutation is a read-then-guarded-write: the ledger reads the entitlement,
//! computes a [`UsageChange`] against the version it saw, and hands both the claim
//! write and the usage change to the store as one atomic unit. When another writer
//! got there first the store answers with a conflict and the ledger retries from a
//! fresh read, backing off a little longer on each attempt.

use std::time::Duration;

use chrono::Utc;
use tracing::{error, info, instrument, warn};

use crate::{
    config::{LedgerSettings, ReconcilePolicy},
    errors::{Error, Result},
    models::{Category, Claim, ClaimStatus, Entitlement, EntitlementUpdate, NewClaim, UsageChange},
    store::LedgerStore,
};

/// Outcome chosen by a reviewer for a pending claim.
#[derive(Debug, Clone, PartialEq)]
pub enum ReviewDecision {
    /// Accept the claim, optionally for less than was claimed
    Approve {
        /// Amount granted; defaults to the claimed amount
        approved_amount: Option<f64>,
        /// Reviewer comments
        comments: Option<String>,
    },
    /// Decline the claim
    Reject {
        /// Reason shown to the claimant
        reason: String,
        /// Reviewer comments
        comments: Option<String>,
    },
}

/// System-wide entitlement totals for the active fiscal year.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Balance {
    /// Σ `total_amount`
    pub total: f64,
    /// Σ `used_amount`
    pub used: f64,
    /// `total - used`
    pub available: f64,
}

impl Balance {
    /// Sums totals and usage across entitlements.
    #[must_use]
    pub fn of(entitlements: &[Entitlement]) -> Self {
        let total: f64 = entitlements.iter().map(|e| e.total_amount).sum();
        let used: f64 = entitlements.iter().map(|e| e.used_amount).sum();
        Self {
            total,
            used,
            available: total - used,
        }
    }
}

/// Rejects zero, negative, and non-finite amounts.
pub fn validate_amount(amount: f64) -> Result<()> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(Error::InvalidAmount { amount });
    }
    Ok(())
}

/// Keeps entitlement usage consistent with the claims recorded against it.
#[derive(Debug)]
pub struct Ledger<S> {
    store: S,
    settings: LedgerSettings,
}

impl<S: LedgerStore> Ledger<S> {
    /// Creates a ledger over an explicitly constructed store.
    #[must_use]
    pub const fn new(store: S, settings: LedgerSettings) -> Self {
        Self { store, settings }
    }

    /// The backing store.
    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Active settings.
    #[must_use]
    pub const fn settings(&self) -> &LedgerSettings {
        &self.settings
    }

    /// Records a validated claim as pending and charges its amount to the matching
    /// entitlement in one atomic step.
    ///
    /// # Errors
    /// - `InvalidAmount` for zero, negative, or non-finite amounts (nothing is written)
    /// - `Configuration` when the category has no entitlement this fiscal year
    /// - `Conflict` once `max_attempts` guarded writes have all lost a race
    #[instrument(skip(self, claim), fields(user_id = claim.user_id, category = %claim.category, amount = claim.amount))]
    pub async fn record_claim(&self, claim: NewClaim) -> Result<Claim> {
        validate_amount(claim.amount)?;

        let mut attempt = 1;
        loop {
            let entitlement = self.active_entitlement(claim.category).await?;
            let usage = UsageChange::against(&entitlement, claim.amount);

            let err = match self.store.insert_claim(claim.clone(), usage).await {
                Ok(recorded) => {
                    info!(
                        claim_id = recorded.id,
                        used_amount = entitlement.used_amount + claim.amount,
                        "Recorded claim"
                    );
                    return Ok(recorded);
                }
                Err(e) => e,
            };
            if !self.retry_after_conflict(&err, attempt).await {
                return Err(err);
            }
            attempt += 1;
        }
    }

    /// All entitlements of the active fiscal year.
    pub async fn list_entitlements(&self) -> Result<Vec<Entitlement>> {
        self.store.entitlements(&self.settings.fiscal_year).await
    }

    /// Totals across the active fiscal year's entitlements.
    pub async fn balance(&self) -> Result<Balance> {
        Ok(Balance::of(&self.list_entitlements().await?))
    }

    /// Administrative correction of an entitlement's usage by `delta`.
    ///
    /// # Errors
    /// - `InvalidAmount` for a non-finite delta
    /// - `EntitlementNotFound` for an unknown id
    /// - `Validation` when usage would drop below zero
    #[instrument(skip(self))]
    pub async fn adjust_entitlement(&self, id: i64, delta: f64) -> Result<Entitlement> {
        if !delta.is_finite() {
            return Err(Error::InvalidAmount { amount: delta });
        }

        let mut attempt = 1;
        loop {
            let entitlement = self
                .store
                .entitlement(id)
                .await?
                .ok_or(Error::EntitlementNotFound { id })?;

            if entitlement.used_amount + delta < 0.0 {
                return Err(Error::validation(
                    "delta",
                    format!(
                        "usage of {} would become negative ({} {delta:+})",
                        entitlement.category, entitlement.used_amount
                    ),
                ));
            }

            let err = match self
                .store
                .apply_usage(UsageChange::against(&entitlement, delta))
                .await
            {
                Ok(adjusted) => {
                    info!(used_amount = adjusted.used_amount, "Adjusted entitlement");
                    return Ok(adjusted);
                }
                Err(e) => e,
            };
            if !self.retry_after_conflict(&err, attempt).await {
                return Err(err);
            }
            attempt += 1;
        }
    }

    /// Revises an entitlement's name, description, or budget cap.
    ///
    /// # Errors
    /// - `InvalidAmount` for a negative or non-finite cap
    /// - `Validation` for a blank name
    /// - `EntitlementNotFound` for an unknown id
    #[instrument(skip(self, update))]
    pub async fn update_entitlement(
        &self,
        id: i64,
        mut update: EntitlementUpdate,
    ) -> Result<Entitlement> {
        if let Some(total) = update.total_amount {
            if !total.is_finite() || total < 0.0 {
                return Err(Error::InvalidAmount { amount: total });
            }
        }
        if let Some(name) = update.name.as_mut() {
            let trimmed = name.trim();
            if trimmed.is_empty() {
                return Err(Error::validation("name", "must not be blank"));
            }
            *name = trimmed.to_string();
        }

        let updated = self.store.update_entitlement(id, update).await?;
        info!(
            total_amount = updated.total_amount,
            used_amount = updated.used_amount,
            "Updated entitlement"
        );
        Ok(updated)
    }

    /// Moves a pending claim to approved or rejected.
    ///
    /// Under [`ReconcilePolicy::Retain`] the entitlement is left alone. Under
    /// [`ReconcilePolicy::ReleaseOnRejection`] a rejection gives back what the claim
    /// still holds (`charged_amount`) and a partial approval gives back whatever is
    /// held beyond the approved amount, atomically with the status change.
    ///
    /// # Errors
    /// - `ClaimNotFound` for an unknown id
    /// - `InvalidTransition` when the claim is no longer pending, including when
    ///   another writer reviewed it first
    /// - `InvalidAmount`/`Validation` for an unusable approved amount
    #[instrument(skip(self, decision))]
    pub async fn review_claim(
        &self,
        claim_id: i64,
        reviewer_id: i64,
        decision: ReviewDecision,
    ) -> Result<Claim> {
        let mut attempt = 1;
        loop {
            let claim = self
                .store
                .claim(claim_id)
                .await?
                .ok_or(Error::ClaimNotFound { id: claim_id })?;

            if claim.status != ClaimStatus::Pending {
                return Err(Error::InvalidTransition {
                    id: claim_id,
                    status: claim.status,
                    action: "review",
                });
            }

            let (mut reviewed, releasable) = apply_decision(claim, reviewer_id, &decision)?;
            let released = match self.settings.reconcile_policy {
                ReconcilePolicy::ReleaseOnRejection if releasable > 0.0 => releasable,
                _ => 0.0,
            };
            let usage = if released > 0.0 {
                let entitlement = self.active_entitlement(reviewed.category).await?;
                reviewed.charged_amount -= released;
                Some(UsageChange::against(&entitlement, -released))
            } else {
                None
            };

            let err = match self.store.update_claim(reviewed, usage).await {
                Ok(updated) => {
                    info!(status = %updated.status, released, "Reviewed claim");
                    return Ok(updated);
                }
                Err(e) => e,
            };
            if !self.retry_after_conflict(&err, attempt).await {
                return Err(err);
            }
            attempt += 1;
        }
    }

    async fn active_entitlement(&self, category: Category) -> Result<Entitlement> {
        let fiscal_year = &self.settings.fiscal_year;
        self.store
            .entitlement_for_category(category, fiscal_year)
            .await?
            .ok_or_else(|| {
                error!(%category, %fiscal_year, "No entitlement seeded for category");
                Error::Configuration {
                    category,
                    fiscal_year: fiscal_year.clone(),
                }
            })
    }

    /// Sleeps and returns true when `err` is a conflict with attempts to spare.
    pub(crate) async fn retry_after_conflict(&self, err: &Error, attempt: u32) -> bool {
        let conflicted = matches!(err, Error::Conflict { .. } | Error::ClaimConflict { .. });
        if !conflicted || attempt >= self.settings.max_attempts {
            return false;
        }
        warn!(attempt, %err, "Concurrent update, retrying");
        let backoff = self.settings.retry_backoff_ms.saturating_mul(u64::from(attempt));
        tokio::time::sleep(Duration::from_millis(backoff)).await;
        true
    }
}

/// Applies a review decision, returning the updated claim and the amount that
/// would be released back to the entitlement under a reconciling policy.
///
/// The releasable amount never exceeds what the claim still holds, so edits to
/// `amount` after submission cannot release usage that was never charged.
fn apply_decision(
    mut claim: Claim,
    reviewer_id: i64,
    decision: &ReviewDecision,
) -> Result<(Claim, f64)> {
    match decision {
        ReviewDecision::Approve {
            approved_amount,
            comments,
        } => {
            let approved = approved_amount.unwrap_or(claim.amount);
            validate_amount(approved)?;
            if approved > claim.amount {
                return Err(Error::validation(
                    "approved_amount",
                    format!(
                        "approved {approved} exceeds claimed {}",
                        claim.amount
                    ),
                ));
            }
            let released = (claim.charged_amount - approved).max(0.0);
            claim.status = ClaimStatus::Approved;
            claim.approved_amount = Some(approved);
            claim.approved_by = Some(reviewer_id);
            claim.approved_at = Some(Utc::now());
            claim.comments.clone_from(comments);
            Ok((claim, released))
        }
        ReviewDecision::Reject { reason, comments } => {
            if reason.trim().is_empty() {
                return Err(Error::validation(
                    "rejection_reason",
                    "a reason is required",
                ));
            }
            let released = claim.charged_amount.max(0.0);
            claim.status = ClaimStatus::Rejected;
            claim.rejection_reason = Some(reason.trim().to_string());
            claim.comments.clone_from(comments);
            Ok((claim, released))
        }
    }
}
