//! Dashboard aggregation.
//!
//! Builds a read-only summary for one user from the ledger's entitlements and the
//! user's own claims and appointments. Entitlement totals are shared category pools,
//! so balances are system-wide while claim statistics are per user. Store failures
//! degrade the affected section to zeroes instead of failing the whole dashboard.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use tracing::warn;

use crate::{
    config::LedgerSettings,
    core::ledger::{Balance, Ledger},
    models::{Appointment, Category, Claim, ClaimStatus, Entitlement, MonthKey},
    store::LedgerStore,
};

/// Everything the dashboard page shows.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DashboardSnapshot {
    /// Σ entitlement totals for the active fiscal year
    pub total_entitlement: f64,
    /// Σ entitlement usage for the active fiscal year
    pub used_entitlement: f64,
    /// `total_entitlement - used_entitlement`
    pub available_balance: f64,
    /// Per-category breakdown
    pub entitlements: Vec<EntitlementSummary>,
    /// Number of the user's pending claims
    pub pending_claims_count: usize,
    /// Σ amount of the user's pending claims
    pub pending_claims_amount: f64,
    /// The user's latest claims, newest first
    pub recent_activity: Vec<ActivityEntry>,
    /// Earliest upcoming appointment
    pub next_appointment: Option<Appointment>,
    /// Per-month claimed amounts, oldest month first
    pub monthly_claims: Vec<MonthlyClaims>,
}

/// One entitlement row on the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntitlementSummary {
    /// Category
    pub category: Category,
    /// Display name
    pub name: String,
    /// Budget cap
    pub total_amount: f64,
    /// Consumed so far
    pub used_amount: f64,
    /// `total - used`, negative when over-claimed
    pub remaining: f64,
    /// `used / total * 100`, zero for an empty budget
    pub utilisation_percent: f64,
}

impl From<&Entitlement> for EntitlementSummary {
    fn from(entitlement: &Entitlement) -> Self {
        let utilisation_percent = if entitlement.total_amount > 0.0 {
            entitlement.used_amount / entitlement.total_amount * 100.0
        } else {
            0.0
        };
        Self {
            category: entitlement.category,
            name: entitlement.name.clone(),
            total_amount: entitlement.total_amount,
            used_amount: entitlement.used_amount,
            remaining: entitlement.remaining(),
            utilisation_percent,
        }
    }
}

/// A claim as shown in the recent-activity list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivityEntry {
    /// Claim id
    pub claim_id: i64,
    /// Submission date
    pub date: NaiveDate,
    /// Claim description
    pub description: String,
    /// Category charged
    pub category: Category,
    /// Claimed amount
    pub amount: f64,
    /// Review state
    pub status: ClaimStatus,
}

impl From<&Claim> for ActivityEntry {
    fn from(claim: &Claim) -> Self {
        Self {
            claim_id: claim.id,
            date: claim.submission_date.date_naive(),
            description: claim.description.clone(),
            category: claim.category,
            amount: claim.amount,
            status: claim.status,
        }
    }
}

/// Claimed amounts per category in one calendar month.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyClaims {
    /// Calendar month
    pub month: MonthKey,
    /// Domiciliary total
    pub domiciliary: f64,
    /// Chronic total
    pub chronic: f64,
    /// Hospitalization total
    pub hospitalization: f64,
}

impl MonthlyClaims {
    const fn empty(month: MonthKey) -> Self {
        Self {
            month,
            domiciliary: 0.0,
            chronic: 0.0,
            hospitalization: 0.0,
        }
    }

    fn add(&mut self, category: Category, amount: f64) {
        match category {
            Category::Domiciliary => self.domiciliary += amount,
            Category::Chronic => self.chronic += amount,
            Category::Hospitalization => self.hospitalization += amount,
        }
    }

    /// Sum across categories.
    #[must_use]
    pub fn total(&self) -> f64 {
        self.domiciliary + self.chronic + self.hospitalization
    }
}

/// Builds the dashboard for `user_id` as of `now`. Never fails.
pub async fn dashboard<S: LedgerStore>(
    store: &S,
    settings: &LedgerSettings,
    user_id: i64,
    now: DateTime<Utc>,
) -> DashboardSnapshot {
    let entitlements = store
        .entitlements(&settings.fiscal_year)
        .await
        .unwrap_or_else(|e| {
            warn!(error = %e, "Dashboard could not load entitlements");
            Vec::new()
        });
    let claims = store.claims_for_user(user_id).await.unwrap_or_else(|e| {
        warn!(error = %e, user_id, "Dashboard could not load claims");
        Vec::new()
    });
    let appointments = store
        .appointments_for_user(user_id)
        .await
        .unwrap_or_else(|e| {
            warn!(error = %e, user_id, "Dashboard could not load appointments");
            Vec::new()
        });

    let balance = Balance::of(&entitlements);
    let (pending_claims_count, pending_claims_amount) = pending_totals(&claims);

    DashboardSnapshot {
        total_entitlement: balance.total,
        used_entitlement: balance.used,
        available_balance: balance.available,
        entitlements: entitlements.iter().map(EntitlementSummary::from).collect(),
        pending_claims_count,
        pending_claims_amount,
        recent_activity: recent_activity(&claims, settings.recent_activity_limit),
        next_appointment: next_appointment(appointments, now),
        monthly_claims: monthly_breakdown(&claims, now, settings.monthly_window),
    }
}

impl<S: LedgerStore> Ledger<S> {
    /// Dashboard for `user_id` as of now.
    pub async fn dashboard(&self, user_id: i64) -> DashboardSnapshot {
        dashboard(self.store(), self.settings(), user_id, Utc::now()).await
    }
}

/// Count and sum of pending claims.
#[must_use]
pub fn pending_totals(claims: &[Claim]) -> (usize, f64) {
    claims
        .iter()
        .filter(|c| c.status == ClaimStatus::Pending)
        .fold((0, 0.0), |(count, sum), c| (count + 1, sum + c.amount))
}

/// Up to `limit` claims, newest submission first.
#[must_use]
pub fn recent_activity(claims: &[Claim], limit: usize) -> Vec<ActivityEntry> {
    let mut sorted: Vec<&Claim> = claims.iter().collect();
    sorted.sort_by(|a, b| {
        b.submission_date
            .cmp(&a.submission_date)
            .then(b.id.cmp(&a.id))
    });
    sorted
        .into_iter()
        .take(limit)
        .map(ActivityEntry::from)
        .collect()
}

/// Earliest appointment not in the past.
#[must_use]
pub fn next_appointment(appointments: Vec<Appointment>, now: DateTime<Utc>) -> Option<Appointment> {
    appointments
        .into_iter()
        .filter(|a| a.scheduled_at >= now)
        .min_by_key(|a| a.scheduled_at)
}

/// Claimed amounts for the `window` calendar months ending with `now`'s month,
/// oldest first. Months without claims are zero-filled.
#[must_use]
pub fn monthly_breakdown(claims: &[Claim], now: DateTime<Utc>, window: usize) -> Vec<MonthlyClaims> {
    let mut months = BTreeMap::new();
    let mut month = MonthKey::of(now.date_naive());
    for _ in 0..window {
        months.insert(month, MonthlyClaims::empty(month));
        month = month.previous();
    }

    for claim in claims {
        let key = MonthKey::of(claim.submission_date.date_naive());
        if let Some(bucket) = months.get_mut(&key) {
            bucket.add(claim.category, claim.amount);
        }
    }

    months.into_values().collect()
}
