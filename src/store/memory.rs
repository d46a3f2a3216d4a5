//! In-memory reference store.
//!
//! All tables sit behind one async mutex, so each trait operation is a single
//! critical section and the claim insert plus usage change can never interleave
//! with another writer.

use std::collections::BTreeMap;

use tokio::sync::Mutex;

use super::LedgerStore;
use crate::errors::{Error, Result};
use crate::models::{
    Appointment, Category, Claim, ClaimStatus, Entitlement, EntitlementUpdate, NewAppointment,
    NewClaim, NewEntitlement, UsageChange,
};

#[derive(Debug, Default)]
struct Tables {
    entitlements: BTreeMap<i64, Entitlement>,
    claims: BTreeMap<i64, Claim>,
    appointments: BTreeMap<i64, Appointment>,
    last_entitlement_id: i64,
    last_claim_id: i64,
    last_appointment_id: i64,
}

impl Tables {
    fn apply_usage(&mut self, usage: UsageChange) -> Result<Entitlement> {
        let entitlement = self
            .entitlements
            .get_mut(&usage.entitlement_id)
            .ok_or(Error::EntitlementNotFound {
                id: usage.entitlement_id,
            })?;

        if entitlement.version != usage.expected_version {
            return Err(Error::Conflict {
                entitlement_id: usage.entitlement_id,
                expected_version: usage.expected_version,
            });
        }
        if entitlement.used_amount + usage.delta < 0.0 {
            return Err(Error::NegativeUsage {
                entitlement_id: usage.entitlement_id,
                used_amount: entitlement.used_amount,
                delta: usage.delta,
            });
        }

        entitlement.used_amount += usage.delta;
        entitlement.version += 1;
        Ok(entitlement.clone())
    }
}

fn next_id(last: &mut i64) -> i64 {
    *last += 1;
    *last
}

/// Map-backed [`LedgerStore`]; construct one per ledger, there is no shared instance.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl LedgerStore for MemoryStore {
    async fn entitlements(&self, fiscal_year: &str) -> Result<Vec<Entitlement>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .entitlements
            .values()
            .filter(|e| e.fiscal_year == fiscal_year)
            .cloned()
            .collect())
    }

    async fn entitlement(&self, id: i64) -> Result<Option<Entitlement>> {
        Ok(self.tables.lock().await.entitlements.get(&id).cloned())
    }

    async fn entitlement_for_category(
        &self,
        category: Category,
        fiscal_year: &str,
    ) -> Result<Option<Entitlement>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .entitlements
            .values()
            .find(|e| e.category == category && e.fiscal_year == fiscal_year)
            .cloned())
    }

    async fn insert_entitlement(&self, entitlement: NewEntitlement) -> Result<Entitlement> {
        let mut tables = self.tables.lock().await;
        let duplicate = tables.entitlements.values().any(|e| {
            e.category == entitlement.category && e.fiscal_year == entitlement.fiscal_year
        });
        if duplicate {
            return Err(Error::DuplicateEntitlement {
                category: entitlement.category,
                fiscal_year: entitlement.fiscal_year,
            });
        }

        let id = next_id(&mut tables.last_entitlement_id);
        let stored = Entitlement {
            id,
            category: entitlement.category,
            name: entitlement.name,
            description: entitlement.description,
            total_amount: entitlement.total_amount,
            used_amount: entitlement.used_amount,
            fiscal_year: entitlement.fiscal_year,
            version: 0,
        };
        tables.entitlements.insert(id, stored.clone());
        Ok(stored)
    }

    async fn update_entitlement(&self, id: i64, update: EntitlementUpdate) -> Result<Entitlement> {
        let mut tables = self.tables.lock().await;
        let entitlement = tables
            .entitlements
            .get_mut(&id)
            .ok_or(Error::EntitlementNotFound { id })?;
        if let Some(name) = update.name {
            entitlement.name = name;
        }
        if let Some(description) = update.description {
            entitlement.description = description;
        }
        if let Some(total_amount) = update.total_amount {
            entitlement.total_amount = total_amount;
        }
        Ok(entitlement.clone())
    }

    async fn claims(&self) -> Result<Vec<Claim>> {
        Ok(self.tables.lock().await.claims.values().cloned().collect())
    }

    async fn claims_for_user(&self, user_id: i64) -> Result<Vec<Claim>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .claims
            .values()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn claim(&self, id: i64) -> Result<Option<Claim>> {
        Ok(self.tables.lock().await.claims.get(&id).cloned())
    }

    async fn insert_claim(&self, claim: NewClaim, usage: UsageChange) -> Result<Claim> {
        let mut tables = self.tables.lock().await;
        // Usage first: if the guard fails nothing has been written yet.
        tables.apply_usage(usage)?;

        let id = next_id(&mut tables.last_claim_id);
        let stored = Claim {
            id,
            user_id: claim.user_id,
            category: claim.category,
            description: claim.description,
            amount: claim.amount,
            bill: claim.bill,
            patient_name: claim.patient_name,
            relationship: claim.relationship,
            submission_date: claim.submission_date,
            status: ClaimStatus::Pending,
            approved_amount: None,
            approved_by: None,
            approved_at: None,
            rejection_reason: None,
            comments: None,
            charged_amount: usage.delta,
            version: 0,
        };
        tables.claims.insert(id, stored.clone());
        Ok(stored)
    }

    async fn update_claim(&self, mut claim: Claim, usage: Option<UsageChange>) -> Result<Claim> {
        let mut tables = self.tables.lock().await;
        let stored_version = tables
            .claims
            .get(&claim.id)
            .map(|c| c.version)
            .ok_or(Error::ClaimNotFound { id: claim.id })?;
        if stored_version != claim.version {
            return Err(Error::ClaimConflict {
                id: claim.id,
                expected_version: claim.version,
            });
        }
        if let Some(usage) = usage {
            tables.apply_usage(usage)?;
        }
        claim.version += 1;
        tables.claims.insert(claim.id, claim.clone());
        Ok(claim)
    }

    async fn delete_claim(&self, id: i64) -> Result<bool> {
        Ok(self.tables.lock().await.claims.remove(&id).is_some())
    }

    async fn apply_usage(&self, usage: UsageChange) -> Result<Entitlement> {
        self.tables.lock().await.apply_usage(usage)
    }

    async fn appointments_for_user(&self, user_id: i64) -> Result<Vec<Appointment>> {
        let tables = self.tables.lock().await;
        let mut appointments: Vec<Appointment> = tables
            .appointments
            .values()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect();
        appointments.sort_by_key(|a| a.scheduled_at);
        Ok(appointments)
    }

    async fn insert_appointment(&self, appointment: NewAppointment) -> Result<Appointment> {
        let mut tables = self.tables.lock().await;
        let id = next_id(&mut tables.last_appointment_id);
        let stored = Appointment {
            id,
            user_id: appointment.user_id,
            doctor_name: appointment.doctor_name,
            specialization: appointment.specialization,
            location: appointment.location,
            scheduled_at: appointment.scheduled_at,
        };
        tables.appointments.insert(id, stored.clone());
        Ok(stored)
    }
}
