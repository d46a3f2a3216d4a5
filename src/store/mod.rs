//! Persistence collaborator for the ledger.
//!
//! [`LedgerStore`] is the only interface the ledger, claims service, and dashboard
//! use to reach storage. Two adapters implement it: [`MemoryStore`] (reference
//! implementation, used by tests and demos) and [`DatabaseStore`] (`SeaORM`).
//!
//! Every write that touches `used_amount` goes through a [`UsageChange`], which is
//! applied only when the entitlement still has the version the caller read. A
//! mismatch writes nothing and returns [`Error::Conflict`](crate::errors::Error::Conflict),
//! leaving retry decisions to the ledger. A change that would take `used_amount`
//! below zero is refused with [`Error::NegativeUsage`](crate::errors::Error::NegativeUsage).
//!
//! Claim rows carry their own `version`: [`LedgerStore::update_claim`] writes only
//! when the stored claim still has the version the caller read, so an edit and a
//! review racing on the same claim cannot silently overwrite each other.

mod database;
mod memory;

pub use database::DatabaseStore;
pub use memory::MemoryStore;

use std::future::Future;

use crate::errors::Result;
use crate::models::{
    Appointment, Category, Claim, Entitlement, EntitlementUpdate, NewAppointment, NewClaim,
    NewEntitlement, UsageChange,
};

/// Storage operations for entitlements, claims, and appointments.
pub trait LedgerStore: Send + Sync {
    /// All entitlements of a fiscal year, ordered by id.
    fn entitlements(&self, fiscal_year: &str)
    -> impl Future<Output = Result<Vec<Entitlement>>> + Send;

    /// Entitlement by id.
    fn entitlement(&self, id: i64) -> impl Future<Output = Result<Option<Entitlement>>> + Send;

    /// The entitlement for a category within a fiscal year.
    fn entitlement_for_category(
        &self,
        category: Category,
        fiscal_year: &str,
    ) -> impl Future<Output = Result<Option<Entitlement>>> + Send;

    /// Inserts an entitlement with version 0.
    ///
    /// Fails with `DuplicateEntitlement` when the category already has one in that year.
    fn insert_entitlement(
        &self,
        entitlement: NewEntitlement,
    ) -> impl Future<Output = Result<Entitlement>> + Send;

    /// Revises name, description, or budget cap. Usage and version are untouched.
    fn update_entitlement(
        &self,
        id: i64,
        update: EntitlementUpdate,
    ) -> impl Future<Output = Result<Entitlement>> + Send;

    /// Every claim, in id order.
    fn claims(&self) -> impl Future<Output = Result<Vec<Claim>>> + Send;

    /// Claims submitted by one user, in id order.
    fn claims_for_user(&self, user_id: i64) -> impl Future<Output = Result<Vec<Claim>>> + Send;

    /// Claim by id.
    fn claim(&self, id: i64) -> impl Future<Output = Result<Option<Claim>>> + Send;

    /// Inserts a pending claim and applies `usage` as one atomic unit.
    ///
    /// The claim starts at version 0 with `charged_amount = usage.delta`.
    fn insert_claim(
        &self,
        claim: NewClaim,
        usage: UsageChange,
    ) -> impl Future<Output = Result<Claim>> + Send;

    /// Overwrites a claim, optionally applying `usage` in the same atomic unit.
    ///
    /// Fails with `ClaimConflict` when the stored claim's version differs from
    /// `claim.version`; on success the returned claim carries the bumped version.
    fn update_claim(
        &self,
        claim: Claim,
        usage: Option<UsageChange>,
    ) -> impl Future<Output = Result<Claim>> + Send;

    /// Removes a claim. Returns whether it existed.
    fn delete_claim(&self, id: i64) -> impl Future<Output = Result<bool>> + Send;

    /// Applies a guarded usage change on its own and returns the updated entitlement.
    fn apply_usage(&self, usage: UsageChange) -> impl Future<Output = Result<Entitlement>> + Send;

    /// Appointments of a user, earliest first.
    fn appointments_for_user(
        &self,
        user_id: i64,
    ) -> impl Future<Output = Result<Vec<Appointment>>> + Send;

    /// Inserts an appointment.
    fn insert_appointment(
        &self,
        appointment: NewAppointment,
    ) -> impl Future<Output = Result<Appointment>> + Send;
}
