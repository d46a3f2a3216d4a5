//! Shared test utilities for the claims ledger.
//!
//! This module provides helpers for setting up stores and ledgers with the
//! standard seed data, a contract check run against every store adapter, and
//! store wrappers that inject competing writes to exercise conflict handling.

#![allow(clippy::unwrap_used)]
#![allow(clippy::float_cmp)]

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use chrono::{Duration, Utc};
use sea_orm::DatabaseConnection;

use crate::{
    config::{Config, LedgerSettings, ReconcilePolicy},
    core::{claim::ClaimForm, ledger::Ledger, seed},
    errors::{Error, Result},
    models::{
        Actor, Appointment, BillDetails, Category, Claim, ClaimStatus, Entitlement,
        EntitlementUpdate, NewAppointment, NewClaim, NewEntitlement, Role, UsageChange,
    },
    store::{LedgerStore, MemoryStore},
};

/// Fiscal year used by the default seed data.
pub const FISCAL_YEAR: &str = "2023-24";

/// Creates an in-memory `SQLite` database with all tables initialized.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Default settings with a short backoff so retry tests stay fast.
pub fn test_settings() -> LedgerSettings {
    LedgerSettings {
        retry_backoff_ms: 1,
        ..LedgerSettings::default()
    }
}

/// A validated claim submitted now.
pub fn new_claim(user_id: i64, category: Category, amount: f64) -> NewClaim {
    NewClaim {
        user_id,
        category,
        description: "Consultation and medicines".to_string(),
        amount,
        bill: BillDetails::default(),
        patient_name: "Self".to_string(),
        relationship: "self".to_string(),
        submission_date: Utc::now(),
    }
}

/// A form that passes validation.
pub fn claim_form(category: &str, amount: f64) -> ClaimForm {
    ClaimForm {
        category: category.to_string(),
        description: "Lab tests - blood work".to_string(),
        amount,
        bill: BillDetails {
            bill_number: Some("B-1042".to_string()),
            bill_date: Some("2023-06-10".to_string()),
            hospital_name: Some("Referral Hospital".to_string()),
            doctor_name: Some("Dr. Mehra".to_string()),
        },
        patient_name: "Asha Devi".to_string(),
        relationship: "spouse".to_string(),
    }
}

/// Officer actor with the given id.
pub const fn officer(user_id: i64) -> Actor {
    Actor::new(user_id, Role::Officer)
}

/// Admin actor.
pub const fn admin() -> Actor {
    Actor::new(1000, Role::Admin)
}

/// Medical officer actor.
pub const fn medical_officer() -> Actor {
    Actor::new(2000, Role::MedicalOfficer)
}

/// Inserts a domiciliary entitlement for [`FISCAL_YEAR`].
pub async fn seed_domiciliary<S: LedgerStore>(
    store: &S,
    total_amount: f64,
    used_amount: f64,
) -> Result<Entitlement> {
    store
        .insert_entitlement(NewEntitlement {
            category: Category::Domiciliary,
            name: "Domiciliary".to_string(),
            description: "Regular outpatient expenses and medications".to_string(),
            total_amount,
            used_amount,
            fiscal_year: FISCAL_YEAR.to_string(),
        })
        .await
}

/// Memory-backed ledger seeded with the three default entitlements.
pub async fn seeded_memory_ledger() -> Result<Ledger<MemoryStore>> {
    seeded_memory_ledger_with(ReconcilePolicy::Retain).await
}

/// Same as [`seeded_memory_ledger`] with a chosen reconcile policy.
pub async fn seeded_memory_ledger_with(policy: ReconcilePolicy) -> Result<Ledger<MemoryStore>> {
    let store = MemoryStore::new();
    seed::seed_fiscal_year(&store, &Config::default()).await?;
    let settings = LedgerSettings {
        reconcile_policy: policy,
        ..test_settings()
    };
    Ok(Ledger::new(store, settings))
}

/// Current entitlement for a category in the ledger's fiscal year.
pub async fn entitlement_for<S: LedgerStore>(
    ledger: &Ledger<S>,
    category: Category,
) -> Result<Entitlement> {
    Ok(ledger
        .store()
        .entitlement_for_category(category, &ledger.settings().fiscal_year)
        .await?
        .unwrap())
}

/// Behaviour every [`LedgerStore`] adapter must share.
pub async fn check_store_contract<S: LedgerStore>(store: &S) -> Result<()> {
    // Entitlements: one per category per year
    let domiciliary = seed_domiciliary(store, 25_000.0, 12_500.0).await?;
    assert_eq!(domiciliary.version, 0);
    let chronic = store
        .insert_entitlement(NewEntitlement {
            category: Category::Chronic,
            name: "Chronic".to_string(),
            description: "Long-term medication".to_string(),
            total_amount: 15_000.0,
            used_amount: 3_250.0,
            fiscal_year: FISCAL_YEAR.to_string(),
        })
        .await?;
    let duplicate = seed_domiciliary(store, 1.0, 0.0).await;
    assert!(matches!(
        duplicate,
        Err(Error::DuplicateEntitlement {
            category: Category::Domiciliary,
            ..
        })
    ));

    let listed = store.entitlements(FISCAL_YEAR).await?;
    assert_eq!(listed, vec![domiciliary.clone(), chronic.clone()]);
    assert!(store.entitlements("2024-25").await?.is_empty());
    assert_eq!(
        store
            .entitlement_for_category(Category::Chronic, FISCAL_YEAR)
            .await?,
        Some(chronic.clone())
    );
    assert!(
        store
            .entitlement_for_category(Category::Hospitalization, FISCAL_YEAR)
            .await?
            .is_none()
    );

    // Claim insert applies usage atomically
    let first = store
        .insert_claim(
            new_claim(1, Category::Domiciliary, 1_500.0),
            UsageChange::against(&domiciliary, 1_500.0),
        )
        .await?;
    assert_eq!(first.status, ClaimStatus::Pending);
    assert_eq!(first.charged_amount, 1_500.0);
    assert_eq!(first.version, 0);
    let domiciliary = store.entitlement(domiciliary.id).await?.unwrap();
    assert_eq!(domiciliary.used_amount, 14_000.0);
    assert_eq!(domiciliary.version, 1);

    let second = store
        .insert_claim(
            new_claim(2, Category::Chronic, 250.0),
            UsageChange::against(&chronic, 250.0),
        )
        .await?;
    assert_eq!(store.claims().await?.len(), 2);
    assert_eq!(store.claims_for_user(1).await?, vec![first.clone()]);
    assert_eq!(store.claim(second.id).await?, Some(second.clone()));
    assert!(store.claim(9_999).await?.is_none());

    // Stale version is refused and changes nothing
    let stale = store
        .apply_usage(UsageChange::against(&chronic, 10.0))
        .await;
    assert!(matches!(stale, Err(Error::Conflict { .. })));
    let missing = store
        .apply_usage(UsageChange {
            entitlement_id: 9_999,
            expected_version: 0,
            delta: 1.0,
        })
        .await;
    assert!(matches!(missing, Err(Error::EntitlementNotFound { id: 9_999 })));

    // Usage never drops below zero
    let chronic = store.entitlement(chronic.id).await?.unwrap();
    let overdrawn = store
        .apply_usage(UsageChange::against(&chronic, -10_000.0))
        .await;
    assert!(matches!(overdrawn, Err(Error::NegativeUsage { .. })));
    assert_eq!(store.entitlement(chronic.id).await?, Some(chronic.clone()));

    // Updating a claim together with a release bumps the claim version
    let mut rejected: Claim = second.clone();
    rejected.status = ClaimStatus::Rejected;
    rejected.rejection_reason = Some("Not covered".to_string());
    rejected.charged_amount = 0.0;
    let updated = store
        .update_claim(rejected.clone(), Some(UsageChange::against(&chronic, -250.0)))
        .await?;
    assert_eq!(updated.version, 1);
    assert_eq!(updated.status, ClaimStatus::Rejected);
    assert_eq!(updated.charged_amount, 0.0);
    assert_eq!(store.claim(second.id).await?, Some(updated.clone()));
    let chronic = store.entitlement(chronic.id).await?.unwrap();
    assert_eq!(chronic.used_amount, 3_250.0);

    // A write based on the old version is refused and changes nothing
    let mut stale = rejected;
    stale.status = ClaimStatus::Pending;
    let result = store
        .update_claim(stale, Some(UsageChange::against(&chronic, -100.0)))
        .await;
    assert!(matches!(
        result,
        Err(Error::ClaimConflict {
            expected_version: 0,
            ..
        })
    ));
    assert_eq!(store.claim(second.id).await?, Some(updated));
    assert_eq!(store.entitlement(chronic.id).await?, Some(chronic.clone()));

    // Budget revisions leave usage and version alone
    let revised = store
        .update_entitlement(
            chronic.id,
            EntitlementUpdate {
                total_amount: Some(18_000.0),
                description: Some("Chronic medication".to_string()),
                ..EntitlementUpdate::default()
            },
        )
        .await?;
    assert_eq!(revised.total_amount, 18_000.0);
    assert_eq!(revised.description, "Chronic medication");
    assert_eq!(revised.name, chronic.name);
    assert_eq!(revised.used_amount, chronic.used_amount);
    assert_eq!(revised.version, chronic.version);
    assert!(matches!(
        store
            .update_entitlement(9_999, EntitlementUpdate::default())
            .await,
        Err(Error::EntitlementNotFound { id: 9_999 })
    ));

    let mut ghost = first.clone();
    ghost.id = 9_999;
    assert!(matches!(
        store.update_claim(ghost, None).await,
        Err(Error::ClaimNotFound { id: 9_999 })
    ));

    // Delete
    assert!(store.delete_claim(first.id).await?);
    assert!(!store.delete_claim(first.id).await?);

    // Appointments come back earliest first
    let now = Utc::now();
    let later = appointment(1, now + Duration::days(30));
    let sooner = appointment(1, now + Duration::days(3));
    store.insert_appointment(later).await?;
    let stored_sooner: Appointment = store.insert_appointment(sooner).await?;
    let appointments = store.appointments_for_user(1).await?;
    assert_eq!(appointments.len(), 2);
    assert_eq!(appointments[0], stored_sooner);
    assert!(store.appointments_for_user(2).await?.is_empty());

    Ok(())
}

/// An appointment with a cardiologist at the given time.
pub fn appointment(user_id: i64, scheduled_at: chrono::DateTime<Utc>) -> NewAppointment {
    NewAppointment {
        user_id,
        doctor_name: "Dr. Mehra".to_string(),
        specialization: "Cardiologist".to_string(),
        location: "Referral Hospital, Delhi".to_string(),
        scheduled_at,
    }
}

/// Store wrapper that lets another writer bump the targeted entitlement right
/// before each of the next `interferences` guarded writes, forcing a conflict.
pub struct ContendedStore<S> {
    inner: S,
    interferences: AtomicU32,
}

impl<S: LedgerStore> ContendedStore<S> {
    /// Wraps `inner`, interfering with the next `interferences` guarded writes.
    pub const fn new(inner: S, interferences: u32) -> Self {
        Self {
            inner,
            interferences: AtomicU32::new(interferences),
        }
    }

    /// The wrapped store.
    pub const fn inner(&self) -> &S {
        &self.inner
    }

    /// Competing write of 50 against the entitlement.
    async fn interfere(&self, entitlement_id: i64) -> Result<()> {
        let remaining = self
            .interferences
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if remaining.is_ok() {
            let current = self.inner.entitlement(entitlement_id).await?.unwrap();
            self.inner
                .apply_usage(UsageChange::against(&current, 50.0))
                .await?;
        }
        Ok(())
    }
}

impl<S: LedgerStore> LedgerStore for ContendedStore<S> {
    async fn entitlements(&self, fiscal_year: &str) -> Result<Vec<Entitlement>> {
        self.inner.entitlements(fiscal_year).await
    }

    async fn entitlement(&self, id: i64) -> Result<Option<Entitlement>> {
        self.inner.entitlement(id).await
    }

    async fn entitlement_for_category(
        &self,
        category: Category,
        fiscal_year: &str,
    ) -> Result<Option<Entitlement>> {
        self.inner
            .entitlement_for_category(category, fiscal_year)
            .await
    }

    async fn insert_entitlement(&self, entitlement: NewEntitlement) -> Result<Entitlement> {
        self.inner.insert_entitlement(entitlement).await
    }

    async fn update_entitlement(&self, id: i64, update: EntitlementUpdate) -> Result<Entitlement> {
        self.inner.update_entitlement(id, update).await
    }

    async fn claims(&self) -> Result<Vec<Claim>> {
        self.inner.claims().await
    }

    async fn claims_for_user(&self, user_id: i64) -> Result<Vec<Claim>> {
        self.inner.claims_for_user(user_id).await
    }

    async fn claim(&self, id: i64) -> Result<Option<Claim>> {
        self.inner.claim(id).await
    }

    async fn insert_claim(&self, claim: NewClaim, usage: UsageChange) -> Result<Claim> {
        self.interfere(usage.entitlement_id).await?;
        self.inner.insert_claim(claim, usage).await
    }

    async fn update_claim(&self, claim: Claim, usage: Option<UsageChange>) -> Result<Claim> {
        if let Some(usage) = usage {
            self.interfere(usage.entitlement_id).await?;
        }
        self.inner.update_claim(claim, usage).await
    }

    async fn delete_claim(&self, id: i64) -> Result<bool> {
        self.inner.delete_claim(id).await
    }

    async fn apply_usage(&self, usage: UsageChange) -> Result<Entitlement> {
        self.interfere(usage.entitlement_id).await?;
        self.inner.apply_usage(usage).await
    }

    async fn appointments_for_user(&self, user_id: i64) -> Result<Vec<Appointment>> {
        self.inner.appointments_for_user(user_id).await
    }

    async fn insert_appointment(&self, appointment: NewAppointment) -> Result<Appointment> {
        self.inner.insert_appointment(appointment).await
    }
}

/// Store wrapper where another reviewer rejects the claim right before the next
/// claim write, after the caller has already read it as pending.
pub struct ReviewRaceStore<S> {
    inner: S,
    armed: AtomicBool,
}

impl<S: LedgerStore> ReviewRaceStore<S> {
    /// Wraps `inner`; the competing rejection fires once.
    pub const fn new(inner: S) -> Self {
        Self {
            inner,
            armed: AtomicBool::new(true),
        }
    }

    /// The wrapped store.
    pub const fn inner(&self) -> &S {
        &self.inner
    }

    async fn reject_first(&self, id: i64) -> Result<()> {
        if self.armed.swap(false, Ordering::SeqCst) {
            let mut current = self.inner.claim(id).await?.unwrap();
            current.status = ClaimStatus::Rejected;
            current.rejection_reason = Some("Rejected by another reviewer".to_string());
            self.inner.update_claim(current, None).await?;
        }
        Ok(())
    }
}

impl<S: LedgerStore> LedgerStore for ReviewRaceStore<S> {
    async fn entitlements(&self, fiscal_year: &str) -> Result<Vec<Entitlement>> {
        self.inner.entitlements(fiscal_year).await
    }

    async fn entitlement(&self, id: i64) -> Result<Option<Entitlement>> {
        self.inner.entitlement(id).await
    }

    async fn entitlement_for_category(
        &self,
        category: Category,
        fiscal_year: &str,
    ) -> Result<Option<Entitlement>> {
        self.inner
            .entitlement_for_category(category, fiscal_year)
            .await
    }

    async fn insert_entitlement(&self, entitlement: NewEntitlement) -> Result<Entitlement> {
        self.inner.insert_entitlement(entitlement).await
    }

    async fn update_entitlement(&self, id: i64, update: EntitlementUpdate) -> Result<Entitlement> {
        self.inner.update_entitlement(id, update).await
    }

    async fn claims(&self) -> Result<Vec<Claim>> {
        self.inner.claims().await
    }

    async fn claims_for_user(&self, user_id: i64) -> Result<Vec<Claim>> {
        self.inner.claims_for_user(user_id).await
    }

    async fn claim(&self, id: i64) -> Result<Option<Claim>> {
        self.inner.claim(id).await
    }

    async fn insert_claim(&self, claim: NewClaim, usage: UsageChange) -> Result<Claim> {
        self.inner.insert_claim(claim, usage).await
    }

    async fn update_claim(&self, claim: Claim, usage: Option<UsageChange>) -> Result<Claim> {
        self.reject_first(claim.id).await?;
        self.inner.update_claim(claim, usage).await
    }

    async fn delete_claim(&self, id: i64) -> Result<bool> {
        self.inner.delete_claim(id).await
    }

    async fn apply_usage(&self, usage: UsageChange) -> Result<Entitlement> {
        self.inner.apply_usage(usage).await
    }

    async fn appointments_for_user(&self, user_id: i64) -> Result<Vec<Appointment>> {
        self.inner.appointments_for_user(user_id).await
    }

    async fn insert_appointment(&self, appointment: NewAppointment) -> Result<Appointment> {
        self.inner.insert_appointment(appointment).await
    }
}
