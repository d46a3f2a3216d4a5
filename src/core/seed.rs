//! Seeds the store from configuration.
//!
//! Entitlements are created once per category per fiscal year; reruns skip the
//! ones that already exist, so seeding is safe on every start.

use tracing::{info, warn};

use crate::{
    config::{
        Config,
        ledger::{AppointmentConfig, EntitlementConfig},
    },
    errors::{Error, Result},
    models::{NewAppointment, NewEntitlement},
    store::LedgerStore,
};

/// What a seeding run did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedReport {
    /// Entitlements newly inserted
    pub entitlements_inserted: usize,
    /// Entitlements already present
    pub entitlements_skipped: usize,
    /// Appointments newly inserted
    pub appointments_inserted: usize,
}

/// Inserts the configured entitlements for the configured fiscal year, plus any
/// configured appointments not stored yet.
///
/// Every configured amount is checked before anything is written.
pub async fn seed_fiscal_year<S: LedgerStore>(store: &S, config: &Config) -> Result<SeedReport> {
    config
        .entitlements
        .iter()
        .try_for_each(validate_entitlement)?;

    let fiscal_year = &config.ledger.fiscal_year;
    info!(
        "Seeding {} entitlements for fiscal year {fiscal_year}",
        config.entitlements.len()
    );

    let mut report = SeedReport::default();
    for entitlement in &config.entitlements {
        let new = NewEntitlement {
            category: entitlement.category,
            name: entitlement.name.clone(),
            description: entitlement.description.clone(),
            total_amount: entitlement.total_amount,
            used_amount: entitlement.used_amount,
            fiscal_year: fiscal_year.clone(),
        };
        match store.insert_entitlement(new).await {
            Ok(_) => report.entitlements_inserted += 1,
            Err(Error::DuplicateEntitlement { category, .. }) => {
                warn!("Entitlement '{category}' for {fiscal_year} already exists. Skipping.");
                report.entitlements_skipped += 1;
            }
            Err(e) => return Err(e),
        }
    }

    for appointment in &config.appointments {
        if appointment_exists(store, appointment).await? {
            continue;
        }
        store
            .insert_appointment(NewAppointment {
                user_id: appointment.user_id,
                doctor_name: appointment.doctor_name.clone(),
                specialization: appointment.specialization.clone(),
                location: appointment.location.clone(),
                scheduled_at: appointment.scheduled_at,
            })
            .await?;
        report.appointments_inserted += 1;
    }

    info!(?report, "Finished seeding");
    Ok(report)
}

fn validate_entitlement(entitlement: &EntitlementConfig) -> Result<()> {
    let amounts = [
        ("total_amount", entitlement.total_amount),
        ("used_amount", entitlement.used_amount),
    ];
    for (field, amount) in amounts {
        if !amount.is_finite() || amount < 0.0 {
            return Err(Error::Config {
                message: format!(
                    "{} entitlement has invalid {field} {amount}",
                    entitlement.category
                ),
            });
        }
    }
    Ok(())
}

async fn appointment_exists<S: LedgerStore>(store: &S, wanted: &AppointmentConfig) -> Result<bool> {
    Ok(store
        .appointments_for_user(wanted.user_id)
        .await?
        .iter()
        .any(|a| a.scheduled_at == wanted.scheduled_at && a.doctor_name == wanted.doctor_name))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::config::ledger::parse_config;
    use crate::models::Category;
    use crate::store::{DatabaseStore, MemoryStore};
    use crate::test_utils::{FISCAL_YEAR, setup_test_db};

    #[tokio::test]
    async fn test_seed_defaults() -> Result<()> {
        let store = MemoryStore::new();
        let report = seed_fiscal_year(&store, &Config::default()).await?;
        assert_eq!(report.entitlements_inserted, 3);

        let entitlements = store.entitlements(FISCAL_YEAR).await?;
        let domiciliary = entitlements
            .iter()
            .find(|e| e.category == Category::Domiciliary)
            .unwrap();
        assert_eq!(domiciliary.total_amount, 25_000.0);
        assert_eq!(domiciliary.used_amount, 12_500.0);
        Ok(())
    }

    #[tokio::test]
    async fn test_reseeding_skips_existing() -> Result<()> {
        let store = DatabaseStore::new(setup_test_db().await?);
        let config = parse_config(
            r#"
            [[appointments]]
            user_id = 1
            doctor_name = "Dr. Mehra"
            specialization = "Cardiologist"
            location = "Referral Hospital, Delhi"
            scheduled_at = "2030-06-15T10:30:00Z"
        "#,
        )?;

        let first = seed_fiscal_year(&store, &config).await?;
        assert_eq!(first.entitlements_inserted, 3);
        assert_eq!(first.appointments_inserted, 1);

        let second = seed_fiscal_year(&store, &config).await?;
        assert_eq!(
            second,
            SeedReport {
                entitlements_inserted: 0,
                entitlements_skipped: 3,
                appointments_inserted: 0,
            }
        );
        assert_eq!(store.entitlements(FISCAL_YEAR).await?.len(), 3);
        assert_eq!(store.appointments_for_user(1).await?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_invalid_amounts_are_refused_before_writing() -> Result<()> {
        for (total, used) in [(15_000.0, -100.0), (-1.0, 0.0), (f64::NAN, 0.0)] {
            let mut config = Config::default();
            config.entitlements[1].total_amount = total;
            config.entitlements[1].used_amount = used;

            let store = MemoryStore::new();
            let result = seed_fiscal_year(&store, &config).await;
            assert!(matches!(result, Err(Error::Config { .. })));
            assert!(store.entitlements(FISCAL_YEAR).await?.is_empty());
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_negative_usage_in_toml_is_refused() -> Result<()> {
        let config = parse_config(
            r#"
            [[entitlements]]
            category = "chronic"
            name = "Chronic"
            description = "Long-term medication"
            total_amount = 15000.0
            used_amount = -100.0
        "#,
        )?;
        let err = seed_fiscal_year(&MemoryStore::new(), &config)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("used_amount"));
        Ok(())
    }
}
