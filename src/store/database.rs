//! `SeaORM`-backed store.
//!
//! Multi-step writes run inside a database transaction. The usage change is a single
//! `UPDATE entitlements SET used_amount = used_amount + ?, version = version + 1
//! WHERE id = ? AND version = ? AND used_amount >= -?`; zero affected rows rolls the
//! transaction back. Claim rows are guarded the same way on their own `version`.

use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveValue::{NotSet, Set},
    ConnectionTrait, DatabaseConnection, QueryOrder, SqlErr, TransactionTrait,
    prelude::*,
};
use tracing::debug;

use super::LedgerStore;
use crate::entities::{appointment, claim, entitlement};
use crate::errors::{Error, Result};
use crate::models::{
    Appointment, BillDetails, Category, Claim, ClaimStatus, Entitlement, EntitlementUpdate,
    NewAppointment, NewClaim, NewEntitlement, UsageChange,
};

/// [`LedgerStore`] over any `SeaORM` connection (`SQLite` in tests and by default).
#[derive(Debug)]
pub struct DatabaseStore {
    db: DatabaseConnection,
}

impl DatabaseStore {
    /// Wraps an open connection. Tables must already exist
    /// (see [`create_tables`](crate::config::database::create_tables)).
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// The underlying connection.
    #[must_use]
    pub const fn connection(&self) -> &DatabaseConnection {
        &self.db
    }
}

impl TryFrom<entitlement::Model> for Entitlement {
    type Error = Error;

    fn try_from(model: entitlement::Model) -> Result<Self> {
        Ok(Self {
            id: model.id,
            category: model.category.parse()?,
            name: model.name,
            description: model.description,
            total_amount: model.total_amount,
            used_amount: model.used_amount,
            fiscal_year: model.fiscal_year,
            version: model.version,
        })
    }
}

impl TryFrom<claim::Model> for Claim {
    type Error = Error;

    fn try_from(model: claim::Model) -> Result<Self> {
        Ok(Self {
            id: model.id,
            user_id: model.user_id,
            category: model.category.parse()?,
            description: model.description,
            amount: model.amount,
            bill: BillDetails {
                bill_number: model.bill_number,
                bill_date: model.bill_date,
                hospital_name: model.hospital_name,
                doctor_name: model.doctor_name,
            },
            patient_name: model.patient_name,
            relationship: model.relationship,
            submission_date: model.submission_date,
            status: model.status.parse::<ClaimStatus>()?,
            approved_amount: model.approved_amount,
            approved_by: model.approved_by,
            approved_at: model.approved_at,
            rejection_reason: model.rejection_reason,
            comments: model.comments,
            charged_amount: model.charged_amount,
            version: model.version,
        })
    }
}

impl From<appointment::Model> for Appointment {
    fn from(model: appointment::Model) -> Self {
        Self {
            id: model.id,
            user_id: model.user_id,
            doctor_name: model.doctor_name,
            specialization: model.specialization,
            location: model.location,
            scheduled_at: model.scheduled_at,
        }
    }
}

fn convert_all<M, T>(models: Vec<M>) -> Result<Vec<T>>
where
    T: TryFrom<M, Error = Error>,
{
    models.into_iter().map(T::try_from).collect()
}

/// Every column set from the domain claim; id and version are left to the caller.
fn claim_active_model(claim: Claim) -> claim::ActiveModel {
    claim::ActiveModel {
        id: NotSet,
        user_id: Set(claim.user_id),
        category: Set(claim.category.to_string()),
        description: Set(claim.description),
        amount: Set(claim.amount),
        bill_number: Set(claim.bill.bill_number),
        bill_date: Set(claim.bill.bill_date),
        hospital_name: Set(claim.bill.hospital_name),
        doctor_name: Set(claim.bill.doctor_name),
        patient_name: Set(claim.patient_name),
        relationship: Set(claim.relationship),
        submission_date: Set(claim.submission_date),
        status: Set(claim.status.to_string()),
        approved_amount: Set(claim.approved_amount),
        approved_by: Set(claim.approved_by),
        approved_at: Set(claim.approved_at),
        rejection_reason: Set(claim.rejection_reason),
        comments: Set(claim.comments),
        charged_amount: Set(claim.charged_amount),
        version: NotSet,
    }
}

/// Guarded increment shared by every write path.
async fn apply_usage_on<C>(conn: &C, usage: UsageChange) -> Result<()>
where
    C: ConnectionTrait,
{
    let result = entitlement::Entity::update_many()
        .col_expr(
            entitlement::Column::UsedAmount,
            Expr::col(entitlement::Column::UsedAmount).add(usage.delta),
        )
        .col_expr(
            entitlement::Column::Version,
            Expr::col(entitlement::Column::Version).add(1),
        )
        .filter(entitlement::Column::Id.eq(usage.entitlement_id))
        .filter(entitlement::Column::Version.eq(usage.expected_version))
        .filter(entitlement::Column::UsedAmount.gte(-usage.delta))
        .exec(conn)
        .await?;

    if result.rows_affected == 0 {
        let current = entitlement::Entity::find_by_id(usage.entitlement_id)
            .one(conn)
            .await?;
        return Err(match current {
            None => Error::EntitlementNotFound {
                id: usage.entitlement_id,
            },
            Some(model) if model.version != usage.expected_version => Error::Conflict {
                entitlement_id: usage.entitlement_id,
                expected_version: usage.expected_version,
            },
            Some(model) => Error::NegativeUsage {
                entitlement_id: usage.entitlement_id,
                used_amount: model.used_amount,
                delta: usage.delta,
            },
        });
    }

    debug!(
        entitlement_id = usage.entitlement_id,
        delta = usage.delta,
        "Applied usage change"
    );
    Ok(())
}

impl LedgerStore for DatabaseStore {
    async fn entitlements(&self, fiscal_year: &str) -> Result<Vec<Entitlement>> {
        let models = entitlement::Entity::find()
            .filter(entitlement::Column::FiscalYear.eq(fiscal_year))
            .order_by_asc(entitlement::Column::Id)
            .all(&self.db)
            .await?;
        convert_all(models)
    }

    async fn entitlement(&self, id: i64) -> Result<Option<Entitlement>> {
        entitlement::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .map(Entitlement::try_from)
            .transpose()
    }

    async fn entitlement_for_category(
        &self,
        category: Category,
        fiscal_year: &str,
    ) -> Result<Option<Entitlement>> {
        entitlement::Entity::find()
            .filter(entitlement::Column::Category.eq(category.as_str()))
            .filter(entitlement::Column::FiscalYear.eq(fiscal_year))
            .one(&self.db)
            .await?
            .map(Entitlement::try_from)
            .transpose()
    }

    async fn insert_entitlement(&self, new: NewEntitlement) -> Result<Entitlement> {
        let txn = self.db.begin().await?;

        let existing = entitlement::Entity::find()
            .filter(entitlement::Column::Category.eq(new.category.as_str()))
            .filter(entitlement::Column::FiscalYear.eq(new.fiscal_year.as_str()))
            .one(&txn)
            .await?;
        if existing.is_some() {
            return Err(Error::DuplicateEntitlement {
                category: new.category,
                fiscal_year: new.fiscal_year,
            });
        }

        let category = new.category;
        let fiscal_year = new.fiscal_year.clone();
        let model = entitlement::ActiveModel {
            category: Set(new.category.to_string()),
            name: Set(new.name),
            description: Set(new.description),
            total_amount: Set(new.total_amount),
            used_amount: Set(new.used_amount),
            fiscal_year: Set(new.fiscal_year),
            version: Set(0),
            ..Default::default()
        }
        .insert(&txn)
        .await
        .map_err(|err| match err.sql_err() {
            // Another writer inserted the pair after our lookup
            Some(SqlErr::UniqueConstraintViolation(_)) => Error::DuplicateEntitlement {
                category,
                fiscal_year,
            },
            _ => err.into(),
        })?;

        txn.commit().await?;
        Entitlement::try_from(model)
    }

    async fn update_entitlement(&self, id: i64, update: EntitlementUpdate) -> Result<Entitlement> {
        let model = entitlement::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or(Error::EntitlementNotFound { id })?;
        if update == EntitlementUpdate::default() {
            return Entitlement::try_from(model);
        }

        // Only the revised columns are written, so concurrent usage changes survive
        let mut active: entitlement::ActiveModel = model.into();
        if let Some(name) = update.name {
            active.name = Set(name);
        }
        if let Some(description) = update.description {
            active.description = Set(description);
        }
        if let Some(total_amount) = update.total_amount {
            active.total_amount = Set(total_amount);
        }
        let model = active.update(&self.db).await?;
        Entitlement::try_from(model)
    }

    async fn claims(&self) -> Result<Vec<Claim>> {
        let models = claim::Entity::find()
            .order_by_asc(claim::Column::Id)
            .all(&self.db)
            .await?;
        convert_all(models)
    }

    async fn claims_for_user(&self, user_id: i64) -> Result<Vec<Claim>> {
        let models = claim::Entity::find()
            .filter(claim::Column::UserId.eq(user_id))
            .order_by_asc(claim::Column::Id)
            .all(&self.db)
            .await?;
        convert_all(models)
    }

    async fn claim(&self, id: i64) -> Result<Option<Claim>> {
        claim::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .map(Claim::try_from)
            .transpose()
    }

    async fn insert_claim(&self, new: NewClaim, usage: UsageChange) -> Result<Claim> {
        // Dropping the transaction on any early return rolls it back
        let txn = self.db.begin().await?;

        apply_usage_on(&txn, usage).await?;

        let model = claim::ActiveModel {
            user_id: Set(new.user_id),
            category: Set(new.category.to_string()),
            description: Set(new.description),
            amount: Set(new.amount),
            bill_number: Set(new.bill.bill_number),
            bill_date: Set(new.bill.bill_date),
            hospital_name: Set(new.bill.hospital_name),
            doctor_name: Set(new.bill.doctor_name),
            patient_name: Set(new.patient_name),
            relationship: Set(new.relationship),
            submission_date: Set(new.submission_date),
            status: Set(ClaimStatus::Pending.to_string()),
            approved_amount: Set(None),
            approved_by: Set(None),
            approved_at: Set(None),
            rejection_reason: Set(None),
            comments: Set(None),
            charged_amount: Set(usage.delta),
            version: Set(0),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        txn.commit().await?;
        Claim::try_from(model)
    }

    async fn update_claim(&self, claim: Claim, usage: Option<UsageChange>) -> Result<Claim> {
        let txn = self.db.begin().await?;

        let id = claim.id;
        let expected_version = claim.version;
        let mut active = claim_active_model(claim);
        active.version = Set(expected_version + 1);
        let result = claim::Entity::update_many()
            .set(active)
            .filter(claim::Column::Id.eq(id))
            .filter(claim::Column::Version.eq(expected_version))
            .exec(&txn)
            .await?;

        if result.rows_affected == 0 {
            let exists = claim::Entity::find_by_id(id).one(&txn).await?.is_some();
            return Err(if exists {
                Error::ClaimConflict {
                    id,
                    expected_version,
                }
            } else {
                Error::ClaimNotFound { id }
            });
        }

        if let Some(usage) = usage {
            apply_usage_on(&txn, usage).await?;
        }

        let model = claim::Entity::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or(Error::ClaimNotFound { id })?;
        txn.commit().await?;
        Claim::try_from(model)
    }

    async fn delete_claim(&self, id: i64) -> Result<bool> {
        let result = claim::Entity::delete_by_id(id).exec(&self.db).await?;
        Ok(result.rows_affected > 0)
    }

    async fn apply_usage(&self, usage: UsageChange) -> Result<Entitlement> {
        let txn = self.db.begin().await?;
        apply_usage_on(&txn, usage).await?;
        let model = entitlement::Entity::find_by_id(usage.entitlement_id)
            .one(&txn)
            .await?
            .ok_or(Error::EntitlementNotFound {
                id: usage.entitlement_id,
            })?;
        txn.commit().await?;
        Entitlement::try_from(model)
    }

    async fn appointments_for_user(&self, user_id: i64) -> Result<Vec<Appointment>> {
        let models = appointment::Entity::find()
            .filter(appointment::Column::UserId.eq(user_id))
            .order_by_asc(appointment::Column::ScheduledAt)
            .all(&self.db)
            .await?;
        Ok(models.into_iter().map(Appointment::from).collect())
    }

    async fn insert_appointment(&self, new: NewAppointment) -> Result<Appointment> {
        let model = appointment::ActiveModel {
            user_id: Set(new.user_id),
            doctor_name: Set(new.doctor_name),
            specialization: Set(new.specialization),
            location: Set(new.location),
            scheduled_at: Set(new.scheduled_at),
            ..Default::default()
        }
        .insert(&self.db)
        .await?;
        Ok(model.into())
    }
}
