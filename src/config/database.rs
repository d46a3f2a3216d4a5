//! Database configuration module for the claims ledger.
//!
//! This module handles database connection and table creation using `SeaORM`.
//! Tables are generated with `Schema::create_table_from_entity` so the schema always
//! matches the entity definitions without hand-written SQL.

use crate::entities::{Appointment, Claim, Entitlement, EntitlementColumn};
use crate::errors::Result;
use sea_orm::sea_query::Index;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Schema};

/// Unique index enforcing one entitlement per category per fiscal year.
pub const ENTITLEMENT_CATEGORY_INDEX: &str = "idx_entitlements_category_fiscal_year";

/// Default `SQLite` location when `DATABASE_URL` is not set.
pub const DEFAULT_DATABASE_URL: &str = "sqlite://data/claims_ledger.sqlite?mode=rwc";

/// Gets the database URL from environment variable or returns default `SQLite` path.
#[must_use]
pub fn get_database_url() -> String {
    std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string())
}

/// Establishes a connection to the database named by `DATABASE_URL`.
///
/// Falls back to a default local `SQLite` file if no environment variable is set.
pub async fn create_connection() -> Result<DatabaseConnection> {
    Database::connect(get_database_url()).await.map_err(Into::into)
}

/// Creates the entitlement, claim, and appointment tables if they do not exist yet,
/// along with the unique (category, fiscal year) index on entitlements.
pub async fn create_tables(db: &DatabaseConnection) -> Result<()> {
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    let mut entitlement_table = schema.create_table_from_entity(Entitlement);
    let mut claim_table = schema.create_table_from_entity(Claim);
    let mut appointment_table = schema.create_table_from_entity(Appointment);
    entitlement_table.if_not_exists();
    claim_table.if_not_exists();
    appointment_table.if_not_exists();

    db.execute(builder.build(&entitlement_table)).await?;
    db.execute(builder.build(&claim_table)).await?;
    db.execute(builder.build(&appointment_table)).await?;

    let mut category_index = Index::create();
    category_index
        .name(ENTITLEMENT_CATEGORY_INDEX)
        .table(Entitlement)
        .col(EntitlementColumn::Category)
        .col(EntitlementColumn::FiscalYear)
        .unique()
        .if_not_exists();
    db.execute(builder.build(&category_index)).await?;

    Ok(())
}
