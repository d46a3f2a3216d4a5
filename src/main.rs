use claims_ledger::{
    config::{self, database},
    core::{Ledger, seed},
    errors::Result,
    store::DatabaseStore,
};
use dotenvy::dotenv;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file; env vars can also be set externally
    dotenv().ok();
    info!("Attempted to load .env file.");

    // 3. Load ledger settings and seed data
    let app_config = config::ledger::load_default_config()
        .inspect_err(|e| error!("Failed to load configuration: {}", e))?;
    info!(
        fiscal_year = %app_config.ledger.fiscal_year,
        "Successfully processed application configuration."
    );

    // 4. Open the database and make sure the tables exist
    let database_url = database::get_database_url();
    if database_url == database::DEFAULT_DATABASE_URL {
        std::fs::create_dir_all("data")?;
    }
    let db = database::create_connection()
        .await
        .inspect_err(|e| error!("Failed to connect to {}: {}", database_url, e))?;
    database::create_tables(&db)
        .await
        .inspect(|()| info!("Database initialized successfully."))
        .inspect_err(|e| error!("Failed to create tables: {}", e))?;

    // 5. Seed the active fiscal year
    let store = DatabaseStore::new(db);
    seed::seed_fiscal_year(&store, &app_config)
        .await
        .inspect_err(|e| error!("Failed to seed entitlements: {}", e))?;

    // 6. Report the ledger state
    let ledger = Ledger::new(store, app_config.ledger);
    for entitlement in ledger.list_entitlements().await? {
        info!(
            category = %entitlement.category,
            total = entitlement.total_amount,
            used = entitlement.used_amount,
            remaining = entitlement.remaining(),
            "Entitlement"
        );
    }
    let balance = ledger.balance().await?;
    info!(
        total = balance.total,
        used = balance.used,
        available = balance.available,
        "Ledger ready"
    );

    Ok(())
}
