//! Goma Server: Application entry point.
//!
//! Loads configuration, connects to SurrealDB, applies migrations,
//! seeds the permission catalog, and waits for shutdown.

mod config;

use anyhow::Context;
use goma_db::DbManager;
use goma_db::repository::{
    SurrealPermissionRepository, SurrealRoleRepository, SurrealTenantRepository,
};
use goma_rbac::RbacService;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::{AppConfig, LoggingConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("failed to load configuration")?;
    init_tracing(&config.logging)?;

    info!(version = env!("CARGO_PKG_VERSION"), "Starting Goma server");

    let db = DbManager::connect(&config.database)
        .await
        .context("failed to connect to SurrealDB")?;
    db.migrate().await.context("failed to apply migrations")?;

    let client = db.client().clone();
    let rbac = RbacService::new(
        SurrealTenantRepository::new(client.clone()),
        SurrealRoleRepository::new(client.clone()),
        SurrealPermissionRepository::new(client),
    );

    if !config.seed.permissions.is_empty() {
        let seeded = rbac
            .ensure_permissions(config.seed.permissions)
            .await
            .context("failed to seed permission catalog")?;
        info!(count = seeded.len(), "Permission catalog ready");
    }

    info!("Goma server ready; press Ctrl-C to stop");
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;

    info!("Goma server stopped");
    Ok(())
}

/// Install the global subscriber. `RUST_LOG` wins over `logging.level`.
fn init_tracing(logging: &LoggingConfig) -> anyhow::Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&logging.level)
            .with_context(|| format!("invalid log level {:?}", logging.level))?,
    };

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}
