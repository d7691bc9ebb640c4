//! Migrate command - applies or reverts the knowledge schema

use tracing::info;

use crate::config::AppConfig;
use crate::infrastructure::logging::init_logging;
use crate::infrastructure::storage::{connect_pool, PostgresMigrator};

use super::MigrateArgs;

pub async fn run(args: MigrateArgs) -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load()?;
    init_logging(&config.logging)?;

    let pool = connect_pool(&config.database).await?;
    let migrator = PostgresMigrator::new(pool);

    if args.revert {
        match migrator.revert().await? {
            Some(version) => info!(version, "Reverted migration"),
            None => info!("No migration to revert"),
        }
    } else {
        let applied = migrator.run().await?;
        info!(applied, "Applied pending migrations");
    }

    info!(version = ?migrator.version().await?, "Migrations complete");
    Ok(())
}
