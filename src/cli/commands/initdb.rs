use anyhow::Result;
use migration::{Migrator, MigratorTrait};
use sea_orm::{Database, DatabaseConnection};
use std::path::Path;
use tracing::{debug, error, info};

use crate::config::load_config;
use crate::logging::init_logging;

/// Create the parent directory of a file based SQLite database.
fn ensure_sqlite_parent(database_url: &str) -> Result<()> {
    let Some(rest) = database_url.strip_prefix("sqlite://") else {
        return Ok(());
    };
    let path = rest.split('?').next().unwrap_or_default();
    if path.is_empty() || path.contains(":memory:") {
        return Ok(());
    }
    if let Some(parent) = Path::new(path).parent().filter(|p| !p.as_os_str().is_empty()) {
        debug!("Creating database directory {}", parent.display());
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

pub async fn init_database(config_path: Option<&Path>, database_url: Option<String>) -> Result<()> {
    let config = load_config(config_path)?;
    init_logging(&config)?;

    let database_url = database_url.unwrap_or(config.database_url);
    info!("Initializing database");
    debug!("Database URL: {}", database_url);
    ensure_sqlite_parent(&database_url)?;

    let db: DatabaseConnection = match Database::connect(&database_url).await {
        Ok(connection) => {
            info!("Successfully connected to database");
            connection
        }
        Err(e) => {
            error!("Failed to connect to database '{}': {}", database_url, e);
            return Err(e.into());
        }
    };

    info!("Running database migrations");
    if let Err(e) = Migrator::up(&db, None).await {
        error!("Failed to run database migrations: {}", e);
        return Err(e.into());
    }

    info!("Database initialization completed successfully!");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_sqlite_parent() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("nested/dir/bbs.sqlite");
        let url = format!("sqlite://{}?mode=rwc", db_path.display());

        ensure_sqlite_parent(&url).unwrap();
        assert!(dir.path().join("nested/dir").is_dir());

        ensure_sqlite_parent("sqlite::memory:").unwrap();
        ensure_sqlite_parent("postgresql://localhost/bbs").unwrap();
    }
}
