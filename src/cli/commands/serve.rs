use anyhow::Result;
use migration::{Migrator, MigratorTrait};
use std::path::PathBuf;
use tokio::net::TcpListener;
use tracing::{debug, error, info, trace};

use crate::config::{initialize_app_state, load_config};
use crate::logging::init_logging;
use crate::router::create_app;

/// Command line overrides for `serve`.
#[derive(Debug, Default)]
pub struct ServeOptions {
    pub config: Option<PathBuf>,
    pub database_url: Option<String>,
    pub bind_address: Option<String>,
    pub migrate: bool,
}

pub async fn serve(options: ServeOptions) -> Result<()> {
    let mut config = load_config(options.config.as_deref())?;
    if let Some(database_url) = options.database_url {
        config.database_url = database_url;
    }
    if let Some(bind_address) = options.bind_address {
        config.bind_address = bind_address;
    }

    init_logging(&config)?;
    info!("{} starting up", config.app_name);
    debug!("Database URL: {}", config.database_url);

    // Initialize application state
    let state = match initialize_app_state(&config).await {
        Ok(state) => {
            debug!("Application state initialized successfully");
            state
        }
        Err(e) => {
            error!("Failed to initialize application state: {}", e);
            return Err(e);
        }
    };

    if options.migrate {
        info!("Running database migrations");
        Migrator::up(&state.db, None).await?;
    }

    trace!("Creating application router");
    let app = create_app(state, None);

    info!("Starting server on {}", config.bind_address);
    let listener = match TcpListener::bind(&config.bind_address).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to address {}: {}", config.bind_address, e);
            return Err(e.into());
        }
    };

    info!("{} running on http://{}", config.app_name, config.bind_address);
    if let Err(e) = axum::serve(listener, app).await {
        error!("Server error: {}", e);
        return Err(e.into());
    }

    info!("Server shutdown gracefully");
    Ok(())
}
