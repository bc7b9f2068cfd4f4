use crate::config::AppConfig;
use crate::router::create_app;
use crate::schemas::AppState;
use crate::templates::Templates;
use axum::Router;
use axum_test::TestServer;
use migration::{Migrator, MigratorTrait};
use moka::future::Cache;
use sea_orm::{Database, DatabaseConnection};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Create an in-memory SQLite database for testing
pub async fn setup_test_db() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:")
        .await
        .expect("Failed to connect to in-memory database");

    Migrator::up(&db, None)
        .await
        .expect("Failed to run migrations");

    db
}

pub fn test_config() -> AppConfig {
    AppConfig {
        testing: true,
        per_page: 2,
        ..AppConfig::default()
    }
}

/// Create AppState for testing
pub async fn setup_test_app_state() -> AppState {
    let db = setup_test_db().await;
    let templates = Templates::new().expect("Failed to compile templates");
    AppState::new(db, Cache::new(100), templates, test_config())
}

/// Initialize tracing for tests with output to STDERR.
///
/// The log level is taken from RUST_LOG, defaulting to WARN.
fn init_test_tracing() -> tracing::subscriber::DefaultGuard {
    let log_level = std::env::var("RUST_LOG")
        .ok()
        .and_then(|level| level.parse::<Level>().ok())
        .unwrap_or(Level::WARN);

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_default(subscriber)
}

/// Create axum app for testing
pub async fn setup_test_app() -> Router {
    let _guard = init_test_tracing();

    let state = setup_test_app_state().await;
    create_app(state, None)
}

/// Test server that keeps the session cookie between requests.
pub async fn setup_test_server() -> TestServer {
    let mut server = TestServer::new(setup_test_app().await).expect("Failed to start test server");
    server.do_save_cookies();
    server
}
