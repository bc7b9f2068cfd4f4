use crate::auth::authenticate;
use crate::errors::{fallback, handle_errors, panic_response};
use crate::handlers::{admin, bbs, site, user};
use crate::schemas::AppState;
use axum::{middleware, Router};
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{
    catch_panic::CatchPanicLayer, compression::CompressionLayer, timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tower_sessions::{MemoryStore, SessionManagerLayer};
use tracing::debug;

/// Builds the routes of one group, relative to its mount prefix.
pub type Blueprint = fn() -> Router<AppState>;

/// Route groups mounted when the caller does not supply its own list.
pub const DEFAULT_BLUEPRINTS: &[(Blueprint, &str)] = &[
    (site::routes, "/"),
    (bbs::routes, "/bbs"),
    (user::routes, "/user"),
    (admin::routes, "/admin"),
];

/// Mount each route group at its prefix.
fn config_blueprints(blueprints: &[(Blueprint, &str)]) -> Router<AppState> {
    blueprints
        .iter()
        .fold(Router::new(), |router, (blueprint, prefix)| {
            debug!("Mounting route group at {}", prefix);
            if *prefix == "/" || prefix.is_empty() {
                router.merge(blueprint())
            } else {
                router.nest(prefix, blueprint())
            }
        })
}

/// Create the application: route groups, the current-user hook, error
/// handlers, sessions and the HTTP middleware stack.
pub fn create_app(state: AppState, blueprints: Option<&[(Blueprint, &str)]>) -> Router {
    let session_layer = SessionManagerLayer::new(MemoryStore::default())
        .with_name(state.config.session_cookie_name.clone())
        .with_secure(false);

    config_blueprints(blueprints.unwrap_or(DEFAULT_BLUEPRINTS))
        .fallback(fallback)
        .layer(middleware::from_fn_with_state(state.clone(), authenticate))
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(middleware::from_fn_with_state(state.clone(), handle_errors))
        .layer(session_layer)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(TimeoutLayer::new(Duration::from_secs(30))),
        )
        .with_state(state)
}
