use axum::{
    extract::{Query, State},
    response::Html,
    routing::get,
    Router,
};
use serde_json::json;
use tower_sessions::Session;
use tracing::instrument;

use crate::auth::CurrentUser;
use crate::errors::AppError;
use crate::handlers::{bbs::recent_posts, health::health_check};
use crate::schemas::{AppState, NextQuery};
use crate::templates::render_page;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health_check))
}

/// Front page: latest topics plus the login and register forms.
#[instrument(skip_all)]
pub async fn index(
    State(state): State<AppState>,
    session: Session,
    current: CurrentUser,
    Query(query): Query<NextQuery>,
) -> Result<Html<String>, AppError> {
    let posts = recent_posts(&state).await?;
    let context = json!({
        "posts": posts,
        "next": query.next.unwrap_or_default(),
    });
    render_page(&state, &session, &current, "site/index", context).await
}
