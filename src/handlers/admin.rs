use axum::{
    extract::State,
    response::{Html, Redirect},
    routing::{get, post},
    Router,
};
use model::entities::{bbs_post, user};
use sea_orm::{ActiveModelTrait, EntityTrait, QueryOrder, Set};
use serde::Deserialize;
use serde_json::json;
use tower_sessions::Session;
use tracing::{info, instrument};
use validator::Validate;

use crate::auth::{flash, forget_user, CurrentUser, RequireAdmin};
use crate::errors::AppError;
use crate::extract::{PathParam, ValidForm};
use crate::handlers::bbs::{forget_recent_posts, post_page};
use crate::schemas::AppState;
use crate::templates::render_page;

#[derive(Debug, Deserialize, Validate)]
pub struct UserFlagsForm {
    #[validate(range(min = 1, max = 2, message = "Unknown status"))]
    pub status: i16,
    #[validate(range(min = 0, max = 1, message = "Unknown visibility"))]
    pub seen: i16,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(users))
        .route("/users/:user_id", post(update_user))
        .route("/posts/:post_id/delete", post(delete_post))
}

/// Member list plus the most recently active topics.
#[instrument(skip_all, fields(admin_id = admin.id))]
pub async fn users(
    State(state): State<AppState>,
    session: Session,
    current: CurrentUser,
    RequireAdmin(admin): RequireAdmin,
) -> Result<Html<String>, AppError> {
    let users = user::Entity::find()
        .order_by_asc(user::Column::Id)
        .all(&state.db)
        .await?;
    let (posts, _) = post_page(&state.db, 1, state.config.per_page).await?;

    let context = json!({ "users": users, "posts": posts });
    render_page(&state, &session, &current, "admin/users", context).await
}

#[instrument(skip_all, fields(admin_id = admin.id, user_id = user_id))]
pub async fn update_user(
    State(state): State<AppState>,
    session: Session,
    RequireAdmin(admin): RequireAdmin,
    PathParam(user_id): PathParam<i32>,
    ValidForm(form): ValidForm<UserFlagsForm>,
) -> Result<Redirect, AppError> {
    if user_id == admin.id && form.status != user::STATUS_ADMIN {
        return Err(AppError::BadRequest(
            "You cannot revoke your own admin status".to_string(),
        ));
    }

    let target = user::Entity::find_by_id(user_id)
        .one(&state.db)
        .await?
        .ok_or(AppError::NotFound)?;

    let mut active: user::ActiveModel = target.into();
    active.status = Set(form.status);
    active.seen = Set(form.seen);
    let updated = active.update(&state.db).await?;
    forget_user(&state, updated.id).await;

    info!("{} set status={} seen={} on {}", admin, updated.status, updated.seen, updated);
    flash(&session, "message", format!("Updated {}", updated.display_name(false))).await?;
    Ok(Redirect::to("/admin"))
}

#[instrument(skip_all, fields(admin_id = admin.id, post_id = post_id))]
pub async fn delete_post(
    State(state): State<AppState>,
    session: Session,
    RequireAdmin(admin): RequireAdmin,
    PathParam(post_id): PathParam<i32>,
) -> Result<Redirect, AppError> {
    let result = bbs_post::Entity::delete_by_id(post_id).exec(&state.db).await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound);
    }

    info!("{} removed topic {}", admin, post_id);
    forget_recent_posts(&state).await;
    flash(&session, "message", "Topic removed").await?;
    Ok(Redirect::to("/admin"))
}
