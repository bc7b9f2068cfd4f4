use axum::{
    extract::State,
    response::{Html, Redirect},
    routing::{get, post},
    Router,
};
use chrono::Utc;
use model::entities::{bbs_cmt, user};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
    SqlErr, TransactionTrait,
};
use serde::Deserialize;
use serde_json::json;
use tower_sessions::Session;
use tracing::{debug, info, instrument, warn};
use validator::{Validate, ValidationError};

use crate::auth::{flash, forget_user, login_user, logout_user, CurrentUser};
use crate::errors::AppError;
use crate::extract::{not_blank, PathParam, ValidForm};
use crate::handlers::bbs::posts_by;
use crate::schemas::{AppState, CommentView};
use crate::templates::render_page;

/// Paths under `/user` that would shadow a profile.
const RESERVED_URLNAMES: &[&str] = &["login", "logout", "register"];

fn validate_urlname(urlname: &str) -> Result<(), ValidationError> {
    if !urlname
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(ValidationError::new("urlname")
            .with_message("URL name may only contain letters, digits, '-' and '_'".into()));
    }
    if RESERVED_URLNAMES.contains(&urlname.to_ascii_lowercase().as_str()) {
        return Err(ValidationError::new("urlname").with_message("That name is reserved".into()));
    }
    Ok(())
}

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterForm {
    #[validate(
        length(min = 1, max = 10, message = "URL name must be 1 to 10 characters"),
        custom(function = "validate_urlname")
    )]
    pub urlname: String,
    #[validate(
        length(min = 1, max = 10, message = "Nickname must be 1 to 10 characters"),
        custom(function = "not_blank", message = "Nickname must not be blank")
    )]
    pub nickname: String,
    #[validate(
        length(min = 1, max = 10, message = "Alias must be 1 to 10 characters"),
        custom(function = "not_blank", message = "Alias must not be blank")
    )]
    pub anonyname: String,
    pub next: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginForm {
    #[validate(length(min = 1, max = 10, message = "URL name must be 1 to 10 characters"))]
    pub urlname: String,
    pub next: Option<String>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", get(logout))
        .route("/:urlname", get(profile))
}

/// The `next` hint if it points back into this site.
pub fn safe_next(next: Option<&str>) -> &str {
    match next {
        Some(path) if path.starts_with('/') && !path.starts_with("//") => path,
        _ => "/",
    }
}

/// Create an account and log it in. The first account becomes an administrator.
///
/// The first-account check counts users and inserts in one transaction at
/// the default isolation level. On Postgres two concurrent first
/// registrations can both see an empty table and both become admins;
/// SQLite serializes writers so it cannot happen there.
#[instrument(skip_all, fields(urlname = %form.urlname))]
pub async fn register(
    State(state): State<AppState>,
    session: Session,
    ValidForm(form): ValidForm<RegisterForm>,
) -> Result<Redirect, AppError> {

    let now = Utc::now().naive_utc();
    let urlname = form.urlname.clone();
    let nickname = form.nickname.trim().to_string();
    let anonyname = form.anonyname.trim().to_string();

    let result = state
        .db
        .transaction::<_, user::Model, AppError>(move |txn| {
            Box::pin(async move {
                let status = if user::Entity::find().count(txn).await? == 0 {
                    user::STATUS_ADMIN
                } else {
                    user::STATUS_NORMAL
                };

                let new_user = user::ActiveModel {
                    urlname: Set(Some(urlname)),
                    nickname: Set(Some(nickname)),
                    anonyname: Set(Some(anonyname)),
                    reg_time: Set(Some(now)),
                    last_login: Set(Some(now)),
                    seen: Set(user::SEEN_VISIBLE),
                    status: Set(status),
                    ..Default::default()
                };
                Ok(new_user.insert(txn).await?)
            })
        })
        .await
        .map_err(AppError::from);

    let user = match result {
        Ok(user) => user,
        Err(AppError::Database(e)) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
            warn!("Registration rejected, handle already taken: {}", e);
            return Err(AppError::BadRequest("That name is already taken".to_string()));
        }
        Err(e) => return Err(e),
    };

    info!("Registered {} with id {}", user, user.id);
    login_user(&session, &user).await?;
    flash(&session, "message", "Welcome aboard").await?;
    Ok(Redirect::to(safe_next(form.next.as_deref())))
}

#[instrument(skip_all, fields(urlname = %form.urlname))]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    ValidForm(form): ValidForm<LoginForm>,
) -> Result<Redirect, AppError> {

    let Some(user) = user::Entity::find()
        .filter(user::Column::Urlname.eq(form.urlname.as_str()))
        .one(&state.db)
        .await?
    else {
        debug!("Login attempt for unknown user");
        return Err(AppError::BadRequest("No such user".to_string()));
    };

    let mut active: user::ActiveModel = user.into();
    active.last_login = Set(Some(Utc::now().naive_utc()));
    let user = active.update(&state.db).await?;
    forget_user(&state, user.id).await;

    login_user(&session, &user).await?;
    info!("{} logged in", user);
    flash(&session, "message", format!("Welcome back, {}", user.display_name(false))).await?;
    Ok(Redirect::to(safe_next(form.next.as_deref())))
}

#[instrument(skip_all)]
pub async fn logout(session: Session, current: CurrentUser) -> Result<Redirect, AppError> {
    if let Some(user) = current.user() {
        info!("{} logged out", user);
    }
    logout_user(&session).await?;
    flash(&session, "message", "You have logged out").await?;
    Ok(Redirect::to("/"))
}

/// Member profile with their topics and replies. Hidden profiles are only
/// shown to their owner and administrators.
#[instrument(skip(state, session, current))]
pub async fn profile(
    State(state): State<AppState>,
    session: Session,
    current: CurrentUser,
    PathParam(urlname): PathParam<String>,
) -> Result<Html<String>, AppError> {
    let profile = user::Entity::find()
        .filter(user::Column::Urlname.eq(urlname.as_str()))
        .one(&state.db)
        .await?
        .ok_or(AppError::NotFound)?;

    let own = current.is(&profile);
    if !profile.is_visible() && !own && !current.is_admin() {
        debug!("Profile {} is hidden", urlname);
        return Err(AppError::NotFound);
    }

    let posts = posts_by(&state.db, &profile, own).await?;

    let mut comments = bbs_cmt::Entity::find()
        .filter(bbs_cmt::Column::AuthorId.eq(profile.id))
        .order_by_desc(bbs_cmt::Column::CreatedAt);
    if !own {
        comments = comments.filter(bbs_cmt::Column::Anonymous.eq(false));
    }
    let comments: Vec<CommentView> = comments
        .all(&state.db)
        .await?
        .into_iter()
        .map(|cmt| CommentView::new(cmt, Some(&profile)))
        .collect();

    let context = json!({
        "profile": profile,
        "posts": posts,
        "comments": comments,
    });
    render_page(&state, &session, &current, "user/profile", context).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_next() {
        assert_eq!(safe_next(None), "/");
        assert_eq!(safe_next(Some("/bbs/new")), "/bbs/new");
        assert_eq!(safe_next(Some("//evil.example")), "/");
        assert_eq!(safe_next(Some("https://evil.example/")), "/");
        assert_eq!(safe_next(Some("")), "/");
    }

    #[test]
    fn test_register_form_validation() {
        let form = RegisterForm {
            urlname: "erin_01".to_string(),
            nickname: "Erin".to_string(),
            anonyname: "Ghost".to_string(),
            next: None,
        };
        assert!(form.validate().is_ok());

        let bad = RegisterForm {
            urlname: "a b".to_string(),
            ..form
        };
        assert!(bad.validate().is_err());

        let reserved = RegisterForm {
            urlname: "Logout".to_string(),
            nickname: "x".to_string(),
            anonyname: "y".to_string(),
            next: None,
        };
        assert!(reserved.validate().is_err());

        let too_long = RegisterForm {
            urlname: "abcdefghijk".to_string(),
            nickname: "x".to_string(),
            anonyname: "y".to_string(),
            next: None,
        };
        assert!(too_long.validate().is_err());
    }
}
