//! Login state and flash messages, both kept in the `tower-sessions`
//! session.

use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::{IntoResponse, Response},
};
use model::entities::user;
use sea_orm::{DbErr, EntityTrait};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use tower_sessions::Session;
use tracing::{debug, trace};

use crate::errors::AppError;
use crate::schemas::{user_cache_key, AppState, CachedData};

const USER_ID_KEY: &str = "_user_id";
const FLASHES_KEY: &str = "_flashes";

/// A one-shot notice shown on the next rendered page.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flash {
    /// `"message"`, `"error"`, ...
    pub category: String,
    pub message: String,
}

/// Queue a flash message for the next rendered page.
pub async fn flash(
    session: &Session,
    category: &str,
    message: impl Into<String>,
) -> Result<(), AppError> {
    let mut flashes: Vec<Flash> = session.get(FLASHES_KEY).await?.unwrap_or_default();
    flashes.push(Flash {
        category: category.to_string(),
        message: message.into(),
    });
    session.insert(FLASHES_KEY, flashes).await?;
    Ok(())
}

/// Remove and return all queued flash messages.
pub async fn take_flashes(session: &Session) -> Result<Vec<Flash>, AppError> {
    Ok(session
        .remove::<Vec<Flash>>(FLASHES_KEY)
        .await?
        .unwrap_or_default())
}

/// Remember `user` as logged in for this session.
pub async fn login_user(session: &Session, user: &user::Model) -> Result<(), AppError> {
    session.cycle_id().await?;
    session.insert(USER_ID_KEY, user.get_id()).await?;
    debug!("Logged in {}", user);
    Ok(())
}

/// Forget the logged in user. The whole session is flushed, pending flash
/// messages included.
pub async fn logout_user(session: &Session) -> Result<(), AppError> {
    session.flush().await?;
    Ok(())
}

/// The user loader: cache first, then the database.
pub async fn load_user(state: &AppState, user_id: i32) -> Result<Option<user::Model>, DbErr> {
    let key = user_cache_key(user_id);
    if let Some(CachedData::User(user)) = state.cache.get(&key).await {
        trace!("User {} served from cache", user_id);
        return Ok(Some(user));
    }

    let user = user::Entity::find_by_id(user_id).one(&state.db).await?;
    if let Some(user) = &user {
        state.cache.insert(key, CachedData::User(user.clone())).await;
    }
    Ok(user)
}

/// Drop a cached user after its row changed.
pub async fn forget_user(state: &AppState, user_id: i32) {
    state.cache.invalidate(&user_cache_key(user_id)).await;
}

/// The user making the request, if logged in.
#[derive(Clone, Debug, Default)]
pub struct CurrentUser(pub Option<user::Model>);

impl CurrentUser {
    pub fn user(&self) -> Option<&user::Model> {
        self.0.as_ref()
    }

    pub fn is_admin(&self) -> bool {
        self.0.as_ref().is_some_and(user::Model::is_admin)
    }

    pub fn is(&self, other: &user::Model) -> bool {
        self.0.as_ref().is_some_and(|u| u.id == other.id)
    }
}

async fn resolve_user(state: &AppState, session: &Session) -> Result<Option<user::Model>, AppError> {
    let Some(raw_id) = session.get::<String>(USER_ID_KEY).await? else {
        return Ok(None);
    };
    let Ok(user_id) = raw_id.parse::<i32>() else {
        debug!("Ignoring malformed session user id {:?}", raw_id);
        return Ok(None);
    };

    let user = load_user(state, user_id).await?;
    Ok(user.filter(|u| u.is_authenticated() && u.is_active()))
}

/// Before-request hook resolving the current user from the session.
///
/// The resolved [`CurrentUser`] is added to the request extensions for
/// handlers, and to the response extensions so the error pages rendered
/// further out can show the same navigation.
pub async fn authenticate(
    State(state): State<AppState>,
    session: Session,
    mut request: Request,
    next: Next,
) -> Response {
    let current = match resolve_user(&state, &session).await {
        Ok(user) => CurrentUser(user),
        Err(e) => return e.into_response(),
    };

    request.extensions_mut().insert(current.clone());
    let mut response = next.run(request).await;
    response.extensions_mut().insert(current);
    response
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .unwrap_or_default())
    }
}

/// Extractor for handlers that need a logged-in user.
pub struct RequireUser(pub user::Model);

#[async_trait]
impl<S> FromRequestParts<S> for RequireUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state)
            .await
            .unwrap_or_default();
        user.map(RequireUser).ok_or(AppError::Unauthorized)
    }
}

/// Extractor for administrator-only handlers. Members without admin status
/// get a 404 so the admin area stays hidden.
pub struct RequireAdmin(pub user::Model);

#[async_trait]
impl<S> FromRequestParts<S> for RequireAdmin
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let RequireUser(user) = RequireUser::from_request_parts(parts, state).await?;
        if user.is_admin() {
            Ok(RequireAdmin(user))
        } else {
            Err(AppError::NotFound)
        }
    }
}
