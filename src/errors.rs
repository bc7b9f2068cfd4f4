use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode, Uri},
    middleware::Next,
    response::{IntoResponse, Json, Redirect, Response},
};
use sea_orm::{DbErr, TransactionError};
use serde_json::json;
use std::any::Any;
use thiserror::Error;
use tower_sessions::Session;
use tracing::{debug, error, warn};

use crate::auth::{flash, CurrentUser};
use crate::schemas::{AppState, ErrorResponse};
use crate::templates::render_page;

/// Errors surfaced by handlers.
///
/// The response produced for an error carries an [`ErrorPage`] marker;
/// [`handle_errors`] turns marked responses into JSON bodies, redirects or
/// rendered error pages depending on the client.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found")]
    NotFound,

    #[error("Login required")]
    Unauthorized,

    #[error("{0}")]
    BadRequest(String),

    #[error("Database error: {0}")]
    Database(#[from] DbErr),

    #[error("Session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    #[error("Template error: {0}")]
    Template(#[from] handlebars::RenderError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Database(_)
            | AppError::Session(_)
            | AppError::Template(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show to the client.
    fn public_message(&self) -> String {
        match self {
            AppError::NotFound => "Sorry, page not found".to_string(),
            AppError::Unauthorized => "Login required".to_string(),
            AppError::BadRequest(message) => message.clone(),
            _ => "Internal server error".to_string(),
        }
    }
}

impl From<TransactionError<AppError>> for AppError {
    fn from(err: TransactionError<AppError>) -> Self {
        match err {
            TransactionError::Connection(db_err) => AppError::Database(db_err),
            TransactionError::Transaction(inner) => inner,
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::BadRequest(errors.to_string())
    }
}

/// Marker attached to responses built from an [`AppError`].
#[derive(Clone, Debug)]
pub struct ErrorPage {
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!("{}", self);
        } else {
            debug!("Request failed with {}: {}", status, self);
        }

        let mut response = status.into_response();
        response.extensions_mut().insert(ErrorPage {
            message: self.public_message(),
        });
        response
    }
}

/// Response for a handler that panicked, so the 500 page is still shown.
pub fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else {
        "unknown panic payload".to_string()
    };
    AppError::Internal(format!("handler panicked: {detail}")).into_response()
}

/// Router fallback for unknown paths.
pub async fn fallback() -> AppError {
    AppError::NotFound
}

/// Whether the client asked for a data response rather than a page.
pub fn expects_json(headers: &HeaderMap) -> bool {
    let xhr = headers
        .get("x-requested-with")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("XMLHttpRequest"));

    let accept_json = headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains("application/json") && !v.contains("text/html"));

    xhr || accept_json
}

/// Local path to send the client back to after a rejected form.
fn referer_path(headers: &HeaderMap) -> String {
    headers
        .get(header::REFERER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<Uri>().ok())
        .and_then(|uri| uri.path_and_query().map(|pq| pq.as_str().to_string()))
        .unwrap_or_else(|| "/".to_string())
}

/// Index URL carrying the path to return to after logging in.
pub fn login_redirect_target(path: &str) -> String {
    match serde_urlencoded::to_string(&[("next", path)]) {
        Ok(query) => format!("/?{query}"),
        Err(_) => "/".to_string(),
    }
}

fn json_error(status: StatusCode, message: &str, code: &str) -> Response {
    let body = ErrorResponse {
        error: message.to_string(),
        code: code.to_string(),
        success: false,
    };
    (status, Json(body)).into_response()
}

/// Error handlers for 404, 401, 400 and 500 responses raised by handlers.
pub async fn handle_errors(
    State(state): State<AppState>,
    session: Session,
    request: Request,
    next: Next,
) -> Response {
    let wants_json = expects_json(request.headers());
    let path = request.uri().path().to_string();
    let back = referer_path(request.headers());

    let response = next.run(request).await;

    let Some(page) = response.extensions().get::<ErrorPage>().cloned() else {
        return response;
    };
    let current = response
        .extensions()
        .get::<CurrentUser>()
        .cloned()
        .unwrap_or_default();

    match response.status() {
        StatusCode::NOT_FOUND => {
            if wants_json {
                return json_error(StatusCode::NOT_FOUND, &page.message, "NOT_FOUND");
            }
            render_error_page(&state, &session, &current, "errors/404", StatusCode::NOT_FOUND, &page).await
        }
        StatusCode::UNAUTHORIZED => {
            if wants_json {
                return json_error(StatusCode::UNAUTHORIZED, &page.message, "LOGIN_REQUIRED");
            }
            if let Err(e) = flash(&session, "error", "Please login to see this page").await {
                warn!("Failed to store flash message: {}", e);
            }
            Redirect::to(&login_redirect_target(&path)).into_response()
        }
        StatusCode::BAD_REQUEST => {
            if wants_json {
                return json_error(StatusCode::BAD_REQUEST, &page.message, "BAD_REQUEST");
            }
            if let Err(e) = flash(&session, "error", page.message.clone()).await {
                warn!("Failed to store flash message: {}", e);
            }
            Redirect::to(&back).into_response()
        }
        StatusCode::INTERNAL_SERVER_ERROR => {
            // Write paths run inside `DatabaseConnection::transaction`, which
            // has already rolled back by the time the error gets here.
            render_error_page(
                &state,
                &session,
                &current,
                "errors/500",
                StatusCode::INTERNAL_SERVER_ERROR,
                &page,
            )
            .await
        }
        _ => response,
    }
}

async fn render_error_page(
    state: &AppState,
    session: &Session,
    current: &CurrentUser,
    template: &str,
    status: StatusCode,
    page: &ErrorPage,
) -> Response {
    match render_page(state, session, current, template, json!({ "error": page.message })).await {
        Ok(html) => (status, html).into_response(),
        Err(e) => {
            error!("Failed to render {}: {}", template, e);
            (status, page.message.clone()).into_response()
        }
    }
}
