use askama::Template;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Form,
};
use service_core::error::AppError;
use tower_sessions::Session;
use validator::Validate;

use crate::dtos::{safe_next, LoginForm, NextParams};
use crate::handlers::render;
use crate::middleware::auth::{LOGIN_PATH, SESSION_USER_ID};
use crate::models::{AuthUser, User};
use crate::services::metrics::LOGIN_ATTEMPTS;
use crate::startup::AppState;
use crate::utils::{verify_password, Password};

const LOGIN_FAILED: &str = "Please enter a correct username and password.";

#[derive(Template)]
#[template(path = "login.html")]
pub struct LoginTemplate {
    pub current_user: Option<AuthUser>,
    pub error: Option<String>,
    pub username: String,
    pub next: String,
}

fn session_error(e: tower_sessions::session::Error) -> AppError {
    AppError::InternalError(anyhow::anyhow!("Session error: {}", e))
}

/// GET /login/
pub async fn login_page(Query(params): Query<NextParams>) -> impl IntoResponse {
    LoginTemplate {
        current_user: None,
        error: None,
        username: String::new(),
        next: safe_next(params.next.as_deref()),
    }
}

fn login_failed(form: &LoginForm) -> Result<Response, AppError> {
    LOGIN_ATTEMPTS.with_label_values(&["failed"]).inc();
    render(
        StatusCode::UNPROCESSABLE_ENTITY,
        &LoginTemplate {
            current_user: None,
            error: Some(LOGIN_FAILED.to_string()),
            username: form.username.trim().to_string(),
            next: safe_next(form.next.as_deref()),
        },
    )
}

/// Only active superusers may sign in to the portal.
async fn authenticate(state: &AppState, form: &LoginForm) -> Result<Option<User>, AppError> {
    let Some(user) = state.db.get_user_by_username(form.username.trim()).await? else {
        return Ok(None);
    };
    if !user.is_active || !user.is_superuser {
        return Ok(None);
    }

    let password = Password::new(form.password.clone());
    let hash = user.password_hash.clone();
    let matches = tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|e| AppError::InternalError(anyhow::anyhow!("Password check failed: {}", e)))?;

    Ok(matches.then_some(user))
}

/// POST /login/
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<LoginForm>,
) -> Result<Response, AppError> {
    if form.validate().is_err() {
        return login_failed(&form);
    }

    let Some(user) = authenticate(&state, &form).await? else {
        tracing::info!(username = %form.username.trim(), "Login rejected");
        return login_failed(&form);
    };

    session.cycle_id().await.map_err(session_error)?;
    session
        .insert(SESSION_USER_ID, user.id)
        .await
        .map_err(session_error)?;
    state.db.touch_last_login(user.id).await?;

    LOGIN_ATTEMPTS.with_label_values(&["success"]).inc();
    tracing::info!(user_id = user.id, username = %user.username, "User logged in");

    Ok(Redirect::to(&safe_next(form.next.as_deref())).into_response())
}

/// GET|POST /logout/
pub async fn logout(session: Session) -> Result<Response, AppError> {
    if let Ok(Some(user_id)) = session.get::<i64>(SESSION_USER_ID).await {
        tracing::info!(user_id = user_id, "User logged out");
    }
    session.flush().await.map_err(session_error)?;
    Ok(Redirect::to(LOGIN_PATH).into_response())
}
