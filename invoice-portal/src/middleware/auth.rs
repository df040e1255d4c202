//! Superuser access guard.

use axum::{
    extract::{Request, State},
    http::Uri,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use service_core::error::AppError;
use tower_sessions::Session;

use crate::models::{AuthUser, User};
use crate::services::Database;
use crate::startup::AppState;

/// Session key holding the logged-in user's id.
pub const SESSION_USER_ID: &str = "user_id";

pub const LOGIN_PATH: &str = "/login/";

/// Outcome of checking a request against the superuser requirement.
#[derive(Debug, Clone, PartialEq)]
pub enum AccessDecision {
    Granted(AuthUser),
    Anonymous,
    NotSuperuser,
}

impl AccessDecision {
    /// Decide from the user the session points at, if any. Inactive or
    /// deleted accounts count as anonymous.
    pub fn for_user(user: Option<&User>) -> Self {
        match user {
            Some(user) if !user.is_active => AccessDecision::Anonymous,
            Some(user) if !user.is_superuser => AccessDecision::NotSuperuser,
            Some(user) => AccessDecision::Granted(AuthUser::from(user)),
            None => AccessDecision::Anonymous,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AccessDecision::Granted(_) => "granted",
            AccessDecision::Anonymous => "anonymous",
            AccessDecision::NotSuperuser => "not_superuser",
        }
    }
}

/// Resolve the session to an access decision. Anonymous sessions never
/// reach the database.
pub async fn evaluate_access(db: &Database, session: &Session) -> Result<AccessDecision, AppError> {
    let user_id = match session.get::<i64>(SESSION_USER_ID).await {
        Ok(id) => id,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to read session, treating as anonymous");
            None
        }
    };

    let Some(user_id) = user_id else {
        return Ok(AccessDecision::Anonymous);
    };

    let user = db.get_user(user_id).await?;
    Ok(AccessDecision::for_user(user.as_ref()))
}

/// `/login/?next=<path and query>` for the given request target.
pub fn login_redirect(uri: &Uri) -> String {
    let target = uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    format!("{}?next={}", LOGIN_PATH, urlencoding::encode(target))
}

/// Route layer: only active superusers get through. Everyone else is sent
/// to the login page with a `next` pointing back here.
pub async fn require_superuser(
    State(state): State<AppState>,
    session: Session,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let decision = evaluate_access(&state.db, &session).await?;

    match decision {
        AccessDecision::Granted(user) => {
            request.extensions_mut().insert(user);
            Ok(next.run(request).await)
        }
        denied => {
            tracing::info!(
                decision = denied.as_str(),
                path = %request.uri().path(),
                "Access denied, redirecting to login"
            );
            Ok(Redirect::to(&login_redirect(request.uri())).into_response())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn user(is_superuser: bool, is_active: bool) -> User {
        User {
            id: 3,
            username: "admin".to_string(),
            password_hash: String::new(),
            is_superuser,
            is_active,
            created_at: Utc::now(),
            last_login_at: None,
        }
    }

    #[test]
    fn active_superuser_is_granted() {
        let decision = AccessDecision::for_user(Some(&user(true, true)));
        assert_eq!(
            decision,
            AccessDecision::Granted(AuthUser {
                user_id: 3,
                username: "admin".to_string()
            })
        );
    }

    #[test]
    fn staff_without_superuser_is_refused() {
        assert_eq!(
            AccessDecision::for_user(Some(&user(false, true))),
            AccessDecision::NotSuperuser
        );
    }

    #[test]
    fn missing_or_inactive_user_is_anonymous() {
        assert_eq!(AccessDecision::for_user(None), AccessDecision::Anonymous);
        assert_eq!(
            AccessDecision::for_user(Some(&user(true, false))),
            AccessDecision::Anonymous
        );
    }

    #[test]
    fn login_redirect_carries_path_and_query() {
        let uri: Uri = "/list/?search=acme&page=2".parse().unwrap();
        assert_eq!(
            login_redirect(&uri),
            "/login/?next=%2Flist%2F%3Fsearch%3Dacme%26page%3D2"
        );
    }
}
