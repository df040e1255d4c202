pub mod analytics;
pub mod auth;
pub mod documents;
pub mod health;
pub mod invoices;

use askama::Template;
use axum::{
    async_trait,
    extract::{FromRequestParts, Path},
    http::{request::Parts, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Response},
};
use service_core::error::AppError;

/// Render `template` as an HTML response with the given status.
pub(crate) fn render<T: Template>(status: StatusCode, template: &T) -> Result<Response, AppError> {
    Ok((status, Html(template.render()?)).into_response())
}

/// Whether the caller asked for just a page fragment (`fetch`/XHR or htmx).
pub(crate) fn is_fragment_request(headers: &HeaderMap) -> bool {
    let xhr = headers
        .get("x-requested-with")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("XMLHttpRequest"));
    let htmx = headers
        .get("hx-request")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == "true");
    xhr || htmx
}

/// Numeric `{id}` path segment. A segment that is not a number is answered
/// like an unknown id.
pub struct InvoiceId(pub i64);

#[async_trait]
impl<S> FromRequestParts<S> for InvoiceId
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Path::<i64>::from_request_parts(parts, state).await {
            Ok(Path(id)) => Ok(InvoiceId(id)),
            Err(rejection) => {
                tracing::debug!(error = %rejection, path = %parts.uri.path(), "Invalid invoice id");
                Err(AppError::NotFound(anyhow::anyhow!("Invoice not found")))
            }
        }
    }
}
