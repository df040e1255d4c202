use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Response},
};
use service_core::error::AppError;

use crate::handlers::InvoiceId;
use crate::services::documents::{render_document, DocumentKind};
use crate::startup::AppState;

async fn document_response(
    state: &AppState,
    id: i64,
    kind: DocumentKind,
) -> Result<Response, AppError> {
    let invoice = state.db.require_invoice(id).await?;

    let rendered = render_document(
        kind,
        invoice,
        &state.config.documents.company_name,
        &state.config.documents.currency,
        state.converter.clone(),
    )
    .await?;

    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", rendered.filename),
            ),
        ],
        rendered.bytes,
    )
        .into_response())
}

/// GET /generate-pdf/{id}/
pub async fn invoice_pdf(
    State(state): State<AppState>,
    InvoiceId(id): InvoiceId,
) -> Result<Response, AppError> {
    document_response(&state, id, DocumentKind::Invoice).await
}

/// GET /generate-quotation/{id}/
pub async fn quotation_pdf(
    State(state): State<AppState>,
    InvoiceId(id): InvoiceId,
) -> Result<Response, AppError> {
    document_response(&state, id, DocumentKind::Quotation).await
}
