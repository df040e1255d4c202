//! Invoice list, create, edit and delete pages.

use askama::Template;
use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
    Extension, Form,
};
use service_core::error::AppError;

use crate::dtos::{CreatedParams, FormErrors, InvoiceForm, ListParams};
use crate::handlers::{is_fragment_request, render, InvoiceId};
use crate::services::metrics::ERRORS_TOTAL;
use crate::models::{AuthUser, Invoice, InvoiceInput, Page};
use crate::startup::AppState;

#[derive(Template)]
#[template(path = "invoice_list.html")]
pub struct InvoiceListTemplate {
    pub current_user: Option<AuthUser>,
    pub page: Page<Invoice>,
    pub search: String,
    pub date_from: String,
    pub date_to: String,
}

#[derive(Template)]
#[template(path = "partials/invoice_table.html")]
pub struct InvoiceTableTemplate {
    pub page: Page<Invoice>,
    pub search: String,
    pub date_from: String,
    pub date_to: String,
}

#[derive(Template)]
#[template(path = "invoice_form.html")]
pub struct InvoiceFormTemplate {
    pub current_user: Option<AuthUser>,
    pub title: String,
    pub action: String,
    pub form: InvoiceForm,
    pub errors: FormErrors,
    pub created: Option<Invoice>,
}

#[derive(Template)]
#[template(path = "invoice_confirm_delete.html")]
pub struct DeleteInvoiceTemplate {
    pub current_user: Option<AuthUser>,
    pub invoice: Invoice,
}

fn echo(value: &Option<String>) -> String {
    value.as_deref().unwrap_or_default().trim().to_string()
}

/// GET / and /list/
pub async fn list_invoices(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    headers: HeaderMap,
    Query(params): Query<ListParams>,
) -> Result<Response, AppError> {
    let filter = params.filter();
    let page = state
        .db
        .list_invoices(&filter, params.page.as_deref())
        .await?;

    let search = echo(&params.search);
    let date_from = echo(&params.date_from);
    let date_to = echo(&params.date_to);

    if is_fragment_request(&headers) {
        return render(
            StatusCode::OK,
            &InvoiceTableTemplate {
                page,
                search,
                date_from,
                date_to,
            },
        );
    }

    render(
        StatusCode::OK,
        &InvoiceListTemplate {
            current_user: Some(user),
            page,
            search,
            date_from,
            date_to,
        },
    )
}

/// GET /add/
pub async fn create_form(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<CreatedParams>,
) -> Result<Response, AppError> {
    let created = match params.created_id() {
        Some(id) => state.db.get_invoice(id).await?,
        None => None,
    };

    render(
        StatusCode::OK,
        &InvoiceFormTemplate {
            current_user: Some(user),
            title: "Create Quotation".to_string(),
            action: "/add/".to_string(),
            form: InvoiceForm::default(),
            errors: FormErrors::default(),
            created,
        },
    )
}

/// POST /add/
pub async fn create_invoice(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Form(form): Form<InvoiceForm>,
) -> Result<Response, AppError> {
    let input = match form.parse() {
        Ok(input) => input,
        Err(errors) => {
            ERRORS_TOTAL.with_label_values(&["validation_error"]).inc();
            return render(
                StatusCode::UNPROCESSABLE_ENTITY,
                &InvoiceFormTemplate {
                    current_user: Some(user),
                    title: "Create Quotation".to_string(),
                    action: "/add/".to_string(),
                    form,
                    errors,
                    created: None,
                },
            )
        }
    };

    let invoice = state.db.create_invoice(&input).await?;

    tracing::info!(
        invoice_id = invoice.id,
        invoice_number = invoice.invoice_number,
        user = %user.username,
        "Invoice submitted"
    );

    Ok(Redirect::to(&format!("/add/?created_id={}", invoice.id)).into_response())
}

fn input_of(invoice: &Invoice) -> InvoiceInput {
    InvoiceInput {
        client_name: invoice.client_name.clone(),
        reference_no: invoice.reference_no.clone(),
        date: invoice.date,
        subject: invoice.subject.clone(),
        address: invoice.address.clone(),
        mobile_number: invoice.mobile_number.clone(),
        amount: invoice.amount,
        work_description: invoice.work_description.clone(),
    }
}

/// GET /update/{id}/
pub async fn edit_form(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    InvoiceId(id): InvoiceId,
) -> Result<Response, AppError> {
    let invoice = state.db.require_invoice(id).await?;

    render(
        StatusCode::OK,
        &InvoiceFormTemplate {
            current_user: Some(user),
            title: "Edit Quotation".to_string(),
            action: format!("/update/{}/", id),
            form: InvoiceForm::from_input(&input_of(&invoice)),
            errors: FormErrors::default(),
            created: None,
        },
    )
}

/// POST /update/{id}/
pub async fn update_invoice(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    InvoiceId(id): InvoiceId,
    Form(form): Form<InvoiceForm>,
) -> Result<Response, AppError> {
    // Unknown ids are a 404 even when the submission is invalid.
    state.db.require_invoice(id).await?;

    match form.parse() {
        Ok(input) => {
            state.db.update_invoice(id, &input).await?;
            Ok(Redirect::to("/list/").into_response())
        }
        Err(errors) => {
            ERRORS_TOTAL.with_label_values(&["validation_error"]).inc();
            render(
                StatusCode::UNPROCESSABLE_ENTITY,
                &InvoiceFormTemplate {
                    current_user: Some(user),
                    title: "Edit Quotation".to_string(),
                    action: format!("/update/{}/", id),
                    form,
                    errors,
                    created: None,
                },
            )
        }
    }
}

/// GET /delete/{id}/
pub async fn delete_confirm(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    InvoiceId(id): InvoiceId,
) -> Result<Response, AppError> {
    let invoice = state.db.require_invoice(id).await?;

    render(
        StatusCode::OK,
        &DeleteInvoiceTemplate {
            current_user: Some(user),
            invoice,
        },
    )
}

/// POST /delete/{id}/
pub async fn delete_invoice(
    State(state): State<AppState>,
    InvoiceId(id): InvoiceId,
) -> Result<Response, AppError> {
    state.db.delete_invoice(id).await?;
    Ok(Redirect::to("/list/").into_response())
}
