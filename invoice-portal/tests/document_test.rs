//! Invoice and quotation PDF downloads.

mod common;

use common::TestApp;
use reqwest::StatusCode;

#[tokio::test]
#[ignore = "Requires PostgreSQL (TEST_DATABASE_URL)"]
async fn invoice_pdf_is_an_attachment() {
    let app = TestApp::spawn().await;
    let id = app.create_invoice("Acme", "REF-9", "2026-10-01", "1000.00").await;

    let response = app.get(&format!("/generate-pdf/{}/", id)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "application/pdf");
    assert_eq!(
        response.headers()["content-disposition"],
        "attachment; filename=\"invoice_REF-9.pdf\""
    );
    let bytes = response.bytes().await.unwrap();
    assert!(bytes.starts_with(b"%PDF"));

    app.cleanup().await;
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (TEST_DATABASE_URL)"]
async fn quotation_filename_is_sanitised() {
    let app = TestApp::spawn().await;
    let id = app.create_invoice("Acme", "Q/2026 #7", "2026-10-01", "250.00").await;

    let response = app.get(&format!("/generate-quotation/{}/", id)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["content-disposition"],
        "attachment; filename=\"quotation_Q_2026__7.pdf\""
    );
    assert!(response.bytes().await.unwrap().starts_with(b"%PDF"));

    app.cleanup().await;
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (TEST_DATABASE_URL)"]
async fn documents_for_unknown_invoices_are_not_found() {
    let app = TestApp::spawn().await;

    assert_eq!(app.get("/generate-pdf/999999/").await.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        app.get("/generate-quotation/999999/").await.status(),
        StatusCode::NOT_FOUND
    );

    app.cleanup().await;
}
