//! PDF endpoints with the external renderer swapped out.

mod common;

use async_trait::async_trait;
use axum::http::{header, StatusCode};
use common::{two_item_invoice, TestApp, STUB_PDF};
use invoicing_service::services::{LocalStorage, PdfRenderer, ServiceError};
use serde_json::json;
use std::sync::{Arc, Mutex};

/// Keeps the last HTML document it was asked to render.
#[derive(Default)]
struct CapturingRenderer {
    html: Mutex<Option<String>>,
}

#[async_trait]
impl PdfRenderer for CapturingRenderer {
    async fn render(&self, html: String) -> Result<Vec<u8>, ServiceError> {
        *self.html.lock().unwrap() = Some(html);
        Ok(STUB_PDF.to_vec())
    }
}

struct FailingRenderer;

#[async_trait]
impl PdfRenderer for FailingRenderer {
    async fn render(&self, _html: String) -> Result<Vec<u8>, ServiceError> {
        Err(ServiceError::Render(anyhow::anyhow!("renderer exited with status 1")))
    }
}

fn public_request() -> serde_json::Value {
    json!({
        "invoice_number": "Q/2024 7",
        "issue_date": "2024-03-01",
        "due_date": "2024-03-31",
        "currency": "EUR",
        "tax_rate": 10,
        "sender": {
            "name": "Freelance Studio",
            "email": "hello@studio.test",
            "bank_name": "Studio Bank",
            "bank_account_name": "Freelance Studio",
            "bank_account_number": "DE00 1234"
        },
        "recipient": {"name": "Client GmbH", "email": "ap@client.test"},
        "items": [{"description": "Design sprint", "quantity": 2, "unit_price": 600}]
    })
}

#[tokio::test]
async fn stored_invoice_pdf_is_returned_as_attachment() {
    let renderer = Arc::new(CapturingRenderer::default());
    let app = TestApp::build(renderer.clone(), None);
    let token = app.sign_up("owner@example.com").await;
    let invoice = app.create_invoice(&token, two_item_invoice("INV-001")).await;

    let response = app
        .post(
            &format!("/v1/protected/invoices/{}/pdf", invoice["id"]),
            Some(&token),
            json!({}),
        )
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.headers[header::CONTENT_TYPE], "application/pdf");
    assert_eq!(
        response.headers[header::CONTENT_DISPOSITION],
        "attachment; filename=\"invoice-INV-001.pdf\""
    );
    assert_eq!(response.bytes, STUB_PDF);

    let html = renderer.html.lock().unwrap().clone().unwrap();
    assert!(html.contains("INV-001"));
    assert!(html.contains("Ada Lovelace"));
    assert!(html.contains("First Engine Bank"));
    assert!(html.contains("Acme Corp"));
    assert!(html.contains("Consulting"));
    assert!(html.contains("USD 27.50"));
}

#[tokio::test]
async fn stored_invoice_pdf_prefers_live_client_record() {
    let renderer = Arc::new(CapturingRenderer::default());
    let app = TestApp::build(renderer.clone(), None);
    let token = app.sign_up("owner@example.com").await;
    let client = app.create_client(&token, "Tyrell Corp").await;

    let mut body = two_item_invoice("INV-002");
    body["client_id"] = client["id"].clone();
    let invoice = app.create_invoice(&token, body).await;
    app.put(
        &format!("/v1/protected/clients/{}", client["id"]),
        &token,
        json!({"address": "2019 Off-World Ave"}),
    )
    .await;

    let response = app
        .post(
            &format!("/v1/protected/invoices/{}/pdf", invoice["id"]),
            Some(&token),
            json!({}),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);

    let html = renderer.html.lock().unwrap().clone().unwrap();
    assert!(html.contains("2019 Off-World Ave"));
}

#[tokio::test]
async fn pdf_of_foreign_invoice_is_not_found() {
    let app = TestApp::new();
    let owner = app.sign_up("owner@example.com").await;
    let other = app.sign_up("other@example.com").await;
    let invoice = app.create_invoice(&owner, two_item_invoice("INV-1")).await;

    let response = app
        .post(
            &format!("/v1/protected/invoices/{}/pdf", invoice["id"]),
            Some(&other),
            json!({}),
        )
        .await;

    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn public_pdf_needs_no_account_and_stores_nothing() {
    let renderer = Arc::new(CapturingRenderer::default());
    let app = TestApp::build(renderer.clone(), None);

    let response = app
        .post("/v1/public/invoices/generate-pdf", None, public_request())
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.headers[header::CONTENT_TYPE], "application/pdf");
    assert_eq!(
        response.headers[header::CONTENT_DISPOSITION],
        "attachment; filename=\"invoice-Q_2024_7.pdf\""
    );

    let html = renderer.html.lock().unwrap().clone().unwrap();
    assert!(html.contains("Freelance Studio"));
    assert!(html.contains("Client GmbH"));
    assert!(html.contains("Studio Bank"));
    assert!(html.contains("EUR 1,320.00"));

    let token = app.sign_up("owner@example.com").await;
    let listed = app.get("/v1/protected/invoices", &token).await.json();
    assert!(listed["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn public_pdf_validates_request() {
    let app = TestApp::new();

    let mut body = public_request();
    body["items"] = json!([]);
    let response = app
        .post("/v1/public/invoices/generate-pdf", None, body)
        .await;
    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);

    let mut body = public_request();
    body["due_date"] = json!("March 31");
    let response = app
        .post("/v1/public/invoices/generate-pdf", None, body)
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn render_failure_is_a_server_error() {
    let app = TestApp::build(Arc::new(FailingRenderer), None);

    let response = app
        .post("/v1/public/invoices/generate-pdf", None, public_request())
        .await;

    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.json()["error"], "Failed to generate PDF");
}

#[tokio::test]
async fn rendered_pdf_is_archived_and_removed_with_invoice() {
    let dir = tempfile::tempdir().unwrap();
    let archive = LocalStorage::new(dir.path()).await.unwrap();
    let app = TestApp::with_archive(archive);
    let token = app.sign_up("owner@example.com").await;
    let invoice = app.create_invoice(&token, two_item_invoice("INV-001")).await;
    let id = invoice["id"].as_i64().unwrap();

    let response = app
        .post(
            &format!("/v1/protected/invoices/{}/pdf", id),
            Some(&token),
            json!({}),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);

    let archived = dir
        .path()
        .join("invoices")
        .join(invoice["user_id"].to_string())
        .join(format!("{}.pdf", id));
    assert_eq!(std::fs::read(&archived).unwrap(), STUB_PDF);

    let response = app
        .delete(&format!("/v1/protected/invoices/{}", id), &token)
        .await;
    assert_eq!(response.status, StatusCode::NO_CONTENT);
    assert!(!archived.exists());
}
