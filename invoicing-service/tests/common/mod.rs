//! Shared test harness: the full router over the in-memory store.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use invoicing_service::{
    build_router,
    config::{CorsConfig, DatabaseConfig, InvoicingConfig, JwtConfig, PdfConfig},
    services::{InMemoryStore, LocalStorage, PdfRenderer, ServiceError, Storage},
    AppState,
};
use secrecy::Secret;
use serde_json::{json, Value};
use service_core::observability::init_test_tracing;
use std::sync::Arc;
use tower::util::ServiceExt;

pub const STUB_PDF: &[u8] = b"%PDF-1.4 stub";

/// Renderer that skips the external binary.
pub struct StubRenderer;

#[async_trait]
impl PdfRenderer for StubRenderer {
    async fn render(&self, _html: String) -> Result<Vec<u8>, ServiceError> {
        Ok(STUB_PDF.to_vec())
    }
}

pub fn test_config() -> InvoicingConfig {
    InvoicingConfig {
        common: service_core::config::Config::default(),
        service_name: "invoicing-service".to_string(),
        service_version: "test".to_string(),
        log_level: "warn".to_string(),
        otlp_endpoint: None,
        database: DatabaseConfig {
            url: "postgres://unused".to_string(),
            max_connections: 1,
            min_connections: 1,
        },
        jwt: JwtConfig {
            secret: Secret::new("test-secret-that-is-at-least-32-bytes-long".to_string()),
            access_token_expiry_minutes: 15,
            refresh_token_expiry_days: 7,
        },
        pdf: PdfConfig {
            renderer_binary: "wkhtmltopdf".to_string(),
            render_timeout_seconds: 5,
            archive_dir: None,
        },
        cors: CorsConfig {
            allowed_origins: vec!["*".to_string()],
        },
    }
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: axum::http::HeaderMap,
    pub bytes: Vec<u8>,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.bytes).unwrap()
    }
}

pub struct TestApp {
    pub router: Router,
    pub store: Arc<InMemoryStore>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::build(Arc::new(StubRenderer), None)
    }

    pub fn with_archive(archive: LocalStorage) -> Self {
        Self::build(Arc::new(StubRenderer), Some(Arc::new(archive)))
    }

    pub fn build(renderer: Arc<dyn PdfRenderer>, archive: Option<Arc<dyn Storage>>) -> Self {
        init_test_tracing();

        let store = Arc::new(InMemoryStore::new());
        let state = AppState::new(test_config(), store.clone(), renderer, archive);

        Self {
            router: build_router(state),
            store,
        }
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let body = match body {
            Some(value) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };

        let response = self
            .router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response
            .into_body()
            .collect()
            .await
            .unwrap()
            .to_bytes()
            .to_vec();

        TestResponse {
            status,
            headers,
            bytes,
        }
    }

    pub async fn get(&self, uri: &str, token: &str) -> TestResponse {
        self.request(Method::GET, uri, Some(token), None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> TestResponse {
        self.request(Method::POST, uri, token, Some(body)).await
    }

    pub async fn put(&self, uri: &str, token: &str, body: Value) -> TestResponse {
        self.request(Method::PUT, uri, Some(token), Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: &str) -> TestResponse {
        self.request(Method::DELETE, uri, Some(token), None).await
    }

    /// Register an account and return its access token.
    pub async fn sign_up(&self, email: &str) -> String {
        let response = self
            .post("/v1/public/auth/sign-up", None, sign_up_body(email))
            .await;
        assert_eq!(response.status, StatusCode::CREATED);
        response.json()["access_token"]
            .as_str()
            .unwrap()
            .to_string()
    }

    pub async fn create_client(&self, token: &str, name: &str) -> Value {
        let response = self
            .post(
                "/v1/protected/clients",
                Some(token),
                json!({
                    "name": name,
                    "email": format!("{}@client.test", name.to_lowercase().replace(' ', "-")),
                    "address": "1 Client Road",
                    "phone": "+1-555-0100"
                }),
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED);
        response.json()
    }

    pub async fn create_invoice(&self, token: &str, body: Value) -> Value {
        let response = self.post("/v1/protected/invoices", Some(token), body).await;
        assert_eq!(response.status, StatusCode::CREATED, "{}", response.json());
        response.json()
    }
}

pub fn sign_up_body(email: &str) -> Value {
    json!({
        "name": "Ada Lovelace",
        "email": email,
        "password": "secret123",
        "address": "12 Analytical Street",
        "phone": "+44-20-0000",
        "bank_name": "First Engine Bank",
        "bank_account_name": "Ada Lovelace",
        "bank_account_number": "0012345678"
    })
}

/// Invoice with items `2 x 10` and `1 x 5` at 10% tax.
pub fn two_item_invoice(number: &str) -> Value {
    json!({
        "invoice_number": number,
        "issue_date": "2024-01-01",
        "due_date": "2024-01-31",
        "tax_rate": 10,
        "client_name": "Acme Corp",
        "client_email": "billing@acme.test",
        "items": [
            {"description": "Consulting", "quantity": 2, "unit_price": 10},
            {"description": "Hosting", "quantity": 1, "unit_price": 5}
        ]
    })
}

pub fn item_ids(invoice: &Value) -> Vec<i64> {
    invoice["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["id"].as_i64().unwrap())
        .collect()
}
