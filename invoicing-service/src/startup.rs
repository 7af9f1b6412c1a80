//! Application startup and lifecycle management.

use axum::{
    http::HeaderValue,
    middleware,
    routing::{get, patch, post},
    Router,
};
use service_core::error::AppError;
use service_core::middleware::{request_id_middleware, security_headers_middleware};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::config::{CorsConfig, InvoicingConfig};
use crate::handlers::*;
use crate::middleware::{auth_middleware, metrics_middleware};
use crate::services::{
    init_metrics, AuthService, ClientService, CommandPdfRenderer, Database, HealthCheck,
    InvoiceService, JwtService, LocalStorage, PdfRenderer, Storage, Store,
};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<InvoicingConfig>,
    pub jwt: JwtService,
    pub auth: AuthService,
    pub clients: ClientService,
    pub invoices: InvoiceService,
    pub health: Arc<dyn HealthCheck>,
}

impl AppState {
    /// Wire every service to one backing store.
    pub fn new<S: Store + 'static>(
        config: InvoicingConfig,
        store: Arc<S>,
        renderer: Arc<dyn PdfRenderer>,
        archive: Option<Arc<dyn Storage>>,
    ) -> Self {
        let jwt = JwtService::new(&config.jwt);

        Self {
            auth: AuthService::new(store.clone(), jwt.clone()),
            clients: ClientService::new(store.clone()),
            invoices: InvoiceService::new(
                store.clone(),
                store.clone(),
                store.clone(),
                renderer,
                archive,
            ),
            health: store,
            jwt,
            config: Arc::new(config),
        }
    }
}

fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    if config.allows_any() {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(origins)
}

/// Build the full HTTP router.
pub fn build_router(state: AppState) -> Router {
    let public = Router::new()
        .route("/auth/sign-up", post(sign_up))
        .route("/auth/sign-in", post(sign_in))
        .route("/auth/refresh-token", post(refresh_token))
        .route("/invoices/generate-pdf", post(public_invoice_pdf));

    let protected = Router::new()
        .route("/me", get(me).put(update_me))
        .route("/clients", post(create_client).get(list_clients))
        .route(
            "/clients/:id",
            get(get_client).put(update_client).delete(delete_client),
        )
        .route("/invoices/summary", get(invoice_summary))
        .route("/invoices", post(create_invoice).get(list_invoices))
        .route(
            "/invoices/:id",
            get(get_invoice).put(update_invoice).delete(delete_invoice),
        )
        .route("/invoices/:id/status", patch(update_invoice_status))
        .route("/invoices/:id/pdf", post(invoice_pdf))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/metrics", get(metrics_handler))
        .nest("/v1/public", public)
        .nest("/v1/protected", protected)
        .route_layer(middleware::from_fn(metrics_middleware))
        .layer(TimeoutLayer::new(state.config.common.request_timeout()))
        .layer(cors_layer(&state.config.cors))
        .layer(middleware::from_fn(security_headers_middleware))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(trace_layer)
        .with_state(state)
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    state: AppState,
}

impl Application {
    /// Build the application with the given configuration.
    pub async fn build(config: InvoicingConfig) -> Result<Self, AppError> {
        Self::build_internal(config, true).await
    }

    /// Build the application without running migrations.
    /// Use this in tests when migrations are already applied by the test harness.
    pub async fn build_without_migrations(config: InvoicingConfig) -> Result<Self, AppError> {
        Self::build_internal(config, false).await
    }

    async fn build_internal(
        config: InvoicingConfig,
        run_migrations: bool,
    ) -> Result<Self, AppError> {
        init_metrics();

        let db = Database::new(
            &config.database.url,
            config.database.max_connections,
            config.database.min_connections,
        )
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to connect to PostgreSQL");
            e
        })?;

        if run_migrations {
            db.run_migrations().await.map_err(|e| {
                tracing::error!(error = %e, "Failed to run migrations");
                e
            })?;
        }

        let renderer: Arc<dyn PdfRenderer> = Arc::new(CommandPdfRenderer::new(
            config.pdf.renderer_binary.clone(),
            config.pdf.render_timeout(),
        ));

        let archive: Option<Arc<dyn Storage>> = match &config.pdf.archive_dir {
            Some(dir) => {
                let storage = LocalStorage::new(dir.clone()).await.map_err(|e| {
                    tracing::error!(
                        error = %e,
                        dir = %dir.display(),
                        "Failed to prepare PDF archive"
                    );
                    AppError::from(e)
                })?;
                tracing::info!(dir = %dir.display(), "Archiving rendered PDFs");
                Some(Arc::new(storage))
            }
            None => None,
        };

        let addr: SocketAddr = config.common.address().parse().map_err(|e| {
            AppError::ConfigError(anyhow::anyhow!("Invalid listen address: {}", e))
        })?;
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!(error = %e, addr = %addr, "Failed to bind HTTP listener");
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        let state = AppState::new(config, Arc::new(db), renderer, archive);

        tracing::info!(port = port, "Invoicing service listener bound");

        Ok(Self {
            port,
            listener,
            state,
        })
    }

    /// Get the port the server is listening on.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Run the application until stopped.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        let router = build_router(self.state);

        tracing::info!(
            service = "invoicing-service",
            version = env!("CARGO_PKG_VERSION"),
            port = self.port,
            "Service ready to accept connections"
        );

        axum::serve(self.listener, router).await.map_err(|e| {
            tracing::error!(error = %e, "HTTP server error");
            std::io::Error::other(format!("HTTP server error: {}", e))
        })
    }
}
