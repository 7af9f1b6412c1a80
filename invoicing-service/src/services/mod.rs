//! Services module for invoicing-service.

pub mod auth;
pub mod calculation;
pub mod clients;
pub mod database;
pub mod error;
pub mod executor;
pub mod invoices;
pub mod jwt;
pub mod memory;
pub mod metrics;
pub mod pdf;
pub mod reconcile;
pub mod repository;
pub mod storage;

pub use auth::AuthService;
pub use clients::ClientService;
pub use database::Database;
pub use error::ServiceError;
pub use invoices::InvoiceService;
pub use jwt::{Claims, JwtService, TokenPair};
pub use memory::InMemoryStore;
pub use metrics::{get_metrics, init_metrics};
pub use pdf::{CommandPdfRenderer, PdfModel, PdfRenderer, RenderedPdf};
pub use repository::{ClientRepository, HealthCheck, InvoiceRepository, Store, UserRepository};
pub use storage::{LocalStorage, Storage};
