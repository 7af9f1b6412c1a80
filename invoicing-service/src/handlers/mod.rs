//! HTTP handlers for invoicing-service.

pub mod auth;
pub mod clients;
pub mod health;
pub mod invoices;

pub use auth::*;
pub use clients::*;
pub use health::*;
pub use invoices::*;
