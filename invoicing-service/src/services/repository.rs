//! Persistence ports. [`Database`](super::Database) implements them on
//! PostgreSQL and [`InMemoryStore`](super::InMemoryStore) in process memory.
//!
//! Every client and invoice operation takes the owning user's id and must
//! treat rows owned by anyone else as absent.

use async_trait::async_trait;

use crate::models::{
    Client, Invoice, InvoicePatch, InvoiceSummary, ListClientsFilter, ListInvoicesFilter,
    NewClient, NewInvoice, NewUser, User,
};
use crate::services::ServiceError;

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Fails with `Conflict` when the email is already registered.
    async fn create_user(&self, input: &NewUser) -> Result<User, ServiceError>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, ServiceError>;

    async fn find_user_by_id(&self, user_id: i64) -> Result<Option<User>, ServiceError>;

    /// Persist every profile field of `user`. Fails with `Conflict` when the
    /// new email belongs to another account.
    async fn update_user(&self, user: &User) -> Result<Option<User>, ServiceError>;
}

#[async_trait]
pub trait ClientRepository: Send + Sync {
    async fn create_client(&self, input: &NewClient) -> Result<Client, ServiceError>;

    /// Matching clients, newest first, and the total match count.
    async fn list_clients(
        &self,
        user_id: i64,
        filter: &ListClientsFilter,
    ) -> Result<(Vec<Client>, i64), ServiceError>;

    async fn get_client(&self, user_id: i64, client_id: i64)
        -> Result<Option<Client>, ServiceError>;

    async fn update_client(&self, client: &Client) -> Result<Option<Client>, ServiceError>;

    async fn delete_client(&self, user_id: i64, client_id: i64) -> Result<bool, ServiceError>;
}

#[async_trait]
pub trait InvoiceRepository: Send + Sync {
    /// Insert the header and all items atomically with derived totals and
    /// status `draft`.
    async fn create_invoice(&self, input: &NewInvoice) -> Result<Invoice, ServiceError>;

    async fn get_invoice(
        &self,
        user_id: i64,
        invoice_id: i64,
    ) -> Result<Option<Invoice>, ServiceError>;

    /// Matching invoices with items, newest first, and the total match count.
    async fn list_invoices(
        &self,
        user_id: i64,
        filter: &ListInvoicesFilter,
    ) -> Result<(Vec<Invoice>, i64), ServiceError>;

    /// Apply `patch` as one atomic unit. Readers observe either the invoice
    /// before the call or after it, never a partial item set.
    async fn reconcile_invoice(
        &self,
        user_id: i64,
        invoice_id: i64,
        patch: &InvoicePatch,
    ) -> Result<Invoice, ServiceError>;

    async fn update_invoice_status(
        &self,
        user_id: i64,
        invoice_id: i64,
        status: &str,
    ) -> Result<Option<Invoice>, ServiceError>;

    /// Delete items, then the header, in one transaction.
    async fn delete_invoice(&self, user_id: i64, invoice_id: i64) -> Result<bool, ServiceError>;

    async fn invoice_summary(&self, user_id: i64) -> Result<InvoiceSummary, ServiceError>;
}

#[async_trait]
pub trait HealthCheck: Send + Sync {
    async fn health_check(&self) -> Result<(), ServiceError>;
}

/// Everything the service needs from a backing store.
pub trait Store: UserRepository + ClientRepository + InvoiceRepository + HealthCheck {}

impl<T> Store for T where T: UserRepository + ClientRepository + InvoiceRepository + HealthCheck {}
