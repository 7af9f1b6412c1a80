//! In-process store used by tests and local runs without PostgreSQL.
//!
//! One `RwLock` guards all tables. Mutations hold the write lock for their
//! whole duration and only touch state after every check has passed, which
//! gives the same all-or-nothing visibility as a database transaction.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashSet};
use tokio::sync::RwLock;

use crate::models::{
    Client, Invoice, InvoiceItem, InvoicePatch, InvoiceStatus, InvoiceSummary, ListClientsFilter,
    ListInvoicesFilter, NewClient, NewInvoice, NewUser, User,
};
use crate::services::calculation::{line_total, recompute_aggregate};
use crate::services::reconcile::{plan_reconcile, ItemChange};
use crate::services::repository::{
    ClientRepository, HealthCheck, InvoiceRepository, UserRepository,
};
use crate::services::ServiceError;
use crate::utils::{normalize_search, PageRequest};

#[derive(Debug, Default)]
struct MemoryState {
    last_user_id: i64,
    last_client_id: i64,
    last_invoice_id: i64,
    last_item_id: i64,
    users: BTreeMap<i64, User>,
    clients: BTreeMap<i64, Client>,
    /// Headers only; items live in `items`.
    invoices: BTreeMap<i64, Invoice>,
    items: BTreeMap<i64, InvoiceItem>,
}

fn next_id(counter: &mut i64) -> i64 {
    *counter += 1;
    *counter
}

impl MemoryState {
    fn items_of(&self, invoice_id: i64) -> Vec<InvoiceItem> {
        self.items
            .values()
            .filter(|item| item.invoice_id == invoice_id)
            .cloned()
            .collect()
    }

    fn with_items(&self, header: &Invoice) -> Invoice {
        let mut invoice = header.clone();
        invoice.items = self.items_of(header.id);
        invoice
    }

    fn owned_invoice(&self, user_id: i64, invoice_id: i64) -> Option<&Invoice> {
        self.invoices
            .get(&invoice_id)
            .filter(|invoice| invoice.user_id == user_id)
    }

    fn insert_item(
        &mut self,
        invoice_id: i64,
        description: &str,
        quantity: i32,
        unit_price: f64,
    ) -> InvoiceItem {
        let item = InvoiceItem {
            id: next_id(&mut self.last_item_id),
            invoice_id,
            description: description.to_string(),
            quantity,
            unit_price,
            total: line_total(quantity, unit_price),
        };
        self.items.insert(item.id, item.clone());
        item
    }
}

fn contains_ci(field: Option<&str>, needle: &str) -> bool {
    field.is_some_and(|value| value.to_lowercase().contains(needle))
}

/// Newest first; id breaks ties so ordering is stable.
fn newest_first<T>(rows: &mut [T], key: impl Fn(&T) -> (chrono::DateTime<Utc>, i64)) {
    rows.sort_by(|a, b| key(b).cmp(&key(a)));
}

fn paginate<T>(rows: Vec<T>, page: Option<PageRequest>) -> Vec<T> {
    match page {
        Some(page) => rows
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit() as usize)
            .collect(),
        None => rows,
    }
}

#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: RwLock<MemoryState>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ids of every stored item row belonging to `invoice_id`, whoever owns it.
    pub async fn item_ids_for(&self, invoice_id: i64) -> Vec<i64> {
        let state = self.state.read().await;
        state.items_of(invoice_id).iter().map(|item| item.id).collect()
    }
}

#[async_trait]
impl HealthCheck for InMemoryStore {
    async fn health_check(&self) -> Result<(), ServiceError> {
        Ok(())
    }
}

#[async_trait]
impl UserRepository for InMemoryStore {
    async fn create_user(&self, input: &NewUser) -> Result<User, ServiceError> {
        let mut state = self.state.write().await;

        if state.users.values().any(|u| u.email == input.email) {
            return Err(ServiceError::Conflict("email already exists".to_string()));
        }

        let now = Utc::now();
        let user = User {
            id: next_id(&mut state.last_user_id),
            name: input.name.clone(),
            email: input.email.clone(),
            password_hash: input.password_hash.clone(),
            address: input.address.clone(),
            phone: input.phone.clone(),
            bank_name: input.bank_name.clone(),
            bank_account_name: input.bank_account_name.clone(),
            bank_account_number: input.bank_account_number.clone(),
            created_at: now,
            updated_at: now,
        };
        state.users.insert(user.id, user.clone());

        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, ServiceError> {
        let state = self.state.read().await;
        Ok(state.users.values().find(|u| u.email == email).cloned())
    }

    async fn find_user_by_id(&self, user_id: i64) -> Result<Option<User>, ServiceError> {
        let state = self.state.read().await;
        Ok(state.users.get(&user_id).cloned())
    }

    async fn update_user(&self, user: &User) -> Result<Option<User>, ServiceError> {
        let mut state = self.state.write().await;

        if state
            .users
            .values()
            .any(|u| u.id != user.id && u.email == user.email)
        {
            return Err(ServiceError::Conflict("email already exists".to_string()));
        }

        let Some(stored) = state.users.get_mut(&user.id) else {
            return Ok(None);
        };
        stored.name = user.name.clone();
        stored.email = user.email.clone();
        stored.address = user.address.clone();
        stored.phone = user.phone.clone();
        stored.bank_name = user.bank_name.clone();
        stored.bank_account_name = user.bank_account_name.clone();
        stored.bank_account_number = user.bank_account_number.clone();
        stored.updated_at = Utc::now();

        Ok(Some(stored.clone()))
    }
}

#[async_trait]
impl ClientRepository for InMemoryStore {
    async fn create_client(&self, input: &NewClient) -> Result<Client, ServiceError> {
        let mut state = self.state.write().await;

        let now = Utc::now();
        let client = Client {
            id: next_id(&mut state.last_client_id),
            user_id: input.user_id,
            name: input.name.clone(),
            email: Some(input.email.clone()),
            phone: Some(input.phone.clone()),
            address: Some(input.address.clone()),
            created_at: now,
            updated_at: now,
        };
        state.clients.insert(client.id, client.clone());

        Ok(client)
    }

    async fn list_clients(
        &self,
        user_id: i64,
        filter: &ListClientsFilter,
    ) -> Result<(Vec<Client>, i64), ServiceError> {
        let state = self.state.read().await;
        let needle = normalize_search(filter.search.as_deref()).map(|s| s.to_lowercase());

        let mut matching: Vec<Client> = state
            .clients
            .values()
            .filter(|c| c.user_id == user_id)
            .filter(|c| match &needle {
                Some(needle) => {
                    contains_ci(Some(&c.name), needle)
                        || contains_ci(c.email.as_deref(), needle)
                        || contains_ci(c.phone.as_deref(), needle)
                        || contains_ci(c.address.as_deref(), needle)
                }
                None => true,
            })
            .cloned()
            .collect();
        newest_first(&mut matching, |c| (c.created_at, c.id));

        let total = matching.len() as i64;
        Ok((paginate(matching, filter.page), total))
    }

    async fn get_client(
        &self,
        user_id: i64,
        client_id: i64,
    ) -> Result<Option<Client>, ServiceError> {
        let state = self.state.read().await;
        Ok(state
            .clients
            .get(&client_id)
            .filter(|c| c.user_id == user_id)
            .cloned())
    }

    async fn update_client(&self, client: &Client) -> Result<Option<Client>, ServiceError> {
        let mut state = self.state.write().await;

        let Some(stored) = state
            .clients
            .get_mut(&client.id)
            .filter(|c| c.user_id == client.user_id)
        else {
            return Ok(None);
        };
        stored.name = client.name.clone();
        stored.email = client.email.clone();
        stored.phone = client.phone.clone();
        stored.address = client.address.clone();
        stored.updated_at = Utc::now();

        Ok(Some(stored.clone()))
    }

    async fn delete_client(&self, user_id: i64, client_id: i64) -> Result<bool, ServiceError> {
        let mut state = self.state.write().await;

        let owned = state
            .clients
            .get(&client_id)
            .is_some_and(|c| c.user_id == user_id);
        if owned {
            state.clients.remove(&client_id);
        }

        Ok(owned)
    }
}

#[async_trait]
impl InvoiceRepository for InMemoryStore {
    async fn create_invoice(&self, input: &NewInvoice) -> Result<Invoice, ServiceError> {
        let mut state = self.state.write().await;

        let totals = recompute_aggregate(&input.items, input.tax_rate);
        let now = Utc::now();
        let header = Invoice {
            id: next_id(&mut state.last_invoice_id),
            user_id: input.user_id,
            client_id: input.client_id,
            invoice_number: input.invoice_number.clone(),
            issue_date: input.issue_date,
            due_date: input.due_date,
            status: InvoiceStatus::Draft.as_str().to_string(),
            notes: input.notes.clone(),
            currency: input.currency.as_str().to_string(),
            tax_rate: input.tax_rate,
            subtotal: totals.subtotal,
            tax: totals.tax,
            total: totals.total,
            client_name: input.client_name.clone(),
            client_email: input.client_email.clone(),
            client_address: input.client_address.clone(),
            client_phone: input.client_phone.clone(),
            created_at: now,
            updated_at: now,
            items: Vec::new(),
        };
        state.invoices.insert(header.id, header.clone());

        let mut invoice = header;
        for item in &input.items {
            let created =
                state.insert_item(invoice.id, &item.description, item.quantity, item.unit_price);
            invoice.items.push(created);
        }

        Ok(invoice)
    }

    async fn get_invoice(
        &self,
        user_id: i64,
        invoice_id: i64,
    ) -> Result<Option<Invoice>, ServiceError> {
        let state = self.state.read().await;
        Ok(state
            .owned_invoice(user_id, invoice_id)
            .map(|header| state.with_items(header)))
    }

    async fn list_invoices(
        &self,
        user_id: i64,
        filter: &ListInvoicesFilter,
    ) -> Result<(Vec<Invoice>, i64), ServiceError> {
        let state = self.state.read().await;
        let status = filter.status.as_deref().filter(|s| !s.is_empty());
        let needle = normalize_search(filter.search.as_deref()).map(|s| s.to_lowercase());

        let mut matching: Vec<&Invoice> = state
            .invoices
            .values()
            .filter(|i| i.user_id == user_id)
            .filter(|i| status.map_or(true, |s| i.status == s))
            .filter(|i| match &needle {
                Some(needle) => {
                    contains_ci(Some(&i.invoice_number), needle)
                        || contains_ci(i.client_name.as_deref(), needle)
                        || contains_ci(i.client_email.as_deref(), needle)
                        || contains_ci(i.notes.as_deref(), needle)
                }
                None => true,
            })
            .collect();
        newest_first(&mut matching, |i| (i.created_at, i.id));

        let total = matching.len() as i64;
        let page = paginate(matching, filter.page)
            .into_iter()
            .map(|header| state.with_items(header))
            .collect();

        Ok((page, total))
    }

    async fn reconcile_invoice(
        &self,
        user_id: i64,
        invoice_id: i64,
        patch: &InvoicePatch,
    ) -> Result<Invoice, ServiceError> {
        let mut state = self.state.write().await;

        let current = state
            .owned_invoice(user_id, invoice_id)
            .map(|header| state.with_items(header))
            .ok_or(ServiceError::NotFound("Invoice"))?;

        let plan = plan_reconcile(&current, patch)?;

        for change in &plan.changes {
            match change {
                ItemChange::Update(item) => {
                    state.items.insert(item.id, item.clone());
                }
                ItemChange::Insert(item) => {
                    state.insert_item(
                        invoice_id,
                        &item.description,
                        item.quantity,
                        item.unit_price,
                    );
                }
            }
        }
        let deleted: HashSet<i64> = plan.deleted.iter().copied().collect();
        state.items.retain(|id, _| !deleted.contains(id));

        let mut header = plan.invoice;
        header.updated_at = Utc::now();
        state.invoices.insert(invoice_id, header.clone());

        Ok(state.with_items(&header))
    }

    async fn update_invoice_status(
        &self,
        user_id: i64,
        invoice_id: i64,
        status: &str,
    ) -> Result<Option<Invoice>, ServiceError> {
        let mut state = self.state.write().await;

        let Some(header) = state
            .invoices
            .get_mut(&invoice_id)
            .filter(|i| i.user_id == user_id)
        else {
            return Ok(None);
        };
        header.status = status.to_string();
        header.updated_at = Utc::now();
        let header = header.clone();

        Ok(Some(state.with_items(&header)))
    }

    async fn delete_invoice(&self, user_id: i64, invoice_id: i64) -> Result<bool, ServiceError> {
        let mut state = self.state.write().await;

        if state.owned_invoice(user_id, invoice_id).is_none() {
            return Ok(false);
        }
        state.items.retain(|_, item| item.invoice_id != invoice_id);
        state.invoices.remove(&invoice_id);

        Ok(true)
    }

    async fn invoice_summary(&self, user_id: i64) -> Result<InvoiceSummary, ServiceError> {
        let state = self.state.read().await;

        let mut summary = InvoiceSummary::default();
        for invoice in state.invoices.values().filter(|i| i.user_id == user_id) {
            summary.accumulate(&invoice.status, invoice.total);
        }

        Ok(summary)
    }
}
