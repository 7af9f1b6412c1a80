//! PostgreSQL store for invoicing-service.

use async_trait::async_trait;
use service_core::error::AppError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{PgConnection, Postgres, Transaction};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{info, instrument};

use crate::models::{
    Client, Invoice, InvoiceItem, InvoicePatch, InvoiceStatus, InvoiceSummary, ListClientsFilter,
    ListInvoicesFilter, NewClient, NewInvoice, NewUser, User,
};
use crate::services::calculation::{line_total, recompute_aggregate};
use crate::services::metrics::DB_QUERY_DURATION;
use crate::services::reconcile::{plan_reconcile, ItemChange};
use crate::services::repository::{
    ClientRepository, HealthCheck, InvoiceRepository, UserRepository,
};
use crate::services::ServiceError;
use crate::utils::{like_pattern, normalize_search};

const USER_COLUMNS: &str = "id, name, email, password_hash, address, phone, bank_name, \
    bank_account_name, bank_account_number, created_at, updated_at";

const CLIENT_COLUMNS: &str = "id, user_id, name, email, phone, address, created_at, updated_at";

const INVOICE_COLUMNS: &str = "id, user_id, client_id, invoice_number, issue_date, due_date, \
    status, notes, currency, tax_rate, subtotal, tax, total, client_name, client_email, \
    client_address, client_phone, created_at, updated_at";

const ITEM_COLUMNS: &str = "id, invoice_id, description, quantity, unit_price, total";

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "invoicing-service"))]
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    /// Run database migrations.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }

    async fn begin(&self) -> Result<Transaction<'static, Postgres>, ServiceError> {
        self.pool
            .begin()
            .await
            .map_err(|e| ServiceError::persistence("begin transaction", e))
    }

    /// Read-only transaction whose statements all see one snapshot, so a header
    /// and its items never come from different commits.
    async fn begin_snapshot(&self) -> Result<Transaction<'static, Postgres>, ServiceError> {
        let mut tx = self.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
            .execute(&mut *tx)
            .await
            .map_err(|e| ServiceError::persistence("set snapshot isolation", e))?;
        Ok(tx)
    }
}

/// Load the items of the given invoices, ordered by id.
async fn load_items(
    conn: &mut PgConnection,
    invoice_ids: &[i64],
) -> Result<Vec<InvoiceItem>, ServiceError> {
    if invoice_ids.is_empty() {
        return Ok(Vec::new());
    }

    sqlx::query_as::<_, InvoiceItem>(&format!(
        "SELECT {ITEM_COLUMNS} FROM invoice_items \
         WHERE invoice_id = ANY($1) ORDER BY invoice_id, id"
    ))
    .bind(invoice_ids)
    .fetch_all(conn)
    .await
    .map_err(|e| ServiceError::persistence("load invoice items", e))
}

fn attach_items(invoices: &mut [Invoice], items: Vec<InvoiceItem>) {
    let mut by_invoice: HashMap<i64, Vec<InvoiceItem>> = HashMap::new();
    for item in items {
        by_invoice.entry(item.invoice_id).or_default().push(item);
    }
    for invoice in invoices.iter_mut() {
        invoice.items = by_invoice.remove(&invoice.id).unwrap_or_default();
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}

#[async_trait]
impl HealthCheck for Database {
    #[instrument(skip(self))]
    async fn health_check(&self) -> Result<(), ServiceError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| ServiceError::persistence("run health check", e))?;
        Ok(())
    }
}

// -------------------------------------------------------------------------
// User Operations
// -------------------------------------------------------------------------

#[async_trait]
impl UserRepository for Database {
    #[instrument(skip(self, input))]
    async fn create_user(&self, input: &NewUser) -> Result<User, ServiceError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_user"])
            .start_timer();

        if self.find_user_by_email(&input.email).await?.is_some() {
            return Err(ServiceError::Conflict("email already exists".to_string()));
        }

        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (name, email, password_hash, address, phone, bank_name,
                bank_account_name, bank_account_number)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&input.name)
        .bind(&input.email)
        .bind(&input.password_hash)
        .bind(&input.address)
        .bind(&input.phone)
        .bind(&input.bank_name)
        .bind(&input.bank_account_name)
        .bind(&input.bank_account_number)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                ServiceError::Conflict("email already exists".to_string())
            } else {
                ServiceError::persistence("create user", e)
            }
        })?;

        timer.observe_duration();

        info!(user_id = user.id, "User created");

        Ok(user)
    }

    #[instrument(skip(self, email))]
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, ServiceError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["find_user_by_email"])
            .start_timer();

        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| ServiceError::persistence("find user", e))?;

        timer.observe_duration();

        Ok(user)
    }

    #[instrument(skip(self))]
    async fn find_user_by_id(&self, user_id: i64) -> Result<Option<User>, ServiceError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["find_user_by_id"])
            .start_timer();

        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| ServiceError::persistence("find user", e))?;

        timer.observe_duration();

        Ok(user)
    }

    #[instrument(skip(self, user), fields(user_id = user.id))]
    async fn update_user(&self, user: &User) -> Result<Option<User>, ServiceError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_user"])
            .start_timer();

        let updated = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET name = $2,
                email = $3,
                address = $4,
                phone = $5,
                bank_name = $6,
                bank_account_name = $7,
                bank_account_number = $8,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.address)
        .bind(&user.phone)
        .bind(&user.bank_name)
        .bind(&user.bank_account_name)
        .bind(&user.bank_account_number)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                ServiceError::Conflict("email already exists".to_string())
            } else {
                ServiceError::persistence("update user", e)
            }
        })?;

        timer.observe_duration();

        if updated.is_some() {
            info!(user_id = user.id, "User updated");
        }

        Ok(updated)
    }
}

// -------------------------------------------------------------------------
// Client Operations
// -------------------------------------------------------------------------

#[async_trait]
impl ClientRepository for Database {
    #[instrument(skip(self, input), fields(user_id = input.user_id))]
    async fn create_client(&self, input: &NewClient) -> Result<Client, ServiceError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_client"])
            .start_timer();

        let client = sqlx::query_as::<_, Client>(&format!(
            r#"
            INSERT INTO clients (user_id, name, email, phone, address)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {CLIENT_COLUMNS}
            "#
        ))
        .bind(input.user_id)
        .bind(&input.name)
        .bind(&input.email)
        .bind(&input.phone)
        .bind(&input.address)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| ServiceError::persistence("create client", e))?;

        timer.observe_duration();

        info!(client_id = client.id, "Client created");

        Ok(client)
    }

    #[instrument(skip(self, filter))]
    async fn list_clients(
        &self,
        user_id: i64,
        filter: &ListClientsFilter,
    ) -> Result<(Vec<Client>, i64), ServiceError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_clients"])
            .start_timer();

        let pattern = normalize_search(filter.search.as_deref()).map(|s| like_pattern(&s));
        let limit = filter.page.map(|p| p.limit());
        let offset = filter.page.map(|p| p.offset()).unwrap_or(0);

        let clients = sqlx::query_as::<_, Client>(&format!(
            r#"
            SELECT {CLIENT_COLUMNS}
            FROM clients
            WHERE user_id = $1
              AND ($2::text IS NULL
                   OR name ILIKE $2 ESCAPE '\'
                   OR email ILIKE $2 ESCAPE '\'
                   OR phone ILIKE $2 ESCAPE '\'
                   OR address ILIKE $2 ESCAPE '\')
            ORDER BY created_at DESC, id DESC
            LIMIT $3 OFFSET $4
            "#
        ))
        .bind(user_id)
        .bind(&pattern)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| ServiceError::persistence("list clients", e))?;

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM clients
            WHERE user_id = $1
              AND ($2::text IS NULL
                   OR name ILIKE $2 ESCAPE '\'
                   OR email ILIKE $2 ESCAPE '\'
                   OR phone ILIKE $2 ESCAPE '\'
                   OR address ILIKE $2 ESCAPE '\')
            "#,
        )
        .bind(user_id)
        .bind(&pattern)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| ServiceError::persistence("count clients", e))?;

        timer.observe_duration();

        Ok((clients, total))
    }

    #[instrument(skip(self))]
    async fn get_client(
        &self,
        user_id: i64,
        client_id: i64,
    ) -> Result<Option<Client>, ServiceError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_client"])
            .start_timer();

        let client = sqlx::query_as::<_, Client>(&format!(
            "SELECT {CLIENT_COLUMNS} FROM clients WHERE id = $1 AND user_id = $2"
        ))
        .bind(client_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| ServiceError::persistence("get client", e))?;

        timer.observe_duration();

        Ok(client)
    }

    #[instrument(skip(self, client), fields(user_id = client.user_id, client_id = client.id))]
    async fn update_client(&self, client: &Client) -> Result<Option<Client>, ServiceError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_client"])
            .start_timer();

        let updated = sqlx::query_as::<_, Client>(&format!(
            r#"
            UPDATE clients
            SET name = $3, email = $4, phone = $5, address = $6, updated_at = NOW()
            WHERE id = $1 AND user_id = $2
            RETURNING {CLIENT_COLUMNS}
            "#
        ))
        .bind(client.id)
        .bind(client.user_id)
        .bind(&client.name)
        .bind(&client.email)
        .bind(&client.phone)
        .bind(&client.address)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| ServiceError::persistence("update client", e))?;

        timer.observe_duration();

        if updated.is_some() {
            info!(client_id = client.id, "Client updated");
        }

        Ok(updated)
    }

    #[instrument(skip(self))]
    async fn delete_client(&self, user_id: i64, client_id: i64) -> Result<bool, ServiceError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_client"])
            .start_timer();

        let result = sqlx::query("DELETE FROM clients WHERE id = $1 AND user_id = $2")
            .bind(client_id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| ServiceError::persistence("delete client", e))?;

        timer.observe_duration();

        let deleted = result.rows_affected() > 0;
        if deleted {
            info!(client_id = client_id, "Client deleted");
        }

        Ok(deleted)
    }
}

// -------------------------------------------------------------------------
// Invoice Operations
// -------------------------------------------------------------------------

#[async_trait]
impl InvoiceRepository for Database {
    #[instrument(skip(self, input), fields(user_id = input.user_id))]
    async fn create_invoice(&self, input: &NewInvoice) -> Result<Invoice, ServiceError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_invoice"])
            .start_timer();

        let totals = recompute_aggregate(&input.items, input.tax_rate);

        let mut tx = self.begin().await?;

        let mut invoice = sqlx::query_as::<_, Invoice>(&format!(
            r#"
            INSERT INTO invoices (user_id, client_id, invoice_number, issue_date, due_date, status,
                notes, currency, tax_rate, subtotal, tax, total, client_name, client_email,
                client_address, client_phone)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            RETURNING {INVOICE_COLUMNS}
            "#
        ))
        .bind(input.user_id)
        .bind(input.client_id)
        .bind(&input.invoice_number)
        .bind(input.issue_date)
        .bind(input.due_date)
        .bind(InvoiceStatus::Draft.as_str())
        .bind(&input.notes)
        .bind(input.currency.as_str())
        .bind(input.tax_rate)
        .bind(totals.subtotal)
        .bind(totals.tax)
        .bind(totals.total)
        .bind(&input.client_name)
        .bind(&input.client_email)
        .bind(&input.client_address)
        .bind(&input.client_phone)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| ServiceError::persistence("create invoice", e))?;

        for item in &input.items {
            let created = sqlx::query_as::<_, InvoiceItem>(&format!(
                r#"
                INSERT INTO invoice_items (invoice_id, description, quantity, unit_price, total)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING {ITEM_COLUMNS}
                "#
            ))
            .bind(invoice.id)
            .bind(&item.description)
            .bind(item.quantity)
            .bind(item.unit_price)
            .bind(line_total(item.quantity, item.unit_price))
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| ServiceError::persistence("create invoice item", e))?;
            invoice.items.push(created);
        }

        tx.commit()
            .await
            .map_err(|e| ServiceError::persistence("commit invoice", e))?;

        timer.observe_duration();

        info!(
            invoice_id = invoice.id,
            items = invoice.items.len(),
            total = invoice.total,
            "Invoice created"
        );

        Ok(invoice)
    }

    #[instrument(skip(self))]
    async fn get_invoice(
        &self,
        user_id: i64,
        invoice_id: i64,
    ) -> Result<Option<Invoice>, ServiceError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_invoice"])
            .start_timer();

        let mut tx = self.begin_snapshot().await?;

        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            "SELECT {INVOICE_COLUMNS} FROM invoices WHERE id = $1 AND user_id = $2"
        ))
        .bind(invoice_id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| ServiceError::persistence("get invoice", e))?;

        let invoice = match invoice {
            Some(mut invoice) => {
                invoice.items = load_items(&mut tx, &[invoice.id]).await?;
                Some(invoice)
            }
            None => None,
        };

        tx.commit()
            .await
            .map_err(|e| ServiceError::persistence("commit read", e))?;

        timer.observe_duration();

        Ok(invoice)
    }

    #[instrument(skip(self, filter))]
    async fn list_invoices(
        &self,
        user_id: i64,
        filter: &ListInvoicesFilter,
    ) -> Result<(Vec<Invoice>, i64), ServiceError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_invoices"])
            .start_timer();

        let status = filter.status.as_deref().filter(|s| !s.is_empty());
        let pattern = normalize_search(filter.search.as_deref()).map(|s| like_pattern(&s));
        let limit = filter.page.map(|p| p.limit());
        let offset = filter.page.map(|p| p.offset()).unwrap_or(0);

        let mut tx = self.begin_snapshot().await?;

        let mut invoices = sqlx::query_as::<_, Invoice>(&format!(
            r#"
            SELECT {INVOICE_COLUMNS}
            FROM invoices
            WHERE user_id = $1
              AND ($2::text IS NULL OR status = $2)
              AND ($3::text IS NULL
                   OR invoice_number ILIKE $3 ESCAPE '\'
                   OR client_name ILIKE $3 ESCAPE '\'
                   OR client_email ILIKE $3 ESCAPE '\'
                   OR notes ILIKE $3 ESCAPE '\')
            ORDER BY created_at DESC, id DESC
            LIMIT $4 OFFSET $5
            "#
        ))
        .bind(user_id)
        .bind(status)
        .bind(&pattern)
        .bind(limit)
        .bind(offset)
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| ServiceError::persistence("list invoices", e))?;

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM invoices
            WHERE user_id = $1
              AND ($2::text IS NULL OR status = $2)
              AND ($3::text IS NULL
                   OR invoice_number ILIKE $3 ESCAPE '\'
                   OR client_name ILIKE $3 ESCAPE '\'
                   OR client_email ILIKE $3 ESCAPE '\'
                   OR notes ILIKE $3 ESCAPE '\')
            "#,
        )
        .bind(user_id)
        .bind(status)
        .bind(&pattern)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| ServiceError::persistence("count invoices", e))?;

        let ids: Vec<i64> = invoices.iter().map(|i| i.id).collect();
        let items = load_items(&mut tx, &ids).await?;
        attach_items(&mut invoices, items);

        tx.commit()
            .await
            .map_err(|e| ServiceError::persistence("commit read", e))?;

        timer.observe_duration();

        Ok((invoices, total))
    }

    #[instrument(skip(self, patch))]
    async fn reconcile_invoice(
        &self,
        user_id: i64,
        invoice_id: i64,
        patch: &InvoicePatch,
    ) -> Result<Invoice, ServiceError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["reconcile_invoice"])
            .start_timer();

        // Dropping `tx` on any early return rolls the whole reconcile back.
        let mut tx = self.begin().await?;

        let mut current = sqlx::query_as::<_, Invoice>(&format!(
            "SELECT {INVOICE_COLUMNS} FROM invoices WHERE id = $1 AND user_id = $2 FOR UPDATE"
        ))
        .bind(invoice_id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| ServiceError::persistence("load invoice", e))?
        .ok_or(ServiceError::NotFound("Invoice"))?;
        current.items = load_items(&mut tx, &[current.id]).await?;

        let plan = plan_reconcile(&current, patch)?;

        let mut items = Vec::with_capacity(plan.changes.len());
        for change in &plan.changes {
            let row = match change {
                ItemChange::Update(item) => sqlx::query_as::<_, InvoiceItem>(&format!(
                    r#"
                    UPDATE invoice_items
                    SET description = $3, quantity = $4, unit_price = $5, total = $6
                    WHERE id = $1 AND invoice_id = $2
                    RETURNING {ITEM_COLUMNS}
                    "#
                ))
                .bind(item.id)
                .bind(invoice_id)
                .bind(&item.description)
                .bind(item.quantity)
                .bind(item.unit_price)
                .bind(item.total)
                .fetch_one(&mut *tx)
                .await
                .map_err(|e| ServiceError::persistence("update invoice item", e))?,
                ItemChange::Insert(item) => sqlx::query_as::<_, InvoiceItem>(&format!(
                    r#"
                    INSERT INTO invoice_items (invoice_id, description, quantity, unit_price, total)
                    VALUES ($1, $2, $3, $4, $5)
                    RETURNING {ITEM_COLUMNS}
                    "#
                ))
                .bind(invoice_id)
                .bind(&item.description)
                .bind(item.quantity)
                .bind(item.unit_price)
                .bind(line_total(item.quantity, item.unit_price))
                .fetch_one(&mut *tx)
                .await
                .map_err(|e| ServiceError::persistence("create invoice item", e))?,
            };
            items.push(row);
        }

        if !plan.deleted.is_empty() {
            sqlx::query("DELETE FROM invoice_items WHERE invoice_id = $1 AND id = ANY($2)")
                .bind(invoice_id)
                .bind(&plan.deleted)
                .execute(&mut *tx)
                .await
                .map_err(|e| ServiceError::persistence("delete invoice items", e))?;
        }

        let header = &plan.invoice;
        let mut invoice = sqlx::query_as::<_, Invoice>(&format!(
            r#"
            UPDATE invoices
            SET client_id = $3,
                invoice_number = $4,
                issue_date = $5,
                due_date = $6,
                status = $7,
                notes = $8,
                currency = $9,
                tax_rate = $10,
                subtotal = $11,
                tax = $12,
                total = $13,
                client_name = $14,
                client_email = $15,
                client_address = $16,
                client_phone = $17,
                updated_at = NOW()
            WHERE id = $1 AND user_id = $2
            RETURNING {INVOICE_COLUMNS}
            "#
        ))
        .bind(invoice_id)
        .bind(user_id)
        .bind(header.client_id)
        .bind(&header.invoice_number)
        .bind(header.issue_date)
        .bind(header.due_date)
        .bind(&header.status)
        .bind(&header.notes)
        .bind(&header.currency)
        .bind(header.tax_rate)
        .bind(header.subtotal)
        .bind(header.tax)
        .bind(header.total)
        .bind(&header.client_name)
        .bind(&header.client_email)
        .bind(&header.client_address)
        .bind(&header.client_phone)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| ServiceError::persistence("update invoice", e))?;

        if patch.items.is_absent() {
            items = current.items;
        }
        items.sort_by_key(|item| item.id);
        invoice.items = items;

        tx.commit()
            .await
            .map_err(|e| ServiceError::persistence("commit reconcile", e))?;

        timer.observe_duration();

        info!(
            invoice_id = invoice_id,
            updated = plan.updated_count(),
            created = plan.inserted_count(),
            deleted = plan.deleted.len(),
            total = invoice.total,
            "Invoice reconciled"
        );

        Ok(invoice)
    }

    #[instrument(skip(self))]
    async fn update_invoice_status(
        &self,
        user_id: i64,
        invoice_id: i64,
        status: &str,
    ) -> Result<Option<Invoice>, ServiceError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_invoice_status"])
            .start_timer();

        let mut tx = self.begin().await?;

        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            r#"
            UPDATE invoices
            SET status = $3, updated_at = NOW()
            WHERE id = $1 AND user_id = $2
            RETURNING {INVOICE_COLUMNS}
            "#
        ))
        .bind(invoice_id)
        .bind(user_id)
        .bind(status)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| ServiceError::persistence("update invoice status", e))?;

        let invoice = match invoice {
            Some(mut invoice) => {
                invoice.items = load_items(&mut tx, &[invoice.id]).await?;
                Some(invoice)
            }
            None => None,
        };

        tx.commit()
            .await
            .map_err(|e| ServiceError::persistence("commit status", e))?;

        timer.observe_duration();

        if invoice.is_some() {
            info!(invoice_id = invoice_id, status = %status, "Invoice status updated");
        }

        Ok(invoice)
    }

    #[instrument(skip(self))]
    async fn delete_invoice(&self, user_id: i64, invoice_id: i64) -> Result<bool, ServiceError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_invoice"])
            .start_timer();

        let mut tx = self.begin().await?;

        let items_deleted = sqlx::query(
            r#"
            DELETE FROM invoice_items
            WHERE invoice_id IN (SELECT id FROM invoices WHERE id = $1 AND user_id = $2)
            "#,
        )
        .bind(invoice_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| ServiceError::persistence("delete invoice items", e))?
        .rows_affected();

        let result = sqlx::query("DELETE FROM invoices WHERE id = $1 AND user_id = $2")
            .bind(invoice_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| ServiceError::persistence("delete invoice", e))?;

        if result.rows_affected() == 0 {
            tx.rollback().await.ok();
            return Ok(false);
        }

        tx.commit()
            .await
            .map_err(|e| ServiceError::persistence("commit delete", e))?;

        timer.observe_duration();

        info!(invoice_id = invoice_id, items_deleted = items_deleted, "Invoice deleted");

        Ok(true)
    }

    #[instrument(skip(self))]
    async fn invoice_summary(&self, user_id: i64) -> Result<InvoiceSummary, ServiceError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["invoice_summary"])
            .start_timer();

        let summary = sqlx::query_as::<_, InvoiceSummary>(
            r#"
            SELECT
                COALESCE(SUM(total) FILTER (WHERE status = 'paid'), 0)::float8 AS paid,
                COALESCE(SUM(total) FILTER (WHERE status IN ('draft', 'open')), 0)::float8
                    AS unpaid,
                COALESCE(SUM(total) FILTER (WHERE status = 'past_due'), 0)::float8 AS past_due
            FROM invoices
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| ServiceError::persistence("summarize invoices", e))?;

        timer.observe_duration();

        Ok(summary)
    }
}
