use chrono::{NaiveDate, Utc};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, instrument, warn};
use validator::Validate;

use crate::{
    dtos::invoice::{CreateInvoiceRequest, PublicInvoiceRequest, UpdateStatusRequest},
    models::{
        Client, Currency, Invoice, InvoiceItem, InvoicePatch, InvoiceStatus, InvoiceSummary,
        ListInvoicesFilter, NewInvoice, NewInvoiceItem, Patch, User,
    },
    services::{
        calculation::{line_total, recompute_aggregate},
        metrics::{INVOICES_TOTAL, PDF_RENDER_DURATION},
        pdf::{pdf_filename, render_html, PdfModel, PdfRenderer, RenderedPdf},
        reconcile::parse_date,
        storage::{invoice_pdf_key, Storage},
        ClientRepository, InvoiceRepository, ServiceError, UserRepository,
    },
};

fn parse_currency(value: Option<&str>) -> Result<Currency, ServiceError> {
    match value {
        None => Ok(Currency::default()),
        Some(code) => Currency::parse(code).ok_or_else(|| {
            ServiceError::Validation("currency must be one of USD, EUR, IDR".to_string())
        }),
    }
}

fn issue_date_or_today(value: Option<&str>) -> Result<NaiveDate, ServiceError> {
    match value {
        Some(date) => parse_date(date),
        None => Ok(Utc::now().date_naive()),
    }
}

/// Client stand-in built from the snapshot columns on the invoice.
fn client_from_snapshot(invoice: &Invoice) -> Client {
    Client {
        id: invoice.client_id.unwrap_or_default(),
        user_id: invoice.user_id,
        name: invoice.client_name.clone().unwrap_or_default(),
        email: invoice.client_email.clone(),
        phone: invoice.client_phone.clone(),
        address: invoice.client_address.clone(),
        created_at: invoice.created_at,
        updated_at: invoice.updated_at,
    }
}

/// Invoice lifecycle, reconciliation and PDF generation for one owner at a time.
#[derive(Clone)]
pub struct InvoiceService {
    invoices: Arc<dyn InvoiceRepository>,
    clients: Arc<dyn ClientRepository>,
    users: Arc<dyn UserRepository>,
    renderer: Arc<dyn PdfRenderer>,
    archive: Option<Arc<dyn Storage>>,
}

impl InvoiceService {
    pub fn new(
        invoices: Arc<dyn InvoiceRepository>,
        clients: Arc<dyn ClientRepository>,
        users: Arc<dyn UserRepository>,
        renderer: Arc<dyn PdfRenderer>,
        archive: Option<Arc<dyn Storage>>,
    ) -> Self {
        Self {
            invoices,
            clients,
            users,
            renderer,
            archive,
        }
    }

    async fn owned_client(&self, user_id: i64, client_id: i64) -> Result<Client, ServiceError> {
        self.clients
            .get_client(user_id, client_id)
            .await?
            .ok_or(ServiceError::NotFound("Client"))
    }

    #[instrument(skip(self, req))]
    pub async fn create(
        &self,
        user_id: i64,
        req: CreateInvoiceRequest,
    ) -> Result<Invoice, ServiceError> {
        req.validate()?;

        let currency = parse_currency(req.currency.as_deref())?;
        let issue_date = issue_date_or_today(req.issue_date.as_deref())?;
        let due_date = parse_date(&req.due_date)?;

        let mut input = NewInvoice {
            user_id,
            client_id: req.client_id,
            invoice_number: req.invoice_number,
            issue_date,
            due_date,
            notes: req.notes,
            currency,
            tax_rate: req.tax_rate,
            client_name: req.client_name,
            client_email: req.client_email,
            client_address: req.client_address,
            client_phone: req.client_phone,
            items: req
                .items
                .into_iter()
                .map(|item| NewInvoiceItem {
                    description: item.description,
                    quantity: item.quantity,
                    unit_price: item.unit_price,
                })
                .collect(),
        };

        if let Some(client_id) = input.client_id {
            let client = self.owned_client(user_id, client_id).await?;
            input.client_name = input.client_name.or(Some(client.name));
            input.client_email = input.client_email.or(client.email);
            input.client_address = input.client_address.or(client.address);
            input.client_phone = input.client_phone.or(client.phone);
        }

        let invoice = self.invoices.create_invoice(&input).await?;
        INVOICES_TOTAL.with_label_values(&["create"]).inc();

        Ok(invoice)
    }

    pub async fn get(&self, user_id: i64, invoice_id: i64) -> Result<Invoice, ServiceError> {
        self.invoices
            .get_invoice(user_id, invoice_id)
            .await?
            .ok_or(ServiceError::NotFound("Invoice"))
    }

    pub async fn list(
        &self,
        user_id: i64,
        filter: &ListInvoicesFilter,
    ) -> Result<(Vec<Invoice>, i64), ServiceError> {
        self.invoices.list_invoices(user_id, filter).await
    }

    /// Apply a sparse patch to an invoice and, when `items` is present,
    /// replace its item set.
    #[instrument(skip(self, patch))]
    pub async fn reconcile(
        &self,
        user_id: i64,
        invoice_id: i64,
        mut patch: InvoicePatch,
    ) -> Result<Invoice, ServiceError> {
        patch.validate()?;

        if let Patch::Present(Some(client_id)) = patch.client_id {
            let client = self.owned_client(user_id, client_id).await?;
            if patch.client_name.is_absent() {
                patch.client_name = Patch::Present(client.name);
            }
            if let (true, Some(email)) = (patch.client_email.is_absent(), client.email) {
                patch.client_email = Patch::Present(email);
            }
            if let (true, Some(address)) = (patch.client_address.is_absent(), client.address) {
                patch.client_address = Patch::Present(address);
            }
            if let (true, Some(phone)) = (patch.client_phone.is_absent(), client.phone) {
                patch.client_phone = Patch::Present(phone);
            }
        }

        let invoice = self
            .invoices
            .reconcile_invoice(user_id, invoice_id, &patch)
            .await?;
        INVOICES_TOTAL.with_label_values(&["reconcile"]).inc();

        Ok(invoice)
    }

    #[instrument(skip(self, req))]
    pub async fn update_status(
        &self,
        user_id: i64,
        invoice_id: i64,
        req: UpdateStatusRequest,
    ) -> Result<Invoice, ServiceError> {
        req.validate()?;

        if InvoiceStatus::parse(&req.status).is_none() {
            warn!(status = %req.status, "Storing unrecognised invoice status");
        }

        let invoice = self
            .invoices
            .update_invoice_status(user_id, invoice_id, &req.status)
            .await?
            .ok_or(ServiceError::NotFound("Invoice"))?;
        INVOICES_TOTAL.with_label_values(&["status"]).inc();

        Ok(invoice)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, user_id: i64, invoice_id: i64) -> Result<(), ServiceError> {
        if !self.invoices.delete_invoice(user_id, invoice_id).await? {
            return Err(ServiceError::NotFound("Invoice"));
        }
        INVOICES_TOTAL.with_label_values(&["delete"]).inc();

        if let Some(archive) = &self.archive {
            let key = invoice_pdf_key(user_id, invoice_id);
            if let Err(e) = archive.delete(&key).await {
                warn!(error = %e, key = %key, "Failed to remove archived PDF");
            }
        }

        Ok(())
    }

    pub async fn summary(&self, user_id: i64) -> Result<InvoiceSummary, ServiceError> {
        self.invoices.invoice_summary(user_id).await
    }

    /// Invoice, billed client and sender for a stored invoice.
    ///
    /// The client comes from the directory while `client_id` still resolves
    /// for the owner, otherwise from the snapshot columns.
    pub async fn generate_pdf_model(
        &self,
        user_id: i64,
        invoice_id: i64,
    ) -> Result<PdfModel, ServiceError> {
        let invoice = self.get(user_id, invoice_id).await?;

        let client = match invoice.client_id {
            Some(client_id) => self.clients.get_client(user_id, client_id).await?,
            None => None,
        }
        .unwrap_or_else(|| client_from_snapshot(&invoice));

        let sender = self
            .users
            .find_user_by_id(invoice.user_id)
            .await?
            .ok_or(ServiceError::NotFound("User"))?;

        Ok(PdfModel {
            invoice,
            client,
            sender,
        })
    }

    /// Build an unsaved model from a self-contained request.
    pub fn generate_public_pdf_model(
        &self,
        req: PublicInvoiceRequest,
    ) -> Result<PdfModel, ServiceError> {
        req.validate()?;

        let currency = parse_currency(req.currency.as_deref())?;
        let issue_date = issue_date_or_today(req.issue_date.as_deref())?;
        let due_date = parse_date(&req.due_date)?;

        let items: Vec<InvoiceItem> = req
            .items
            .into_iter()
            .zip(1..)
            .map(|(item, id)| InvoiceItem {
                id,
                invoice_id: 0,
                total: line_total(item.quantity, item.unit_price),
                description: item.description,
                quantity: item.quantity,
                unit_price: item.unit_price,
            })
            .collect();
        let totals = recompute_aggregate(&items, req.tax_rate);

        let now = Utc::now();
        let recipient = req.recipient;
        let sender = req.sender;

        let invoice = Invoice {
            id: 0,
            user_id: 0,
            client_id: None,
            invoice_number: req.invoice_number,
            issue_date,
            due_date,
            status: InvoiceStatus::Draft.as_str().to_string(),
            notes: req.notes,
            currency: currency.as_str().to_string(),
            tax_rate: req.tax_rate,
            subtotal: totals.subtotal,
            tax: totals.tax,
            total: totals.total,
            client_name: Some(recipient.name),
            client_email: recipient.email,
            client_address: recipient.address,
            client_phone: recipient.phone,
            created_at: now,
            updated_at: now,
            items,
        };
        let client = client_from_snapshot(&invoice);
        let sender = User {
            id: 0,
            name: sender.name,
            email: sender.email,
            password_hash: String::new(),
            address: sender.address,
            phone: sender.phone,
            bank_name: sender.bank_name,
            bank_account_name: sender.bank_account_name,
            bank_account_number: sender.bank_account_number,
            created_at: now,
            updated_at: now,
        };

        Ok(PdfModel {
            invoice,
            client,
            sender,
        })
    }

    async fn render(&self, model: &PdfModel) -> Result<RenderedPdf, ServiceError> {
        let html = render_html(model)?;

        let started = Instant::now();
        let result = self.renderer.render(html).await;
        let outcome = if result.is_ok() { "success" } else { "failure" };
        PDF_RENDER_DURATION
            .with_label_values(&[outcome])
            .observe(started.elapsed().as_secs_f64());

        Ok(RenderedPdf {
            filename: pdf_filename(&model.invoice.invoice_number),
            bytes: result?,
        })
    }

    /// Render a stored invoice and archive the result when storage is configured.
    #[instrument(skip(self))]
    pub async fn invoice_pdf(
        &self,
        user_id: i64,
        invoice_id: i64,
    ) -> Result<RenderedPdf, ServiceError> {
        let model = self.generate_pdf_model(user_id, invoice_id).await?;
        let pdf = self.render(&model).await?;

        if let Some(archive) = &self.archive {
            let key = invoice_pdf_key(user_id, invoice_id);
            match archive.upload(&key, pdf.bytes.clone()).await {
                Ok(()) => info!(key = %key, "Archived invoice PDF"),
                Err(e) => warn!(error = %e, key = %key, "Failed to archive invoice PDF"),
            }
        }

        Ok(pdf)
    }

    pub async fn public_pdf(&self, req: PublicInvoiceRequest) -> Result<RenderedPdf, ServiceError> {
        let model = self.generate_public_pdf_model(req)?;
        self.render(&model).await
    }
}
