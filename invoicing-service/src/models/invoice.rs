//! Invoice aggregate model for invoicing-service.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::{Validate, ValidateEmail, ValidationError, ValidationErrors};

use super::{InvoiceItem, ItemPatch, NewInvoiceItem, Patch};
use crate::utils::PageRequest;

/// Invoice status.
///
/// Stored as free text: status updates accept any string, so rows may hold
/// values outside this set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Draft,
    Open,
    Paid,
    PastDue,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "draft",
            InvoiceStatus::Open => "open",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::PastDue => "past_due",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(InvoiceStatus::Draft),
            "open" => Some(InvoiceStatus::Open),
            "paid" => Some(InvoiceStatus::Paid),
            "past_due" => Some(InvoiceStatus::PastDue),
            _ => None,
        }
    }
}

/// Display currency of an invoice. No conversion is performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Usd,
    Eur,
    Idr,
}

impl Currency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Currency::Usd => "USD",
            Currency::Eur => "EUR",
            Currency::Idr => "IDR",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "USD" => Some(Currency::Usd),
            "EUR" => Some(Currency::Eur),
            "IDR" => Some(Currency::Idr),
            _ => None,
        }
    }
}

impl Default for Currency {
    fn default() -> Self {
        Currency::Usd
    }
}

pub(crate) fn validate_currency(value: &str) -> Result<(), ValidationError> {
    match Currency::parse(value) {
        Some(_) => Ok(()),
        None => {
            let mut err = ValidationError::new("currency");
            err.message = Some("currency must be one of USD, EUR, IDR".into());
            Err(err)
        }
    }
}

/// Invoice header with its line items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Invoice {
    pub id: i64,
    pub user_id: i64,
    pub client_id: Option<i64>,
    pub invoice_number: String,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub status: String,
    pub notes: Option<String>,
    pub currency: String,
    pub tax_rate: f64,
    pub subtotal: f64,
    pub tax: f64,
    pub total: f64,
    pub client_name: Option<String>,
    pub client_email: Option<String>,
    pub client_address: Option<String>,
    pub client_phone: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[sqlx(skip)]
    #[serde(default)]
    pub items: Vec<InvoiceItem>,
}

/// Input for creating an invoice. Totals are derived by the store.
#[derive(Debug, Clone)]
pub struct NewInvoice {
    pub user_id: i64,
    pub client_id: Option<i64>,
    pub invoice_number: String,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub notes: Option<String>,
    pub currency: Currency,
    pub tax_rate: f64,
    pub client_name: Option<String>,
    pub client_email: Option<String>,
    pub client_address: Option<String>,
    pub client_phone: Option<String>,
    pub items: Vec<NewInvoiceItem>,
}

/// Sparse update of an invoice and, optionally, its full item set.
///
/// When `items` is present it declares every item the invoice should keep:
/// entries with an `id` overwrite that item, entries without one are
/// inserted, and existing items not listed are deleted.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct InvoicePatch {
    #[serde(skip_serializing_if = "Patch::is_absent")]
    pub client_id: Patch<Option<i64>>,
    #[serde(skip_serializing_if = "Patch::is_absent")]
    pub issue_date: Patch<String>,
    #[serde(skip_serializing_if = "Patch::is_absent")]
    pub due_date: Patch<String>,
    #[serde(skip_serializing_if = "Patch::is_absent")]
    pub invoice_number: Patch<String>,
    #[serde(skip_serializing_if = "Patch::is_absent")]
    pub notes: Patch<Option<String>>,
    #[serde(skip_serializing_if = "Patch::is_absent")]
    pub status: Patch<String>,
    #[serde(skip_serializing_if = "Patch::is_absent")]
    pub currency: Patch<String>,
    #[serde(skip_serializing_if = "Patch::is_absent")]
    pub tax_rate: Patch<f64>,
    #[serde(skip_serializing_if = "Patch::is_absent")]
    pub client_name: Patch<String>,
    #[serde(skip_serializing_if = "Patch::is_absent")]
    pub client_email: Patch<String>,
    #[serde(skip_serializing_if = "Patch::is_absent")]
    pub client_address: Patch<String>,
    #[serde(skip_serializing_if = "Patch::is_absent")]
    pub client_phone: Patch<String>,
    #[serde(skip_serializing_if = "Patch::is_absent")]
    pub items: Patch<Vec<ItemPatch>>,
}

impl Validate for InvoicePatch {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if let Patch::Present(rate) = self.tax_rate {
            if !rate.is_finite() || rate < 0.0 {
                errors.add("tax_rate", ValidationError::new("range"));
            }
        }
        if let Patch::Present(number) = &self.invoice_number {
            if number.trim().is_empty() {
                errors.add("invoice_number", ValidationError::new("length"));
            }
        }
        if let Patch::Present(email) = &self.client_email {
            if !email.validate_email() {
                errors.add("client_email", ValidationError::new("email"));
            }
        }
        if let Patch::Present(currency) = &self.currency {
            if let Err(err) = validate_currency(currency) {
                errors.add("currency", err);
            }
        }
        if let Patch::Present(items) = &self.items {
            if items.is_empty() {
                errors.add("items", ValidationError::new("length"));
            }
        }

        if !errors.is_empty() {
            return Err(errors);
        }

        if let Patch::Present(items) = &self.items {
            for item in items {
                item.validate()?;
            }
        }

        Ok(())
    }
}

/// Filter parameters for listing invoices.
#[derive(Debug, Clone, Default)]
pub struct ListInvoicesFilter {
    pub status: Option<String>,
    pub search: Option<String>,
    /// `None` returns every matching invoice.
    pub page: Option<PageRequest>,
}

/// Sums of `total` per status bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, FromRow)]
pub struct InvoiceSummary {
    pub paid: f64,
    pub unpaid: f64,
    pub past_due: f64,
}

impl InvoiceSummary {
    /// Add one invoice total to the bucket its status belongs to, if any.
    pub fn accumulate(&mut self, status: &str, total: f64) {
        match InvoiceStatus::parse(status) {
            Some(InvoiceStatus::Paid) => self.paid += total,
            Some(InvoiceStatus::Draft) | Some(InvoiceStatus::Open) => self.unpaid += total,
            Some(InvoiceStatus::PastDue) => self.past_due += total,
            None => {}
        }
    }
}
