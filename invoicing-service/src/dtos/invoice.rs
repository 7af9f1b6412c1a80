use serde::{Deserialize, Serialize};
use validator::Validate;

use super::page_request;
use crate::models::ListInvoicesFilter;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct InvoiceItemRequest {
    #[validate(length(min = 1, message = "Description is required"))]
    pub description: String,

    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: i32,

    #[validate(range(exclusive_min = 0.0, message = "Unit price must be greater than 0"))]
    pub unit_price: f64,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateInvoiceRequest {
    pub client_id: Option<i64>,

    #[validate(length(min = 1, message = "Invoice number is required"))]
    pub invoice_number: String,

    /// `YYYY-MM-DD`; today when omitted.
    pub issue_date: Option<String>,

    /// `YYYY-MM-DD`
    pub due_date: String,

    pub notes: Option<String>,

    /// `USD`, `EUR` or `IDR`; `USD` when omitted.
    pub currency: Option<String>,

    #[validate(range(min = 0.0, message = "Tax rate must not be negative"))]
    #[serde(default)]
    pub tax_rate: f64,

    pub client_name: Option<String>,

    #[validate(email(message = "Invalid client email format"))]
    pub client_email: Option<String>,

    pub client_address: Option<String>,

    pub client_phone: Option<String>,

    #[validate(length(min = 1, message = "At least one item is required"), nested)]
    pub items: Vec<InvoiceItemRequest>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListInvoicesQuery {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
    pub search: Option<String>,
    pub status: Option<String>,
    pub all: Option<bool>,
}

impl From<ListInvoicesQuery> for ListInvoicesFilter {
    fn from(query: ListInvoicesQuery) -> Self {
        Self {
            page: page_request(query.page, query.page_size, query.all),
            status: query.status.filter(|s| !s.trim().is_empty()),
            search: query.search,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateStatusRequest {
    #[validate(length(min = 1, message = "Status is required"))]
    pub status: String,
}

/// Issuer block of a public invoice.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SenderRequest {
    #[validate(length(min = 1, message = "Sender name is required"))]
    pub name: String,

    #[validate(email(message = "Invalid sender email format"))]
    pub email: String,

    pub address: Option<String>,
    pub phone: Option<String>,
    pub bank_name: Option<String>,
    pub bank_account_name: Option<String>,
    pub bank_account_number: Option<String>,
}

/// Billed party of a public invoice.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RecipientRequest {
    #[validate(length(min = 1, message = "Recipient name is required"))]
    pub name: String,

    #[validate(email(message = "Invalid recipient email format"))]
    pub email: Option<String>,

    pub address: Option<String>,
    pub phone: Option<String>,
}

/// Self-contained invoice rendered without an account. Nothing is stored.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct PublicInvoiceRequest {
    #[validate(length(min = 1, message = "Invoice number is required"))]
    pub invoice_number: String,

    pub issue_date: Option<String>,

    pub due_date: String,

    pub notes: Option<String>,

    pub currency: Option<String>,

    #[validate(range(min = 0.0, message = "Tax rate must not be negative"))]
    #[serde(default)]
    pub tax_rate: f64,

    #[validate(nested)]
    pub sender: SenderRequest,

    #[validate(nested)]
    pub recipient: RecipientRequest,

    #[validate(length(min = 1, message = "At least one item is required"), nested)]
    pub items: Vec<InvoiceItemRequest>,
}
