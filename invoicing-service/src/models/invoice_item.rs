//! Invoice line item model.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// A line on an invoice. `total` is always `quantity * unit_price`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct InvoiceItem {
    pub id: i64,
    pub invoice_id: i64,
    pub description: String,
    pub quantity: i32,
    pub unit_price: f64,
    pub total: f64,
}

/// A line to insert under an invoice.
#[derive(Debug, Clone, PartialEq)]
pub struct NewInvoiceItem {
    pub description: String,
    pub quantity: i32,
    pub unit_price: f64,
}

/// One entry of a reconcile item list. With an `id` it overwrites that item;
/// without one it becomes a new item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct ItemPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[validate(length(min = 1, message = "Description is required"))]
    pub description: String,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: i32,
    #[validate(range(exclusive_min = 0.0, message = "Unit price must be greater than 0"))]
    pub unit_price: f64,
}

impl From<&ItemPatch> for NewInvoiceItem {
    fn from(patch: &ItemPatch) -> Self {
        Self {
            description: patch.description.clone(),
            quantity: patch.quantity,
            unit_price: patch.unit_price,
        }
    }
}
