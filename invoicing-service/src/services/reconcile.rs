//! Merge a sparse invoice patch against the stored aggregate.
//!
//! Planning is pure: it reads the current invoice and its items, applies the
//! patch in memory and decides every row change up front. A plan is only
//! produced when the whole patch is valid, so stores can execute it inside a
//! single transaction without ever writing half of an update.

use chrono::NaiveDate;
use std::collections::{HashMap, HashSet};

use crate::models::{Invoice, InvoiceItem, InvoicePatch, NewInvoiceItem, Patch};
use crate::services::calculation::{line_total, recompute_aggregate};
use crate::services::ServiceError;

/// A row-level change to an invoice's items.
#[derive(Debug, Clone, PartialEq)]
pub enum ItemChange {
    /// Overwrite an existing item; `total` is already recomputed.
    Update(InvoiceItem),
    Insert(NewInvoiceItem),
}

/// Outcome of planning a reconcile.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconcilePlan {
    /// Header with patched fields and recomputed totals. `items` is empty.
    pub invoice: Invoice,
    /// Item changes in request order.
    pub changes: Vec<ItemChange>,
    /// Existing items left out of the patch.
    pub deleted: Vec<i64>,
}

impl ReconcilePlan {
    pub fn updated_count(&self) -> usize {
        self.changes
            .iter()
            .filter(|c| matches!(c, ItemChange::Update(_)))
            .count()
    }

    pub fn inserted_count(&self) -> usize {
        self.changes.len() - self.updated_count()
    }
}

/// Parse a `YYYY-MM-DD` calendar date.
pub fn parse_date(value: &str) -> Result<NaiveDate, ServiceError> {
    if value.len() != 10 {
        return Err(ServiceError::InvalidDateFormat);
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| ServiceError::InvalidDateFormat)
}

/// Plan the reconcile of `current` (header plus all of its items) with `patch`.
pub fn plan_reconcile(
    current: &Invoice,
    patch: &InvoicePatch,
) -> Result<ReconcilePlan, ServiceError> {
    let mut invoice = current.clone();
    invoice.items = Vec::new();

    patch.client_id.apply(&mut invoice.client_id);
    if let Patch::Present(date) = &patch.issue_date {
        invoice.issue_date = parse_date(date)?;
    }
    if let Patch::Present(date) = &patch.due_date {
        invoice.due_date = parse_date(date)?;
    }
    patch.invoice_number.apply(&mut invoice.invoice_number);
    patch.notes.apply(&mut invoice.notes);
    patch.status.apply(&mut invoice.status);
    patch.currency.apply(&mut invoice.currency);
    patch.tax_rate.apply(&mut invoice.tax_rate);
    patch.client_name.apply_some(&mut invoice.client_name);
    patch.client_email.apply_some(&mut invoice.client_email);
    patch.client_address.apply_some(&mut invoice.client_address);
    patch.client_phone.apply_some(&mut invoice.client_phone);

    let (changes, deleted, totals) = match &patch.items {
        Patch::Absent => (
            Vec::new(),
            Vec::new(),
            recompute_aggregate(&current.items, invoice.tax_rate),
        ),
        Patch::Present(item_patches) => {
            let existing: HashMap<i64, &InvoiceItem> =
                current.items.iter().map(|item| (item.id, item)).collect();
            let mut kept = HashSet::new();
            let mut changes = Vec::with_capacity(item_patches.len());

            for item_patch in item_patches {
                match item_patch.id {
                    Some(id) => {
                        let found = existing
                            .get(&id)
                            .ok_or(ServiceError::ItemNotFound(id))?;
                        if !kept.insert(id) {
                            return Err(ServiceError::Validation(format!(
                                "invoice item with ID {} listed more than once",
                                id
                            )));
                        }

                        let mut updated = (*found).clone();
                        updated.description = item_patch.description.clone();
                        updated.quantity = item_patch.quantity;
                        updated.unit_price = item_patch.unit_price;
                        updated.total = line_total(updated.quantity, updated.unit_price);
                        changes.push(ItemChange::Update(updated));
                    }
                    None => changes.push(ItemChange::Insert(NewInvoiceItem::from(item_patch))),
                }
            }

            let deleted = current
                .items
                .iter()
                .filter(|item| !kept.contains(&item.id))
                .map(|item| item.id)
                .collect();

            (
                changes,
                deleted,
                recompute_aggregate(item_patches, invoice.tax_rate),
            )
        }
    };

    invoice.subtotal = totals.subtotal;
    invoice.tax = totals.tax;
    invoice.total = totals.total;

    Ok(ReconcilePlan {
        invoice,
        changes,
        deleted,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ItemPatch;
    use chrono::Utc;

    fn item(id: i64, quantity: i32, unit_price: f64) -> InvoiceItem {
        InvoiceItem {
            id,
            invoice_id: 7,
            description: format!("Item {}", id),
            quantity,
            unit_price,
            total: line_total(quantity, unit_price),
        }
    }

    fn invoice() -> Invoice {
        let items = vec![item(1, 2, 10.0), item(2, 1, 5.0)];
        let totals = recompute_aggregate(&items, 10.0);
        Invoice {
            id: 7,
            user_id: 1,
            client_id: None,
            invoice_number: "INV-001".to_string(),
            issue_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            due_date: NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
            status: "draft".to_string(),
            notes: None,
            currency: "USD".to_string(),
            tax_rate: 10.0,
            subtotal: totals.subtotal,
            tax: totals.tax,
            total: totals.total,
            client_name: None,
            client_email: None,
            client_address: None,
            client_phone: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            items,
        }
    }

    fn item_patch(id: Option<i64>, quantity: i32, unit_price: f64) -> ItemPatch {
        ItemPatch {
            id,
            description: "Patched".to_string(),
            quantity,
            unit_price,
        }
    }

    #[test]
    fn omitted_items_are_deleted() {
        let patch = InvoicePatch {
            items: Patch::Present(vec![item_patch(Some(1), 5, 2.0)]),
            ..Default::default()
        };

        let plan = plan_reconcile(&invoice(), &patch).unwrap();

        assert_eq!(plan.deleted, vec![2]);
        assert_eq!(plan.changes.len(), 1);
        match &plan.changes[0] {
            ItemChange::Update(updated) => {
                assert_eq!(updated.id, 1);
                assert_eq!(updated.total, 10.0);
            }
            other => panic!("unexpected change {:?}", other),
        }
        assert_eq!(plan.invoice.subtotal, 10.0);
        assert_eq!(plan.invoice.tax, 1.0);
        assert_eq!(plan.invoice.total, 11.0);
    }

    #[test]
    fn unknown_item_id_fails_whole_plan() {
        let patch = InvoicePatch {
            notes: Patch::Present(Some("staged".to_string())),
            items: Patch::Present(vec![
                item_patch(Some(1), 1, 1.0),
                item_patch(Some(999), 1, 1.0),
            ]),
            ..Default::default()
        };

        let err = plan_reconcile(&invoice(), &patch).unwrap_err();
        assert!(matches!(err, ServiceError::ItemNotFound(999)));
    }

    #[test]
    fn malformed_date_is_rejected() {
        for bad in ["2024/01/31", "31-01-2024", "2024-1-5", "2024-02-30"] {
            let patch = InvoicePatch {
                due_date: Patch::Present(bad.to_string()),
                ..Default::default()
            };
            assert!(
                matches!(plan_reconcile(&invoice(), &patch), Err(ServiceError::InvalidDateFormat)),
                "{} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn duplicate_item_id_is_rejected() {
        let patch = InvoicePatch {
            items: Patch::Present(vec![
                item_patch(Some(1), 1, 1.0),
                item_patch(Some(1), 2, 1.0),
            ]),
            ..Default::default()
        };
        assert!(matches!(
            plan_reconcile(&invoice(), &patch),
            Err(ServiceError::Validation(_))
        ));
    }

    #[test]
    fn untagged_items_are_inserted() {
        let patch = InvoicePatch {
            items: Patch::Present(vec![
                item_patch(Some(2), 1, 5.0),
                item_patch(None, 4, 2.5),
            ]),
            ..Default::default()
        };

        let plan = plan_reconcile(&invoice(), &patch).unwrap();

        assert_eq!(plan.updated_count(), 1);
        assert_eq!(plan.inserted_count(), 1);
        assert_eq!(plan.deleted, vec![1]);
        assert_eq!(plan.invoice.subtotal, 15.0);
    }

    #[test]
    fn header_only_patch_keeps_items_and_recomputes_tax() {
        let patch = InvoicePatch {
            tax_rate: Patch::Present(20.0),
            status: Patch::Present("open".to_string()),
            ..Default::default()
        };

        let plan = plan_reconcile(&invoice(), &patch).unwrap();

        assert!(plan.changes.is_empty());
        assert!(plan.deleted.is_empty());
        assert_eq!(plan.invoice.status, "open");
        assert_eq!(plan.invoice.subtotal, 25.0);
        assert_eq!(plan.invoice.tax, 5.0);
        assert_eq!(plan.invoice.total, 30.0);
    }

    #[test]
    fn absent_fields_are_untouched() {
        let current = invoice();
        let patch = InvoicePatch {
            client_name: Patch::Present("Acme".to_string()),
            notes: Patch::Present(None),
            ..Default::default()
        };

        let plan = plan_reconcile(&current, &patch).unwrap();

        assert_eq!(plan.invoice.client_name.as_deref(), Some("Acme"));
        assert_eq!(plan.invoice.invoice_number, current.invoice_number);
        assert_eq!(plan.invoice.due_date, current.due_date);
        assert_eq!(plan.invoice.notes, None);
    }

    #[test]
    fn tax_change_and_item_drop_match_worked_example() {
        let patch = InvoicePatch {
            tax_rate: Patch::Present(20.0),
            items: Patch::Present(vec![item_patch(Some(1), 3, 10.0)]),
            ..Default::default()
        };

        let plan = plan_reconcile(&invoice(), &patch).unwrap();

        assert_eq!(plan.invoice.subtotal, 30.0);
        assert_eq!(plan.invoice.tax, 6.0);
        assert_eq!(plan.invoice.total, 36.0);
        assert_eq!(plan.deleted, vec![2]);
    }
}
