//! Invoice arithmetic: line totals and header aggregates.
//!
//! Amounts are plain `f64`. No rounding is applied beyond the float multiply,
//! so values such as `0.1 * 3` carry the usual binary representation error.

use crate::models::{InvoiceItem, ItemPatch, NewInvoiceItem};

/// Anything with a quantity and a unit price.
pub trait LineAmount {
    fn quantity(&self) -> i32;
    fn unit_price(&self) -> f64;

    fn line_total(&self) -> f64 {
        line_total(self.quantity(), self.unit_price())
    }
}

impl LineAmount for InvoiceItem {
    fn quantity(&self) -> i32 {
        self.quantity
    }

    fn unit_price(&self) -> f64 {
        self.unit_price
    }
}

impl LineAmount for NewInvoiceItem {
    fn quantity(&self) -> i32 {
        self.quantity
    }

    fn unit_price(&self) -> f64 {
        self.unit_price
    }
}

impl LineAmount for ItemPatch {
    fn quantity(&self) -> i32 {
        self.quantity
    }

    fn unit_price(&self) -> f64 {
        self.unit_price
    }
}

impl<T: LineAmount + ?Sized> LineAmount for &T {
    fn quantity(&self) -> i32 {
        (**self).quantity()
    }

    fn unit_price(&self) -> f64 {
        (**self).unit_price()
    }
}

/// Derived header amounts.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Totals {
    pub subtotal: f64,
    pub tax: f64,
    pub total: f64,
}

pub fn line_total(quantity: i32, unit_price: f64) -> f64 {
    f64::from(quantity) * unit_price
}

/// `subtotal = Σ line totals`, `tax = tax_rate * subtotal / 100`,
/// `total = subtotal + tax`.
pub fn recompute_aggregate<I>(items: I, tax_rate: f64) -> Totals
where
    I: IntoIterator,
    I::Item: LineAmount,
{
    let subtotal: f64 = items.into_iter().map(|item| item.line_total()).sum();
    let tax = tax_rate * subtotal / 100.0;

    Totals {
        subtotal,
        tax,
        total: subtotal + tax,
    }
}
