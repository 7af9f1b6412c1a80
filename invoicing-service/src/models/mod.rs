//! Domain models for invoicing-service.

mod client;
mod invoice;
mod invoice_item;
mod patch;
mod user;

pub use client::{Client, ClientPatch, ListClientsFilter, NewClient};
pub use invoice::{
    Currency, Invoice, InvoicePatch, InvoiceStatus, InvoiceSummary, ListInvoicesFilter,
    NewInvoice,
};
pub use invoice_item::{InvoiceItem, ItemPatch, NewInvoiceItem};
pub use patch::Patch;
pub use user::{NewUser, User, UserPatch};
