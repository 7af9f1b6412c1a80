//! Invoice PDF rendering.
//!
//! A [`PdfModel`] is turned into HTML by the askama [`InvoiceTemplate`] and
//! the HTML into PDF bytes by a [`PdfRenderer`].

use askama::Template;
use async_trait::async_trait;
use std::time::Duration;

use crate::models::{Client, Invoice, User};
use crate::services::executor::CommandExecutor;
use crate::services::ServiceError;

/// Everything needed to render one invoice.
#[derive(Debug, Clone, PartialEq)]
pub struct PdfModel {
    pub invoice: Invoice,
    pub client: Client,
    pub sender: User,
}

/// Rendered document ready to be sent.
#[derive(Debug, Clone)]
pub struct RenderedPdf {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// `invoice-<number>.pdf`, reduced to characters safe in a header value.
pub fn pdf_filename(invoice_number: &str) -> String {
    let safe: String = invoice_number
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("invoice-{}.pdf", safe)
}

/// `USD 1,234.50`. Negative amounts keep their sign after the code.
pub fn format_money(amount: f64, currency: &str) -> String {
    let fixed = format!("{:.2}", amount.abs());
    let (whole, cents) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if amount < 0.0 && fixed != "0.00" { "-" } else { "" };
    format!("{} {}{}.{}", currency, sign, grouped, cents)
}

pub struct PartyView {
    pub name: String,
    pub email: String,
    pub address: String,
    pub phone: String,
}

pub struct BankView {
    pub bank_name: String,
    pub account_name: String,
    pub account_number: String,
}

pub struct LineView {
    pub description: String,
    pub quantity: i32,
    pub unit_price: String,
    pub total: String,
}

#[derive(Template)]
#[template(path = "invoice.html")]
pub struct InvoiceTemplate {
    pub invoice_number: String,
    pub issue_date: String,
    pub due_date: String,
    pub status: String,
    pub notes: Option<String>,
    pub sender: PartyView,
    pub recipient: PartyView,
    pub bank: Option<BankView>,
    pub lines: Vec<LineView>,
    pub tax_rate: String,
    pub subtotal: String,
    pub tax: String,
    pub total: String,
}

fn text(value: &Option<String>) -> String {
    value.clone().unwrap_or_default()
}

impl From<&PdfModel> for InvoiceTemplate {
    fn from(model: &PdfModel) -> Self {
        let invoice = &model.invoice;
        let currency = invoice.currency.as_str();
        let sender = &model.sender;

        let bank = sender.bank_name.as_ref().map(|bank_name| BankView {
            bank_name: bank_name.clone(),
            account_name: text(&sender.bank_account_name),
            account_number: text(&sender.bank_account_number),
        });

        Self {
            invoice_number: invoice.invoice_number.clone(),
            issue_date: invoice.issue_date.format("%d %b %Y").to_string(),
            due_date: invoice.due_date.format("%d %b %Y").to_string(),
            status: invoice.status.replace('_', " ").to_uppercase(),
            notes: invoice.notes.clone().filter(|n| !n.trim().is_empty()),
            sender: PartyView {
                name: sender.name.clone(),
                email: sender.email.clone(),
                address: text(&sender.address),
                phone: text(&sender.phone),
            },
            recipient: PartyView {
                name: model.client.name.clone(),
                email: text(&model.client.email),
                address: text(&model.client.address),
                phone: text(&model.client.phone),
            },
            bank,
            lines: invoice
                .items
                .iter()
                .map(|item| LineView {
                    description: item.description.clone(),
                    quantity: item.quantity,
                    unit_price: format_money(item.unit_price, currency),
                    total: format_money(item.total, currency),
                })
                .collect(),
            tax_rate: format!("{}%", invoice.tax_rate),
            subtotal: format_money(invoice.subtotal, currency),
            tax: format_money(invoice.tax, currency),
            total: format_money(invoice.total, currency),
        }
    }
}

pub fn render_html(model: &PdfModel) -> Result<String, ServiceError> {
    InvoiceTemplate::from(model)
        .render()
        .map_err(|e| ServiceError::Render(anyhow::anyhow!("Failed to render template: {}", e)))
}

/// Converts an HTML document into PDF bytes.
#[async_trait]
pub trait PdfRenderer: Send + Sync {
    async fn render(&self, html: String) -> Result<Vec<u8>, ServiceError>;
}

/// Pipes HTML through an external converter (`wkhtmltopdf` by default)
/// reading stdin and writing the PDF to stdout.
pub struct CommandPdfRenderer {
    binary: String,
    executor: CommandExecutor,
}

impl CommandPdfRenderer {
    pub fn new(binary: impl Into<String>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            executor: CommandExecutor::new(timeout),
        }
    }
}

#[async_trait]
impl PdfRenderer for CommandPdfRenderer {
    async fn render(&self, html: String) -> Result<Vec<u8>, ServiceError> {
        let output = self
            .executor
            .execute(&self.binary, &["--quiet", "-", "-"], html.as_bytes())
            .await?;

        if !output.stdout.starts_with(b"%PDF") {
            return Err(ServiceError::Render(anyhow::anyhow!(
                "{} produced {} bytes that are not a PDF",
                self.binary,
                output.stdout.len()
            )));
        }

        Ok(output.stdout)
    }
}
