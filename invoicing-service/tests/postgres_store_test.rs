//! PostgreSQL store against a live database.
//!
//! Set `TEST_DATABASE_URL` to run these; without it every test returns early.

use chrono::NaiveDate;
use invoicing_service::models::{
    Currency, Invoice, InvoicePatch, ItemPatch, ListInvoicesFilter, NewInvoice, NewInvoiceItem,
    NewUser, Patch,
};
use invoicing_service::services::{Database, InvoiceRepository, ServiceError, UserRepository};
use invoicing_service::utils::PageRequest;
use service_core::observability::init_test_tracing;
use uuid::Uuid;

async fn database() -> Option<Database> {
    init_test_tracing();
    dotenvy::dotenv().ok();

    let url = std::env::var("TEST_DATABASE_URL").ok()?;
    let db = Database::new(&url, 2, 1)
        .await
        .expect("Failed to connect to test database");
    db.run_migrations()
        .await
        .expect("Failed to run migrations");
    Some(db)
}

async fn new_user(db: &Database) -> i64 {
    db.create_user(&NewUser {
        name: "Store Test".to_string(),
        email: format!("store-{}@example.com", Uuid::new_v4()),
        password_hash: "not-a-real-hash".to_string(),
        address: None,
        phone: None,
        bank_name: None,
        bank_account_name: None,
        bank_account_number: None,
    })
    .await
    .unwrap()
    .id
}

fn new_invoice(user_id: i64, number: &str) -> NewInvoice {
    NewInvoice {
        user_id,
        client_id: None,
        invoice_number: number.to_string(),
        issue_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        due_date: NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
        notes: None,
        currency: Currency::Usd,
        tax_rate: 10.0,
        client_name: Some("Acme Corp".to_string()),
        client_email: None,
        client_address: None,
        client_phone: None,
        items: vec![
            NewInvoiceItem {
                description: "Consulting".to_string(),
                quantity: 2,
                unit_price: 10.0,
            },
            NewInvoiceItem {
                description: "Hosting".to_string(),
                quantity: 1,
                unit_price: 5.0,
            },
        ],
    }
}

#[tokio::test]
async fn duplicate_email_is_a_conflict() {
    let Some(db) = database().await else {
        return;
    };
    let email = format!("dup-{}@example.com", Uuid::new_v4());
    let user = NewUser {
        name: "Dup".to_string(),
        email,
        password_hash: "x".to_string(),
        address: None,
        phone: None,
        bank_name: None,
        bank_account_name: None,
        bank_account_number: None,
    };

    db.create_user(&user).await.unwrap();
    let err = db.create_user(&user).await.unwrap_err();
    assert!(matches!(err, ServiceError::Conflict(_)));
}

#[tokio::test]
async fn reconcile_commits_atomically() {
    let Some(db) = database().await else {
        return;
    };
    let user_id = new_user(&db).await;
    let invoice = db
        .create_invoice(&new_invoice(user_id, "PG-1"))
        .await
        .unwrap();
    assert_eq!(invoice.total, 27.5);
    let keep = invoice.items[0].id;

    let failing = InvoicePatch {
        notes: Patch::Present(Some("discarded".to_string())),
        items: Patch::Present(vec![ItemPatch {
            id: Some(i64::MAX),
            description: "Ghost".to_string(),
            quantity: 1,
            unit_price: 1.0,
        }]),
        ..Default::default()
    };
    let err = db
        .reconcile_invoice(user_id, invoice.id, &failing)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::ItemNotFound(_)));
    let unchanged = db.get_invoice(user_id, invoice.id).await.unwrap().unwrap();
    assert_eq!(unchanged, invoice);

    let patch = InvoicePatch {
        tax_rate: Patch::Present(20.0),
        items: Patch::Present(vec![ItemPatch {
            id: Some(keep),
            description: "Consulting".to_string(),
            quantity: 3,
            unit_price: 10.0,
        }]),
        ..Default::default()
    };
    let updated = db
        .reconcile_invoice(user_id, invoice.id, &patch)
        .await
        .unwrap();
    assert_eq!(updated.subtotal, 30.0);
    assert_eq!(updated.tax, 6.0);
    assert_eq!(updated.total, 36.0);
    assert_eq!(updated.items.len(), 1);
    assert_eq!(updated.items[0].id, keep);

    assert!(db.delete_invoice(user_id, invoice.id).await.unwrap());
    assert!(db.get_invoice(user_id, invoice.id).await.unwrap().is_none());
}

#[tokio::test]
async fn list_counts_beyond_last_page() {
    let Some(db) = database().await else {
        return;
    };
    let user_id = new_user(&db).await;
    for n in 0..3 {
        db.create_invoice(&new_invoice(user_id, &format!("PG-{}", n)))
            .await
            .unwrap();
    }

    let filter = ListInvoicesFilter {
        page: Some(PageRequest::new(Some(2), Some(2))),
        ..Default::default()
    };
    let (invoices, total) = db.list_invoices(user_id, &filter).await.unwrap();
    assert_eq!(total, 3);
    assert_eq!(invoices.len(), 1);
    assert_eq!(invoices[0].invoice_number, "PG-0");
    assert_eq!(invoices[0].items.len(), 2);

    let summary = db.invoice_summary(user_id).await.unwrap();
    assert_eq!(summary.unpaid, 82.5);
}

fn lines(count: usize) -> Vec<ItemPatch> {
    (0..count)
        .map(|n| ItemPatch {
            id: None,
            description: format!("Line {}", n),
            quantity: 1,
            unit_price: 1.0,
        })
        .collect()
}

fn assert_consistent(invoice: &Invoice) {
    let sum: f64 = invoice.items.iter().map(|item| item.total).sum();
    assert_eq!(
        invoice.subtotal,
        sum,
        "header and items from different commits ({} items)",
        invoice.items.len()
    );
}

#[tokio::test]
async fn readers_never_see_a_half_applied_reconcile() {
    let Some(db) = database().await else {
        return;
    };
    let user_id = new_user(&db).await;
    let invoice = db
        .create_invoice(&new_invoice(user_id, "PG-RACE"))
        .await
        .unwrap();

    let writer = {
        let db = db.clone();
        tokio::spawn(async move {
            for round in 0..100 {
                let patch = InvoicePatch {
                    items: Patch::Present(lines(if round % 2 == 0 { 5 } else { 1 })),
                    ..Default::default()
                };
                db.reconcile_invoice(user_id, invoice.id, &patch)
                    .await
                    .unwrap();
            }
        })
    };

    let readers: Vec<_> = (0..3)
        .map(|_| {
            let db = db.clone();
            tokio::spawn(async move {
                for _ in 0..100 {
                    let current = db.get_invoice(user_id, invoice.id).await.unwrap().unwrap();
                    assert_consistent(&current);

                    let (listed, _) = db
                        .list_invoices(user_id, &ListInvoicesFilter::default())
                        .await
                        .unwrap();
                    listed.iter().for_each(assert_consistent);
                }
            })
        })
        .collect();

    writer.await.unwrap();
    for reader in readers {
        reader.await.unwrap();
    }
}
