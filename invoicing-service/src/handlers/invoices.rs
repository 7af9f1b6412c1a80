//! Invoice handlers.

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use service_core::error::AppError;

use crate::dtos::invoice::{
    CreateInvoiceRequest, ListInvoicesQuery, PublicInvoiceRequest, UpdateStatusRequest,
};
use crate::dtos::ListResponse;
use crate::middleware::AuthUser;
use crate::models::{Invoice, InvoicePatch, InvoiceSummary, ListInvoicesFilter};
use crate::services::RenderedPdf;
use crate::AppState;

fn pdf_response(pdf: RenderedPdf) -> impl IntoResponse {
    (
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", pdf.filename),
            ),
        ],
        pdf.bytes,
    )
}

pub async fn create_invoice(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<CreateInvoiceRequest>,
) -> Result<(StatusCode, Json<Invoice>), AppError> {
    let invoice = state.invoices.create(user.user_id, req).await?;
    Ok((StatusCode::CREATED, Json(invoice)))
}

pub async fn list_invoices(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<ListInvoicesQuery>,
) -> Result<Json<ListResponse<Invoice>>, AppError> {
    let filter = ListInvoicesFilter::from(query);
    let (invoices, total) = state.invoices.list(user.user_id, &filter).await?;
    Ok(Json(ListResponse::new(invoices, filter.page, total)))
}

pub async fn get_invoice(
    State(state): State<AppState>,
    user: AuthUser,
    Path(invoice_id): Path<i64>,
) -> Result<Json<Invoice>, AppError> {
    Ok(Json(state.invoices.get(user.user_id, invoice_id).await?))
}

/// PUT /v1/protected/invoices/:id
///
/// Sparse update. When `items` is sent it is the complete item set: listed
/// ids are overwritten, entries without an id are added, and every other
/// item of the invoice is deleted.
pub async fn update_invoice(
    State(state): State<AppState>,
    user: AuthUser,
    Path(invoice_id): Path<i64>,
    Json(patch): Json<InvoicePatch>,
) -> Result<Json<Invoice>, AppError> {
    Ok(Json(
        state
            .invoices
            .reconcile(user.user_id, invoice_id, patch)
            .await?,
    ))
}

pub async fn update_invoice_status(
    State(state): State<AppState>,
    user: AuthUser,
    Path(invoice_id): Path<i64>,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<Json<Invoice>, AppError> {
    Ok(Json(
        state
            .invoices
            .update_status(user.user_id, invoice_id, req)
            .await?,
    ))
}

pub async fn delete_invoice(
    State(state): State<AppState>,
    user: AuthUser,
    Path(invoice_id): Path<i64>,
) -> Result<StatusCode, AppError> {
    state.invoices.delete(user.user_id, invoice_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn invoice_summary(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<InvoiceSummary>, AppError> {
    Ok(Json(state.invoices.summary(user.user_id).await?))
}

/// POST /v1/protected/invoices/:id/pdf
pub async fn invoice_pdf(
    State(state): State<AppState>,
    user: AuthUser,
    Path(invoice_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let pdf = state.invoices.invoice_pdf(user.user_id, invoice_id).await?;
    Ok(pdf_response(pdf))
}

/// POST /v1/public/invoices/generate-pdf
pub async fn public_invoice_pdf(
    State(state): State<AppState>,
    Json(req): Json<PublicInvoiceRequest>,
) -> Result<impl IntoResponse, AppError> {
    let pdf = state.invoices.public_pdf(req).await?;
    Ok(pdf_response(pdf))
}
