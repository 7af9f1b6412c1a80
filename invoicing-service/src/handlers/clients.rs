//! Client directory handlers. Every route is scoped to the caller.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;

use crate::dtos::client::{CreateClientRequest, ListClientsQuery};
use crate::dtos::ListResponse;
use crate::middleware::AuthUser;
use crate::models::{Client, ClientPatch, ListClientsFilter};
use crate::AppState;

pub async fn create_client(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<CreateClientRequest>,
) -> Result<(StatusCode, Json<Client>), AppError> {
    let client = state.clients.create(user.user_id, req).await?;
    Ok((StatusCode::CREATED, Json(client)))
}

pub async fn list_clients(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<ListClientsQuery>,
) -> Result<Json<ListResponse<Client>>, AppError> {
    let filter = ListClientsFilter::from(query);
    let (clients, total) = state.clients.list(user.user_id, &filter).await?;
    Ok(Json(ListResponse::new(clients, filter.page, total)))
}

pub async fn get_client(
    State(state): State<AppState>,
    user: AuthUser,
    Path(client_id): Path<i64>,
) -> Result<Json<Client>, AppError> {
    Ok(Json(state.clients.get(user.user_id, client_id).await?))
}

pub async fn update_client(
    State(state): State<AppState>,
    user: AuthUser,
    Path(client_id): Path<i64>,
    Json(patch): Json<ClientPatch>,
) -> Result<Json<Client>, AppError> {
    Ok(Json(
        state.clients.update(user.user_id, client_id, patch).await?,
    ))
}

pub async fn delete_client(
    State(state): State<AppState>,
    user: AuthUser,
    Path(client_id): Path<i64>,
) -> Result<StatusCode, AppError> {
    state.clients.delete(user.user_id, client_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
