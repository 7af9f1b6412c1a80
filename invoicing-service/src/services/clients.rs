use std::sync::Arc;
use tracing::{info, instrument};
use validator::Validate;

use crate::{
    dtos::client::CreateClientRequest,
    models::{Client, ClientPatch, ListClientsFilter, NewClient},
    services::{ClientRepository, ServiceError},
};

/// Owner-scoped client directory.
#[derive(Clone)]
pub struct ClientService {
    clients: Arc<dyn ClientRepository>,
}

impl ClientService {
    pub fn new(clients: Arc<dyn ClientRepository>) -> Self {
        Self { clients }
    }

    #[instrument(skip(self, req))]
    pub async fn create(
        &self,
        user_id: i64,
        req: CreateClientRequest,
    ) -> Result<Client, ServiceError> {
        req.validate()?;

        let client = self
            .clients
            .create_client(&NewClient {
                user_id,
                name: req.name,
                email: req.email,
                phone: req.phone,
                address: req.address,
            })
            .await?;

        info!(client_id = client.id, "Client created");
        Ok(client)
    }

    pub async fn list(
        &self,
        user_id: i64,
        filter: &ListClientsFilter,
    ) -> Result<(Vec<Client>, i64), ServiceError> {
        self.clients.list_clients(user_id, filter).await
    }

    pub async fn get(&self, user_id: i64, client_id: i64) -> Result<Client, ServiceError> {
        self.clients
            .get_client(user_id, client_id)
            .await?
            .ok_or(ServiceError::NotFound("Client"))
    }

    #[instrument(skip(self, patch))]
    pub async fn update(
        &self,
        user_id: i64,
        client_id: i64,
        patch: ClientPatch,
    ) -> Result<Client, ServiceError> {
        patch.validate()?;

        let mut client = self.get(user_id, client_id).await?;
        patch.apply_to(&mut client);

        let client = self
            .clients
            .update_client(&client)
            .await?
            .ok_or(ServiceError::NotFound("Client"))?;

        info!("Client updated");
        Ok(client)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, user_id: i64, client_id: i64) -> Result<(), ServiceError> {
        if !self.clients.delete_client(user_id, client_id).await? {
            return Err(ServiceError::NotFound("Client"));
        }

        info!("Client deleted");
        Ok(())
    }
}
