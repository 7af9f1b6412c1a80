//! Client directory model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::{Validate, ValidateEmail, ValidationError, ValidationErrors};

use super::Patch;
use crate::utils::PageRequest;

/// A billing contact owned by one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Client {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a client.
#[derive(Debug, Clone)]
pub struct NewClient {
    pub user_id: i64,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
}

/// Sparse update of a client.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ClientPatch {
    pub name: Patch<String>,
    pub email: Patch<String>,
    pub phone: Patch<String>,
    pub address: Patch<String>,
}

impl ClientPatch {
    pub fn apply_to(&self, client: &mut Client) {
        self.name.apply(&mut client.name);
        self.email.apply_some(&mut client.email);
        self.phone.apply_some(&mut client.phone);
        self.address.apply_some(&mut client.address);
    }
}

impl Validate for ClientPatch {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if let Patch::Present(name) = &self.name {
            if name.trim().is_empty() {
                errors.add("name", ValidationError::new("length"));
            }
        }
        if let Patch::Present(email) = &self.email {
            if !email.validate_email() {
                errors.add("email", ValidationError::new("email"));
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Filter parameters for listing clients.
#[derive(Debug, Clone, Default)]
pub struct ListClientsFilter {
    pub search: Option<String>,
    pub page: Option<PageRequest>,
}
