//! User account model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::{Validate, ValidateEmail, ValidationError, ValidationErrors};

use super::Patch;

/// A registered account. The banking fields only appear on rendered invoices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub bank_name: Option<String>,
    pub bank_account_name: Option<String>,
    pub bank_account_number: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a user. The password is already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub bank_name: Option<String>,
    pub bank_account_name: Option<String>,
    pub bank_account_number: Option<String>,
}

/// Sparse update of the caller's own profile.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UserPatch {
    pub name: Patch<String>,
    pub email: Patch<String>,
    pub address: Patch<String>,
    pub phone: Patch<String>,
    pub bank_name: Patch<String>,
    pub bank_account_name: Patch<String>,
    pub bank_account_number: Patch<String>,
}

impl UserPatch {
    pub fn apply_to(&self, user: &mut User) {
        self.name.apply(&mut user.name);
        self.email.apply(&mut user.email);
        self.address.apply_some(&mut user.address);
        self.phone.apply_some(&mut user.phone);
        self.bank_name.apply_some(&mut user.bank_name);
        self.bank_account_name.apply_some(&mut user.bank_account_name);
        self.bank_account_number
            .apply_some(&mut user.bank_account_number);
    }
}

impl Validate for UserPatch {
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
