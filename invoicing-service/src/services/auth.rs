use std::sync::Arc;
use tracing::{info, instrument};
use validator::Validate;

use crate::{
    dtos::auth::{RefreshTokenRequest, SignInRequest, SignUpRequest},
    models::{NewUser, User, UserPatch},
    services::{JwtService, ServiceError, TokenPair, UserRepository},
    utils::{hash_password, verify_password, Password},
};

/// Sign-up, sign-in and profile management.
#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserRepository>,
    jwt: JwtService,
}

impl AuthService {
    pub fn new(users: Arc<dyn UserRepository>, jwt: JwtService) -> Self {
        Self { users, jwt }
    }

    #[instrument(skip_all, fields(email = %req.email))]
    pub async fn sign_up(&self, req: SignUpRequest) -> Result<TokenPair, ServiceError> {
        req.validate()?;

        if self.users.find_user_by_email(&req.email).await?.is_some() {
            return Err(ServiceError::Conflict("email already exists".to_string()));
        }

        let password_hash = hash_password(&Password::new(req.password)).map_err(|e| {
            ServiceError::Internal(anyhow::anyhow!("Password hashing error: {}", e))
        })?;

        let user = self
            .users
            .create_user(&NewUser {
                name: req.name,
                email: req.email,
                password_hash,
                address: Some(req.address),
                phone: Some(req.phone),
                bank_name: Some(req.bank_name),
                bank_account_name: Some(req.bank_account_name),
                bank_account_number: Some(req.bank_account_number),
            })
            .await?;

        info!(user_id = user.id, "User signed up");
        self.tokens_for(user.id)
    }

    #[instrument(skip_all, fields(email = %req.email))]
    pub async fn sign_in(&self, req: SignInRequest) -> Result<TokenPair, ServiceError> {
        req.validate()?;

        let user = self
            .users
            .find_user_by_email(&req.email)
            .await?
            .ok_or(ServiceError::InvalidCredentials)?;

        let valid = verify_password(&Password::new(req.password), &user.password_hash)
            .map_err(ServiceError::Internal)?;
        if !valid {
            return Err(ServiceError::InvalidCredentials);
        }

        info!(user_id = user.id, "User signed in");
        self.tokens_for(user.id)
    }

    /// Exchange a valid refresh token for a new pair.
    pub async fn refresh_token(&self, req: RefreshTokenRequest) -> Result<TokenPair, ServiceError> {
        req.validate()?;

        let user_id = self
            .jwt
            .validate_refresh_token(&req.refresh_token)
            .and_then(|claims| claims.user_id())
            .map_err(|e| ServiceError::Unauthorized(e.to_string()))?;

        // The account may have been removed since the token was issued.
        let user = self
            .users
            .find_user_by_id(user_id)
            .await?
            .ok_or_else(|| ServiceError::Unauthorized("user no longer exists".to_string()))?;

        self.tokens_for(user.id)
    }

    pub async fn me(&self, user_id: i64) -> Result<User, ServiceError> {
        self.users
            .find_user_by_id(user_id)
            .await?
            .ok_or(ServiceError::NotFound("User"))
    }

    #[instrument(skip(self, patch))]
    pub async fn update_me(&self, user_id: i64, patch: UserPatch) -> Result<User, ServiceError> {
        patch.validate()?;

        let mut user = self.me(user_id).await?;

        if let Some(email) = patch.email.present() {
            if *email != user.email {
                if let Some(other) = self.users.find_user_by_email(email).await? {
                    if other.id != user_id {
                        return Err(ServiceError::Conflict("email already exists".to_string()));
                    }
                }
            }
        }

        patch.apply_to(&mut user);
        let user = self
            .users
            .update_user(&user)
            .await?
            .ok_or(ServiceError::NotFound("User"))?;

        info!(user_id, "User profile updated");
        Ok(user)
    }

    fn tokens_for(&self, user_id: i64) -> Result<TokenPair, ServiceError> {
        self.jwt
            .generate_token_pair(user_id)
            .map_err(ServiceError::Internal)
    }
}
