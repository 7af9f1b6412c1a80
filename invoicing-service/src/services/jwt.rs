use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::JwtConfig;

const ACCESS: &str = "access";
const REFRESH: &str = "refresh";

/// Issues and validates HS256 tokens signed with the configured secret.
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_token_expiry_minutes: i64,
    refresh_token_expiry_days: i64,
}

/// Claims carried by both token kinds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    pub jti: String,
    /// `access` or `refresh`
    pub token_type: String,
}

impl Claims {
    pub fn user_id(&self) -> Result<i64, anyhow::Error> {
        self.sub
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid token subject: {}", e))
    }
}

/// Token response returned to client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

impl JwtService {
    pub fn new(config: &JwtConfig) -> Self {
        let secret = config.secret.expose_secret().as_bytes();

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            access_token_expiry_minutes: config.access_token_expiry_minutes,
            refresh_token_expiry_days: config.refresh_token_expiry_days,
        }
    }

    fn issue(
        &self,
        user_id: i64,
        token_type: &str,
        ttl: Duration,
    ) -> Result<String, anyhow::Error> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
            jti: Uuid::new_v4().to_string(),
            token_type: token_type.to_string(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| anyhow::anyhow!("Failed to encode {} token: {}", token_type, e))
    }

    pub fn generate_access_token(&self, user_id: i64) -> Result<String, anyhow::Error> {
        self.issue(
            user_id,
            ACCESS,
            Duration::minutes(self.access_token_expiry_minutes),
        )
    }

    pub fn generate_refresh_token(&self, user_id: i64) -> Result<String, anyhow::Error> {
        self.issue(user_id, REFRESH, Duration::days(self.refresh_token_expiry_days))
    }

    /// Generate both access and refresh tokens
    pub fn generate_token_pair(&self, user_id: i64) -> Result<TokenPair, anyhow::Error> {
        Ok(TokenPair {
            access_token: self.generate_access_token(user_id)?,
            refresh_token: self.generate_refresh_token(user_id)?,
            token_type: "Bearer".to_string(),
            expires_in: self.access_token_expiry_seconds(),
        })
    }

    fn validate(&self, token: &str, expected_type: &str) -> Result<Claims, anyhow::Error> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;

        let claims = decode::<Claims>(token, &self.decoding_key, &validation)
            .map_err(|e| anyhow::anyhow!("Invalid {} token: {}", expected_type, e))?
            .claims;

        if claims.token_type != expected_type {
            anyhow::bail!("Expected {} token, got {}", expected_type, claims.token_type);
        }

        Ok(claims)
    }

    pub fn validate_access_token(&self, token: &str) -> Result<Claims, anyhow::Error> {
        self.validate(token, ACCESS)
    }

    pub fn validate_refresh_token(&self, token: &str) -> Result<Claims, anyhow::Error> {
        self.validate(token, REFRESH)
    }

    /// Get access token expiry in seconds (for client info)
    pub fn access_token_expiry_seconds(&self) -> i64 {
        self.access_token_expiry_minutes * 60
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::Secret;

    fn service(secret: &str, access_minutes: i64) -> JwtService {
        JwtService::new(&JwtConfig {
            secret: Secret::new(secret.to_string()),
            access_token_expiry_minutes: access_minutes,
            refresh_token_expiry_days: 7,
        })
    }

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    #[test]
    fn test_access_token_generation_and_validation() -> Result<(), anyhow::Error> {
        let jwt = service(SECRET, 15);
        let token = jwt.generate_access_token(42)?;

        let claims = jwt.validate_access_token(&token)?;
        assert_eq!(claims.user_id()?, 42);
        assert_eq!(claims.token_type, "access");
        assert!(claims.exp > claims.iat);
        Ok(())
    }

    #[test]
    fn test_token_pair_generation() -> Result<(), anyhow::Error> {
        let jwt = service(SECRET, 15);
        let pair = jwt.generate_token_pair(7)?;

        assert_eq!(pair.token_type, "Bearer");
        assert_eq!(pair.expires_in, 900);
        assert_eq!(jwt.validate_refresh_token(&pair.refresh_token)?.user_id()?, 7);
        Ok(())
    }

    #[test]
    fn refresh_token_is_not_an_access_token() -> Result<(), anyhow::Error> {
        let jwt = service(SECRET, 15);
        let pair = jwt.generate_token_pair(7)?;

        assert!(jwt.validate_access_token(&pair.refresh_token).is_err());
        assert!(jwt.validate_refresh_token(&pair.access_token).is_err());
        Ok(())
    }

    #[test]
    fn rejects_token_signed_with_other_secret() -> Result<(), anyhow::Error> {
        let token = service("ffffffffffffffffffffffffffffffff", 15).generate_access_token(1)?;
        assert!(service(SECRET, 15).validate_access_token(&token).is_err());
        Ok(())
    }

    #[test]
    fn rejects_expired_token() -> Result<(), anyhow::Error> {
        // Past the default 60 second leeway.
        let token = service(SECRET, -5).generate_access_token(1)?;
        assert!(service(SECRET, 15).validate_access_token(&token).is_err());
        Ok(())
    }
}
