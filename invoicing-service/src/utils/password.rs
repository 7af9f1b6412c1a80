use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

/// Plaintext password; kept out of `Debug` output.
#[derive(Clone)]
pub struct Password(String);

impl Password {
    pub fn new(password: impl Into<String>) -> Self {
        Self(password.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Password {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Password(***)")
    }
}

/// Hash a password with Argon2id and a random salt, in PHC string format.
pub fn hash_password(password: &Password) -> Result<String, anyhow::Error> {
    let salt = SaltString::generate(&mut OsRng);

    let password_hash = Argon2::default()
        .hash_password(password.as_str().as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?
        .to_string();

    Ok(password_hash)
}

/// Check `password` against a stored PHC hash.
///
/// A malformed hash is an error; a mismatch is `Ok(false)`.
pub fn verify_password(password: &Password, password_hash: &str) -> Result<bool, anyhow::Error> {
    let parsed_hash = PasswordHash::new(password_hash)
        .map_err(|e| anyhow::anyhow!("Invalid password hash format: {}", e))?;

    Ok(Argon2::default()
        .verify_password(password.as_str().as_bytes(), &parsed_hash)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_argon2_phc_string() {
        let hash = hash_password(&Password::new("secret123")).expect("Failed to hash password");
        assert!(hash.starts_with("$argon2"));
    }

    #[test]
    fn verify_accepts_matching_password() {
        let password = Password::new("secret123");
        let hash = hash_password(&password).expect("Failed to hash password");
        assert!(verify_password(&password, &hash).unwrap());
    }

    #[test]
    fn verify_rejects_wrong_password() {
        let hash = hash_password(&Password::new("secret123")).expect("Failed to hash password");
        assert!(!verify_password(&Password::new("wrong-password"), &hash).unwrap());
    }

    #[test]
    fn verify_errors_on_garbage_hash() {
        assert!(verify_password(&Password::new("secret123"), "not-a-hash").is_err());
    }

    #[test]
    fn debug_output_is_masked() {
        assert_eq!(format!("{:?}", Password::new("secret123")), "Password(***)");
    }
}
