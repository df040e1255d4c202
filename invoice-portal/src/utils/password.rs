//! Argon2 credential hashing for staff logins.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use secrecy::{ExposeSecret, Secret};

/// Plaintext password, redacted from `Debug` output.
#[derive(Debug, Clone)]
pub struct Password(Secret<String>);

impl Password {
    pub fn new(password: String) -> Self {
        Self(Secret::new(password))
    }

    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl From<Secret<String>> for Password {
    fn from(secret: Secret<String>) -> Self {
        Self(secret)
    }
}

/// PHC-format Argon2 hash as stored in `users.password_hash`.
#[derive(Debug, Clone)]
pub struct PasswordHashString(String);

impl PasswordHashString {
    pub fn new(hash: String) -> Self {
        Self(hash)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

/// Hash with Argon2id default parameters and a fresh random salt.
pub fn hash_password(password: &Password) -> Result<PasswordHashString, anyhow::Error> {
    let salt = SaltString::generate(&mut OsRng);

    let password_hash = Argon2::default()
        .hash_password(password.expose().as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?
        .to_string();

    Ok(PasswordHashString::new(password_hash))
}

/// Check `password` against a stored hash. A malformed hash never matches.
pub fn verify_password(password: &Password, password_hash: &str) -> bool {
    match PasswordHash::new(password_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.expose().as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            tracing::warn!(error = %e, "Stored password hash is malformed");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_argon2_phc_string() {
        let hash = hash_password(&Password::new("s3cret-pass".to_string())).unwrap();
        assert!(hash.as_str().starts_with("$argon2"));
    }

    #[test]
    fn correct_password_verifies() {
        let password = Password::new("s3cret-pass".to_string());
        let hash = hash_password(&password).unwrap();
        assert!(verify_password(&password, hash.as_str()));
    }

    #[test]
    fn wrong_password_is_rejected() {
        let hash = hash_password(&Password::new("s3cret-pass".to_string())).unwrap();
        assert!(!verify_password(&Password::new("guess".to_string()), hash.as_str()));
    }

    #[test]
    fn malformed_hash_is_rejected() {
        assert!(!verify_password(&Password::new("x".to_string()), "not-a-hash"));
    }

    #[test]
    fn debug_output_hides_plaintext() {
        let password = Password::new("s3cret-pass".to_string());
        assert!(!format!("{:?}", password).contains("s3cret-pass"));
    }
}
