use argon2::{
    password_hash::{self, rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use once_cell::sync::Lazy;
use thiserror::Error;

/// Plaintext password. `Debug` is redacted so it can't end up in logs.
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
        f.write_str("Password(<redacted>)")
    }
}

/// Stored PHC-format password hash.
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

#[derive(Debug, Error)]
pub enum PasswordError {
    /// The stored hash is not a parseable PHC string. Treated as data corruption.
    #[error("Stored password hash is malformed: {0}")]
    MalformedHash(password_hash::Error),

    #[error("Failed to hash password: {0}")]
    Hashing(password_hash::Error),
}

/// Hash of a throwaway password, verified against when the account doesn't
/// exist so both login failure paths do the same work.
static DUMMY_HASH: Lazy<Option<PasswordHashString>> =
    Lazy::new(|| hash_password(&Password::new("timing-equalizer")).ok());

/// Hash a password using Argon2id with a fresh random salt.
pub fn hash_password(password: &Password) -> Result<PasswordHashString, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);

    let password_hash = Argon2::default()
        .hash_password(password.as_str().as_bytes(), &salt)
        .map_err(PasswordError::Hashing)?
        .to_string();

    Ok(PasswordHashString::new(password_hash))
}

/// Check `password` against a stored hash.
///
/// A mismatch is `Ok(false)`. Only a structurally invalid stored hash is an
/// error. The digest comparison inside argon2 is constant-time.
pub fn verify_password(
    password: &Password,
    password_hash: &PasswordHashString,
) -> Result<bool, PasswordError> {
    let parsed_hash =
        PasswordHash::new(password_hash.as_str()).map_err(PasswordError::MalformedHash)?;

    match Argon2::default().verify_password(password.as_str().as_bytes(), &parsed_hash) {
        Ok(()) => Ok(true),
        Err(password_hash::Error::Password) => Ok(false),
        Err(e) => Err(PasswordError::MalformedHash(e)),
    }
}

/// Burn one verification for a login against an unknown account.
pub fn verify_against_dummy(password: &Password) {
    if let Some(hash) = DUMMY_HASH.as_ref() {
        let _ = verify_password(password, hash);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_password() {
        let password = Password::new("mySecurePassword123");
        let hash = hash_password(&password).expect("Failed to hash password");

        assert!(hash.as_str().starts_with("$argon2id$"));
        assert!(!hash.as_str().contains("mySecurePassword123"));
    }

    #[test]
    fn test_verify_password_correct() {
        let password = Password::new("mySecurePassword123");
        let hash = hash_password(&password).expect("Failed to hash password");

        assert!(verify_password(&password, &hash).unwrap());
    }

    #[test]
    fn test_verify_password_incorrect() {
        let password = Password::new("mySecurePassword123");
        let hash = hash_password(&password).expect("Failed to hash password");

        let wrong_password = Password::new("mySecurePassword124");
        assert!(!verify_password(&wrong_password, &hash).unwrap());
    }

    #[test]
    fn test_different_hashes_for_same_password() {
        let password = Password::new("mySecurePassword123");
        let hash1 = hash_password(&password).expect("Failed to hash password");
        let hash2 = hash_password(&password).expect("Failed to hash password");

        assert_ne!(hash1.as_str(), hash2.as_str());
        assert!(verify_password(&password, &hash1).unwrap());
        assert!(verify_password(&password, &hash2).unwrap());
    }

    #[test]
    fn malformed_stored_hash_is_an_error_not_a_mismatch() {
        let password = Password::new("anything");
        let corrupt = PasswordHashString::new("not-a-phc-string".to_string());

        assert!(matches!(
            verify_password(&password, &corrupt),
            Err(PasswordError::MalformedHash(_))
        ));
    }

    #[test]
    fn password_debug_is_redacted() {
        let rendered = format!("{:?}", Password::new("hunter2"));
        assert!(!rendered.contains("hunter2"));
    }
}
