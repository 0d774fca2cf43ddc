// Password hashing and validation service

use argon2::{
    password_hash::{rand_core::OsRng, SaltString},
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
};

use crate::auth::error::AuthError;

/// Password service for hashing and verification
pub struct PasswordService;

impl PasswordService {
    /// Hash a password using Argon2id with a fresh random salt
    pub fn hash_password(password: &str) -> Result<String, AuthError> {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|_| AuthError::PasswordHashError)
    }

    /// Verify a password against a stored hash
    pub fn verify_password(password: &str, hash: &str) -> Result<bool, AuthError> {
        let parsed = PasswordHash::new(hash).map_err(|_| AuthError::PasswordHashError)?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok())
    }

    /// Validate password strength requirements: at least 8 characters,
    /// with at least one letter and one digit
    pub fn validate_password_strength(password: &str) -> Result<(), AuthError> {
        if password.chars().count() < 8 {
            return Err(AuthError::InvalidPasswordFormat(
                "Password must be at least 8 characters long".to_string(),
            ));
        }
        if !password.chars().any(|c| c.is_alphabetic()) {
            return Err(AuthError::InvalidPasswordFormat(
                "Password must contain at least one letter".to_string(),
            ));
        }
        if !password.chars().any(|c| c.is_ascii_digit()) {
            return Err(AuthError::InvalidPasswordFormat(
                "Password must contain at least one digit".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify_round_trip() {
        let hash = PasswordService::hash_password("correct horse 1").unwrap();
        assert!(PasswordService::verify_password("correct horse 1", &hash).unwrap());
        assert!(!PasswordService::verify_password("wrong password 1", &hash).unwrap());
    }

    #[test]
    fn test_hashes_are_salted() {
        let first = PasswordService::hash_password("same password 1").unwrap();
        let second = PasswordService::hash_password("same password 1").unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_verify_rejects_malformed_hash() {
        assert!(PasswordService::verify_password("anything1", "not-a-phc-hash").is_err());
    }

    #[test]
    fn test_strength_requirements() {
        assert!(PasswordService::validate_password_strength("abcdefg1").is_ok());
        assert!(PasswordService::validate_password_strength("short1").is_err());
        assert!(PasswordService::validate_password_strength("12345678").is_err());
        assert!(PasswordService::validate_password_strength("abcdefgh").is_err());
    }
}
