// JWT token generation and validation service

use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::auth::error::AuthError;
use crate::auth::models::Role;

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i32, // user_id
    pub email: String,
    pub role: Role,
    pub exp: i64, // expiration timestamp
    pub iat: i64, // issued at timestamp
}

/// Token service for JWT operations
#[derive(Clone)]
pub struct TokenService {
    secret: String,
    access_token_duration: i64,  // in seconds
    refresh_token_duration: i64, // in seconds
}

impl TokenService {
    /// Create a new TokenService with secret key
    /// Access tokens expire in 15 minutes, refresh tokens in 7 days
    pub fn new(secret: String) -> Self {
        Self {
            secret,
            access_token_duration: 900,
            refresh_token_duration: 604800,
        }
    }

    /// Generate an access token (15 minutes)
    pub fn generate_access_token(
        &self,
        user_id: i32,
        email: &str,
        role: Role,
    ) -> Result<String, AuthError> {
        self.generate_token(user_id, email, role, self.access_token_duration)
    }

    /// Generate a refresh token (7 days)
    pub fn generate_refresh_token(
        &self,
        user_id: i32,
        email: &str,
        role: Role,
    ) -> Result<String, AuthError> {
        self.generate_token(user_id, email, role, self.refresh_token_duration)
    }

    fn generate_token(
        &self,
        user_id: i32,
        email: &str,
        role: Role,
        duration: i64,
    ) -> Result<String, AuthError> {
        let now = Utc::now().timestamp();

        let claims = Claims {
            sub: user_id,
            email: email.to_string(),
            role,
            iat: now,
            exp: now + duration,
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| AuthError::TokenGenerationError(e.to_string()))
    }

    /// Validate an access token
    pub fn validate_access_token(&self, token: &str) -> Result<Claims, AuthError> {
        self.validate_token(token)
    }

    /// Validate a refresh token
    pub fn validate_refresh_token(&self, token: &str) -> Result<Claims, AuthError> {
        self.validate_token(token)
    }

    fn validate_token(&self, token: &str) -> Result<Claims, AuthError> {
        let validation = Validation::default();

        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &validation,
        )
        .map(|data| data.claims)
        .map_err(|e| {
            if e.to_string().contains("ExpiredSignature") {
                AuthError::ExpiredToken
            } else {
                AuthError::InvalidToken
            }
        })
    }

    /// Generate both access and refresh tokens
    pub fn generate_token_pair(
        &self,
        user_id: i32,
        email: &str,
        role: Role,
    ) -> Result<(String, String), AuthError> {
        let access_token = self.generate_access_token(user_id, email, role)?;
        let refresh_token = self.generate_refresh_token(user_id, email, role)?;
        Ok((access_token, refresh_token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn test_token_service() -> TokenService {
        TokenService::new("test_secret_key_for_testing_purposes".to_string())
    }

    #[test]
    fn test_access_token_expiration_is_15_minutes() {
        let service = test_token_service();
        let token = service
            .generate_access_token(1, "test@example.com", Role::User)
            .unwrap();
        let claims = service.validate_access_token(&token).unwrap();

        assert_eq!(claims.exp - claims.iat, 900);
    }

    #[test]
    fn test_refresh_token_expiration_is_7_days() {
        let service = test_token_service();
        let token = service
            .generate_refresh_token(1, "test@example.com", Role::User)
            .unwrap();
        let claims = service.validate_refresh_token(&token).unwrap();

        assert_eq!(claims.exp - claims.iat, 604800);
    }

    #[test]
    fn test_claims_carry_identity_and_role() {
        let service = test_token_service();
        let token = service
            .generate_access_token(42, "manager@example.com", Role::Manager)
            .unwrap();
        let claims = service.validate_access_token(&token).unwrap();

        assert_eq!(claims.sub, 42);
        assert_eq!(claims.email, "manager@example.com");
        assert_eq!(claims.role, Role::Manager);
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let service = test_token_service();

        let claims = Claims {
            sub: 1,
            email: "test@example.com".to_string(),
            role: Role::User,
            iat: Utc::now().timestamp() - 1000,
            exp: Utc::now().timestamp() - 500,
        };

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret("test_secret_key_for_testing_purposes".as_bytes()),
        )
        .unwrap();

        let result = service.validate_access_token(&token);
        assert!(matches!(result, Err(AuthError::ExpiredToken)));
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let service = test_token_service();
        let other = TokenService::new("a_completely_different_secret".to_string());

        let token = service
            .generate_access_token(1, "test@example.com", Role::User)
            .unwrap();
        assert!(matches!(
            other.validate_access_token(&token),
            Err(AuthError::InvalidToken)
        ));
    }

    proptest! {
        #[test]
        fn prop_valid_tokens_round_trip(
            user_id in 1i32..1000000,
            email in "[a-z]{3,10}@[a-z]{3,10}\\.(com|org|net)"
        ) {
            let service = test_token_service();
            let token = service.generate_access_token(user_id, &email, Role::User)?;
            let claims = service.validate_access_token(&token).unwrap();

            prop_assert_eq!(claims.sub, user_id);
            prop_assert_eq!(claims.email, email);
        }

        #[test]
        fn prop_malformed_tokens_rejected(malformed in "[a-zA-Z0-9]{10,50}") {
            let service = test_token_service();
            prop_assert!(service.validate_access_token(&malformed).is_err());
        }
    }
}
