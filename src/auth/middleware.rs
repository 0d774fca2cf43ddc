// Authentication extractors for protected and mixed routes

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts},
};

use crate::auth::error::AuthError;
use crate::auth::models::Role;
use crate::auth::token::TokenService;

/// Authenticated user extractor for protected routes
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: i32,
    pub email: String,
    pub role: Role,
}

impl AuthenticatedUser {
    /// Require an exact role
    pub fn ensure_role(&self, required: Role) -> Result<(), AuthError> {
        if self.role == required {
            Ok(())
        } else {
            Err(AuthError::InsufficientPermissions {
                required,
                actual: self.role,
            })
        }
    }

    /// Require a back-office role (manager or admin)
    pub fn ensure_staff(&self) -> Result<(), AuthError> {
        if self.role.is_staff() {
            Ok(())
        } else {
            Err(AuthError::InsufficientPermissions {
                required: Role::Manager,
                actual: self.role,
            })
        }
    }
}

/// Decode the bearer token from request parts into an authenticated user
///
/// Shared by the required extractor, the optional extractor, and the
/// audit RequestMeta enrichment.
pub fn authenticate_from_parts(parts: &Parts) -> Result<AuthenticatedUser, AuthError> {
    let auth_header = parts
        .headers
        .get(header::AUTHORIZATION)
        .ok_or(AuthError::MissingToken)?
        .to_str()
        .map_err(|_| AuthError::InvalidToken)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(AuthError::InvalidToken)?;

    let jwt_secret = std::env::var("JWT_SECRET")
        .map_err(|_| AuthError::ConfigError("JWT_SECRET not configured".to_string()))?;

    let token_service = TokenService::new(jwt_secret);
    let claims = token_service.validate_access_token(token)?;

    Ok(AuthenticatedUser {
        user_id: claims.sub,
        email: claims.email,
        role: claims.role,
    })
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        authenticate_from_parts(parts)
    }
}

/// Optional user extractor for routes that serve both guests and
/// authenticated customers (checkout, cart)
///
/// A missing header yields None; a present but invalid token also yields
/// None rather than rejecting the request, so a stale token cannot block
/// guest checkout.
#[derive(Debug, Clone)]
pub struct OptionalUser(pub Option<AuthenticatedUser>);

#[async_trait]
impl<S> FromRequestParts<S> for OptionalUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(OptionalUser(authenticate_from_parts(parts).ok()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts_with_auth(auth_value: &str) -> Parts {
        let req = Request::builder()
            .uri("/")
            .header(header::AUTHORIZATION, auth_value)
            .body(())
            .unwrap();
        let (parts, _) = req.into_parts();
        parts
    }

    fn parts_without_auth() -> Parts {
        let req = Request::builder().uri("/").body(()).unwrap();
        let (parts, _) = req.into_parts();
        parts
    }

    fn issue_token(user_id: i32, email: &str, role: Role) -> String {
        std::env::set_var("JWT_SECRET", "test_secret_key_for_testing_purposes");
        TokenService::new("test_secret_key_for_testing_purposes".to_string())
            .generate_access_token(user_id, email, role)
            .unwrap()
    }

    #[test]
    fn test_valid_token_is_accepted() {
        let token = issue_token(42, "test@example.com", Role::User);
        let parts = parts_with_auth(&format!("Bearer {}", token));

        let user = authenticate_from_parts(&parts).unwrap();
        assert_eq!(user.user_id, 42);
        assert_eq!(user.email, "test@example.com");
        assert_eq!(user.role, Role::User);
    }

    #[test]
    fn test_missing_header_is_rejected() {
        std::env::set_var("JWT_SECRET", "test_secret_key_for_testing_purposes");
        let parts = parts_without_auth();
        assert!(matches!(
            authenticate_from_parts(&parts),
            Err(AuthError::MissingToken)
        ));
    }

    #[test]
    fn test_non_bearer_header_is_rejected() {
        std::env::set_var("JWT_SECRET", "test_secret_key_for_testing_purposes");
        for value in ["Basic dXNlcjpwYXNz", "token_without_bearer"] {
            let parts = parts_with_auth(value);
            assert!(matches!(
                authenticate_from_parts(&parts),
                Err(AuthError::InvalidToken)
            ));
        }
    }

    #[test]
    fn test_malformed_token_is_rejected() {
        std::env::set_var("JWT_SECRET", "test_secret_key_for_testing_purposes");
        let parts = parts_with_auth("Bearer not.a.valid.jwt");
        assert!(authenticate_from_parts(&parts).is_err());
    }

    #[tokio::test]
    async fn test_optional_user_absent_for_guests() {
        std::env::set_var("JWT_SECRET", "test_secret_key_for_testing_purposes");
        let mut parts = parts_without_auth();
        let OptionalUser(user) = OptionalUser::from_request_parts(&mut parts, &())
            .await
            .unwrap();
        assert!(user.is_none());
    }

    #[tokio::test]
    async fn test_optional_user_present_when_authenticated() {
        let token = issue_token(7, "reader@example.com", Role::User);
        let mut parts = parts_with_auth(&format!("Bearer {}", token));
        let OptionalUser(user) = OptionalUser::from_request_parts(&mut parts, &())
            .await
            .unwrap();
        assert_eq!(user.unwrap().user_id, 7);
    }

    #[test]
    fn test_role_checks() {
        let manager = AuthenticatedUser {
            user_id: 1,
            email: "m@example.com".to_string(),
            role: Role::Manager,
        };
        assert!(manager.ensure_staff().is_ok());
        assert!(manager.ensure_role(Role::Manager).is_ok());
        assert!(matches!(
            manager.ensure_role(Role::Admin),
            Err(AuthError::InsufficientPermissions { .. })
        ));

        let customer = AuthenticatedUser {
            user_id: 2,
            email: "c@example.com".to_string(),
            role: Role::User,
        };
        assert!(customer.ensure_staff().is_err());
    }
}
