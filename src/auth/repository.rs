// Database repositories for users and refresh tokens

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use sqlx::PgPool;

use crate::auth::error::AuthError;
use crate::auth::models::{RefreshToken, User};

const USER_COLUMNS: &str = "id, email, password_hash, role, first_name, last_name, \
                            middle_name, phone, birth_date, is_active, created_at, updated_at";

/// User repository for database operations
#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    /// Create a new UserRepository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a new user with the default customer role
    pub async fn create_user(&self, email: &str, password_hash: &str) -> Result<User, AuthError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (email, password_hash) VALUES ($1, $2) RETURNING {}",
            USER_COLUMNS
        ))
        .bind(email)
        .bind(password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.is_unique_violation() {
                    return AuthError::EmailAlreadyExists;
                }
            }
            AuthError::DatabaseError(e.to_string())
        })?;

        Ok(user)
    }

    /// Find a user by email (case-insensitive)
    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, AuthError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE LOWER(email) = LOWER($1)",
            USER_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AuthError::DatabaseError(e.to_string()))?;

        Ok(user)
    }

    /// Find a user by ID
    pub async fn find_by_id(&self, id: i32) -> Result<Option<User>, AuthError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE id = $1",
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AuthError::DatabaseError(e.to_string()))?;

        Ok(user)
    }

    /// Update the profile fields of a user
    pub async fn update_profile(
        &self,
        id: i32,
        first_name: Option<String>,
        last_name: Option<String>,
        middle_name: Option<String>,
        phone: Option<String>,
        birth_date: Option<chrono::NaiveDate>,
    ) -> Result<User, AuthError> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET first_name = $1,
                last_name = $2,
                middle_name = $3,
                phone = $4,
                birth_date = $5,
                updated_at = NOW()
            WHERE id = $6
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(first_name)
        .bind(last_name)
        .bind(middle_name)
        .bind(phone)
        .bind(birth_date)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AuthError::DatabaseError(e.to_string()))?
        .ok_or(AuthError::UserNotFound)?;

        Ok(user)
    }
}

/// Token repository for refresh token operations
///
/// Refresh tokens are stored as SHA-256 digests; the raw token never
/// touches the database.
#[derive(Clone)]
pub struct TokenRepository {
    pool: PgPool,
}

impl TokenRepository {
    /// Create a new TokenRepository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Hash a token using SHA-256
    fn hash_token(token: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(token.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Store a refresh token (hashed)
    pub async fn store_refresh_token(
        &self,
        user_id: i32,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AuthError> {
        sqlx::query(
            "INSERT INTO refresh_tokens (user_id, token_hash, expires_at) VALUES ($1, $2, $3)",
        )
        .bind(user_id)
        .bind(Self::hash_token(token))
        .bind(expires_at)
        .execute(&self.pool)
        .await
        .map_err(|e| AuthError::DatabaseError(e.to_string()))?;

        Ok(())
    }

    /// Find a stored, unexpired refresh token by its raw value
    pub async fn find_valid_token(&self, token: &str) -> Result<Option<RefreshToken>, AuthError> {
        let stored = sqlx::query_as::<_, RefreshToken>(
            r#"
            SELECT id, user_id, token_hash, expires_at, created_at
            FROM refresh_tokens
            WHERE token_hash = $1 AND expires_at > NOW()
            "#,
        )
        .bind(Self::hash_token(token))
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AuthError::DatabaseError(e.to_string()))?;

        Ok(stored)
    }

    /// Delete one stored refresh token (rotation)
    pub async fn delete_token(&self, token: &str) -> Result<(), AuthError> {
        sqlx::query("DELETE FROM refresh_tokens WHERE token_hash = $1")
            .bind(Self::hash_token(token))
            .execute(&self.pool)
            .await
            .map_err(|e| AuthError::DatabaseError(e.to_string()))?;

        Ok(())
    }

    /// Delete all refresh tokens for a user (logout everywhere)
    pub async fn delete_all_for_user(&self, user_id: i32) -> Result<(), AuthError> {
        sqlx::query("DELETE FROM refresh_tokens WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| AuthError::DatabaseError(e.to_string()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_hash_is_stable_hex_sha256() {
        let first = TokenRepository::hash_token("some-refresh-token");
        let second = TokenRepository::hash_token("some-refresh-token");
        assert_eq!(first, second);
        assert_eq!(first.len(), 64);
        assert!(first.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_different_tokens_hash_differently() {
        assert_ne!(
            TokenRepository::hash_token("token-a"),
            TokenRepository::hash_token("token-b")
        );
    }
}
