// Authentication data models and DTOs

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// User role for authorization decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Manager,
    Admin,
}

impl Role {
    /// Convert role to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Manager => "manager",
            Role::Admin => "admin",
        }
    }

    /// Managers and admins form the back-office staff
    pub fn is_staff(&self) -> bool {
        matches!(self, Role::Manager | Role::Admin)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// User database model
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i32,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub middle_name: Option<String>,
    pub phone: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Full name assembled from the name parts, falling back to email
    pub fn full_name(&self) -> String {
        let parts: Vec<&str> = [
            self.last_name.as_deref(),
            self.first_name.as_deref(),
            self.middle_name.as_deref(),
        ]
        .into_iter()
        .flatten()
        .collect();

        if parts.is_empty() {
            self.email.clone()
        } else {
            parts.join(" ")
        }
    }
}

/// User response model (excludes password_hash)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: i32,
    pub email: String,
    pub role: Role,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub middle_name: Option<String>,
    pub phone: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            role: user.role,
            first_name: user.first_name,
            last_name: user.last_name,
            middle_name: user.middle_name,
            phone: user.phone,
            birth_date: user.birth_date,
            created_at: user.created_at,
        }
    }
}

/// Refresh token database model
#[derive(Debug, Clone, FromRow)]
pub struct RefreshToken {
    pub id: i32,
    pub user_id: i32,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Registration request DTO
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8))]
    pub password: String,
}

/// Login request DTO
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,
    pub password: String,
}

/// Token refresh request DTO
#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Authentication response DTO
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub user: UserResponse,
}

/// Profile update request DTO
///
/// The birth date can be set only once; the service rejects changes to an
/// already-stored date.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(length(max = 100))]
    pub first_name: Option<String>,
    #[validate(length(max = 100))]
    pub last_name: Option<String>,
    #[validate(length(max = 100))]
    pub middle_name: Option<String>,
    #[validate(custom = "crate::validation::validate_phone")]
    pub phone: Option<String>,
    pub birth_date: Option<NaiveDate>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bare_user() -> User {
        User {
            id: 1,
            email: "reader@example.com".to_string(),
            password_hash: "hash".to_string(),
            role: Role::User,
            first_name: None,
            last_name: None,
            middle_name: None,
            phone: None,
            birth_date: None,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_full_name_assembly() {
        let mut user = bare_user();
        user.last_name = Some("Ivanova".to_string());
        user.first_name = Some("Anna".to_string());
        assert_eq!(user.full_name(), "Ivanova Anna");

        user.middle_name = Some("Petrovna".to_string());
        assert_eq!(user.full_name(), "Ivanova Anna Petrovna");
    }

    #[test]
    fn test_full_name_falls_back_to_email() {
        assert_eq!(bare_user().full_name(), "reader@example.com");
    }

    #[test]
    fn test_staff_roles() {
        assert!(!Role::User.is_staff());
        assert!(Role::Manager.is_staff());
        assert!(Role::Admin.is_staff());
    }

    #[test]
    fn test_user_response_hides_password_hash() {
        let response = UserResponse::from(bare_user());
        let json = serde_json::to_string(&response).expect("serializes");
        assert!(!json.contains("password"));
        assert!(json.contains("reader@example.com"));
    }

    #[test]
    fn test_register_request_validation() {
        let ok = RegisterRequest {
            email: "new@example.com".to_string(),
            password: "long enough".to_string(),
        };
        assert!(ok.validate().is_ok());

        let bad_email = RegisterRequest {
            email: "not-an-email".to_string(),
            password: "long enough".to_string(),
        };
        assert!(bad_email.validate().is_err());

        let short_password = RegisterRequest {
            email: "new@example.com".to_string(),
            password: "short".to_string(),
        };
        assert!(short_password.validate().is_err());
    }
}
