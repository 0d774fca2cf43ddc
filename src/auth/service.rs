// Authentication service - business logic layer

use chrono::{Duration, Utc};
use std::sync::Arc;

use crate::audit::models::{AuditAction, NewAuditEntry, RequestMeta};
use crate::audit::recorder::AuditSink;
use crate::audit::diff::diff_profile;
use crate::auth::{
    error::AuthError,
    models::{AuthResponse, UpdateProfileRequest, User, UserResponse},
    password::PasswordService,
    repository::{TokenRepository, UserRepository},
    token::TokenService,
};

/// Authentication service coordinating registration, login, token
/// rotation, and profile updates. Every mutating flow appends an audit
/// record, including failed login attempts (with no actor).
#[derive(Clone)]
pub struct AuthService {
    user_repo: UserRepository,
    token_repo: TokenRepository,
    token_service: TokenService,
    audit: Arc<dyn AuditSink>,
}

impl AuthService {
    /// Create a new AuthService
    pub fn new(
        user_repo: UserRepository,
        token_repo: TokenRepository,
        token_service: TokenService,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            user_repo,
            token_repo,
            token_service,
            audit,
        }
    }

    /// Register a new user
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        meta: &RequestMeta,
    ) -> Result<AuthResponse, AuthError> {
        PasswordService::validate_password_strength(password)?;

        let password_hash = PasswordService::hash_password(password)?;
        let user = self.user_repo.create_user(email, &password_hash).await?;

        tracing::info!("Registered new user {} ({})", user.id, user.email);

        self.record_audit(
            NewAuditEntry::new(AuditAction::Register)
                .actor(Some(user.id))
                .subject("User", user.id, &user.email)
                .describe(format!("New account registered: {}", user.email))
                .with_meta(meta),
        )
        .await?;

        self.issue_tokens(user).await
    }

    /// Login a user
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        meta: &RequestMeta,
    ) -> Result<AuthResponse, AuthError> {
        let user = match self.user_repo.find_by_email(email).await? {
            Some(user) if user.is_active => user,
            _ => {
                self.record_failed_login(email, meta).await?;
                return Err(AuthError::InvalidCredentials);
            }
        };

        if !PasswordService::verify_password(password, &user.password_hash)? {
            self.record_failed_login(email, meta).await?;
            return Err(AuthError::InvalidCredentials);
        }

        self.record_audit(
            NewAuditEntry::new(AuditAction::Login)
                .actor(Some(user.id))
                .subject("User", user.id, &user.email)
                .describe(format!("User logged in: {}", user.email))
                .with_meta(meta),
        )
        .await?;

        self.issue_tokens(user).await
    }

    /// Rotate a refresh token into a fresh token pair
    pub async fn refresh_tokens(&self, refresh_token: &str) -> Result<AuthResponse, AuthError> {
        self.token_service.validate_refresh_token(refresh_token)?;

        let stored = self
            .token_repo
            .find_valid_token(refresh_token)
            .await?
            .ok_or(AuthError::InvalidToken)?;

        let user = self
            .user_repo
            .find_by_id(stored.user_id)
            .await?
            .filter(|user| user.is_active)
            .ok_or(AuthError::InvalidToken)?;

        // Rotation: the presented token is spent either way
        self.token_repo.delete_token(refresh_token).await?;

        self.issue_tokens(user).await
    }

    /// Log out: revoke every refresh token the user holds
    pub async fn logout(&self, user_id: i32, meta: &RequestMeta) -> Result<(), AuthError> {
        self.token_repo.delete_all_for_user(user_id).await?;

        self.record_audit(
            NewAuditEntry::new(AuditAction::Logout)
                .actor(Some(user_id))
                .subject("User", user_id, format!("User #{}", user_id))
                .describe("User logged out")
                .with_meta(meta),
        )
        .await?;

        Ok(())
    }

    /// Get current user information
    pub async fn get_current_user(&self, user_id: i32) -> Result<UserResponse, AuthError> {
        let user = self
            .user_repo
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        Ok(user.into())
    }

    /// Update profile fields, auditing the field-level changes
    ///
    /// The birth date may be set once and never changed afterwards.
    pub async fn update_profile(
        &self,
        user_id: i32,
        request: UpdateProfileRequest,
        meta: &RequestMeta,
    ) -> Result<UserResponse, AuthError> {
        let old = self
            .user_repo
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        let birth_date = match (old.birth_date, request.birth_date) {
            (Some(existing), Some(requested)) if existing != requested => {
                return Err(AuthError::ValidationError(
                    "Birth date is already set and cannot be changed".to_string(),
                ));
            }
            (Some(existing), _) => Some(existing),
            (None, requested) => requested,
        };

        let updated = self
            .user_repo
            .update_profile(
                user_id,
                request.first_name,
                request.last_name,
                request.middle_name,
                request.phone,
                birth_date,
            )
            .await?;

        let changes = diff_profile(&old, &updated);
        if !changes.is_empty() {
            self.record_audit(
                NewAuditEntry::new(AuditAction::Update)
                    .actor(Some(user_id))
                    .subject("User", user_id, &updated.email)
                    .describe("Profile updated")
                    .with_changes(changes)
                    .with_meta(meta),
            )
            .await?;
        }

        Ok(updated.into())
    }

    async fn issue_tokens(&self, user: User) -> Result<AuthResponse, AuthError> {
        let (access_token, refresh_token) =
            self.token_service
                .generate_token_pair(user.id, &user.email, user.role)?;

        self.token_repo
            .store_refresh_token(user.id, &refresh_token, Utc::now() + Duration::seconds(604800))
            .await?;

        Ok(AuthResponse {
            access_token,
            refresh_token,
            user: user.into(),
        })
    }

    async fn record_failed_login(
        &self,
        email: &str,
        meta: &RequestMeta,
    ) -> Result<(), AuthError> {
        tracing::warn!("Failed login attempt for {}", email);
        self.record_audit(
            NewAuditEntry::new(AuditAction::Login)
                .describe(format!("Failed login attempt: {}", email))
                .with_meta(meta),
        )
        .await
    }

    async fn record_audit(&self, entry: NewAuditEntry) -> Result<(), AuthError> {
        self.audit
            .record(entry)
            .await
            .map_err(|e| AuthError::DatabaseError(e.to_string()))
    }
}
