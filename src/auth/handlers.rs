// HTTP handlers for authentication and profile endpoints

use axum::{extract::State, http::StatusCode, Json};
use validator::Validate;

use crate::audit::models::RequestMeta;
use crate::auth::error::AuthError;
use crate::auth::middleware::AuthenticatedUser;
use crate::auth::models::{
    AuthResponse, LoginRequest, RefreshRequest, RegisterRequest, UpdateProfileRequest,
    UserResponse,
};

/// Handler for POST /api/auth/register
pub async fn register_handler(
    State(state): State<crate::AppState>,
    meta: RequestMeta,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), AuthError> {
    request
        .validate()
        .map_err(|e| AuthError::ValidationError(e.to_string()))?;

    let response = state
        .auth
        .register(&request.email, &request.password, &meta)
        .await?;

    Ok((StatusCode::CREATED, Json(response)))
}

/// Handler for POST /api/auth/login
pub async fn login_handler(
    State(state): State<crate::AppState>,
    meta: RequestMeta,
    Json(request): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, AuthError> {
    request
        .validate()
        .map_err(|e| AuthError::ValidationError(e.to_string()))?;

    let response = state
        .auth
        .login(&request.email, &request.password, &meta)
        .await?;

    Ok(Json(response))
}

/// Handler for POST /api/auth/refresh
pub async fn refresh_handler(
    State(state): State<crate::AppState>,
    Json(request): Json<RefreshRequest>,
) -> Result<Json<AuthResponse>, AuthError> {
    let response = state.auth.refresh_tokens(&request.refresh_token).await?;
    Ok(Json(response))
}

/// Handler for POST /api/auth/logout
pub async fn logout_handler(
    State(state): State<crate::AppState>,
    user: AuthenticatedUser,
    meta: RequestMeta,
) -> Result<StatusCode, AuthError> {
    state.auth.logout(user.user_id, &meta).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Handler for GET /api/auth/me
pub async fn me_handler(
    State(state): State<crate::AppState>,
    user: AuthenticatedUser,
) -> Result<Json<UserResponse>, AuthError> {
    let response = state.auth.get_current_user(user.user_id).await?;
    Ok(Json(response))
}

/// Handler for PUT /api/auth/profile
pub async fn update_profile_handler(
    State(state): State<crate::AppState>,
    user: AuthenticatedUser,
    meta: RequestMeta,
    Json(request): Json<UpdateProfileRequest>,
) -> Result<Json<UserResponse>, AuthError> {
    request
        .validate()
        .map_err(|e| AuthError::ValidationError(e.to_string()))?;

    let response = state
        .auth
        .update_profile(user.user_id, request, &meta)
        .await?;

    Ok(Json(response))
}
