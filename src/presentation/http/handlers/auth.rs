//! Authentication Handlers

use axum::{extract::State, http::StatusCode, Json};

use crate::application::dto::request::{
    GoogleSignInRequest, LoginRequest, RefreshTokenRequest, RegisterRequest,
};
use crate::application::dto::response::{AuthResponse, TokenResponse};
use crate::application::services::{AuthService, RegisterDto, UserDto};
use crate::presentation::http::extractors::ClientMeta;
use crate::presentation::middleware::AuthUser;
use crate::shared::error::AppError;
use crate::shared::validation::validate;
use crate::startup::AppState;

/// Register a new user
pub async fn register(
    State(state): State<AppState>,
    ClientMeta(client): ClientMeta,
    Json(body): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    validate(&body)?;

    let (user, tokens) = state
        .auth_service()
        .register(RegisterDto {
            username: body.username,
            email: body.email,
            password: body.password,
            display_name: body.display_name,
            captcha_token: body.captcha_token,
            client,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse::new(UserDto::from_user(user, true), tokens)),
    ))
}

/// Login with credentials
pub async fn login(
    State(state): State<AppState>,
    ClientMeta(client): ClientMeta,
    Json(body): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    validate(&body)?;

    let (user, tokens) = state
        .auth_service()
        .authenticate(&body.email, &body.password, client)
        .await?;

    Ok(Json(AuthResponse::new(UserDto::from_user(user, true), tokens)))
}

/// Sign in (or sign up) with a Google ID token
pub async fn google(
    State(state): State<AppState>,
    ClientMeta(client): ClientMeta,
    Json(body): Json<GoogleSignInRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    validate(&body)?;

    let (user, tokens) = state
        .auth_service()
        .google_sign_in(&body.id_token, client)
        .await?;

    Ok(Json(AuthResponse::new(UserDto::from_user(user, true), tokens)))
}

/// Rotate a refresh token
pub async fn refresh_token(
    State(state): State<AppState>,
    Json(body): Json<RefreshTokenRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    validate(&body)?;

    let tokens = state
        .auth_service()
        .refresh_token(&body.refresh_token)
        .await?;

    Ok(Json(TokenResponse::from(tokens)))
}

/// Logout (revoke refresh token). Always succeeds.
pub async fn logout(
    State(state): State<AppState>,
    Json(body): Json<RefreshTokenRequest>,
) -> StatusCode {
    if let Err(e) = state.auth_service().revoke_token(&body.refresh_token).await {
        tracing::warn!(error = %e, "Logout failed to revoke session");
    }
    StatusCode::NO_CONTENT
}

/// The account behind the access token
pub async fn me(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<UserDto>, AppError> {
    let user = state.auth_service().get_current_user(auth.user_id).await?;
    Ok(Json(UserDto::from_user(user, true)))
}
