//! Authentication Middleware
//!
//! JWT validation for protected routes and the admin guard for `/admin`.

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{authorization::Bearer, Authorization, HeaderMapExt};

use crate::application::services::{decode_access_token, AuthError};
use crate::domain::UserRole;
use crate::shared::error::AppError;
use crate::startup::AppState;

/// Authenticated caller, inserted into request extensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: i64,
    pub role: UserRole,
}

fn bearer_token(request: &Request) -> Result<String, AppError> {
    if !request.headers().contains_key(AUTHORIZATION) {
        return Err(AppError::Unauthorized("Missing authorization header".into()));
    }

    let Authorization(bearer) = request
        .headers()
        .typed_get::<Authorization<Bearer>>()
        .ok_or_else(|| AppError::Unauthorized("Invalid authorization header format".into()))?;

    Ok(bearer.token().to_string())
}

/// Resolve the caller from a bearer access token.
pub fn authenticate(secret: &str, token: &str) -> Result<AuthUser, AppError> {
    let claims = decode_access_token(secret, token).map_err(AppError::from)?;
    let user_id = claims
        .user_id()
        .map_err(|_| AppError::from(AuthError::InvalidToken))?;

    Ok(AuthUser {
        user_id,
        role: claims.role,
    })
}

/// Rejects requests without a valid access token.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let user = authenticate(&state.settings.jwt.secret, &bearer_token(&request)?)?;
    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

/// Requires the admin role. Must run after `auth_middleware`.
pub async fn require_admin(request: Request, next: Next) -> Result<Response, AppError> {
    match request.extensions().get::<AuthUser>() {
        Some(user) if user.role.is_admin() => Ok(next.run(request).await),
        Some(_) => Err(AppError::Forbidden("Admin access required".into())),
        None => Err(AppError::Unauthorized("Missing authorization header".into())),
    }
}
