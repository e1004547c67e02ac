use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request},
    middleware::Next,
    response::Response,
};

use shared_config::AppConfig;
use shared_models::auth::AuthUser;
use shared_models::error::AppError;

use crate::jwt::validate_token;

/// Pull a bearer token out of `Authorization` or the legacy `X-AUTH` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    if let Some(value) = headers.get("Authorization").and_then(|v| v.to_str().ok()) {
        if let Some(token) = value.strip_prefix("Bearer ") {
            return Some(token.to_string());
        }
    }
    headers
        .get("X-AUTH")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Resolve the caller from request headers, if any credentials are present.
/// Invalid credentials are an error; absent credentials are `Ok(None)`.
pub fn maybe_user(headers: &HeaderMap, config: &AppConfig) -> Result<Option<AuthUser>, AppError> {
    match bearer_token(headers) {
        Some(token) => validate_token(&token, &config.jwt_secret)
            .map(Some)
            .map_err(AppError::Auth),
        None => Ok(None),
    }
}

// Middleware for routes that require authentication
pub async fn auth_middleware(
    State(config): State<Arc<AppConfig>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(request.headers())
        .ok_or_else(|| AppError::Auth("Missing authorization header".to_string()))?;

    let user = validate_token(&token, &config.jwt_secret).map_err(AppError::Auth)?;

    // Add user to request extensions
    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}

// Function to extract user from request extensions
pub fn extract_user<B>(request: &Request<B>) -> Result<AuthUser, AppError> {
    request
        .extensions()
        .get::<AuthUser>()
        .cloned()
        .ok_or_else(|| AppError::Auth("User not found in request extensions".to_string()))
}
