use std::sync::Arc;

use axum::{extract::State, http::HeaderMap, Json};
use chrono::{Duration, Utc};
use tracing::info;
use uuid::Uuid;

use scheduling_cell::services::DoctorDirectory;
use shared_config::AppConfig;
use shared_models::auth::{JwtClaims, LoginRequest, LoginResponse, Role, TokenResponse};
use shared_models::error::AppError;
use shared_utils::extractor::bearer_token;
use shared_utils::jwt::{sign_token, validate_token};

const TOKEN_TTL_HOURS: i64 = 24;

#[derive(Clone)]
pub struct AuthState {
    pub config: Arc<AppConfig>,
    pub directory: Arc<DoctorDirectory>,
}

/// Demo-grade login: no password, the caller states who they are. Doctor
/// tokens are only issued for names the directory can resolve, and carry the
/// canonical directory name so downstream scoping has one spelling to match.
pub async fn login(
    State(state): State<AuthState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let email = request.email.trim();
    if email.is_empty() {
        return Err(AppError::ValidationError("email must not be empty".to_string()));
    }

    let doctor_name = match request.role {
        Role::Patient => None,
        Role::Doctor => {
            let requested = request
                .doctor_name
                .as_deref()
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .ok_or_else(|| {
                    AppError::ValidationError(
                        "doctor_name is required for doctor login".to_string(),
                    )
                })?;
            let doctor = state.directory.find(requested)?;
            Some(doctor.name)
        }
    };

    let now = Utc::now();
    let claims = JwtClaims {
        sub: Uuid::new_v4().to_string(),
        email: Some(email.to_string()),
        role: request.role,
        doctor_name: doctor_name.clone(),
        iat: Some(now.timestamp() as u64),
        exp: Some((now + Duration::hours(TOKEN_TTL_HOURS)).timestamp() as u64),
    };

    let token = sign_token(&claims, &state.config.jwt_secret).map_err(AppError::Internal)?;

    info!(
        "Issued {} token for {}{}",
        request.role,
        email,
        doctor_name
            .as_deref()
            .map(|n| format!(" ({})", n))
            .unwrap_or_default(),
    );

    Ok(Json(LoginResponse {
        token,
        role: request.role,
        doctor_name,
    }))
}

/// GET /auth/validate. Echoes back the identity a presented token carries.
pub async fn validate(
    State(state): State<AuthState>,
    headers: HeaderMap,
) -> Result<Json<TokenResponse>, AppError> {
    let token = bearer_token(&headers)
        .ok_or_else(|| AppError::Auth("Missing authorization header".to_string()))?;
    let user = validate_token(&token, &state.config.jwt_secret).map_err(AppError::Auth)?;

    Ok(Json(TokenResponse {
        valid: true,
        user_id: user.id,
        email: user.email,
        role: Some(user.role),
        doctor_name: user.doctor_name,
    }))
}
