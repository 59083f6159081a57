//! Authentication API handlers
//!
//! Provides the login endpoint that exchanges credentials for a session token.
//!
//! Author: hephaex@gmail.com

use crate::audit::{audit_log, extract_ip_address, extract_user_agent, AuditEvent};
use crate::error::AppError;
use crate::state::AppState;
use axum::{extract::State, http::HeaderMap, Json};
use devbook_core::{DevbookError, UserId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

const INVALID_CREDENTIALS: &str = "Invalid credentials";

/// Login request
#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Login response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LoginResponse {
    pub user_id: UserId,
    /// Session token for the `Authorization: Bearer` header
    pub token: String,
}

/// Authenticate with email and password
///
/// Unknown email and wrong password produce the same response after the
/// same bcrypt work.
///
/// # Responses
///
/// * `200 OK` - Session token issued
/// * `401 Unauthorized` - Invalid credentials
#[utoipa::path(
    post,
    path = "/api/v1/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = LoginResponse),
        (status = 401, description = "Invalid credentials", body = crate::error::ApiError),
        (status = 500, description = "Internal server error", body = crate::error::ApiError),
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let ip_address = extract_ip_address(&headers);
    let user_agent = extract_user_agent(&headers);
    let email = request.email.trim().to_string();

    let user = match state.users.find_by_email(&email).await {
        Ok(user) => user,
        Err(DevbookError::NotFound(_)) => {
            state.verify_unknown_user(request.password).await;
            audit_log(&AuditEvent::LoginFailure {
                email,
                reason: "unknown email".to_string(),
                ip_address,
                user_agent,
            });
            return Err(AppError::Unauthorized(INVALID_CREDENTIALS.to_string()));
        }
        Err(e) => return Err(e.into()),
    };

    if let Err(e) = state
        .verify_password(request.password, user.password_hash.clone())
        .await
    {
        audit_log(&AuditEvent::LoginFailure {
            email,
            reason: e.to_string(),
            ip_address,
            user_agent,
        });
        return Err(e.into());
    }

    let token = state.tokens.create(user.id)?;

    audit_log(&AuditEvent::LoginSuccess {
        user_id: user.id,
        email: user.email,
        ip_address,
        user_agent,
    });

    Ok(Json(LoginResponse {
        user_id: user.id,
        token,
    }))
}
