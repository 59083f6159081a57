//! Authentication middleware for protecting routes
//!
//! Validates the session token from the Authorization header and, on success,
//! adds the authenticated user to request extensions. Handlers then use
//! [`AuthenticatedUser::ensure_owner`] before mutating a user's resources.

use super::jwt::TokenError;
use crate::audit::{audit_log, extract_ip_address, extract_user_agent, AuditEvent};
use crate::error::{ApiError, AppError};
use crate::state::AppState;
use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use devbook_core::UserId;
use std::sync::Arc;
use thiserror::Error;

/// Authenticated user information extracted from the session token
///
/// This is added to request extensions by the auth middleware
/// and can be extracted in handlers using `Extension<AuthenticatedUser>`.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    /// Subject of the token
    pub user_id: UserId,
    /// Client address, for audit records
    pub ip_address: Option<String>,
    /// Client user agent, for audit records
    pub user_agent: Option<String>,
}

impl AuthenticatedUser {
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            ip_address: None,
            user_agent: None,
        }
    }

    /// Whether the resource owned by `owner_id` belongs to this user
    pub fn owns(&self, owner_id: UserId) -> bool {
        self.user_id == owner_id
    }

    /// Refuse to `action` a user other than the caller
    ///
    /// Denials are written to the audit log.
    pub fn ensure_owner(&self, owner_id: UserId, action: &str) -> Result<(), AuthError> {
        if self.owns(owner_id) {
            return Ok(());
        }

        audit_log(&AuditEvent::AccessDenied {
            user_id: Some(self.user_id),
            resource: format!("user:{owner_id}"),
            ip_address: self.ip_address.clone(),
            user_agent: self.user_agent.clone(),
        });

        Err(AuthError::NotOwner(format!(
            "Cannot {action} a user other than yourself"
        )))
    }
}

/// Authentication middleware errors
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid token: {0}")]
    InvalidToken(#[from] TokenError),

    #[error("{0}")]
    NotOwner(String),
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::InvalidToken(_) => StatusCode::UNAUTHORIZED,
            AuthError::NotOwner(_) => StatusCode::FORBIDDEN,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            AuthError::InvalidToken(e) => ApiError::unauthorized(e.to_string()),
            AuthError::NotOwner(msg) => ApiError::forbidden(msg),
        };

        (status, Json(body)).into_response()
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidToken(e) => AppError::from(e),
            AuthError::NotOwner(msg) => AppError::Forbidden(msg),
        }
    }
}

/// Authentication middleware that requires a valid session token
///
/// This middleware:
/// 1. Takes the raw token from `Authorization: <scheme> <token>`
/// 2. Validates signature, algorithm and expiry
/// 3. Reads the subject id
/// 4. Adds `AuthenticatedUser` to request extensions
///
/// # Usage
///
/// ```ignore
/// use axum::{Router, routing::get, middleware};
/// use devbook_api::auth::middleware::auth_middleware;
///
/// let app = Router::new()
///     .route("/protected", get(protected_handler))
///     .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware));
/// ```
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    // Extract context for audit logging
    let ip_address = extract_ip_address(request.headers());
    let user_agent = extract_user_agent(request.headers());

    let user_id = match state.tokens.extract_subject_id(request.headers()) {
        Ok(id) => id,
        Err(e) => {
            audit_log(&AuditEvent::InvalidToken {
                ip_address,
                user_agent,
                reason: e.to_string(),
            });
            return Err(AuthError::InvalidToken(e));
        }
    };

    request.extensions_mut().insert(AuthenticatedUser {
        user_id,
        ip_address,
        user_agent,
    });

    Ok(next.run(request).await)
}
