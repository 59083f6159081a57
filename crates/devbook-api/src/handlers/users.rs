//! User API handlers
//!
//! Registration is public. Everything else runs behind the auth middleware
//! and receives the caller as `Extension<AuthenticatedUser>`.
//!
//! Author: hephaex@gmail.com

use crate::audit::{audit_log, extract_ip_address, extract_user_agent, AuditEvent};
use crate::auth::{AuthenticatedUser, PasswordError};
use crate::error::AppError;
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use devbook_core::{NewUser, User, UserChanges, UserId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

/// User registration request
#[derive(Deserialize, ToSchema, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 50))]
    pub name: String,
    #[validate(length(min = 1, max = 50))]
    pub nick: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

impl RegisterRequest {
    fn trimmed(self) -> Self {
        Self {
            name: self.name.trim().to_string(),
            nick: self.nick.trim().to_string(),
            email: self.email.trim().to_string(),
            password: self.password,
        }
    }
}

/// Profile update request
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct UpdateUserRequest {
    #[validate(length(min = 1, max = 50))]
    pub name: String,
    #[validate(length(min = 1, max = 50))]
    pub nick: String,
    #[validate(email)]
    pub email: String,
}

impl UpdateUserRequest {
    fn trimmed(self) -> Self {
        Self {
            name: self.name.trim().to_string(),
            nick: self.nick.trim().to_string(),
            email: self.email.trim().to_string(),
        }
    }
}

impl From<UpdateUserRequest> for UserChanges {
    fn from(request: UpdateUserRequest) -> Self {
        UserChanges {
            name: request.name,
            nick: request.nick,
            email: request.email,
        }
    }
}

/// Password change request
#[derive(Deserialize, ToSchema, Validate)]
pub struct UpdatePasswordRequest {
    /// Password currently stored
    pub current: String,
    #[validate(length(min = 1))]
    pub new: String,
}

/// Search query parameters
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SearchParams {
    /// Fragment of a name or nick, case-insensitive
    pub user: Option<String>,
}

/// Public view of a user
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    pub id: UserId,
    pub name: String,
    pub nick: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            nick: user.nick,
            email: user.email,
            created_at: user.created_at,
        }
    }
}

fn to_responses(users: Vec<User>) -> Vec<UserResponse> {
    users.into_iter().map(UserResponse::from).collect()
}

/// Parse the `{user_id}` path segment
///
/// Done by hand so a bad id gets the JSON error body instead of axum's
/// plain-text path rejection.
fn parse_user_id(raw: &str) -> Result<UserId, AppError> {
    raw.parse()
        .map_err(|_| AppError::BadRequest(format!("Invalid user id: {raw}")))
}

/// Register a new user
///
/// # Responses
///
/// * `201 Created` - User registered
/// * `400 Bad Request` - Invalid input, email or nick already registered
#[utoipa::path(
    post,
    path = "/api/v1/users",
    tag = "users",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User registered", body = UserResponse),
        (status = 400, description = "Invalid input", body = crate::error::ApiError),
        (status = 500, description = "Internal server error", body = crate::error::ApiError),
    )
)]
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    let ip_address = extract_ip_address(&headers);
    let user_agent = extract_user_agent(&headers);
    let request = request.trimmed();

    if let Err(e) = request.validate() {
        audit_log(&AuditEvent::RegistrationFailure {
            email: request.email,
            reason: "validation failed".to_string(),
            ip_address,
            user_agent,
        });
        return Err(e.into());
    }

    let RegisterRequest {
        name,
        nick,
        email,
        password,
    } = request;

    let password_hash = state.hash_password(password).await?;

    let created = state
        .users
        .create(NewUser {
            name,
            nick,
            email: email.clone(),
            password_hash,
        })
        .await;

    match created {
        Ok(user) => {
            audit_log(&AuditEvent::RegistrationSuccess {
                user_id: user.id,
                email: user.email.clone(),
                ip_address,
                user_agent,
            });
            Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
        }
        Err(e) => {
            audit_log(&AuditEvent::RegistrationFailure {
                email,
                reason: e.to_string(),
                ip_address,
                user_agent,
            });
            Err(e.into())
        }
    }
}

/// Search users by name or nick
#[utoipa::path(
    get,
    path = "/api/v1/users",
    tag = "users",
    params(SearchParams),
    responses(
        (status = 200, description = "Matching users", body = [UserResponse]),
        (status = 401, description = "Missing or invalid token", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn search_users(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<UserResponse>>, AppError> {
    let needle = params.user.unwrap_or_default().trim().to_lowercase();
    let users = state.users.search(&needle).await?;

    Ok(Json(to_responses(users)))
}

/// Get a user by id
#[utoipa::path(
    get,
    path = "/api/v1/users/{user_id}",
    tag = "users",
    params(("user_id" = u64, Path, description = "User id")),
    responses(
        (status = 200, description = "User found", body = UserResponse),
        (status = 400, description = "Invalid user id", body = crate::error::ApiError),
        (status = 401, description = "Missing or invalid token", body = crate::error::ApiError),
        (status = 404, description = "User not found", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<UserResponse>, AppError> {
    let user_id = parse_user_id(&user_id)?;
    let user = state.users.find_by_id(user_id).await?;

    Ok(Json(user.into()))
}

/// Update the caller's own profile
#[utoipa::path(
    put,
    path = "/api/v1/users/{user_id}",
    tag = "users",
    params(("user_id" = u64, Path, description = "User id")),
    request_body = UpdateUserRequest,
    responses(
        (status = 204, description = "Profile updated"),
        (status = 400, description = "Invalid input", body = crate::error::ApiError),
        (status = 401, description = "Missing or invalid token", body = crate::error::ApiError),
        (status = 403, description = "Not the caller's profile", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_user(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthenticatedUser>,
    Path(user_id): Path<String>,
    Json(request): Json<UpdateUserRequest>,
) -> Result<StatusCode, AppError> {
    let user_id = parse_user_id(&user_id)?;
    caller.ensure_owner(user_id, "update")?;

    let request = request.trimmed();
    request.validate()?;

    state.users.update(user_id, request.into()).await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Delete the caller's own account
#[utoipa::path(
    delete,
    path = "/api/v1/users/{user_id}",
    tag = "users",
    params(("user_id" = u64, Path, description = "User id")),
    responses(
        (status = 204, description = "Account deleted"),
        (status = 401, description = "Missing or invalid token", body = crate::error::ApiError),
        (status = 403, description = "Not the caller's account", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthenticatedUser>,
    Path(user_id): Path<String>,
) -> Result<StatusCode, AppError> {
    let user_id = parse_user_id(&user_id)?;
    caller.ensure_owner(user_id, "delete")?;

    state.users.delete(user_id).await?;

    audit_log(&AuditEvent::AccountDeleted {
        user_id,
        ip_address: caller.ip_address,
    });

    Ok(StatusCode::NO_CONTENT)
}

/// Follow a user
#[utoipa::path(
    post,
    path = "/api/v1/users/{user_id}/follow",
    tag = "followers",
    params(("user_id" = u64, Path, description = "User to follow")),
    responses(
        (status = 204, description = "Now following"),
        (status = 403, description = "Cannot follow yourself", body = crate::error::ApiError),
        (status = 404, description = "User not found", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn follow_user(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthenticatedUser>,
    Path(user_id): Path<String>,
) -> Result<StatusCode, AppError> {
    let user_id = parse_user_id(&user_id)?;
    if caller.owns(user_id) {
        return Err(AppError::Forbidden("Cannot follow yourself".to_string()));
    }

    state.users.follow(user_id, caller.user_id).await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Stop following a user
#[utoipa::path(
    post,
    path = "/api/v1/users/{user_id}/unfollow",
    tag = "followers",
    params(("user_id" = u64, Path, description = "User to unfollow")),
    responses(
        (status = 204, description = "No longer following"),
        (status = 403, description = "Cannot unfollow yourself", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn unfollow_user(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthenticatedUser>,
    Path(user_id): Path<String>,
) -> Result<StatusCode, AppError> {
    let user_id = parse_user_id(&user_id)?;
    if caller.owns(user_id) {
        return Err(AppError::Forbidden("Cannot unfollow yourself".to_string()));
    }

    state.users.unfollow(user_id, caller.user_id).await?;

    Ok(StatusCode::NO_CONTENT)
}

/// List the followers of a user
#[utoipa::path(
    get,
    path = "/api/v1/users/{user_id}/followers",
    tag = "followers",
    params(("user_id" = u64, Path, description = "User id")),
    responses(
        (status = 200, description = "Followers", body = [UserResponse]),
        (status = 404, description = "User not found", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_followers(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<UserResponse>>, AppError> {
    let user_id = parse_user_id(&user_id)?;
    let users = state.users.followers(user_id).await?;

    Ok(Json(to_responses(users)))
}

/// List the users a user follows
#[utoipa::path(
    get,
    path = "/api/v1/users/{user_id}/following",
    tag = "followers",
    params(("user_id" = u64, Path, description = "User id")),
    responses(
        (status = 200, description = "Followed users", body = [UserResponse]),
        (status = 404, description = "User not found", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_following(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<UserResponse>>, AppError> {
    let user_id = parse_user_id(&user_id)?;
    let users = state.users.following(user_id).await?;

    Ok(Json(to_responses(users)))
}

/// Change the caller's own password
///
/// The current password must be supplied and match.
#[utoipa::path(
    post,
    path = "/api/v1/users/{user_id}/update-password",
    tag = "users",
    params(("user_id" = u64, Path, description = "User id")),
    request_body = UpdatePasswordRequest,
    responses(
        (status = 204, description = "Password changed"),
        (status = 400, description = "Invalid input", body = crate::error::ApiError),
        (status = 401, description = "Current password is wrong", body = crate::error::ApiError),
        (status = 403, description = "Not the caller's account", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_password(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthenticatedUser>,
    Path(user_id): Path<String>,
    Json(request): Json<UpdatePasswordRequest>,
) -> Result<StatusCode, AppError> {
    let user_id = parse_user_id(&user_id)?;
    caller.ensure_owner(user_id, "change the password of")?;
    request.validate()?;

    let stored = state.users.password_hash(user_id).await?;
    match state.verify_password(request.current, stored).await {
        Ok(()) => {}
        Err(PasswordError::HashMismatch) => {
            return Err(AppError::Unauthorized(
                "Current password is incorrect".to_string(),
            ));
        }
        Err(e) => return Err(e.into()),
    }

    let new_hash = state.hash_password(request.new).await?;
    state.users.update_password(user_id, new_hash).await?;

    audit_log(&AuditEvent::PasswordChange {
        user_id,
        ip_address: caller.ip_address,
        user_agent: caller.user_agent,
    });

    Ok(StatusCode::NO_CONTENT)
}
