//! OpenAPI document served next to Swagger UI
//!
//! Author: hephaex@gmail.com

use crate::error::ApiError;
use crate::handlers::{auth, health, users};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "DevBook API",
        description = "User accounts, follower graph and bearer-token sessions"
    ),
    paths(
        health::health_check,
        health::readiness_check,
        auth::login_handler,
        users::create_user,
        users::search_users,
        users::get_user,
        users::update_user,
        users::delete_user,
        users::update_password,
        users::follow_user,
        users::unfollow_user,
        users::list_followers,
        users::list_following,
    ),
    components(schemas(
        ApiError,
        health::HealthResponse,
        health::ReadinessResponse,
        auth::LoginRequest,
        auth::LoginResponse,
        users::RegisterRequest,
        users::UpdateUserRequest,
        users::UpdatePasswordRequest,
        users::UserResponse,
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "health", description = "Liveness and readiness checks"),
        (name = "auth", description = "Session tokens"),
        (name = "users", description = "User accounts"),
        (name = "followers", description = "Follower graph"),
    )
)]
pub struct ApiDoc;

/// Registers the `bearer_auth` scheme referenced by protected paths
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}
