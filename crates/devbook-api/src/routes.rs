//! API route definitions
//!
//! Author: hephaex@gmail.com

use crate::auth::middleware::auth_middleware;
use crate::handlers::{auth, users};
use crate::state::AppState;
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

/// Create API v1 routes
pub fn api_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    let require_auth = middleware::from_fn_with_state(state, auth_middleware);

    // `/users` mixes a protected GET with public registration. One method
    // router keeps unsupported methods at 405; the layer covers only GET.
    let users_root = get(users::search_users)
        .route_layer(require_auth.clone())
        .post(users::create_user);

    // Public routes (no authentication required)
    let public_routes = Router::new()
        .route("/users", users_root)
        .route("/login", post(auth::login_handler));

    // Protected routes (authentication required)
    let protected_routes = Router::new()
        .route(
            "/users/:user_id",
            get(users::get_user)
                .put(users::update_user)
                .delete(users::delete_user),
        )
        .route("/users/:user_id/update-password", post(users::update_password))
        // Follower endpoints
        .route("/users/:user_id/follow", post(users::follow_user))
        .route("/users/:user_id/unfollow", post(users::unfollow_user))
        .route("/users/:user_id/followers", get(users::list_followers))
        .route("/users/:user_id/following", get(users::list_following))
        .route_layer(require_auth);

    Router::new().merge(public_routes).merge(protected_routes)
}
