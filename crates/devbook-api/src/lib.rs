//! DevBook API - REST server
//!
//! User accounts, follower graph and bearer-token sessions over HTTP.
//!
//! Author: hephaex@gmail.com

pub mod audit;
pub mod auth;
pub mod error;
pub mod handlers;
pub mod openapi;
pub mod routes;
pub mod state;

use axum::{
    http::{header, HeaderValue, Method},
    routing::get,
    Router,
};
use openapi::ApiDoc;
use state::AppState;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Build the full application router
pub fn create_router(state: Arc<AppState>) -> Router {
    let timeout = Duration::from_secs(state.config.server.request_timeout_secs);
    let cors = cors_layer(&state.config.server.cors_origins);

    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/ready", get(handlers::health::readiness_check))
        .nest("/api/v1", routes::api_routes(state.clone()))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(TimeoutLayer::new(timeout))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Resolves once `signal` fires, after flagging the state not ready
///
/// Meant for `with_graceful_shutdown`: `/ready` answers 503 while in-flight
/// requests drain.
pub async fn drain_on(state: Arc<AppState>, signal: impl Future<Output = ()>) {
    signal.await;
    state.set_ready(false);
    tracing::info!("Shutdown requested, draining connections");
}

/// Router over [`AppState::for_testing`]
#[cfg(any(test, feature = "test-utils"))]
pub fn create_router_for_testing() -> Router {
    create_router(Arc::new(AppState::for_testing()))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn test_drain_flips_readiness_on_signal() {
        let state = Arc::new(AppState::for_testing());
        let (tx, rx) = oneshot::channel::<()>();

        let drain = tokio::spawn(drain_on(state.clone(), async move {
            let _ = rx.await;
        }));
        tokio::task::yield_now().await;
        assert!(state.is_ready());

        tx.send(()).unwrap();
        drain.await.unwrap();
        assert!(!state.is_ready());
    }
}
