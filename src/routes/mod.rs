mod auth;
mod health;
mod roles;

use std::sync::Arc;

use axum::{Router, middleware};
use tower_http::trace::TraceLayer;

use crate::{
    middleware::{catch_panic_layer, json_error_middleware},
    state::AppState,
};

pub use auth::{LoginRequest, LogoutRequest, RefreshRequest, TokenResponse};

pub const API_PREFIX: &str = "/api/v1";

pub fn router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .nest("/auth", auth::router(state.clone()))
        .nest("/users", roles::router(state))
        .merge(health::router());

    Router::new().nest(API_PREFIX, api)
}

/// `router` with the JSON error envelope, panic capture and request tracing.
pub fn app(state: Arc<AppState>) -> Router {
    router(state)
        .layer(middleware::from_fn(json_error_middleware))
        .layer(catch_panic_layer())
        .layer(TraceLayer::new_for_http())
}
