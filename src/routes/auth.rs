use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    auth::{SessionTokens, UserId},
    middleware::AuthGuard,
    response::{ApiResult, JsonApiResponse},
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    #[serde(default)]
    pub refresh_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LogoutRequest {
    #[serde(default)]
    pub refresh_token: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub expires_at: DateTime<Utc>,
    pub refresh_expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct LogoutResponse {
    pub logged_out: bool,
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub user_id: UserId,
    pub roles: Vec<String>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/login", post(login))
        .route("/refresh", post(refresh))
        .route("/logout", post(logout))
        .route("/me", get(me))
        .with_state(state)
}

async fn login(
    State(state): State<Arc<AppState>>,
    Json(body): Json<LoginRequest>,
) -> ApiResult<TokenResponse> {
    let tokens = state.sessions.login(&body.email, &body.password).await?;
    JsonApiResponse::ok(tokens.into())
}

async fn refresh(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RefreshRequest>,
) -> ApiResult<TokenResponse> {
    let presented = body.refresh_token.unwrap_or_default();
    let tokens = state.sessions.refresh(&presented).await?;
    JsonApiResponse::ok(tokens.into())
}

async fn logout(
    State(state): State<Arc<AppState>>,
    Json(body): Json<LogoutRequest>,
) -> ApiResult<LogoutResponse> {
    if let Some(token) = body.refresh_token.as_deref() {
        state.sessions.logout(token).await?;
    }
    JsonApiResponse::ok(LogoutResponse { logged_out: true })
}

async fn me(
    State(state): State<Arc<AppState>>,
    guard: AuthGuard,
) -> ApiResult<MeResponse> {
    let roles = state.resolver.role_names(guard.user_id).await?;
    JsonApiResponse::ok(MeResponse {
        user_id: guard.user_id,
        roles: roles.into_iter().collect(),
    })
}

impl From<SessionTokens> for TokenResponse {
    fn from(tokens: SessionTokens) -> Self {
        Self {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            token_type: tokens.token_type.to_string(),
            expires_in: tokens.expires_in,
            expires_at: tokens.expires_at,
            refresh_expires_at: tokens.refresh_expires_at,
        }
    }
}
