use std::sync::Arc;

use axum::{
    Router,
    extract::{Path, State},
    routing::{get, put},
};
use serde::Serialize;

use crate::{
    auth::{RoleId, RoleRecord, UserId, UserRoleRecord},
    middleware::{AdminOnly, AuthRoleGuard},
    response::{ApiResult, JsonApiResponse},
    state::AppState,
};

#[derive(Debug, Serialize)]
pub struct AssignmentResponse {
    pub assignment: UserRoleRecord,
    pub created: bool,
}

#[derive(Debug, Serialize)]
pub struct RemovalResponse {
    pub removed: bool,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/{user_id}/roles", get(list_roles))
        .route(
            "/{user_id}/roles/{role_id}",
            put(assign_role).delete(remove_role),
        )
        .with_state(state)
}

async fn list_roles(
    State(state): State<Arc<AppState>>,
    _admin: AuthRoleGuard<AdminOnly>,
    Path(user_id): Path<UserId>,
) -> ApiResult<Vec<RoleRecord>> {
    JsonApiResponse::ok(state.resolver.roles_of(user_id).await?)
}

async fn assign_role(
    State(state): State<Arc<AppState>>,
    admin: AuthRoleGuard<AdminOnly>,
    Path((user_id, role_id)): Path<(UserId, RoleId)>,
) -> ApiResult<AssignmentResponse> {
    let assignment = state.resolver.assign_role(user_id, role_id).await?;
    tracing::info!(admin_id = admin.user_id, user_id, role_id, "role grant requested");
    let created = assignment.is_created();
    JsonApiResponse::ok(AssignmentResponse {
        assignment: assignment.record().clone(),
        created,
    })
}

async fn remove_role(
    State(state): State<Arc<AppState>>,
    admin: AuthRoleGuard<AdminOnly>,
    Path((user_id, role_id)): Path<(UserId, RoleId)>,
) -> ApiResult<RemovalResponse> {
    let removed = state.resolver.remove_role(user_id, role_id).await?;
    tracing::info!(admin_id = admin.user_id, user_id, role_id, removed, "role revoke requested");
    JsonApiResponse::ok(RemovalResponse { removed })
}
