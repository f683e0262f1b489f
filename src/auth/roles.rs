use std::{collections::BTreeSet, future::Future, sync::Arc, time::Duration as StdDuration};

use super::{
    AuthError, RoleAssignment, RoleId, RoleRecord, UserId,
    deadline::bounded,
    store::{RoleStore, UserDirectory},
};

pub const ADMIN_ROLE: &str = "admin";

/// Resolves role grants straight from the role store on every call.
#[derive(Clone)]
pub struct AuthorizationResolver {
    roles: Arc<dyn RoleStore>,
    users: Arc<dyn UserDirectory>,
    call_timeout: Option<StdDuration>,
}

impl AuthorizationResolver {
    pub fn new(roles: Arc<dyn RoleStore>, users: Arc<dyn UserDirectory>) -> Self {
        Self {
            roles,
            users,
            call_timeout: None,
        }
    }

    /// Bounds every store call; a stalled store fails with `DeadlineExceeded`.
    pub fn with_call_timeout(mut self, call_timeout: Option<StdDuration>) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    pub async fn roles_of(&self, user_id: UserId) -> Result<Vec<RoleRecord>, AuthError> {
        self.call(self.roles.roles_of(user_id)).await
    }

    pub async fn role_names(&self, user_id: UserId) -> Result<BTreeSet<String>, AuthError> {
        Ok(self
            .roles_of(user_id)
            .await?
            .into_iter()
            .map(|role| role.name.to_ascii_lowercase())
            .collect())
    }

    pub async fn has_any(&self, user_id: UserId, required: &[&str]) -> Result<bool, AuthError> {
        if required.is_empty() {
            return Ok(false);
        }
        let held = self.role_names(user_id).await?;
        Ok(required
            .iter()
            .any(|name| held.contains(&name.to_ascii_lowercase())))
    }

    pub async fn has_all(&self, user_id: UserId, required: &[&str]) -> Result<bool, AuthError> {
        if required.is_empty() {
            return Ok(true);
        }
        let held = self.role_names(user_id).await?;
        Ok(required
            .iter()
            .all(|name| held.contains(&name.to_ascii_lowercase())))
    }

    /// Grants `role_id` to `user_id`; re-granting returns the existing
    /// record as `RoleAssignment::AlreadyAssigned`.
    pub async fn assign_role(
        &self,
        user_id: UserId,
        role_id: RoleId,
    ) -> Result<RoleAssignment, AuthError> {
        if self.call(self.users.find_by_id(user_id)).await?.is_none() {
            return Err(AuthError::NotFound {
                entity: "user",
                id: user_id,
            });
        }
        if self.call(self.roles.find_role(role_id)).await?.is_none() {
            return Err(AuthError::NotFound {
                entity: "role",
                id: role_id,
            });
        }

        let assignment = self.call(self.roles.assign(user_id, role_id)).await?;
        match &assignment {
            RoleAssignment::Created(_) => {
                tracing::info!(user_id, role_id, "role assigned");
            }
            RoleAssignment::AlreadyAssigned(_) => {
                tracing::debug!(user_id, role_id, "role already assigned");
            }
        }
        Ok(assignment)
    }

    /// Returns `false` when nothing was assigned; that is not an error.
    pub async fn remove_role(&self, user_id: UserId, role_id: RoleId) -> Result<bool, AuthError> {
        let removed = self.call(self.roles.remove(user_id, role_id)).await?;
        if removed {
            tracing::info!(user_id, role_id, "role removed");
        }
        Ok(removed)
    }

    async fn call<T, E, F>(&self, call: F) -> Result<T, AuthError>
    where
        F: Future<Output = Result<T, E>>,
        AuthError: From<E>,
    {
        bounded(self.call_timeout, call).await
    }
}
