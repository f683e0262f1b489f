//! Persistence capabilities the auth core consumes.
//!
//! Each trait is a narrow contract over rows owned by one user or one token
//! value. `crate::db::dao` backs them with SQL, `crate::auth::memory` with
//! process-local maps.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{
    RefreshTokenRecord, RoleAssignment, RoleId, RoleRecord, StoreError, UserId, UserRecord,
};

pub type StoreResult<T> = Result<T, StoreError>;

/// Read-only view of users. Soft-deleted users are reported as absent.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Case-insensitive match on the email address.
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<UserRecord>>;
    async fn find_by_id(&self, id: UserId) -> StoreResult<Option<UserRecord>>;
}

#[async_trait]
pub trait RefreshTokenStore: Send + Sync {
    async fn find_by_token(&self, token: &str) -> StoreResult<Option<RefreshTokenRecord>>;
    async fn find_by_user_id(&self, user_id: UserId) -> StoreResult<Option<RefreshTokenRecord>>;

    /// Inserts a new row; `StoreError::Conflict` when the token value or the
    /// user already has a row.
    async fn create(
        &self,
        user_id: UserId,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<RefreshTokenRecord>;

    /// Upsert keyed on the user: afterwards the user owns exactly one row,
    /// holding `token`.
    async fn replace(
        &self,
        user_id: UserId,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<RefreshTokenRecord>;

    /// Atomically swaps `current` for `next` if a row still holds `current`
    /// and has not expired at `now`. Returns `None` when the swap did not
    /// happen, which includes losing a race against another rotation.
    async fn rotate(
        &self,
        current: &str,
        next: &str,
        next_expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<RefreshTokenRecord>>;

    async fn delete_by_token(&self, token: &str) -> StoreResult<()>;
    async fn delete_by_user_id(&self, user_id: UserId) -> StoreResult<()>;
    async fn delete_expired(&self, now: DateTime<Utc>) -> StoreResult<u64>;
}

#[async_trait]
pub trait RoleStore: Send + Sync {
    /// Live (not soft-deleted) roles granted to the user.
    async fn roles_of(&self, user_id: UserId) -> StoreResult<Vec<RoleRecord>>;
    async fn find_role(&self, role_id: RoleId) -> StoreResult<Option<RoleRecord>>;
    /// Insert-if-absent on the (user, role) pair.
    async fn assign(&self, user_id: UserId, role_id: RoleId) -> StoreResult<RoleAssignment>;
    /// Returns whether a grant was removed.
    async fn remove(&self, user_id: UserId, role_id: RoleId) -> StoreResult<bool>;
}

/// The persistence collaborators wired into the auth components.
#[derive(Clone)]
pub struct AuthStores {
    pub users: Arc<dyn UserDirectory>,
    pub refresh_tokens: Arc<dyn RefreshTokenStore>,
    pub roles: Arc<dyn RoleStore>,
}
