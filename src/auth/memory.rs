//! Process-local implementations of the persistence capabilities.
//!
//! Every operation runs inside one mutex critical section with no `.await`
//! while the lock is held, so rotation and assignment are atomic with
//! respect to concurrent callers.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{
    RefreshTokenRecord, RoleAssignment, RoleId, RoleRecord, StoreError, UserId, UserRecord,
    UserRoleRecord,
    store::{AuthStores, RefreshTokenStore, RoleStore, StoreResult, UserDirectory},
};

fn lock<T>(mutex: &Mutex<T>) -> StoreResult<MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|_| StoreError::Backend("in-memory store lock poisoned".to_string()))
}

#[derive(Default)]
struct UserRows {
    next_id: UserId,
    rows: HashMap<UserId, (UserRecord, bool)>,
}

#[derive(Default)]
pub struct MemoryUserDirectory {
    inner: Mutex<UserRows>,
}

impl MemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_user(&self, email: &str, password_hash: &str) -> StoreResult<UserRecord> {
        let mut inner = lock(&self.inner)?;
        if inner
            .rows
            .values()
            .any(|(user, _)| user.email.eq_ignore_ascii_case(email))
        {
            return Err(StoreError::Conflict(format!("email {email} already used")));
        }
        inner.next_id += 1;
        let user = UserRecord {
            id: inner.next_id,
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            firstname: String::new(),
            lastname: String::new(),
        };
        inner.rows.insert(user.id, (user.clone(), false));
        Ok(user)
    }

    pub fn soft_delete(&self, id: UserId) -> StoreResult<()> {
        if let Some((_, deleted)) = lock(&self.inner)?.rows.get_mut(&id) {
            *deleted = true;
        }
        Ok(())
    }
}

#[async_trait]
impl UserDirectory for MemoryUserDirectory {
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<UserRecord>> {
        let inner = lock(&self.inner)?;
        Ok(inner
            .rows
            .values()
            .find(|(user, deleted)| !deleted && user.email.eq_ignore_ascii_case(email))
            .map(|(user, _)| user.clone()))
    }

    async fn find_by_id(&self, id: UserId) -> StoreResult<Option<UserRecord>> {
        let inner = lock(&self.inner)?;
        Ok(inner
            .rows
            .get(&id)
            .filter(|(_, deleted)| !deleted)
            .map(|(user, _)| user.clone()))
    }
}

#[derive(Default)]
struct TokenRows {
    next_id: i32,
    by_user: HashMap<UserId, RefreshTokenRecord>,
}

impl TokenRows {
    fn user_holding(&self, token: &str) -> Option<UserId> {
        self.by_user
            .values()
            .find(|row| row.token == token)
            .map(|row| row.user_id)
    }
}

#[derive(Default)]
pub struct MemoryRefreshTokenStore {
    inner: Mutex<TokenRows>,
}

impl MemoryRefreshTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> StoreResult<usize> {
        Ok(lock(&self.inner)?.by_user.len())
    }

    pub fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len()? == 0)
    }
}

#[async_trait]
impl RefreshTokenStore for MemoryRefreshTokenStore {
    async fn find_by_token(&self, token: &str) -> StoreResult<Option<RefreshTokenRecord>> {
        let inner = lock(&self.inner)?;
        Ok(inner
            .user_holding(token)
            .and_then(|user_id| inner.by_user.get(&user_id).cloned()))
    }

    async fn find_by_user_id(&self, user_id: UserId) -> StoreResult<Option<RefreshTokenRecord>> {
        Ok(lock(&self.inner)?.by_user.get(&user_id).cloned())
    }

    async fn create(
        &self,
        user_id: UserId,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<RefreshTokenRecord> {
        let mut inner = lock(&self.inner)?;
        if inner.user_holding(token).is_some() {
            return Err(StoreError::Conflict("refresh token value".to_string()));
        }
        if inner.by_user.contains_key(&user_id) {
            return Err(StoreError::Conflict(format!(
                "user {user_id} already has a refresh token"
            )));
        }

        inner.next_id += 1;
        let now = Utc::now();
        let row = RefreshTokenRecord {
            id: inner.next_id,
            user_id,
            token: token.to_string(),
            expires_at,
            created_at: now,
            updated_at: now,
        };
        inner.by_user.insert(user_id, row.clone());
        Ok(row)
    }

    async fn replace(
        &self,
        user_id: UserId,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<RefreshTokenRecord> {
        let mut inner = lock(&self.inner)?;
        if inner
            .user_holding(token)
            .is_some_and(|holder| holder != user_id)
        {
            return Err(StoreError::Conflict("refresh token value".to_string()));
        }

        let now = Utc::now();
        inner.next_id += 1;
        let next_id = inner.next_id;
        let row = inner
            .by_user
            .entry(user_id)
            .and_modify(|row| {
                row.token = token.to_string();
                row.expires_at = expires_at;
                row.updated_at = now;
            })
            .or_insert_with(|| RefreshTokenRecord {
                id: next_id,
                user_id,
                token: token.to_string(),
                expires_at,
                created_at: now,
                updated_at: now,
            });
        Ok(row.clone())
    }

    async fn rotate(
        &self,
        current: &str,
        next: &str,
        next_expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<RefreshTokenRecord>> {
        let mut inner = lock(&self.inner)?;
        let Some(user_id) = inner.user_holding(current) else {
            return Ok(None);
        };
        let Some(row) = inner.by_user.get_mut(&user_id) else {
            return Ok(None);
        };
        if row.is_expired_at(now) {
            return Ok(None);
        }

        row.token = next.to_string();
        row.expires_at = next_expires_at;
        row.updated_at = now;
        Ok(Some(row.clone()))
    }

    async fn delete_by_token(&self, token: &str) -> StoreResult<()> {
        let mut inner = lock(&self.inner)?;
        if let Some(user_id) = inner.user_holding(token) {
            inner.by_user.remove(&user_id);
        }
        Ok(())
    }

    async fn delete_by_user_id(&self, user_id: UserId) -> StoreResult<()> {
        lock(&self.inner)?.by_user.remove(&user_id);
        Ok(())
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        let mut inner = lock(&self.inner)?;
        let before = inner.by_user.len();
        inner.by_user.retain(|_, row| !row.is_expired_at(now));
        Ok((before - inner.by_user.len()) as u64)
    }
}

#[derive(Default)]
struct RoleRows {
    next_role_id: RoleId,
    next_grant_id: i32,
    roles: HashMap<RoleId, (RoleRecord, bool)>,
    grants: Vec<UserRoleRecord>,
}

#[derive(Default)]
pub struct MemoryRoleStore {
    inner: Mutex<RoleRows>,
}

impl MemoryRoleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_role(&self, name: &str) -> StoreResult<RoleRecord> {
        let mut inner = lock(&self.inner)?;
        if inner
            .roles
            .values()
            .any(|(role, _)| role.name.eq_ignore_ascii_case(name))
        {
            return Err(StoreError::Conflict(format!("role {name} already exists")));
        }
        inner.next_role_id += 1;
        let role = RoleRecord {
            id: inner.next_role_id,
            name: name.to_string(),
        };
        inner.roles.insert(role.id, (role.clone(), false));
        Ok(role)
    }

    pub fn soft_delete_role(&self, role_id: RoleId) -> StoreResult<()> {
        if let Some((_, deleted)) = lock(&self.inner)?.roles.get_mut(&role_id) {
            *deleted = true;
        }
        Ok(())
    }

    /// Number of stored grant rows for the pair.
    pub fn grant_count(&self, user_id: UserId, role_id: RoleId) -> StoreResult<usize> {
        Ok(lock(&self.inner)?
            .grants
            .iter()
            .filter(|grant| grant.user_id == user_id && grant.role_id == role_id)
            .count())
    }
}

#[async_trait]
impl RoleStore for MemoryRoleStore {
    async fn roles_of(&self, user_id: UserId) -> StoreResult<Vec<RoleRecord>> {
        let inner = lock(&self.inner)?;
        let mut roles: Vec<RoleRecord> = inner
            .grants
            .iter()
            .filter(|grant| grant.user_id == user_id)
            .filter_map(|grant| inner.roles.get(&grant.role_id))
            .filter(|(_, deleted)| !deleted)
            .map(|(role, _)| role.clone())
            .collect();
        roles.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(roles)
    }

    async fn find_role(&self, role_id: RoleId) -> StoreResult<Option<RoleRecord>> {
        let inner = lock(&self.inner)?;
        Ok(inner
            .roles
            .get(&role_id)
            .filter(|(_, deleted)| !deleted)
            .map(|(role, _)| role.clone()))
    }

    async fn assign(&self, user_id: UserId, role_id: RoleId) -> StoreResult<RoleAssignment> {
        let mut inner = lock(&self.inner)?;
        if let Some(existing) = inner
            .grants
            .iter()
            .find(|grant| grant.user_id == user_id && grant.role_id == role_id)
        {
            return Ok(RoleAssignment::AlreadyAssigned(existing.clone()));
        }

        inner.next_grant_id += 1;
        let now = Utc::now();
        let grant = UserRoleRecord {
            id: inner.next_grant_id,
            user_id,
            role_id,
            created_at: now,
            updated_at: now,
        };
        inner.grants.push(grant.clone());
        Ok(RoleAssignment::Created(grant))
    }

    async fn remove(&self, user_id: UserId, role_id: RoleId) -> StoreResult<bool> {
        let mut inner = lock(&self.inner)?;
        let before = inner.grants.len();
        inner
            .grants
            .retain(|grant| !(grant.user_id == user_id && grant.role_id == role_id));
        Ok(inner.grants.len() != before)
    }
}

/// Concrete in-memory stores, kept typed so tests can seed them.
#[derive(Clone, Default)]
pub struct MemoryStores {
    pub users: Arc<MemoryUserDirectory>,
    pub refresh_tokens: Arc<MemoryRefreshTokenStore>,
    pub roles: Arc<MemoryRoleStore>,
}

impl MemoryStores {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn auth_stores(&self) -> AuthStores {
        AuthStores {
            users: self.users.clone(),
            refresh_tokens: self.refresh_tokens.clone(),
            roles: self.roles.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, Utc};

    use super::{MemoryRefreshTokenStore, MemoryRoleStore, MemoryUserDirectory};
    use crate::auth::{
        StoreError,
        store::{RefreshTokenStore, RoleStore, UserDirectory},
    };

    #[tokio::test]
    async fn email_lookup_ignores_case_and_soft_deleted_users() {
        let users = MemoryUserDirectory::new();
        let user = users
            .add_user("Alice@Example.com", "hash")
            .expect("user should insert");

        let found = users
            .find_by_email("alice@example.COM")
            .await
            .expect("lookup should succeed");
        assert_eq!(found.map(|u| u.id), Some(user.id));

        users.soft_delete(user.id).expect("soft delete should succeed");
        assert!(
            users
                .find_by_email("alice@example.com")
                .await
                .expect("lookup should succeed")
                .is_none()
        );
        assert!(
            users
                .find_by_id(user.id)
                .await
                .expect("lookup should succeed")
                .is_none()
        );
    }

    #[tokio::test]
    async fn create_rejects_duplicate_value_with_typed_conflict() {
        let store = MemoryRefreshTokenStore::new();
        let expires = Utc::now() + Duration::days(1);
        store.create(1, "dup", expires).await.expect("first insert");

        let err = store
            .create(2, "dup", expires)
            .await
            .expect_err("duplicate value should fail");

        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn replace_keeps_one_row_per_user() {
        let store = MemoryRefreshTokenStore::new();
        let expires = Utc::now() + Duration::days(1);
        store.replace(1, "first", expires).await.expect("replace");
        store.replace(1, "second", expires).await.expect("replace");

        assert_eq!(store.len().expect("len"), 1);
        assert!(store.find_by_token("first").await.expect("find").is_none());
        let row = store
            .find_by_user_id(1)
            .await
            .expect("find")
            .expect("row should exist");
        assert_eq!(row.token, "second");
    }

    #[tokio::test]
    async fn rotate_succeeds_once_under_contention() {
        let store = Arc::new(MemoryRefreshTokenStore::new());
        let now = Utc::now();
        store
            .replace(1, "current", now + Duration::days(1))
            .await
            .expect("seed");

        let mut handles = Vec::new();
        for attempt in 0..8 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store
                    .rotate(
                        "current",
                        &format!("next-{attempt}"),
                        now + Duration::days(2),
                        now,
                    )
                    .await
                    .expect("rotate should not error")
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.expect("task should join").is_some() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
        assert!(store.find_by_token("current").await.expect("find").is_none());
    }

    #[tokio::test]
    async fn rotate_refuses_expired_rows() {
        let store = MemoryRefreshTokenStore::new();
        let now = Utc::now();
        store
            .replace(1, "stale", now - Duration::seconds(1))
            .await
            .expect("seed");

        let rotated = store
            .rotate("stale", "fresh", now + Duration::days(1), now)
            .await
            .expect("rotate should not error");

        assert!(rotated.is_none());
        assert!(store.find_by_token("stale").await.expect("find").is_some());
    }

    #[tokio::test]
    async fn deletes_are_idempotent_and_sweep_counts_expired() {
        let store = MemoryRefreshTokenStore::new();
        let now = Utc::now();
        store.replace(1, "live", now + Duration::days(1)).await.expect("seed");
        store.replace(2, "dead", now - Duration::days(1)).await.expect("seed");
        store.replace(3, "gone", now + Duration::days(1)).await.expect("seed");

        store.delete_by_token("gone").await.expect("delete");
        store.delete_by_token("gone").await.expect("second delete");
        store.delete_by_user_id(99).await.expect("delete absent user");

        assert_eq!(store.delete_expired(now).await.expect("sweep"), 1);
        assert_eq!(store.len().expect("len"), 1);
    }

    #[tokio::test]
    async fn assign_is_idempotent_and_hides_deleted_roles() {
        let roles = MemoryRoleStore::new();
        let cashier = roles.add_role("cashier").expect("role");
        let manager = roles.add_role("manager").expect("role");

        assert!(roles.assign(1, cashier.id).await.expect("assign").is_created());
        assert!(!roles.assign(1, cashier.id).await.expect("assign").is_created());
        roles.assign(1, manager.id).await.expect("assign");
        assert_eq!(roles.grant_count(1, cashier.id).expect("count"), 1);

        roles.soft_delete_role(manager.id).expect("soft delete");
        let held = roles.roles_of(1).await.expect("roles");
        assert_eq!(held, vec![cashier.clone()]);

        assert!(roles.remove(1, cashier.id).await.expect("remove"));
        assert!(!roles.remove(1, cashier.id).await.expect("remove again"));
    }
}
