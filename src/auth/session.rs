use std::{future::Future, sync::Arc, sync::OnceLock, time::Duration as StdDuration};

use chrono::{Duration, Utc};

use super::{
    AuthError, CustomClaims, PasswordHasher, RefreshTokenRecord, SessionTokens, TokenSigner,
    UserId, UserRecord,
    deadline::{bounded, expires_after},
    refresh::generate_refresh_token,
    roles::AuthorizationResolver,
    store::{AuthStores, RefreshTokenStore, UserDirectory},
};

pub const TOKEN_TYPE: &str = "Bearer";

#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    /// Upper bound on each persistence call; `None` waits indefinitely.
    pub call_timeout: Option<StdDuration>,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            access_ttl: Duration::minutes(15),
            refresh_ttl: Duration::days(7),
            call_timeout: Some(StdDuration::from_secs(5)),
        }
    }
}

/// Login, refresh and logout over injected capabilities.
///
/// Every operation is cancel-safe: persistence writes are single atomic
/// statements, so dropping a future mid-flight either commits the write or
/// leaves the previous state untouched.
#[derive(Clone)]
pub struct SessionManager {
    users: Arc<dyn UserDirectory>,
    refresh_tokens: Arc<dyn RefreshTokenStore>,
    resolver: AuthorizationResolver,
    hasher: Arc<dyn PasswordHasher>,
    signer: Arc<dyn TokenSigner>,
    settings: SessionSettings,
    dummy_hash: Arc<OnceLock<Option<String>>>,
}

impl SessionManager {
    pub fn new(
        stores: &AuthStores,
        hasher: Arc<dyn PasswordHasher>,
        signer: Arc<dyn TokenSigner>,
        settings: SessionSettings,
    ) -> Self {
        Self {
            users: stores.users.clone(),
            refresh_tokens: stores.refresh_tokens.clone(),
            resolver: AuthorizationResolver::new(stores.roles.clone(), stores.users.clone())
                .with_call_timeout(settings.call_timeout),
            hasher,
            signer,
            settings,
            dummy_hash: Arc::new(OnceLock::new()),
        }
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<SessionTokens, AuthError> {
        let email = email.trim();
        let user = match self.call(self.users.find_by_email(email)).await? {
            Some(user) => user,
            None => {
                self.burn_verification(password);
                tracing::info!("login rejected: invalid credentials");
                return Err(AuthError::InvalidCredentials);
            }
        };

        if !self.hasher.verify(password, &user.password_hash) {
            tracing::info!(user_id = user.id, "login rejected: invalid credentials");
            return Err(AuthError::InvalidCredentials);
        }

        let tokens = self.open_session(&user).await?;
        tracing::info!(user_id = user.id, "login succeeded");
        Ok(tokens)
    }

    /// Exchanges a refresh token for a new pair. The presented value is
    /// consumed by an atomic rotation, so each refresh token works once.
    pub async fn refresh(&self, refresh_token: &str) -> Result<SessionTokens, AuthError> {
        let presented = refresh_token.trim();
        if presented.is_empty() {
            return Err(AuthError::RefreshTokenInvalid);
        }

        let now = Utc::now();
        let record = self
            .call(self.refresh_tokens.find_by_token(presented))
            .await?
            .ok_or(AuthError::RefreshTokenInvalid)?;

        if record.is_expired_at(now) {
            self.discard(&record).await;
            tracing::info!(user_id = record.user_id, "refresh rejected: token expired");
            return Err(AuthError::RefreshTokenExpired);
        }

        let Some(user) = self.call(self.users.find_by_id(record.user_id)).await? else {
            self.discard(&record).await;
            tracing::warn!(user_id = record.user_id, "refresh rejected: user no longer exists");
            return Err(AuthError::RefreshTokenInvalid);
        };

        let roles = self.resolver.role_names(user.id).await?;
        let access = self.signer.issue(
            &user.id.to_string(),
            self.settings.access_ttl,
            CustomClaims::with_roles(roles),
        )?;

        let next = generate_refresh_token();
        let next_expires_at = expires_after(now, self.settings.refresh_ttl)?;
        let rotated = self
            .call(
                self.refresh_tokens
                    .rotate(presented, &next, next_expires_at, now),
            )
            .await?
            .ok_or_else(|| {
                tracing::warn!(
                    user_id = user.id,
                    "refresh rejected: token already rotated or revoked"
                );
                AuthError::RefreshTokenInvalid
            })?;

        tracing::debug!(user_id = user.id, "refresh token rotated");
        Ok(self.bundle(access.token, access.expires_at, rotated))
    }

    /// Deletes the session behind `refresh_token`; unknown values succeed.
    pub async fn logout(&self, refresh_token: &str) -> Result<(), AuthError> {
        let presented = refresh_token.trim();
        if presented.is_empty() {
            return Ok(());
        }
        self.call(self.refresh_tokens.delete_by_token(presented))
            .await?;
        tracing::debug!("refresh token revoked");
        Ok(())
    }

    pub async fn logout_user(&self, user_id: UserId) -> Result<(), AuthError> {
        self.call(self.refresh_tokens.delete_by_user_id(user_id))
            .await?;
        tracing::info!(user_id, "all sessions revoked");
        Ok(())
    }

    async fn open_session(&self, user: &UserRecord) -> Result<SessionTokens, AuthError> {
        let roles = self.resolver.role_names(user.id).await?;
        let access = self.signer.issue(
            &user.id.to_string(),
            self.settings.access_ttl,
            CustomClaims::with_roles(roles),
        )?;

        let refresh = generate_refresh_token();
        let expires_at = expires_after(Utc::now(), self.settings.refresh_ttl)?;
        let record = self
            .call(self.refresh_tokens.replace(user.id, &refresh, expires_at))
            .await?;

        Ok(self.bundle(access.token, access.expires_at, record))
    }

    fn bundle(
        &self,
        access_token: String,
        expires_at: chrono::DateTime<Utc>,
        refresh: RefreshTokenRecord,
    ) -> SessionTokens {
        SessionTokens {
            access_token,
            refresh_token: refresh.token,
            token_type: TOKEN_TYPE,
            expires_at,
            expires_in: self.settings.access_ttl.num_seconds(),
            refresh_expires_at: refresh.expires_at,
        }
    }

    /// Best-effort removal of a dead row; the caller's error wins.
    async fn discard(&self, record: &RefreshTokenRecord) {
        if let Err(err) = self
            .call(self.refresh_tokens.delete_by_token(&record.token))
            .await
        {
            tracing::warn!(user_id = record.user_id, error = %err, "failed to delete dead refresh token");
        }
    }

    /// Runs a password verification against a throwaway hash so an unknown
    /// email costs about as much as a wrong password.
    fn burn_verification(&self, password: &str) {
        let dummy = self
            .dummy_hash
            .get_or_init(|| self.hasher.hash("pos-auth-dummy-password").ok());
        if let Some(hash) = dummy {
            let _ = self.hasher.verify(password, hash);
        }
    }

    async fn call<T, E, F>(&self, call: F) -> Result<T, AuthError>
    where
        F: Future<Output = Result<T, E>>,
        AuthError: From<E>,
    {
        bounded(self.settings.call_timeout, call).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, Utc};

    use super::{SessionManager, SessionSettings};
    use crate::auth::{
        Argon2Hasher, AuthError, JwtSettings, JwtSigner, PasswordHasher, TokenSigner,
        memory::MemoryStores,
        store::{RefreshTokenStore, RoleStore},
    };

    struct Fixture {
        stores: MemoryStores,
        signer: Arc<JwtSigner>,
        sessions: SessionManager,
    }

    fn fixture() -> Fixture {
        let stores = MemoryStores::new();
        let signer = Arc::new(JwtSigner::new(&JwtSettings::new("session-secret", 5)));
        let sessions = SessionManager::new(
            &stores.auth_stores(),
            Arc::new(Argon2Hasher::new()),
            signer.clone(),
            SessionSettings::default(),
        );
        Fixture {
            stores,
            signer,
            sessions,
        }
    }

    fn add_user(fixture: &Fixture, email: &str, password: &str) -> i32 {
        let hash = Argon2Hasher::new().hash(password).expect("hash should succeed");
        fixture
            .stores
            .users
            .add_user(email, &hash)
            .expect("user should insert")
            .id
    }

    #[tokio::test]
    async fn login_issues_access_token_for_user() {
        let fixture = fixture();
        let user_id = add_user(&fixture, "u1@example.com", "correct-horse");
        let role = fixture.stores.roles.add_role("cashier").expect("role");
        fixture
            .stores
            .roles
            .assign(user_id, role.id)
            .await
            .expect("assign");

        let tokens = fixture
            .sessions
            .login("  U1@example.com ", "correct-horse")
            .await
            .expect("login should succeed");

        let claims = fixture
            .signer
            .verify(&tokens.access_token)
            .expect("access token should verify");
        assert_eq!(claims.sub, user_id.to_string());
        assert_eq!(claims.roles(), ["cashier".to_string()]);
        assert_eq!(tokens.token_type, "Bearer");
        assert_eq!(tokens.expires_in, 15 * 60);
        assert!(tokens.refresh_expires_at > tokens.expires_at);
    }

    #[tokio::test]
    async fn unknown_email_and_wrong_password_are_indistinguishable() {
        let fixture = fixture();
        add_user(&fixture, "u1@example.com", "correct-horse");

        let missing = fixture
            .sessions
            .login("nobody@example.com", "correct-horse")
            .await
            .expect_err("login should fail");
        let wrong = fixture
            .sessions
            .login("u1@example.com", "battery-staple")
            .await
            .expect_err("login should fail");

        assert!(matches!(missing, AuthError::InvalidCredentials));
        assert!(matches!(wrong, AuthError::InvalidCredentials));
        assert_eq!(missing.to_string(), wrong.to_string());
    }

    #[tokio::test]
    async fn second_login_supersedes_first_refresh_token() {
        let fixture = fixture();
        let user_id = add_user(&fixture, "u1@example.com", "correct-horse");

        let first = fixture
            .sessions
            .login("u1@example.com", "correct-horse")
            .await
            .expect("login should succeed");
        let second = fixture
            .sessions
            .login("u1@example.com", "correct-horse")
            .await
            .expect("login should succeed");

        assert_ne!(first.refresh_token, second.refresh_token);
        assert_eq!(fixture.stores.refresh_tokens.len().expect("len"), 1);
        let err = fixture
            .sessions
            .refresh(&first.refresh_token)
            .await
            .expect_err("superseded token should fail");
        assert!(matches!(err, AuthError::RefreshTokenInvalid));
        let row = fixture
            .stores
            .refresh_tokens
            .find_by_user_id(user_id)
            .await
            .expect("lookup")
            .expect("row should exist");
        assert_eq!(row.token, second.refresh_token);
    }

    #[tokio::test]
    async fn refresh_rotates_and_rejects_replay() {
        let fixture = fixture();
        add_user(&fixture, "u1@example.com", "correct-horse");
        let login = fixture
            .sessions
            .login("u1@example.com", "correct-horse")
            .await
            .expect("login should succeed");

        let rotated = fixture
            .sessions
            .refresh(&login.refresh_token)
            .await
            .expect("refresh should succeed");
        assert_ne!(rotated.refresh_token, login.refresh_token);

        let replay = fixture
            .sessions
            .refresh(&login.refresh_token)
            .await
            .expect_err("replay should fail");
        assert!(matches!(replay, AuthError::RefreshTokenInvalid));

        fixture
            .sessions
            .refresh(&rotated.refresh_token)
            .await
            .expect("rotated token should work");
    }

    #[tokio::test]
    async fn expired_refresh_token_requires_login_and_is_removed() {
        let fixture = fixture();
        let user_id = add_user(&fixture, "u1@example.com", "correct-horse");
        fixture
            .stores
            .refresh_tokens
            .create(user_id, "stale-token", Utc::now() - Duration::seconds(1))
            .await
            .expect("seed");

        let err = fixture
            .sessions
            .refresh("stale-token")
            .await
            .expect_err("expired token should fail");

        assert!(matches!(err, AuthError::RefreshTokenExpired));
        assert!(fixture.stores.refresh_tokens.is_empty().expect("len"));
    }

    #[tokio::test]
    async fn refresh_for_deleted_user_is_invalid() {
        let fixture = fixture();
        let user_id = add_user(&fixture, "u1@example.com", "correct-horse");
        let login = fixture
            .sessions
            .login("u1@example.com", "correct-horse")
            .await
            .expect("login should succeed");
        fixture.stores.users.soft_delete(user_id).expect("soft delete");

        let err = fixture
            .sessions
            .refresh(&login.refresh_token)
            .await
            .expect_err("refresh should fail");

        assert!(matches!(err, AuthError::RefreshTokenInvalid));
        assert!(fixture.stores.refresh_tokens.is_empty().expect("len"));
    }

    #[tokio::test]
    async fn unrepresentable_refresh_lifetime_fails_login_cleanly() {
        let stores = MemoryStores::new();
        let hash = Argon2Hasher::new().hash("correct-horse").expect("hash");
        stores.users.add_user("u1@example.com", &hash).expect("user");
        let sessions = SessionManager::new(
            &stores.auth_stores(),
            Arc::new(Argon2Hasher::new()),
            Arc::new(JwtSigner::new(&JwtSettings::new("session-secret", 5))),
            SessionSettings {
                refresh_ttl: Duration::MAX,
                ..SessionSettings::default()
            },
        );

        let err = sessions
            .login("u1@example.com", "correct-horse")
            .await
            .expect_err("login should fail");

        assert!(matches!(err, AuthError::TtlOutOfRange(_)));
        assert!(stores.refresh_tokens.is_empty().expect("len"));
    }

    #[tokio::test]
    async fn blank_refresh_token_is_invalid() {
        let fixture = fixture();

        let err = fixture
            .sessions
            .refresh("   ")
            .await
            .expect_err("refresh should fail");

        assert!(matches!(err, AuthError::RefreshTokenInvalid));
    }

    #[tokio::test]
    async fn logout_is_idempotent_and_kills_refresh() {
        let fixture = fixture();
        let user_id = add_user(&fixture, "u1@example.com", "correct-horse");
        let login = fixture
            .sessions
            .login("u1@example.com", "correct-horse")
            .await
            .expect("login should succeed");

        fixture
            .sessions
            .logout(&login.refresh_token)
            .await
            .expect("logout should succeed");
        fixture
            .sessions
            .logout(&login.refresh_token)
            .await
            .expect("second logout should succeed");
        fixture
            .sessions
            .logout_user(user_id)
            .await
            .expect("user logout should succeed");

        let err = fixture
            .sessions
            .refresh(&login.refresh_token)
            .await
            .expect_err("refresh should fail");
        assert!(matches!(err, AuthError::RefreshTokenInvalid));
    }
}
