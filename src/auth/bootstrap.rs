use std::sync::Arc;

use crate::config::AuthConfig;

use super::{
    AccessGate, Argon2Hasher, AuthorizationResolver, JwtSigner, PasswordHasher, SessionManager,
    TokenSigner, store::AuthStores,
};

/// The wired auth core, ready to be shared through application state.
#[derive(Clone)]
pub struct AuthComponents {
    pub sessions: SessionManager,
    pub gate: AccessGate,
    pub resolver: AuthorizationResolver,
}

pub fn build_components(cfg: &AuthConfig, stores: &AuthStores) -> AuthComponents {
    let settings = cfg.session_settings();
    let hasher: Arc<dyn PasswordHasher> = Arc::new(Argon2Hasher::new());
    let signer: Arc<dyn TokenSigner> = Arc::new(JwtSigner::new(&cfg.jwt_settings()));
    let resolver = AuthorizationResolver::new(stores.roles.clone(), stores.users.clone())
        .with_call_timeout(settings.call_timeout);

    AuthComponents {
        gate: AccessGate::new(signer.clone(), resolver.clone()),
        sessions: SessionManager::new(stores, hasher, signer, settings),
        resolver,
    }
}
