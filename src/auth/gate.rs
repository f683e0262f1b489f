use std::sync::Arc;

use super::{AuthError, Claims, TokenSigner, UserId, roles::AuthorizationResolver};

/// Per-request check of an access token, plus an optional role requirement
/// answered from live grants rather than the token's role snapshot.
#[derive(Clone)]
pub struct AccessGate {
    signer: Arc<dyn TokenSigner>,
    resolver: AuthorizationResolver,
}

impl AccessGate {
    pub fn new(signer: Arc<dyn TokenSigner>, resolver: AuthorizationResolver) -> Self {
        Self { signer, resolver }
    }

    pub async fn authorize(
        &self,
        raw_token: &str,
        required_roles: &[&str],
    ) -> Result<UserId, AuthError> {
        self.authorize_claims(raw_token, required_roles)
            .await
            .map(|(user_id, _)| user_id)
    }

    pub async fn authorize_claims(
        &self,
        raw_token: &str,
        required_roles: &[&str],
    ) -> Result<(UserId, Claims), AuthError> {
        let claims = self.signer.verify(raw_token.trim())?;
        let user_id = claims
            .sub
            .parse::<UserId>()
            .map_err(|_| AuthError::TokenMalformed)?;

        if !required_roles.is_empty() && !self.resolver.has_any(user_id, required_roles).await? {
            tracing::info!(user_id, required = ?required_roles, "access denied: missing role");
            return Err(AuthError::Forbidden);
        }

        Ok((user_id, claims))
    }
}

/// Pulls the token out of an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}
