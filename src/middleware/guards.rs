use std::{marker::PhantomData, sync::Arc};

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};

use crate::{
    auth::{ADMIN_ROLE, Claims, UserId, bearer_token},
    error::AppError,
    state::AppState,
};

/// Role names a guarded route accepts; holding any one of them is enough.
pub trait RequiredRoles {
    fn roles() -> &'static [&'static str];
}

pub struct AdminOnly;

impl RequiredRoles for AdminOnly {
    fn roles() -> &'static [&'static str] {
        &[ADMIN_ROLE]
    }
}

fn raw_token(parts: &Parts) -> Result<&str, AppError> {
    parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(bearer_token)
        .ok_or_else(|| {
            AppError::unauthorized("token_malformed", "Missing/invalid Authorization header")
        })
}

// Auth guard: any valid access token.
#[derive(Debug, Clone)]
pub struct AuthGuard {
    pub user_id: UserId,
    pub claims: Claims,
}

impl FromRequestParts<Arc<AppState>> for AuthGuard {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        if let Some(guard) = parts.extensions.get::<AuthGuard>().cloned() {
            return Ok(guard);
        }

        let token = raw_token(parts)?;
        let (user_id, claims) = state.gate.authorize_claims(token, &[]).await?;

        let guard = Self { user_id, claims };
        parts.extensions.insert(guard.clone());
        Ok(guard)
    }
}

/// Valid access token plus a live grant of one of `R::roles()`.
pub struct AuthRoleGuard<R: RequiredRoles> {
    pub user_id: UserId,
    pub claims: Claims,
    _marker: PhantomData<R>,
}

impl<R> FromRequestParts<Arc<AppState>> for AuthRoleGuard<R>
where
    R: RequiredRoles,
{
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = raw_token(parts)?;
        let (user_id, claims) = state.gate.authorize_claims(token, R::roles()).await?;

        Ok(Self {
            user_id,
            claims,
            _marker: PhantomData,
        })
    }
}
