use thiserror::Error;

pub type AuthResult<T> = Result<T, AuthError>;

/// Failure reported by a persistence capability.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unique constraint violated: {0}")]
    Conflict(String),
    #[error("persistence backend failure: {0}")]
    Backend(String),
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("access token is malformed")]
    TokenMalformed,
    #[error("access token signature is invalid")]
    TokenSignatureInvalid,
    #[error("access token expired")]
    TokenExpired,
    #[error("refresh token is invalid")]
    RefreshTokenInvalid,
    #[error("refresh token expired")]
    RefreshTokenExpired,
    #[error("missing required role")]
    Forbidden,
    #[error("{entity} not found (id={id})")]
    NotFound { entity: &'static str, id: i32 },
    #[error("persistence call exceeded its deadline")]
    DeadlineExceeded,
    #[error("password hashing failed: {0}")]
    Hashing(String),
    #[error("token signing failed: {0}")]
    Signing(String),
    #[error("token lifetime of {0}s is out of range")]
    TtlOutOfRange(i64),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl AuthError {
    /// True for failures that mean "present valid credentials again".
    pub fn is_unauthenticated(&self) -> bool {
        matches!(
            self,
            Self::InvalidCredentials
                | Self::TokenMalformed
                | Self::TokenSignatureInvalid
                | Self::TokenExpired
                | Self::RefreshTokenInvalid
                | Self::RefreshTokenExpired
        )
    }

    /// True when the credential was genuine but has run out; an expired
    /// access token can be refreshed, an expired refresh token needs a login.
    pub fn is_expired(&self) -> bool {
        matches!(self, Self::TokenExpired | Self::RefreshTokenExpired)
    }
}

#[cfg(test)]
mod tests {
    use super::{AuthError, StoreError};

    #[test]
    fn classifies_unauthenticated_failures() {
        assert!(AuthError::InvalidCredentials.is_unauthenticated());
        assert!(AuthError::TokenExpired.is_unauthenticated());
        assert!(AuthError::RefreshTokenInvalid.is_unauthenticated());
        assert!(!AuthError::Forbidden.is_unauthenticated());
        assert!(!AuthError::DeadlineExceeded.is_unauthenticated());
    }

    #[test]
    fn only_expiry_variants_report_expired() {
        assert!(AuthError::TokenExpired.is_expired());
        assert!(AuthError::RefreshTokenExpired.is_expired());
        assert!(!AuthError::TokenSignatureInvalid.is_expired());
        assert!(!AuthError::RefreshTokenInvalid.is_expired());
    }

    #[test]
    fn store_errors_convert_transparently() {
        let err = AuthError::from(StoreError::Backend("connection reset".to_string()));

        assert_eq!(
            err.to_string(),
            "persistence backend failure: connection reset"
        );
    }
}
