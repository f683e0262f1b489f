use axum::http::StatusCode;

use crate::auth::AuthError;

/// Transport error: HTTP status, stable machine-readable `code`, and a
/// message safe to show clients.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct AppError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

impl AppError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn unauthorized(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, code, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, "forbidden", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, "conflict", message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(StatusCode::GATEWAY_TIMEOUT, "timeout", message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal", message)
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials => {
                AppError::unauthorized("invalid_credentials", err.to_string())
            }
            AuthError::TokenMalformed => AppError::unauthorized("token_malformed", err.to_string()),
            AuthError::TokenSignatureInvalid => {
                AppError::unauthorized("token_invalid", err.to_string())
            }
            AuthError::TokenExpired => AppError::unauthorized("token_expired", err.to_string()),
            AuthError::RefreshTokenInvalid => {
                AppError::unauthorized("refresh_token_invalid", err.to_string())
            }
            AuthError::RefreshTokenExpired => {
                AppError::unauthorized("refresh_token_expired", err.to_string())
            }
            AuthError::Forbidden => AppError::forbidden(err.to_string()),
            AuthError::NotFound { .. } => AppError::not_found(err.to_string()),
            AuthError::DeadlineExceeded => {
                tracing::error!(error = %err, "auth operation timed out");
                AppError::timeout("request timed out")
            }
            AuthError::Hashing(_)
            | AuthError::Signing(_)
            | AuthError::TtlOutOfRange(_)
            | AuthError::Store(_) => {
                tracing::error!(error = %err, "auth operation failed");
                AppError::internal("internal server error")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use super::AppError;
    use crate::auth::{AuthError, StoreError};

    #[test]
    fn credential_failures_keep_distinct_codes() {
        let cases = [
            (AuthError::InvalidCredentials, "invalid_credentials"),
            (AuthError::TokenMalformed, "token_malformed"),
            (AuthError::TokenSignatureInvalid, "token_invalid"),
            (AuthError::TokenExpired, "token_expired"),
            (AuthError::RefreshTokenInvalid, "refresh_token_invalid"),
            (AuthError::RefreshTokenExpired, "refresh_token_expired"),
        ];

        for (err, code) in cases {
            let app = AppError::from(err);
            assert_eq!(app.status, StatusCode::UNAUTHORIZED);
            assert_eq!(app.code, code);
        }
    }

    #[test]
    fn infrastructure_details_stay_out_of_the_message() {
        let app = AppError::from(AuthError::Store(StoreError::Backend(
            "password authentication failed for user pos".to_string(),
        )));

        assert_eq!(app.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(app.code, "internal");
        assert!(!app.message.contains("pos"));
    }

    #[test]
    fn forbidden_not_found_and_deadline_map_to_their_statuses() {
        assert_eq!(AppError::from(AuthError::Forbidden).status, StatusCode::FORBIDDEN);
        assert_eq!(
            AppError::from(AuthError::NotFound {
                entity: "role",
                id: 3
            })
            .status,
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::from(AuthError::DeadlineExceeded).status,
            StatusCode::GATEWAY_TIMEOUT
        );
    }
}
