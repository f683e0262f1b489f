use sea_orm::{DbErr, SqlErr};
use thiserror::Error;

use crate::auth::StoreError;

#[derive(Debug, Error)]
pub enum DaoLayerError {
    #[error("Database error: {0}")]
    Db(#[from] DbErr),
    #[error("{entity} not found (id={id})")]
    NotFound { entity: &'static str, id: i32 },
}

pub type DaoResult<T> = Result<T, DaoLayerError>;

impl From<DaoLayerError> for StoreError {
    fn from(err: DaoLayerError) -> Self {
        match err {
            DaoLayerError::Db(db_err) => match db_err.sql_err() {
                Some(SqlErr::UniqueConstraintViolation(detail)) => StoreError::Conflict(detail),
                _ => StoreError::Backend(db_err.to_string()),
            },
            other => StoreError::Backend(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use sea_orm::DbErr;

    use super::DaoLayerError;
    use crate::auth::StoreError;

    #[test]
    fn generic_database_errors_become_backend_failures() {
        let err: StoreError = DaoLayerError::Db(DbErr::Custom("boom".to_string())).into();

        assert!(matches!(err, StoreError::Backend(message) if message.contains("boom")));
    }

    #[test]
    fn missing_rows_become_backend_failures() {
        let err: StoreError = DaoLayerError::NotFound {
            entity: "refresh_token",
            id: 3,
        }
        .into();

        assert!(matches!(err, StoreError::Backend(message) if message.contains("id=3")));
    }
}
