use std::sync::Arc;

use sea_orm::DatabaseConnection;

use super::{DaoBase, RefreshTokenDao, RoleDao, UserDao};
use crate::auth::store::AuthStores;

#[derive(Clone)]
pub struct DaoContext {
    db: DatabaseConnection,
}

impl DaoContext {
    pub fn new(db: &DatabaseConnection) -> Self {
        Self { db: db.clone() }
    }

    pub fn user(&self) -> UserDao {
        DaoBase::new(&self.db)
    }

    pub fn role(&self) -> RoleDao {
        DaoBase::new(&self.db)
    }

    pub fn refresh_token(&self) -> RefreshTokenDao {
        DaoBase::new(&self.db)
    }

    /// SQL-backed capabilities for the auth core.
    pub fn auth_stores(&self) -> AuthStores {
        AuthStores {
            users: Arc::new(self.user()),
            refresh_tokens: Arc::new(self.refresh_token()),
            roles: Arc::new(self.role()),
        }
    }
}
