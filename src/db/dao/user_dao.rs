use async_trait::async_trait;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter,
    sea_query::{Expr, Func},
};

use super::{DaoBase, DaoResult, HasDeletedAtColumn};
use crate::auth::{
    UserId, UserRecord,
    store::{StoreResult, UserDirectory},
};
use crate::db::entities::{prelude::User, user};

#[derive(Clone)]
pub struct UserDao {
    db: DatabaseConnection,
}

impl DaoBase for UserDao {
    type Entity = User;

    fn from_db(db: DatabaseConnection) -> Self {
        Self { db }
    }

    fn db(&self) -> &DatabaseConnection {
        &self.db
    }
}

impl HasDeletedAtColumn for User {
    fn deleted_at_column() -> user::Column {
        user::Column::DeletedAt
    }
}

impl From<user::Model> for UserRecord {
    fn from(model: user::Model) -> Self {
        Self {
            id: model.user_id,
            email: model.email,
            password_hash: model.password_hash,
            firstname: model.firstname,
            lastname: model.lastname,
        }
    }
}

impl UserDao {
    pub async fn find_live_by_email(&self, email: &str) -> DaoResult<Option<user::Model>> {
        let model = User::find()
            .filter(Expr::expr(Func::lower(Expr::col(user::Column::Email))).eq(email.to_lowercase()))
            .filter(user::Column::DeletedAt.is_null())
            .one(&self.db)
            .await?;
        Ok(model)
    }
}

#[async_trait]
impl UserDirectory for UserDao {
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<UserRecord>> {
        Ok(self.find_live_by_email(email).await?.map(UserRecord::from))
    }

    async fn find_by_id(&self, id: UserId) -> StoreResult<Option<UserRecord>> {
        Ok(self.find_live_by_id(id).await?.map(UserRecord::from))
    }
}

#[cfg(test)]
mod tests {
    use chrono::{FixedOffset, TimeZone};
    use sea_orm::{DatabaseBackend, DbErr, MockDatabase};

    use crate::auth::{StoreError, store::UserDirectory};
    use crate::db::entities::user;

    use super::UserDao;
    use crate::db::dao::DaoBase;

    fn ts() -> chrono::DateTime<chrono::FixedOffset> {
        FixedOffset::east_opt(0)
            .expect("offset should be valid")
            .with_ymd_and_hms(2026, 1, 1, 0, 0, 0)
            .single()
            .expect("timestamp should be valid")
    }

    fn user_model(id: i32, email: &str) -> user::Model {
        let now = ts();
        user::Model {
            user_id: id,
            email: email.to_string(),
            password_hash: "hash".to_string(),
            firstname: "Ada".to_string(),
            lastname: "Lovelace".to_string(),
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    #[tokio::test]
    async fn find_by_email_lowercases_both_sides() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[user_model(7, "Alice@Example.com")]])
            .into_connection();
        let dao = UserDao::new(&db);

        let user = dao
            .find_by_email("ALICE@example.com")
            .await
            .expect("query should succeed")
            .expect("user should exist");
        assert_eq!(user.id, 7);
        assert_eq!(user.firstname, "Ada");

        let log = db.into_transaction_log();
        assert_eq!(log.len(), 1);
        let sql = format!("{:?}", log[0]);
        assert!(sql.contains("LOWER"));
        assert!(sql.contains("alice@example.com"));
        assert!(sql.contains("deleted_at"));
        assert!(sql.contains("IS NULL"));
    }

    #[tokio::test]
    async fn find_by_id_returns_none_when_missing() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<user::Model>::new()])
            .into_connection();
        let dao = UserDao::new(&db);

        let result = dao.find_by_id(42).await.expect("query should succeed");
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn database_errors_surface_as_backend_failures() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_errors([DbErr::Custom("connection reset".to_string())])
            .into_connection();
        let dao = UserDao::new(&db);

        let err = dao
            .find_by_email("alice@example.com")
            .await
            .expect_err("query should fail");
        assert!(matches!(err, StoreError::Backend(_)));
    }
}
