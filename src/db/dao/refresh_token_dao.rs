use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
    sea_query::{Expr, OnConflict},
};

use super::{DaoBase, DaoResult};
use crate::auth::{
    RefreshTokenRecord, UserId,
    store::{RefreshTokenStore, StoreResult},
};
use crate::db::entities::refresh_token::{self, Entity as RefreshToken};

#[derive(Clone)]
pub struct RefreshTokenDao {
    db: DatabaseConnection,
}

impl DaoBase for RefreshTokenDao {
    type Entity = RefreshToken;

    fn from_db(db: DatabaseConnection) -> Self {
        Self { db }
    }

    fn db(&self) -> &DatabaseConnection {
        &self.db
    }
}

impl From<refresh_token::Model> for RefreshTokenRecord {
    fn from(model: refresh_token::Model) -> Self {
        Self {
            id: model.refresh_token_id,
            user_id: model.user_id,
            token: model.token,
            expires_at: model.expires_at.to_utc(),
            created_at: model.created_at.to_utc(),
            updated_at: model.updated_at.to_utc(),
        }
    }
}

impl RefreshTokenDao {
    fn new_row(user_id: UserId, token: &str, expires_at: DateTime<Utc>) -> refresh_token::ActiveModel {
        let now = Utc::now().fixed_offset();
        refresh_token::ActiveModel {
            user_id: Set(user_id),
            token: Set(token.to_string()),
            expires_at: Set(expires_at.fixed_offset()),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
    }

    pub async fn find_one_by_token(&self, token: &str) -> DaoResult<Option<refresh_token::Model>> {
        let model = RefreshToken::find()
            .filter(refresh_token::Column::Token.eq(token))
            .one(&self.db)
            .await?;
        Ok(model)
    }

    pub async fn find_one_by_user(&self, user_id: UserId) -> DaoResult<Option<refresh_token::Model>> {
        let model = RefreshToken::find()
            .filter(refresh_token::Column::UserId.eq(user_id))
            .one(&self.db)
            .await?;
        Ok(model)
    }

    pub async fn insert_token(
        &self,
        user_id: UserId,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> DaoResult<refresh_token::Model> {
        let model = RefreshToken::insert(Self::new_row(user_id, token, expires_at))
            .exec_with_returning(&self.db)
            .await?;
        Ok(model)
    }

    /// `INSERT .. ON CONFLICT (user_id) DO UPDATE .. RETURNING *`, one
    /// statement, so a concurrent login cannot change what is returned.
    pub async fn upsert_for_user(
        &self,
        user_id: UserId,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> DaoResult<refresh_token::Model> {
        let model = RefreshToken::insert(Self::new_row(user_id, token, expires_at))
            .on_conflict(
                OnConflict::column(refresh_token::Column::UserId)
                    .update_columns([
                        refresh_token::Column::Token,
                        refresh_token::Column::ExpiresAt,
                        refresh_token::Column::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec_with_returning(&self.db)
            .await?;
        Ok(model)
    }

    /// Conditional `UPDATE .. WHERE token = current AND expires_at > now
    /// RETURNING *`. Concurrent callers presenting the same value race on
    /// the row; the database lets exactly one of them match.
    pub async fn swap_token(
        &self,
        current: &str,
        next: &str,
        next_expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> DaoResult<Option<refresh_token::Model>> {
        let now = now.fixed_offset();
        let swapped = RefreshToken::update_many()
            .col_expr(refresh_token::Column::Token, Expr::value(next.to_string()))
            .col_expr(
                refresh_token::Column::ExpiresAt,
                Expr::value(next_expires_at.fixed_offset()),
            )
            .col_expr(refresh_token::Column::UpdatedAt, Expr::value(now))
            .filter(refresh_token::Column::Token.eq(current))
            .filter(refresh_token::Column::ExpiresAt.gt(now))
            .exec_with_returning(&self.db)
            .await?;
        Ok(swapped.into_iter().next())
    }

    pub async fn delete_where_token(&self, token: &str) -> DaoResult<u64> {
        let result = RefreshToken::delete_many()
            .filter(refresh_token::Column::Token.eq(token))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected)
    }

    pub async fn delete_where_user(&self, user_id: UserId) -> DaoResult<u64> {
        let result = RefreshToken::delete_many()
            .filter(refresh_token::Column::UserId.eq(user_id))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected)
    }

    pub async fn delete_expired_before(&self, now: DateTime<Utc>) -> DaoResult<u64> {
        let result = RefreshToken::delete_many()
            .filter(refresh_token::Column::ExpiresAt.lte(now.fixed_offset()))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected)
    }
}

#[async_trait]
impl RefreshTokenStore for RefreshTokenDao {
    async fn find_by_token(&self, token: &str) -> StoreResult<Option<RefreshTokenRecord>> {
        Ok(self.find_one_by_token(token).await?.map(Into::into))
    }

    async fn find_by_user_id(&self, user_id: UserId) -> StoreResult<Option<RefreshTokenRecord>> {
        Ok(self.find_one_by_user(user_id).await?.map(Into::into))
    }

    async fn create(
        &self,
        user_id: UserId,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<RefreshTokenRecord> {
        Ok(self.insert_token(user_id, token, expires_at).await?.into())
    }

    async fn replace(
        &self,
        user_id: UserId,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<RefreshTokenRecord> {
        Ok(self.upsert_for_user(user_id, token, expires_at).await?.into())
    }

    async fn rotate(
        &self,
        current: &str,
        next: &str,
        next_expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<RefreshTokenRecord>> {
        Ok(self
            .swap_token(current, next, next_expires_at, now)
            .await?
            .map(Into::into))
    }

    async fn delete_by_token(&self, token: &str) -> StoreResult<()> {
        self.delete_where_token(token).await?;
        Ok(())
    }

    async fn delete_by_user_id(&self, user_id: UserId) -> StoreResult<()> {
        self.delete_where_user(user_id).await?;
        Ok(())
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        Ok(self.delete_expired_before(now).await?)
    }
}
