use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, PrimaryKeyTrait, QueryFilter,
};

use super::error::DaoResult;

/// Entities that soft-delete through a nullable `deleted_at` column.
pub trait HasDeletedAtColumn: EntityTrait {
    fn deleted_at_column() -> Self::Column;
}

#[async_trait::async_trait]
pub trait DaoBase: Clone + Send + Sync + Sized {
    type Entity: EntityTrait + Send + Sync;

    fn from_db(db: DatabaseConnection) -> Self;

    fn new(db: &DatabaseConnection) -> Self {
        Self::from_db(db.clone())
    }

    fn db(&self) -> &DatabaseConnection;

    /// Row by primary key, treating soft-deleted rows as absent.
    async fn find_live_by_id(
        &self,
        id: i32,
    ) -> DaoResult<Option<<Self::Entity as EntityTrait>::Model>>
    where
        Self::Entity: HasDeletedAtColumn,
        <<Self::Entity as EntityTrait>::PrimaryKey as PrimaryKeyTrait>::ValueType: From<i32>,
    {
        let model = Self::Entity::find_by_id(id)
            .filter(Self::Entity::deleted_at_column().is_null())
            .one(self.db())
            .await?;
        Ok(model)
    }
}
