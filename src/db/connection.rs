use std::time::Duration;

use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr, Schema,
    sea_query::Index,
};
use tracing::info;

use crate::config::DatabaseConfig;

use super::entities::{
    prelude::{RefreshToken, Role, User, UserRole},
    user_role,
};

pub const USER_ROLE_UNIQUE_INDEX: &str = "idx_user_roles_user_role";

pub async fn connect(cfg: &DatabaseConfig) -> anyhow::Result<DatabaseConnection> {
    let mut options = ConnectOptions::new(cfg.url.clone());
    options
        .max_connections(cfg.max_connections)
        .min_connections(cfg.min_idle)
        .connect_timeout(Duration::from_secs(5))
        .sqlx_logging(false);

    let db = Database::connect(options).await?;
    if cfg.sync_schema {
        info!("syncing database schema from entities");
        sync_schema(&db).await?;
    }
    Ok(db)
}

/// Creates missing tables in foreign key order plus the unique index that
/// keeps role grants free of duplicates. Existing tables are left alone.
pub async fn sync_schema(db: &DatabaseConnection) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);

    let tables = [
        schema.create_table_from_entity(User),
        schema.create_table_from_entity(Role),
        schema.create_table_from_entity(UserRole),
        schema.create_table_from_entity(RefreshToken),
    ];
    for mut table in tables {
        table.if_not_exists();
        db.execute(backend.build(&table)).await?;
    }

    let index = Index::create()
        .name(USER_ROLE_UNIQUE_INDEX)
        .table(UserRole)
        .col(user_role::Column::UserId)
        .col(user_role::Column::RoleId)
        .unique()
        .if_not_exists()
        .to_owned();
    db.execute(backend.build(&index)).await?;
    Ok(())
}
