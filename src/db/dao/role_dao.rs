use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, QueryOrder, Set,
    sea_query::OnConflict,
};

use super::{DaoBase, DaoLayerError, DaoResult, HasDeletedAtColumn};
use crate::auth::{
    RoleAssignment, RoleId, RoleRecord, UserId, UserRoleRecord,
    store::{RoleStore, StoreResult},
};
use crate::db::entities::{
    prelude::{Role, UserRole},
    role, user_role,
};

/// Insert/read rounds before a grant that keeps vanishing under a
/// concurrent revoke is reported as missing.
const GRANT_ATTEMPTS: usize = 3;

#[derive(Clone)]
pub struct RoleDao {
    db: DatabaseConnection,
}

impl DaoBase for RoleDao {
    type Entity = Role;

    fn from_db(db: DatabaseConnection) -> Self {
        Self { db }
    }

    fn db(&self) -> &DatabaseConnection {
        &self.db
    }
}

impl HasDeletedAtColumn for Role {
    fn deleted_at_column() -> role::Column {
        role::Column::DeletedAt
    }
}

impl From<role::Model> for RoleRecord {
    fn from(model: role::Model) -> Self {
        Self {
            id: model.role_id,
            name: model.name,
        }
    }
}

impl From<user_role::Model> for UserRoleRecord {
    fn from(model: user_role::Model) -> Self {
        Self {
            id: model.user_role_id,
            user_id: model.user_id,
            role_id: model.role_id,
            created_at: model.created_at.to_utc(),
            updated_at: model.updated_at.to_utc(),
        }
    }
}

impl RoleDao {
    pub async fn live_roles_of(&self, user_id: UserId) -> DaoResult<Vec<role::Model>> {
        let roles = Role::find()
            .inner_join(UserRole)
            .filter(user_role::Column::UserId.eq(user_id))
            .filter(role::Column::DeletedAt.is_null())
            .order_by_asc(role::Column::Name)
            .all(&self.db)
            .await?;
        Ok(roles)
    }

    pub async fn find_grant(
        &self,
        user_id: UserId,
        role_id: RoleId,
    ) -> DaoResult<Option<user_role::Model>> {
        let grant = UserRole::find()
            .filter(user_role::Column::UserId.eq(user_id))
            .filter(user_role::Column::RoleId.eq(role_id))
            .one(&self.db)
            .await?;
        Ok(grant)
    }

    /// Insert-if-absent on `(user_id, role_id)`. Returns the stored grant and
    /// whether this call created it. A fresh grant comes back from
    /// `RETURNING`; on conflict the existing row is read, and if a concurrent
    /// revoke removed it in between, the insert is tried again.
    pub async fn grant(
        &self,
        user_id: UserId,
        role_id: RoleId,
    ) -> DaoResult<(user_role::Model, bool)> {
        let now = Utc::now().fixed_offset();
        let model = user_role::ActiveModel {
            user_id: Set(user_id),
            role_id: Set(role_id),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        for _ in 0..GRANT_ATTEMPTS {
            let inserted = UserRole::insert(model.clone())
                .on_conflict(
                    OnConflict::columns([user_role::Column::UserId, user_role::Column::RoleId])
                        .do_nothing()
                        .to_owned(),
                )
                .exec_with_returning(&self.db)
                .await;
            match inserted {
                Ok(grant) => return Ok((grant, true)),
                // DO NOTHING returned no row: the grant already exists.
                Err(DbErr::RecordNotInserted | DbErr::RecordNotFound(_)) => {}
                Err(err) => return Err(err.into()),
            }

            if let Some(grant) = self.find_grant(user_id, role_id).await? {
                return Ok((grant, false));
            }
            tracing::debug!(user_id, role_id, "grant revoked mid-assign, retrying");
        }

        Err(DaoLayerError::NotFound {
            entity: "user_role",
            id: user_id,
        })
    }

    pub async fn revoke(&self, user_id: UserId, role_id: RoleId) -> DaoResult<u64> {
        let result = UserRole::delete_many()
            .filter(user_role::Column::UserId.eq(user_id))
            .filter(user_role::Column::RoleId.eq(role_id))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected)
    }
}

#[async_trait]
impl RoleStore for RoleDao {
    async fn roles_of(&self, user_id: UserId) -> StoreResult<Vec<RoleRecord>> {
        Ok(self
            .live_roles_of(user_id)
            .await?
            .into_iter()
            .map(RoleRecord::from)
            .collect())
    }

    async fn find_role(&self, role_id: RoleId) -> StoreResult<Option<RoleRecord>> {
        Ok(self.find_live_by_id(role_id).await?.map(RoleRecord::from))
    }

    async fn assign(&self, user_id: UserId, role_id: RoleId) -> StoreResult<RoleAssignment> {
        let (grant, created) = self.grant(user_id, role_id).await?;
        let record = UserRoleRecord::from(grant);
        Ok(if created {
            RoleAssignment::Created(record)
        } else {
            RoleAssignment::AlreadyAssigned(record)
        })
    }

    async fn remove(&self, user_id: UserId, role_id: RoleId) -> StoreResult<bool> {
        Ok(self.revoke(user_id, role_id).await? > 0)
    }
}
