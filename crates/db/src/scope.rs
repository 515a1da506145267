use sea_orm::{ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QuerySelect};
use uuid::Uuid;

use crate::entities::workspace;

/// The tenant a query runs in. Every workspace-owned model function takes
/// one and filters on `workspace_id` itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkspaceScope {
    pub row_id: i64,
    pub uuid: Uuid,
}

impl WorkspaceScope {
    pub fn new(row_id: i64, uuid: Uuid) -> Self {
        Self { row_id, uuid }
    }

    pub async fn resolve<C: ConnectionTrait>(db: &C, uuid: Uuid) -> Result<Option<Self>, DbErr> {
        let row_id: Option<i64> = workspace::Entity::find()
            .select_only()
            .column(workspace::Column::Id)
            .filter(workspace::Column::Uuid.eq(uuid))
            .into_tuple()
            .one(db)
            .await?;
        Ok(row_id.map(|row_id| Self { row_id, uuid }))
    }

    pub async fn from_row_id<C: ConnectionTrait>(
        db: &C,
        row_id: i64,
    ) -> Result<Option<Self>, DbErr> {
        let uuid: Option<Uuid> = workspace::Entity::find()
            .select_only()
            .column(workspace::Column::Uuid)
            .filter(workspace::Column::Id.eq(row_id))
            .into_tuple()
            .one(db)
            .await?;
        Ok(uuid.map(|uuid| Self { row_id, uuid }))
    }
}
