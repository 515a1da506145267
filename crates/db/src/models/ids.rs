use std::collections::HashMap;

use sea_orm::{ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QuerySelect};
use uuid::Uuid;

use crate::{
    entities::{task, team, user, workspace},
    scope::WorkspaceScope,
};

pub async fn workspace_id_by_uuid<C: ConnectionTrait>(
    db: &C,
    uuid: Uuid,
) -> Result<Option<i64>, DbErr> {
    workspace::Entity::find()
        .select_only()
        .column(workspace::Column::Id)
        .filter(workspace::Column::Uuid.eq(uuid))
        .into_tuple()
        .one(db)
        .await
}

pub async fn workspace_uuid_by_id<C: ConnectionTrait>(
    db: &C,
    id: i64,
) -> Result<Option<Uuid>, DbErr> {
    workspace::Entity::find()
        .select_only()
        .column(workspace::Column::Uuid)
        .filter(workspace::Column::Id.eq(id))
        .into_tuple()
        .one(db)
        .await
}

pub async fn user_uuid_by_id<C: ConnectionTrait>(
    db: &C,
    id: i64,
) -> Result<Option<Uuid>, DbErr> {
    user::Entity::find()
        .select_only()
        .column(user::Column::Uuid)
        .filter(user::Column::Id.eq(id))
        .into_tuple()
        .one(db)
        .await
}

pub async fn user_id_in_scope<C: ConnectionTrait>(
    db: &C,
    scope: &WorkspaceScope,
    uuid: Uuid,
) -> Result<Option<i64>, DbErr> {
    user::Entity::find()
        .select_only()
        .column(user::Column::Id)
        .filter(user::Column::Uuid.eq(uuid))
        .filter(user::Column::WorkspaceId.eq(scope.row_id))
        .into_tuple()
        .one(db)
        .await
}

/// Resolves user uuids inside the workspace. Uuids that are unknown or
/// belong to another tenant are absent from the result.
pub async fn user_ids_in_scope<C: ConnectionTrait>(
    db: &C,
    scope: &WorkspaceScope,
    uuids: &[Uuid],
) -> Result<HashMap<Uuid, i64>, DbErr> {
    if uuids.is_empty() {
        return Ok(HashMap::new());
    }
    let rows: Vec<(i64, Uuid)> = user::Entity::find()
        .select_only()
        .column(user::Column::Id)
        .column(user::Column::Uuid)
        .filter(user::Column::Uuid.is_in(uuids.to_vec()))
        .filter(user::Column::WorkspaceId.eq(scope.row_id))
        .into_tuple()
        .all(db)
        .await?;
    Ok(rows.into_iter().map(|(id, uuid)| (uuid, id)).collect())
}

pub async fn user_uuids_by_ids<C: ConnectionTrait>(
    db: &C,
    ids: &[i64],
) -> Result<HashMap<i64, Uuid>, DbErr> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let rows: Vec<(i64, Uuid)> = user::Entity::find()
        .select_only()
        .column(user::Column::Id)
        .column(user::Column::Uuid)
        .filter(user::Column::Id.is_in(ids.to_vec()))
        .into_tuple()
        .all(db)
        .await?;
    Ok(rows.into_iter().collect())
}

pub async fn team_uuid_by_id<C: ConnectionTrait>(
    db: &C,
    id: i64,
) -> Result<Option<Uuid>, DbErr> {
    team::Entity::find()
        .select_only()
        .column(team::Column::Uuid)
        .filter(team::Column::Id.eq(id))
        .into_tuple()
        .one(db)
        .await
}

pub async fn team_id_in_scope<C: ConnectionTrait>(
    db: &C,
    scope: &WorkspaceScope,
    uuid: Uuid,
) -> Result<Option<i64>, DbErr> {
    team::Entity::find()
        .select_only()
        .column(team::Column::Id)
        .filter(team::Column::Uuid.eq(uuid))
        .filter(team::Column::WorkspaceId.eq(scope.row_id))
        .into_tuple()
        .one(db)
        .await
}

pub async fn task_uuid_by_id<C: ConnectionTrait>(
    db: &C,
    id: i64,
) -> Result<Option<Uuid>, DbErr> {
    task::Entity::find()
        .select_only()
        .column(task::Column::Uuid)
        .filter(task::Column::Id.eq(id))
        .into_tuple()
        .one(db)
        .await
}

pub async fn task_id_in_scope<C: ConnectionTrait>(
    db: &C,
    scope: &WorkspaceScope,
    uuid: Uuid,
) -> Result<Option<i64>, DbErr> {
    task::Entity::find()
        .select_only()
        .column(task::Column::Id)
        .filter(task::Column::Uuid.eq(uuid))
        .filter(task::Column::WorkspaceId.eq(scope.row_id))
        .into_tuple()
        .one(db)
        .await
}

/// Converts an optional row id into its uuid, treating a dangling id as absent.
pub(crate) async fn optional_user_uuid<C: ConnectionTrait>(
    db: &C,
    id: Option<i64>,
) -> Result<Option<Uuid>, DbErr> {
    match id {
        Some(id) => user_uuid_by_id(db, id).await,
        None => Ok(None),
    }
}

pub(crate) async fn optional_team_uuid<C: ConnectionTrait>(
    db: &C,
    id: Option<i64>,
) -> Result<Option<Uuid>, DbErr> {
    match id {
        Some(id) => team_uuid_by_id(db, id).await,
        None => Ok(None),
    }
}
