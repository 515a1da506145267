use sea_orm::{ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, sea_query::Expr};
use serde::Serialize;

use crate::{
    entities::{change_log, notification, task, task_comment, team, user},
    scope::WorkspaceScope,
};

/// Rows stamped by one backfill pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OrphanCounts {
    pub users: u64,
    pub tasks: u64,
    pub teams: u64,
    pub comments: u64,
    pub notifications: u64,
    pub change_logs: u64,
}

impl OrphanCounts {
    pub fn total(&self) -> u64 {
        self.users + self.tasks + self.teams + self.comments + self.notifications + self.change_logs
    }
}

/// Stamps every row with a NULL `workspace_id` into `scope`. Audit entries
/// only count when they predate the outbox.
pub async fn assign_orphans<C: ConnectionTrait>(
    db: &C,
    scope: &WorkspaceScope,
) -> Result<OrphanCounts, DbErr> {
    let target = Expr::value(scope.row_id);
    Ok(OrphanCounts {
        users: user::Entity::update_many()
            .col_expr(user::Column::WorkspaceId, target.clone())
            .filter(user::Column::WorkspaceId.is_null())
            .exec(db)
            .await?
            .rows_affected,
        tasks: task::Entity::update_many()
            .col_expr(task::Column::WorkspaceId, target.clone())
            .filter(task::Column::WorkspaceId.is_null())
            .exec(db)
            .await?
            .rows_affected,
        teams: team::Entity::update_many()
            .col_expr(team::Column::WorkspaceId, target.clone())
            .filter(team::Column::WorkspaceId.is_null())
            .exec(db)
            .await?
            .rows_affected,
        comments: task_comment::Entity::update_many()
            .col_expr(task_comment::Column::WorkspaceId, target.clone())
            .filter(task_comment::Column::WorkspaceId.is_null())
            .exec(db)
            .await?
            .rows_affected,
        notifications: notification::Entity::update_many()
            .col_expr(notification::Column::WorkspaceId, target.clone())
            .filter(notification::Column::WorkspaceId.is_null())
            .exec(db)
            .await?
            .rows_affected,
        change_logs: change_log::Entity::update_many()
            .col_expr(change_log::Column::WorkspaceId, target)
            .filter(change_log::Column::WorkspaceId.is_null())
            // Entries written through the outbox are platform audit, not legacy data.
            .filter(change_log::Column::SourceEventId.is_null())
            .exec(db)
            .await?
            .rows_affected,
    })
}
