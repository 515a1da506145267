use chrono::{DateTime, Utc};
use protocol::WorkspaceType;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set,
};
use sea_orm::sea_query::{Expr, Query};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;
use uuid::Uuid;

use crate::{
    entities::{
        change_log, notification, task, task_assignee, task_comment, team, team_member, user,
        workspace,
    },
    models::{ids, parse_enum},
    scope::WorkspaceScope,
};

#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error("Workspace not found")]
    WorkspaceNotFound,
    #[error("Owner not found")]
    OwnerNotFound,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
pub struct WorkspaceUsage {
    pub users: i32,
    pub tasks: i32,
    pub teams: i32,
}

/// `None` means unlimited.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
pub struct WorkspaceLimits {
    pub max_users: Option<i32>,
    pub max_tasks: Option<i32>,
    pub max_teams: Option<i32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsageCounter {
    Users,
    Tasks,
    Teams,
}

impl UsageCounter {
    pub fn label(&self) -> &'static str {
        match self {
            UsageCounter::Users => "users",
            UsageCounter::Tasks => "tasks",
            UsageCounter::Teams => "teams",
        }
    }
}

impl WorkspaceUsage {
    pub fn get(&self, counter: UsageCounter) -> i32 {
        match counter {
            UsageCounter::Users => self.users,
            UsageCounter::Tasks => self.tasks,
            UsageCounter::Teams => self.teams,
        }
    }
}

impl WorkspaceLimits {
    pub fn get(&self, counter: UsageCounter) -> Option<i32> {
        match counter {
            UsageCounter::Users => self.max_users,
            UsageCounter::Tasks => self.max_tasks,
            UsageCounter::Teams => self.max_teams,
        }
    }

    /// Whether `additional` more records fit under the limit.
    pub fn allows(&self, usage: &WorkspaceUsage, counter: UsageCounter, additional: i32) -> bool {
        match self.get(counter) {
            Some(max) => usage.get(counter) + additional <= max,
            None => true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct Workspace {
    pub id: Uuid,
    pub name: String,
    pub workspace_type: WorkspaceType,
    pub owner_id: Option<Uuid>,
    pub is_active: bool,
    pub usage: WorkspaceUsage,
    pub limits: WorkspaceLimits,
    #[ts(type = "Date")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "Date")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateWorkspace {
    pub name: String,
    pub workspace_type: Option<WorkspaceType>,
    pub owner_id: Option<Uuid>,
    pub limits: Option<WorkspaceLimits>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct UpdateWorkspace {
    pub name: Option<String>,
    pub limits: Option<WorkspaceLimits>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
pub struct DeletedCounts {
    pub users: u64,
    pub tasks: u64,
    pub teams: u64,
    pub comments: u64,
    pub notifications: u64,
    pub change_logs: u64,
}

impl Workspace {
    async fn from_model<C: ConnectionTrait>(
        db: &C,
        model: workspace::Model,
    ) -> Result<Self, DbErr> {
        let owner_id = ids::optional_user_uuid(db, model.owner_id).await?;
        Ok(Self {
            id: model.uuid,
            name: model.name,
            workspace_type: parse_enum("workspace_type", &model.workspace_type)?,
            owner_id,
            is_active: model.is_active,
            usage: WorkspaceUsage {
                users: model.usage_users,
                tasks: model.usage_tasks,
                teams: model.usage_teams,
            },
            limits: WorkspaceLimits {
                max_users: model.max_users,
                max_tasks: model.max_tasks,
                max_teams: model.max_teams,
            },
            created_at: model.created_at.into(),
            updated_at: model.updated_at.into(),
        })
    }

    pub async fn find_all<C: ConnectionTrait>(db: &C) -> Result<Vec<Self>, DbErr> {
        let models = workspace::Entity::find()
            .order_by_asc(workspace::Column::CreatedAt)
            .order_by_asc(workspace::Column::Id)
            .all(db)
            .await?;

        let mut workspaces = Vec::with_capacity(models.len());
        for model in models {
            workspaces.push(Self::from_model(db, model).await?);
        }
        Ok(workspaces)
    }

    pub async fn find_by_id<C: ConnectionTrait>(
        db: &C,
        id: Uuid,
    ) -> Result<Option<Self>, DbErr> {
        match Self::find_model(db, id).await? {
            Some(model) => Ok(Some(Self::from_model(db, model).await?)),
            None => Ok(None),
        }
    }

    pub async fn find_by_row_id<C: ConnectionTrait>(
        db: &C,
        row_id: i64,
    ) -> Result<Option<Self>, DbErr> {
        match workspace::Entity::find_by_id(row_id).one(db).await? {
            Some(model) => Ok(Some(Self::from_model(db, model).await?)),
            None => Ok(None),
        }
    }

    pub(crate) async fn find_model<C: ConnectionTrait>(
        db: &C,
        id: Uuid,
    ) -> Result<Option<workspace::Model>, DbErr> {
        workspace::Entity::find()
            .filter(workspace::Column::Uuid.eq(id))
            .one(db)
            .await
    }

    /// The oldest CORE workspace, which legacy rows are backfilled into.
    pub async fn find_primary_core<C: ConnectionTrait>(db: &C) -> Result<Option<Self>, DbErr> {
        let model = workspace::Entity::find()
            .filter(workspace::Column::WorkspaceType.eq(WorkspaceType::Core.to_string()))
            .order_by_asc(workspace::Column::CreatedAt)
            .order_by_asc(workspace::Column::Id)
            .one(db)
            .await?;
        match model {
            Some(model) => Ok(Some(Self::from_model(db, model).await?)),
            None => Ok(None),
        }
    }

    pub async fn create<C: ConnectionTrait>(
        db: &C,
        data: &CreateWorkspace,
    ) -> Result<Self, WorkspaceError> {
        let owner_row_id = match data.owner_id {
            Some(owner) => Some(
                crate::models::user::User::row_id_unscoped(db, owner)
                    .await?
                    .ok_or(WorkspaceError::OwnerNotFound)?,
            ),
            None => None,
        };
        let limits = data.limits.unwrap_or_default();
        let now = Utc::now();
        let active = workspace::ActiveModel {
            uuid: Set(Uuid::new_v4()),
            name: Set(data.name.trim().to_string()),
            workspace_type: Set(data.workspace_type.unwrap_or_default().to_string()),
            owner_id: Set(owner_row_id),
            is_active: Set(true),
            usage_users: Set(0),
            usage_tasks: Set(0),
            usage_teams: Set(0),
            max_users: Set(limits.max_users),
            max_tasks: Set(limits.max_tasks),
            max_teams: Set(limits.max_teams),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
            ..Default::default()
        };
        let model = active.insert(db).await?;
        Ok(Self::from_model(db, model).await?)
    }

    pub async fn update<C: ConnectionTrait>(
        db: &C,
        id: Uuid,
        data: &UpdateWorkspace,
    ) -> Result<Self, WorkspaceError> {
        let record = Self::find_model(db, id)
            .await?
            .ok_or(WorkspaceError::WorkspaceNotFound)?;

        let mut active: workspace::ActiveModel = record.into();
        if let Some(name) = &data.name {
            active.name = Set(name.trim().to_string());
        }
        if let Some(limits) = data.limits {
            active.max_users = Set(limits.max_users);
            active.max_tasks = Set(limits.max_tasks);
            active.max_teams = Set(limits.max_teams);
        }
        active.updated_at = Set(Utc::now().into());
        let updated = active.update(db).await?;
        Ok(Self::from_model(db, updated).await?)
    }

    pub async fn set_owner<C: ConnectionTrait>(
        db: &C,
        scope: &WorkspaceScope,
        owner_row_id: i64,
    ) -> Result<(), DbErr> {
        workspace::Entity::update_many()
            .col_expr(workspace::Column::OwnerId, Expr::value(owner_row_id))
            .filter(workspace::Column::Id.eq(scope.row_id))
            .exec(db)
            .await?;
        Ok(())
    }

    pub async fn set_active<C: ConnectionTrait>(
        db: &C,
        id: Uuid,
        is_active: bool,
    ) -> Result<Self, WorkspaceError> {
        let record = Self::find_model(db, id)
            .await?
            .ok_or(WorkspaceError::WorkspaceNotFound)?;
        let mut active: workspace::ActiveModel = record.into();
        active.is_active = Set(is_active);
        active.updated_at = Set(Utc::now().into());
        let updated = active.update(db).await?;
        Ok(Self::from_model(db, updated).await?)
    }

    pub async fn usage<C: ConnectionTrait>(
        db: &C,
        scope: &WorkspaceScope,
    ) -> Result<(WorkspaceUsage, WorkspaceLimits), DbErr> {
        let model = workspace::Entity::find_by_id(scope.row_id)
            .one(db)
            .await?
            .ok_or(DbErr::RecordNotFound("Workspace not found".to_string()))?;
        Ok((
            WorkspaceUsage {
                users: model.usage_users,
                tasks: model.usage_tasks,
                teams: model.usage_teams,
            },
            WorkspaceLimits {
                max_users: model.max_users,
                max_tasks: model.max_tasks,
                max_teams: model.max_teams,
            },
        ))
    }

    /// Moves one usage counter by `delta`, never below zero.
    pub async fn adjust_usage<C: ConnectionTrait>(
        db: &C,
        scope: &WorkspaceScope,
        counter: UsageCounter,
        delta: i32,
    ) -> Result<(), DbErr> {
        let Some(model) = workspace::Entity::find_by_id(scope.row_id).one(db).await? else {
            return Ok(());
        };
        let current = match counter {
            UsageCounter::Users => model.usage_users,
            UsageCounter::Tasks => model.usage_tasks,
            UsageCounter::Teams => model.usage_teams,
        };
        let next = (current + delta).max(0);
        let mut active: workspace::ActiveModel = model.into();
        match counter {
            UsageCounter::Users => active.usage_users = Set(next),
            UsageCounter::Tasks => active.usage_tasks = Set(next),
            UsageCounter::Teams => active.usage_teams = Set(next),
        }
        active.update(db).await?;
        Ok(())
    }

    /// Rewrites the usage counters from actual row counts.
    pub async fn recompute_usage<C: ConnectionTrait>(
        db: &C,
        scope: &WorkspaceScope,
    ) -> Result<WorkspaceUsage, DbErr> {
        let usage = WorkspaceUsage {
            users: count_i32(
                user::Entity::find()
                    .filter(user::Column::WorkspaceId.eq(scope.row_id))
                    .count(db)
                    .await?,
            ),
            tasks: count_i32(
                task::Entity::find()
                    .filter(task::Column::WorkspaceId.eq(scope.row_id))
                    .count(db)
                    .await?,
            ),
            teams: count_i32(
                team::Entity::find()
                    .filter(team::Column::WorkspaceId.eq(scope.row_id))
                    .count(db)
                    .await?,
            ),
        };

        workspace::Entity::update_many()
            .col_expr(workspace::Column::UsageUsers, Expr::value(usage.users))
            .col_expr(workspace::Column::UsageTasks, Expr::value(usage.tasks))
            .col_expr(workspace::Column::UsageTeams, Expr::value(usage.teams))
            .filter(workspace::Column::Id.eq(scope.row_id))
            .exec(db)
            .await?;
        Ok(usage)
    }

    /// Deletes the workspace with every user, task, team, comment and
    /// notification it owns. Changelog entries are detached, not deleted.
    /// Run inside a transaction.
    pub async fn delete_cascade<C: ConnectionTrait>(
        db: &C,
        id: Uuid,
    ) -> Result<Option<DeletedCounts>, DbErr> {
        let Some(model) = Self::find_model(db, id).await? else {
            return Ok(None);
        };
        let row_id = model.id;

        let notifications = notification::Entity::delete_many()
            .filter(notification::Column::WorkspaceId.eq(row_id))
            .exec(db)
            .await?
            .rows_affected;

        let comments = task_comment::Entity::delete_many()
            .filter(task_comment::Column::WorkspaceId.eq(row_id))
            .exec(db)
            .await?
            .rows_affected;

        task_assignee::Entity::delete_many()
            .filter(
                task_assignee::Column::TaskId.in_subquery(
                    Query::select()
                        .column(task::Column::Id)
                        .from(task::Entity)
                        .and_where(task::Column::WorkspaceId.eq(row_id))
                        .to_owned(),
                ),
            )
            .exec(db)
            .await?;

        let tasks = task::Entity::delete_many()
            .filter(task::Column::WorkspaceId.eq(row_id))
            .exec(db)
            .await?
            .rows_affected;

        team_member::Entity::delete_many()
            .filter(
                team_member::Column::TeamId.in_subquery(
                    Query::select()
                        .column(team::Column::Id)
                        .from(team::Entity)
                        .and_where(team::Column::WorkspaceId.eq(row_id))
                        .to_owned(),
                ),
            )
            .exec(db)
            .await?;

        let teams = team::Entity::delete_many()
            .filter(team::Column::WorkspaceId.eq(row_id))
            .exec(db)
            .await?
            .rows_affected;

        let users = user::Entity::delete_many()
            .filter(user::Column::WorkspaceId.eq(row_id))
            .exec(db)
            .await?
            .rows_affected;

        let change_logs = change_log::Entity::delete_many()
            .filter(change_log::Column::WorkspaceId.eq(row_id))
            .exec(db)
            .await?
            .rows_affected;

        workspace::Entity::delete_by_id(row_id).exec(db).await?;

        Ok(Some(DeletedCounts {
            users,
            tasks,
            teams,
            comments,
            notifications,
            change_logs,
        }))
    }
}

fn count_i32(count: u64) -> i32 {
    i32::try_from(count).unwrap_or(i32::MAX)
}

#[cfg(test)]
mod tests {
    use protocol::Role;

    use super::*;
    use crate::{
        models::{
            fixtures,
            task::{CreateTask, Task},
            team::{CreateTeam, Team},
        },
        test_utils::setup_db,
    };

    #[test]
    fn limits_only_bind_when_set() {
        let usage = WorkspaceUsage { users: 10, tasks: 0, teams: 3 };
        let limits = WorkspaceLimits { max_users: Some(10), max_tasks: None, max_teams: Some(4) };
        assert!(!limits.allows(&usage, UsageCounter::Users, 1));
        assert!(limits.allows(&usage, UsageCounter::Tasks, 1_000));
        assert!(limits.allows(&usage, UsageCounter::Teams, 1));
        assert!(!limits.allows(&usage, UsageCounter::Teams, 2));
    }

    #[tokio::test]
    async fn usage_adjusts_and_recomputes() {
        let db = setup_db().await;
        let scope = fixtures::workspace(&db, "Acme").await;
        fixtures::user(&db, &scope, "ana@acme.io", Role::Admin).await;

        Workspace::adjust_usage(&db, &scope, UsageCounter::Tasks, -3).await.unwrap();
        let (usage, _) = Workspace::usage(&db, &scope).await.unwrap();
        assert_eq!(usage.tasks, 0);

        let usage = Workspace::recompute_usage(&db, &scope).await.unwrap();
        assert_eq!(usage, WorkspaceUsage { users: 1, tasks: 0, teams: 0 });
    }

    #[tokio::test]
    async fn delete_cascade_removes_only_owned_rows() {
        let db = setup_db().await;
        let doomed = fixtures::workspace(&db, "Doomed").await;
        let kept = fixtures::workspace(&db, "Kept").await;

        let ana = fixtures::user(&db, &doomed, "ana@doomed.io", Role::Admin).await;
        let ana_row = ids::user_id_in_scope(&db, &doomed, ana.id).await.unwrap().unwrap();
        fixtures::user(&db, &doomed, "bob@doomed.io", Role::Member).await;
        let carol = fixtures::user(&db, &kept, "carol@kept.io", Role::Admin).await;
        let carol_row = ids::user_id_in_scope(&db, &kept, carol.id).await.unwrap().unwrap();

        Team::create(
            &db,
            &doomed,
            Some(ana_row),
            &CreateTeam { name: "Ops".into(), ..Default::default() },
        )
        .await
        .unwrap();
        for title in ["one", "two", "three"] {
            Task::create(
                &db,
                &doomed,
                ana_row,
                &CreateTask { title: title.into(), ..Default::default() },
            )
            .await
            .unwrap();
        }
        Task::create(
            &db,
            &kept,
            carol_row,
            &CreateTask { title: "survivor".into(), ..Default::default() },
        )
        .await
        .unwrap();

        let deleted = Workspace::delete_cascade(&db, doomed.uuid).await.unwrap().unwrap();
        assert_eq!(deleted.users, 2);
        assert_eq!(deleted.tasks, 3);
        assert_eq!(deleted.teams, 1);

        assert!(Workspace::find_by_id(&db, doomed.uuid).await.unwrap().is_none());
        assert_eq!(task::Entity::find().all(&db).await.unwrap().len(), 1);
        assert_eq!(user::Entity::find().all(&db).await.unwrap().len(), 1);
        assert!(Workspace::delete_cascade(&db, doomed.uuid).await.unwrap().is_none());
    }
}
