use std::collections::HashMap;

use chrono::{DateTime, Utc};
use protocol::{TaskAudience, TaskPriority, TaskStatus, TaskVisibility};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DbErr, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, sea_query::Query,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;
use utils::serde_helpers::double_option;
use uuid::Uuid;

use crate::{
    entities::{notification, task, task_assignee, task_comment},
    models::{ids, parse_enum},
    scope::WorkspaceScope,
};

#[derive(Debug, Error)]
pub enum TaskError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error("Task not found")]
    TaskNotFound,
    #[error("Assignee {0} not found in this workspace")]
    AssigneeNotFound(Uuid),
    #[error("Team not found")]
    TeamNotFound,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct Task {
    pub id: Uuid,
    pub workspace_id: Option<Uuid>,
    pub team_id: Option<Uuid>,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub assigned_to: Vec<Uuid>,
    #[ts(type = "Date | null")]
    pub due_date: Option<DateTime<Utc>>,
    pub created_by: Option<Uuid>,
    #[ts(type = "Date")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "Date")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct CreateTask {
    pub title: String,
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    #[serde(default)]
    pub assigned_to: Vec<Uuid>,
    pub team_id: Option<Uuid>,
    #[ts(type = "Date | null")]
    pub due_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct UpdateTask {
    pub title: Option<String>,
    #[serde(
        default,
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    #[ts(optional, type = "string | null")]
    pub description: Option<Option<String>>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub assigned_to: Option<Vec<Uuid>>,
    #[serde(
        default,
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    #[ts(optional, type = "string | null")]
    pub team_id: Option<Option<Uuid>>,
    #[serde(
        default,
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    #[ts(optional, type = "Date | null")]
    pub due_date: Option<Option<DateTime<Utc>>>,
}

/// Server-side list filters; the client narrows further on its own copy.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct TaskQuery {
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub team_id: Option<Uuid>,
    pub assigned_to: Option<Uuid>,
    pub search: Option<String>,
}

/// Who is looking, resolved to row ids once per request.
#[derive(Debug, Clone, Copy)]
pub struct TaskViewer {
    pub user_row_id: i64,
    pub team_row_id: Option<i64>,
    pub visibility: TaskVisibility,
}

impl Task {
    pub fn audience(&self) -> TaskAudience {
        TaskAudience::new(self.team_id, self.assigned_to.iter().copied(), self.created_by)
    }

    async fn assignee_row_ids<C: ConnectionTrait>(db: &C, task_row_id: i64) -> Result<Vec<i64>, DbErr> {
        task_assignee::Entity::find()
            .select_only()
            .column(task_assignee::Column::UserId)
            .filter(task_assignee::Column::TaskId.eq(task_row_id))
            .order_by_asc(task_assignee::Column::Id)
            .into_tuple()
            .all(db)
            .await
    }

    async fn from_model<C: ConnectionTrait>(db: &C, model: task::Model) -> Result<Self, DbErr> {
        let workspace_id = match model.workspace_id {
            Some(id) => ids::workspace_uuid_by_id(db, id).await?,
            None => None,
        };
        let assignees = Self::assignee_row_ids(db, model.id).await?;
        let mut lookup = assignees.clone();
        lookup.extend(model.created_by);
        let uuids = ids::user_uuids_by_ids(db, &lookup).await?;

        Ok(Self {
            id: model.uuid,
            workspace_id,
            team_id: ids::optional_team_uuid(db, model.team_id).await?,
            title: model.title,
            description: model.description,
            status: parse_enum("status", &model.status)?,
            priority: parse_enum("priority", &model.priority)?,
            assigned_to: assignees
                .iter()
                .filter_map(|id| uuids.get(id).copied())
                .collect(),
            due_date: model.due_date.map(Into::into),
            created_by: model.created_by.and_then(|id| uuids.get(&id).copied()),
            created_at: model.created_at.into(),
            updated_at: model.updated_at.into(),
        })
    }

    pub(crate) async fn find_model<C: ConnectionTrait>(
        db: &C,
        scope: &WorkspaceScope,
        id: Uuid,
    ) -> Result<Option<task::Model>, DbErr> {
        task::Entity::find()
            .filter(task::Column::Uuid.eq(id))
            .filter(task::Column::WorkspaceId.eq(scope.row_id))
            .one(db)
            .await
    }

    fn visibility_condition(viewer: &TaskViewer) -> Option<Condition> {
        let assigned_to_viewer = task::Column::Id.in_subquery(
            Query::select()
                .column(task_assignee::Column::TaskId)
                .from(task_assignee::Entity)
                .and_where(task_assignee::Column::UserId.eq(viewer.user_row_id))
                .to_owned(),
        );
        let own = Condition::any()
            .add(assigned_to_viewer)
            .add(task::Column::CreatedBy.eq(viewer.user_row_id));

        match viewer.visibility {
            TaskVisibility::Workspace => None,
            TaskVisibility::Own => Some(own),
            TaskVisibility::Team => Some(match viewer.team_row_id {
                Some(team_row_id) => own.add(task::Column::TeamId.eq(team_row_id)),
                None => own,
            }),
        }
    }

    /// Tasks the viewer may see, newest first.
    pub async fn find_visible<C: ConnectionTrait>(
        db: &C,
        scope: &WorkspaceScope,
        viewer: &TaskViewer,
        query: &TaskQuery,
    ) -> Result<Vec<Self>, DbErr> {
        let mut select = task::Entity::find().filter(task::Column::WorkspaceId.eq(scope.row_id));
        if let Some(condition) = Self::visibility_condition(viewer) {
            select = select.filter(condition);
        }
        if let Some(status) = query.status {
            select = select.filter(task::Column::Status.eq(status.to_string()));
        }
        if let Some(priority) = query.priority {
            select = select.filter(task::Column::Priority.eq(priority.to_string()));
        }
        if let Some(team_id) = query.team_id {
            match ids::team_id_in_scope(db, scope, team_id).await? {
                Some(team_row_id) => select = select.filter(task::Column::TeamId.eq(team_row_id)),
                None => return Ok(Vec::new()),
            }
        }
        if let Some(assignee) = query.assigned_to {
            let Some(user_row_id) = ids::user_id_in_scope(db, scope, assignee).await? else {
                return Ok(Vec::new());
            };
            select = select.filter(
                task::Column::Id.in_subquery(
                    Query::select()
                        .column(task_assignee::Column::TaskId)
                        .from(task_assignee::Entity)
                        .and_where(task_assignee::Column::UserId.eq(user_row_id))
                        .to_owned(),
                ),
            );
        }
        if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            select = select.filter(
                Condition::any()
                    .add(task::Column::Title.contains(search))
                    .add(task::Column::Description.contains(search)),
            );
        }

        let models = select
            .order_by_desc(task::Column::CreatedAt)
            .order_by_desc(task::Column::Id)
            .all(db)
            .await?;
        let mut tasks = Vec::with_capacity(models.len());
        for model in models {
            tasks.push(Self::from_model(db, model).await?);
        }
        Ok(tasks)
    }

    /// Any task in the workspace, regardless of role visibility.
    pub async fn find_by_id<C: ConnectionTrait>(
        db: &C,
        scope: &WorkspaceScope,
        id: Uuid,
    ) -> Result<Option<Self>, DbErr> {
        match Self::find_model(db, scope, id).await? {
            Some(model) => Ok(Some(Self::from_model(db, model).await?)),
            None => Ok(None),
        }
    }

    /// `None` both for missing tasks and tasks hidden from this viewer.
    pub async fn find_visible_by_id<C: ConnectionTrait>(
        db: &C,
        scope: &WorkspaceScope,
        viewer: &TaskViewer,
        id: Uuid,
    ) -> Result<Option<Self>, DbErr> {
        let mut select = task::Entity::find()
            .filter(task::Column::Uuid.eq(id))
            .filter(task::Column::WorkspaceId.eq(scope.row_id));
        if let Some(condition) = Self::visibility_condition(viewer) {
            select = select.filter(condition);
        }
        match select.one(db).await? {
            Some(model) => Ok(Some(Self::from_model(db, model).await?)),
            None => Ok(None),
        }
    }

    pub async fn count<C: ConnectionTrait>(db: &C, scope: &WorkspaceScope) -> Result<u64, DbErr> {
        task::Entity::find()
            .filter(task::Column::WorkspaceId.eq(scope.row_id))
            .count(db)
            .await
    }

    async fn resolve_assignees<C: ConnectionTrait>(
        db: &C,
        scope: &WorkspaceScope,
        assignees: &[Uuid],
    ) -> Result<Vec<i64>, TaskError> {
        let found = ids::user_ids_in_scope(db, scope, assignees).await?;
        let mut rows = Vec::with_capacity(assignees.len());
        for assignee in assignees {
            let row_id = *found
                .get(assignee)
                .ok_or(TaskError::AssigneeNotFound(*assignee))?;
            if !rows.contains(&row_id) {
                rows.push(row_id);
            }
        }
        Ok(rows)
    }

    async fn resolve_team<C: ConnectionTrait>(
        db: &C,
        scope: &WorkspaceScope,
        team_id: Option<Uuid>,
    ) -> Result<Option<i64>, TaskError> {
        match team_id {
            Some(id) => Ok(Some(
                ids::team_id_in_scope(db, scope, id)
                    .await?
                    .ok_or(TaskError::TeamNotFound)?,
            )),
            None => Ok(None),
        }
    }

    async fn insert_assignees<C: ConnectionTrait>(
        db: &C,
        task_row_id: i64,
        user_row_ids: &[i64],
    ) -> Result<(), DbErr> {
        if user_row_ids.is_empty() {
            return Ok(());
        }
        let now = Utc::now();
        task_assignee::Entity::insert_many(user_row_ids.iter().map(|user_row_id| {
            task_assignee::ActiveModel {
                task_id: Set(task_row_id),
                user_id: Set(*user_row_id),
                created_at: Set(now.into()),
                ..Default::default()
            }
        }))
        .exec(db)
        .await?;
        Ok(())
    }

    pub async fn create<C: ConnectionTrait>(
        db: &C,
        scope: &WorkspaceScope,
        created_by: i64,
        data: &CreateTask,
    ) -> Result<Self, TaskError> {
        let assignees = Self::resolve_assignees(db, scope, &data.assigned_to).await?;
        let team_row_id = Self::resolve_team(db, scope, data.team_id).await?;

        let now = Utc::now();
        let active = task::ActiveModel {
            uuid: Set(Uuid::new_v4()),
            workspace_id: Set(Some(scope.row_id)),
            team_id: Set(team_row_id),
            created_by: Set(Some(created_by)),
            title: Set(data.title.trim().to_string()),
            description: Set(data.description.clone()),
            status: Set(data.status.unwrap_or_default().to_string()),
            priority: Set(data.priority.unwrap_or_default().to_string()),
            due_date: Set(data.due_date.map(Into::into)),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
            ..Default::default()
        };
        let model = active.insert(db).await?;
        Self::insert_assignees(db, model.id, &assignees).await?;
        Ok(Self::from_model(db, model).await?)
    }

    /// Applies a partial update and returns `(before, after)` for diffing.
    pub async fn update<C: ConnectionTrait>(
        db: &C,
        scope: &WorkspaceScope,
        id: Uuid,
        data: &UpdateTask,
    ) -> Result<(Self, Self), TaskError> {
        let record = Self::find_model(db, scope, id)
            .await?
            .ok_or(TaskError::TaskNotFound)?;
        let before = Self::from_model(db, record.clone()).await?;
        let task_row_id = record.id;

        let mut active: task::ActiveModel = record.into();
        if let Some(title) = &data.title {
            active.title = Set(title.trim().to_string());
        }
        if let Some(description) = &data.description {
            active.description = Set(description.clone());
        }
        if let Some(status) = data.status {
            active.status = Set(status.to_string());
        }
        if let Some(priority) = data.priority {
            active.priority = Set(priority.to_string());
        }
        if let Some(team_id) = data.team_id {
            active.team_id = Set(Self::resolve_team(db, scope, team_id).await?);
        }
        if let Some(due_date) = data.due_date {
            active.due_date = Set(due_date.map(Into::into));
        }
        if let Some(assigned_to) = &data.assigned_to {
            let wanted = Self::resolve_assignees(db, scope, assigned_to).await?;
            task_assignee::Entity::delete_many()
                .filter(task_assignee::Column::TaskId.eq(task_row_id))
                .exec(db)
                .await?;
            Self::insert_assignees(db, task_row_id, &wanted).await?;
        }
        active.updated_at = Set(Utc::now().into());
        let updated = active.update(db).await?;

        Ok((before, Self::from_model(db, updated).await?))
    }

    /// Removes the task with its comments and assignee rows; notifications
    /// keep their text but lose the task link.
    pub async fn delete<C: ConnectionTrait>(
        db: &C,
        scope: &WorkspaceScope,
        id: Uuid,
    ) -> Result<u64, DbErr> {
        let Some(record) = Self::find_model(db, scope, id).await? else {
            return Ok(0);
        };
        task_comment::Entity::delete_many()
            .filter(task_comment::Column::TaskId.eq(record.id))
            .exec(db)
            .await?;
        task_assignee::Entity::delete_many()
            .filter(task_assignee::Column::TaskId.eq(record.id))
            .exec(db)
            .await?;
        notification::Entity::update_many()
            .col_expr(
                notification::Column::TaskId,
                sea_orm::sea_query::Expr::value(None::<i64>),
            )
            .filter(notification::Column::TaskId.eq(record.id))
            .exec(db)
            .await?;
        let result = task::Entity::delete_by_id(record.id).exec(db).await?;
        Ok(result.rows_affected)
    }

    /// Task counts per status, for dashboards.
    pub async fn status_counts<C: ConnectionTrait>(
        db: &C,
        scope: &WorkspaceScope,
    ) -> Result<HashMap<TaskStatus, u64>, DbErr> {
        let statuses: Vec<String> = task::Entity::find()
            .select_only()
            .column(task::Column::Status)
            .filter(task::Column::WorkspaceId.eq(scope.row_id))
            .into_tuple()
            .all(db)
            .await?;
        let mut counts = HashMap::new();
        for status in statuses {
            *counts.entry(parse_enum("status", &status)?).or_insert(0) += 1;
        }
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use protocol::Role;

    use super::*;
    use crate::{
        models::{
            fixtures,
            team::{CreateTeam, Team},
            user::User,
        },
        test_utils::setup_db,
    };

    async fn row_id(db: &sea_orm::DatabaseConnection, scope: &WorkspaceScope, user: &User) -> i64 {
        ids::user_id_in_scope(db, scope, user.id).await.unwrap().unwrap()
    }

    fn viewer(user_row_id: i64, team_row_id: Option<i64>, visibility: TaskVisibility) -> TaskViewer {
        TaskViewer { user_row_id, team_row_id, visibility }
    }

    #[tokio::test]
    async fn tasks_never_leak_across_workspaces() {
        let db = setup_db().await;
        let w1 = fixtures::workspace(&db, "One").await;
        let w2 = fixtures::workspace(&db, "Two").await;
        let ana = fixtures::user(&db, &w1, "ana@one.io", Role::Admin).await;
        let eve = fixtures::user(&db, &w2, "eve@two.io", Role::Admin).await;
        let ana_row = row_id(&db, &w1, &ana).await;
        let eve_row = row_id(&db, &w2, &eve).await;

        let task = Task::create(
            &db,
            &w1,
            ana_row,
            &CreateTask { title: "Ship it".into(), ..Default::default() },
        )
        .await
        .unwrap();
        assert_eq!(task.status, TaskStatus::Todo);
        assert_eq!(task.priority, TaskPriority::Medium);

        let eve_view = viewer(eve_row, None, TaskVisibility::Workspace);
        assert!(
            Task::find_visible(&db, &w2, &eve_view, &TaskQuery::default())
                .await
                .unwrap()
                .is_empty()
        );
        assert!(Task::find_visible_by_id(&db, &w2, &eve_view, task.id).await.unwrap().is_none());
        assert_eq!(Task::delete(&db, &w2, task.id).await.unwrap(), 0);
        assert!(Task::find_by_id(&db, &w1, task.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn visibility_follows_role() {
        let db = setup_db().await;
        let scope = fixtures::workspace(&db, "One").await;
        let admin = fixtures::user(&db, &scope, "root@one.io", Role::Admin).await;
        let lead = fixtures::user(&db, &scope, "lead@one.io", Role::TeamLead).await;
        let member = fixtures::user(&db, &scope, "mo@one.io", Role::Member).await;
        let admin_row = row_id(&db, &scope, &admin).await;
        let lead_row = row_id(&db, &scope, &lead).await;
        let member_row = row_id(&db, &scope, &member).await;

        let team = Team::create(
            &db,
            &scope,
            None,
            &CreateTeam { name: "Ops".into(), members: vec![lead.id], ..Default::default() },
        )
        .await
        .unwrap();
        let team_row = ids::team_id_in_scope(&db, &scope, team.id).await.unwrap();

        Task::create(
            &db,
            &scope,
            admin_row,
            &CreateTask { title: "team work".into(), team_id: Some(team.id), ..Default::default() },
        )
        .await
        .unwrap();
        Task::create(
            &db,
            &scope,
            admin_row,
            &CreateTask {
                title: "for member".into(),
                assigned_to: vec![member.id],
                ..Default::default()
            },
        )
        .await
        .unwrap();
        Task::create(
            &db,
            &scope,
            admin_row,
            &CreateTask { title: "private".into(), ..Default::default() },
        )
        .await
        .unwrap();

        let all = TaskQuery::default();
        let count = |tasks: Vec<Task>| tasks.len();
        let admin_view = viewer(admin_row, None, TaskVisibility::Workspace);
        let lead_view = viewer(lead_row, team_row, TaskVisibility::Team);
        let member_view = viewer(member_row, None, TaskVisibility::Own);

        assert_eq!(count(Task::find_visible(&db, &scope, &admin_view, &all).await.unwrap()), 3);
        let lead_tasks = Task::find_visible(&db, &scope, &lead_view, &all).await.unwrap();
        assert_eq!(lead_tasks.len(), 1);
        assert_eq!(lead_tasks[0].title, "team work");
        let member_tasks = Task::find_visible(&db, &scope, &member_view, &all).await.unwrap();
        assert_eq!(member_tasks.len(), 1);
        assert_eq!(member_tasks[0].assigned_to, vec![member.id]);
    }

    #[tokio::test]
    async fn update_returns_before_and_after() {
        let db = setup_db().await;
        let scope = fixtures::workspace(&db, "One").await;
        let ana = fixtures::user(&db, &scope, "ana@one.io", Role::Admin).await;
        let bob = fixtures::user(&db, &scope, "bob@one.io", Role::Member).await;
        let ana_row = row_id(&db, &scope, &ana).await;
        let task = Task::create(
            &db,
            &scope,
            ana_row,
            &CreateTask {
                title: "Draft".into(),
                description: Some("first".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let (before, after) = Task::update(
            &db,
            &scope,
            task.id,
            &UpdateTask {
                status: Some(TaskStatus::Done),
                assigned_to: Some(vec![bob.id, bob.id]),
                description: Some(None),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(before.status, TaskStatus::Todo);
        assert!(before.assigned_to.is_empty());
        assert_eq!(after.status, TaskStatus::Done);
        assert_eq!(after.assigned_to, vec![bob.id]);
        assert_eq!(after.description, None);
        assert_eq!(after.title, "Draft");
    }

    #[tokio::test]
    async fn filters_and_unknown_assignees() {
        let db = setup_db().await;
        let scope = fixtures::workspace(&db, "One").await;
        let ana = fixtures::user(&db, &scope, "ana@one.io", Role::Admin).await;
        let ana_row = row_id(&db, &scope, &ana).await;
        for (title, priority) in [("Fix login", TaskPriority::Urgent), ("Write docs", TaskPriority::Low)] {
            Task::create(
                &db,
                &scope,
                ana_row,
                &CreateTask { title: title.into(), priority: Some(priority), ..Default::default() },
            )
            .await
            .unwrap();
        }
        let admin_view = viewer(ana_row, None, TaskVisibility::Workspace);

        let urgent = Task::find_visible(
            &db,
            &scope,
            &admin_view,
            &TaskQuery { priority: Some(TaskPriority::Urgent), ..Default::default() },
        )
        .await
        .unwrap();
        assert_eq!(urgent.len(), 1);
        let searched = Task::find_visible(
            &db,
            &scope,
            &admin_view,
            &TaskQuery { search: Some("docs".into()), ..Default::default() },
        )
        .await
        .unwrap();
        assert_eq!(searched[0].title, "Write docs");

        let stranger = Uuid::new_v4();
        assert!(matches!(
            Task::create(
                &db,
                &scope,
                ana_row,
                &CreateTask { title: "x".into(), assigned_to: vec![stranger], ..Default::default() },
            )
            .await,
            Err(TaskError::AssigneeNotFound(id)) if id == stranger
        ));

        let counts = Task::status_counts(&db, &scope).await.unwrap();
        assert_eq!(counts.get(&TaskStatus::Todo), Some(&2));
    }
}
