use db::{
    ConnectionTrait, DBService, TransactionTrait, WorkspaceScope,
    events::ChangeLogDraft,
    models::workspace::{
        CreateWorkspace, DeletedCounts, UpdateWorkspace, UsageCounter, Workspace,
    },
};
use protocol::{
    Action, ChangeLogEventType, Resource, WorkspaceType,
    realtime::{WORKSPACE_CREATED, WORKSPACE_DELETED, WORKSPACE_UPDATED},
};
use serde::Serialize;
use ts_rs::TS;
use uuid::Uuid;

use super::{
    activity::{Activity, diff, snapshot},
    config::CommunityLimits,
    context::Actor,
    error::{Result, ServiceError},
};

#[derive(Debug, Clone, Serialize, TS)]
pub struct WorkspaceDeletion {
    pub workspace: Workspace,
    pub deleted: DeletedCounts,
}

/// Fails with `LimitReached` when `additional` more rows of `counter` would
/// exceed the workspace quota.
pub async fn ensure_capacity<C: ConnectionTrait>(
    db: &C,
    scope: &WorkspaceScope,
    counter: UsageCounter,
    additional: i32,
) -> Result<()> {
    let (usage, limits) = Workspace::usage(db, scope).await?;
    if limits.allows(&usage, counter, additional) {
        return Ok(());
    }
    Err(ServiceError::LimitReached {
        counter,
        limit: limits.get(counter).unwrap_or_default(),
    })
}

#[derive(Clone, Default)]
pub struct WorkspaceService;

impl WorkspaceService {
    pub fn new() -> Self {
        Self
    }

    fn manages(actor: &Actor, id: Uuid, action: Action) -> bool {
        actor.can(Resource::Platform, action)
            || (id == actor.workspace_id() && actor.can(Resource::Workspace, action))
    }

    pub async fn list(&self, db: &DBService, actor: &Actor) -> Result<Vec<Workspace>> {
        actor.require(Resource::Platform, Action::Read)?;
        Ok(Workspace::find_all(&db.pool).await?)
    }

    pub async fn get(&self, db: &DBService, actor: &Actor, id: Uuid) -> Result<Workspace> {
        if !Self::manages(actor, id, Action::Read) {
            return Err(ServiceError::NotFound("Workspace"));
        }
        Workspace::find_by_id(&db.pool, id)
            .await?
            .ok_or(ServiceError::NotFound("Workspace"))
    }

    pub async fn my_workspace(&self, db: &DBService, actor: &Actor) -> Result<Workspace> {
        self.get(db, actor, actor.workspace_id()).await
    }

    pub async fn create(
        &self,
        db: &DBService,
        actor: &Actor,
        data: &CreateWorkspace,
        community_limits: &CommunityLimits,
    ) -> Result<Workspace> {
        actor.require(Resource::Platform, Action::Create)?;
        if data.name.trim().is_empty() {
            return Err(ServiceError::Validation("Workspace name is required".to_string()));
        }
        let mut data = data.clone();
        if data.workspace_type.unwrap_or_default() == WorkspaceType::Community
            && data.limits.is_none()
        {
            data.limits = Some(community_limits.as_workspace_limits());
        }

        let tx = db.pool.begin().await?;
        let workspace = Workspace::create(&tx, &data).await?;
        Activity::new(WORKSPACE_CREATED, actor, "workspace", workspace.id)
            .entity(&workspace)?
            .changelog(
                ChangeLogDraft::new(
                    ChangeLogEventType::WorkspaceCreated,
                    "create",
                    format!("Created {} workspace {}", workspace.workspace_type, workspace.name),
                )
                .target(workspace.id, &workspace.name),
            )
            .enqueue(&tx)
            .await?;
        tx.commit().await?;

        tracing::info!(workspace_id = %workspace.id, "workspace created");
        Ok(workspace)
    }

    pub async fn update(
        &self,
        db: &DBService,
        actor: &Actor,
        id: Uuid,
        data: &UpdateWorkspace,
    ) -> Result<Workspace> {
        if !Self::manages(actor, id, Action::Update) {
            return Err(ServiceError::forbidden());
        }
        if matches!(data.name.as_deref(), Some(name) if name.trim().is_empty()) {
            return Err(ServiceError::Validation("Workspace name is required".to_string()));
        }
        // Quotas are a platform decision.
        if data.limits.is_some() && !actor.can(Resource::Platform, Action::Update) {
            return Err(ServiceError::forbidden());
        }

        let tx = db.pool.begin().await?;
        let before = Workspace::find_by_id(&tx, id)
            .await?
            .ok_or(ServiceError::NotFound("Workspace"))?;
        let workspace = Workspace::update(&tx, id, data).await?;
        Activity::new(WORKSPACE_UPDATED, actor, "workspace", workspace.id)
            .in_workspace(Some(workspace.id))
            .entity(&workspace)?
            .changelog(
                ChangeLogDraft::new(
                    ChangeLogEventType::WorkspaceUpdated,
                    "update",
                    format!("Updated workspace {}", workspace.name),
                )
                .target(workspace.id, &workspace.name)
                .changes(diff(&snapshot(&before)?, &snapshot(&workspace)?)),
            )
            .enqueue(&tx)
            .await?;
        tx.commit().await?;
        Ok(workspace)
    }

    pub async fn toggle_status(&self, db: &DBService, actor: &Actor, id: Uuid) -> Result<Workspace> {
        actor.require(Resource::Platform, Action::ToggleStatus)?;
        if id == actor.workspace_id() {
            return Err(ServiceError::Conflict(
                "You cannot deactivate your own workspace".to_string(),
            ));
        }

        let tx = db.pool.begin().await?;
        let current = Workspace::find_by_id(&tx, id)
            .await?
            .ok_or(ServiceError::NotFound("Workspace"))?;
        let workspace = Workspace::set_active(&tx, id, !current.is_active).await?;
        let (event_type, verb) = if workspace.is_active {
            (ChangeLogEventType::WorkspaceActivated, "Activated")
        } else {
            (ChangeLogEventType::WorkspaceDeactivated, "Deactivated")
        };
        Activity::new(WORKSPACE_UPDATED, actor, "workspace", workspace.id)
            .entity(&workspace)?
            .changelog(
                ChangeLogDraft::new(
                    event_type,
                    "toggle_status",
                    format!("{verb} workspace {}", workspace.name),
                )
                .target(workspace.id, &workspace.name),
            )
            .enqueue(&tx)
            .await?;
        tx.commit().await?;

        tracing::info!(workspace_id = %workspace.id, is_active = workspace.is_active, "workspace status toggled");
        Ok(workspace)
    }

    /// Platform deletion of another workspace. The audit entry lands in the
    /// acting admin's workspace.
    pub async fn delete(&self, db: &DBService, actor: &Actor, id: Uuid) -> Result<WorkspaceDeletion> {
        actor.require(Resource::Platform, Action::Delete)?;
        if id == actor.workspace_id() {
            return Err(ServiceError::Conflict(
                "You cannot delete your own workspace".to_string(),
            ));
        }
        self.delete_cascade(db, actor, id, Some(actor.workspace_id())).await
    }

    /// Self-service deletion by a community admin. The audit entry has no
    /// workspace left to live in.
    pub async fn delete_my_workspace(&self, db: &DBService, actor: &Actor) -> Result<WorkspaceDeletion> {
        actor.require(Resource::Workspace, Action::Delete)?;
        self.delete_cascade(db, actor, actor.workspace_id(), None).await
    }

    async fn delete_cascade(
        &self,
        db: &DBService,
        actor: &Actor,
        id: Uuid,
        audit_workspace: Option<Uuid>,
    ) -> Result<WorkspaceDeletion> {
        let tx = db.pool.begin().await?;
        let workspace = Workspace::find_by_id(&tx, id)
            .await?
            .ok_or(ServiceError::NotFound("Workspace"))?;
        let deleted = Workspace::delete_cascade(&tx, id)
            .await?
            .ok_or(ServiceError::NotFound("Workspace"))?;

        let draft = ChangeLogDraft::new(
            ChangeLogEventType::WorkspaceDeleted,
            "delete",
            format!(
                "Deleted workspace {} ({} users, {} tasks, {} teams)",
                workspace.name, deleted.users, deleted.tasks, deleted.teams
            ),
        )
        .target(workspace.id, &workspace.name)
        .metadata(snapshot(&deleted)?);
        Activity::new(WORKSPACE_DELETED, actor, "workspace", workspace.id)
            .in_workspace(audit_workspace.or(Some(workspace.id)))
            .changelog(draft)
            .enqueue(&tx)
            .await?;
        tx.commit().await?;

        tracing::info!(
            workspace_id = %workspace.id,
            users = deleted.users,
            tasks = deleted.tasks,
            teams = deleted.teams,
            "workspace deleted"
        );
        Ok(WorkspaceDeletion { workspace, deleted })
    }
}
