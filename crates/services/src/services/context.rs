use db::{
    ConnectionTrait, WorkspaceScope,
    events::ActorRef,
    models::{
        task::TaskViewer,
        user::{User, UserRecord},
        workspace::Workspace,
    },
};
use protocol::{Action, Resource, Role, Subscriber, WorkspaceType, authorize, task_visibility};
use uuid::Uuid;

use super::error::{Result, ServiceError};

/// The authenticated user a service call acts on behalf of.
#[derive(Debug, Clone)]
pub struct Actor {
    pub user: User,
    pub row_id: i64,
    pub team_row_id: Option<i64>,
    pub scope: WorkspaceScope,
    pub workspace_type: WorkspaceType,
}

impl Actor {
    pub fn new(record: UserRecord, scope: WorkspaceScope, workspace_type: WorkspaceType) -> Self {
        Self {
            user: record.user,
            row_id: record.row_id,
            team_row_id: record.team_row_id,
            scope,
            workspace_type,
        }
    }

    /// Resolves a session subject (email) into an actor. Fails for unknown
    /// or deactivated users and for users of an inactive workspace.
    pub async fn resolve<C: ConnectionTrait>(db: &C, email: &str) -> Result<(Self, Workspace)> {
        let record = User::find_record_by_email(db, email)
            .await?
            .ok_or_else(|| ServiceError::Unauthorized("Unknown user".to_string()))?;
        if !record.user.is_active {
            return Err(ServiceError::Unauthorized("User is deactivated".to_string()));
        }
        let workspace_row_id = record.workspace_row_id.ok_or_else(|| {
            ServiceError::Forbidden("User is not assigned to a workspace".to_string())
        })?;
        let workspace = Workspace::find_by_row_id(db, workspace_row_id)
            .await?
            .ok_or(ServiceError::NotFound("Workspace"))?;
        if !workspace.is_active {
            return Err(ServiceError::Forbidden("Workspace is inactive".to_string()));
        }
        let scope = WorkspaceScope::new(workspace_row_id, workspace.id);
        Ok((Self::new(record, scope, workspace.workspace_type), workspace))
    }

    pub fn id(&self) -> Uuid {
        self.user.id
    }

    pub fn role(&self) -> Role {
        self.user.role
    }

    pub fn workspace_id(&self) -> Uuid {
        self.scope.uuid
    }

    pub fn can(&self, resource: Resource, action: Action) -> bool {
        authorize(self.user.role, self.workspace_type, resource, action)
    }

    pub fn require(&self, resource: Resource, action: Action) -> Result<()> {
        if self.can(resource, action) {
            Ok(())
        } else {
            tracing::debug!(
                user_id = %self.user.id,
                role = %self.user.role,
                %resource,
                %action,
                "permission denied"
            );
            Err(ServiceError::forbidden())
        }
    }

    pub fn actor_ref(&self) -> ActorRef {
        ActorRef {
            id: self.user.id,
            name: self.user.name.clone(),
            email: self.user.email.clone(),
            role: self.user.role,
        }
    }

    /// The realtime identity of this session.
    pub fn subscriber(&self) -> Subscriber {
        Subscriber {
            workspace_id: self.workspace_id(),
            user_id: self.user.id,
            team_id: self.user.team_id,
            role: self.user.role,
            tier: self.workspace_type,
        }
    }

    pub fn task_viewer(&self) -> TaskViewer {
        TaskViewer {
            user_row_id: self.row_id,
            team_row_id: self.team_row_id,
            visibility: task_visibility(self.user.role),
        }
    }
}
