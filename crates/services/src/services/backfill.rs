//! One-shot move of a single-tenant install into the CORE workspace.

use db::{
    DBService, TransactionTrait, WorkspaceScope,
    models::{
        backfill::{OrphanCounts, assign_orphans},
        user::User,
        workspace::{CreateWorkspace, Workspace, WorkspaceUsage},
    },
};
use protocol::WorkspaceType;
use serde::Serialize;

use super::error::{Result, ServiceError};

#[derive(Debug, Clone, Serialize)]
pub struct BackfillReport {
    pub workspace: Workspace,
    pub created_workspace: bool,
    pub assigned: OrphanCounts,
    pub usage: WorkspaceUsage,
    pub users_without_workspace: u64,
}

/// Finds or creates the CORE workspace, stamps every row without a
/// workspace into it and recomputes its usage. Safe to run repeatedly.
pub async fn migrate_to_workspaces(db: &DBService, company_name: &str) -> Result<BackfillReport> {
    let tx = db.pool.begin().await?;

    let (workspace, created_workspace) = match Workspace::find_primary_core(&tx).await? {
        Some(workspace) => {
            tracing::info!(workspace_id = %workspace.id, name = %workspace.name, "using existing CORE workspace");
            (workspace, false)
        }
        None => {
            let workspace = Workspace::create(
                &tx,
                &CreateWorkspace {
                    name: company_name.to_string(),
                    workspace_type: Some(WorkspaceType::Core),
                    owner_id: None,
                    limits: None,
                },
            )
            .await?;
            tracing::info!(workspace_id = %workspace.id, name = %workspace.name, "created CORE workspace");
            (workspace, true)
        }
    };
    let scope = WorkspaceScope::resolve(&tx, workspace.id)
        .await?
        .ok_or(ServiceError::NotFound("Workspace"))?;

    if workspace.owner_id.is_none()
        && let Some(owner_row_id) = User::oldest_admin_row_id(&tx).await?
    {
        Workspace::set_owner(&tx, &scope, owner_row_id).await?;
        tracing::info!(owner_row_id, "assigned workspace owner");
    }

    let assigned = assign_orphans(&tx, &scope).await?;
    tracing::info!(
        users = assigned.users,
        tasks = assigned.tasks,
        teams = assigned.teams,
        comments = assigned.comments,
        notifications = assigned.notifications,
        change_logs = assigned.change_logs,
        "assigned rows without a workspace"
    );
    let usage = Workspace::recompute_usage(&tx, &scope).await?;
    tx.commit().await?;

    let users_without_workspace = User::count_without_workspace(&db.pool).await?;
    let workspace = Workspace::find_by_id(&db.pool, workspace.id)
        .await?
        .ok_or(ServiceError::NotFound("Workspace"))?;
    tracing::info!(
        users = usage.users,
        tasks = usage.tasks,
        teams = usage.teams,
        users_without_workspace,
        "backfill complete"
    );

    Ok(BackfillReport {
        workspace,
        created_workspace,
        assigned,
        usage,
        users_without_workspace,
    })
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use db::{
        entities::{task, user},
        models::{
            change_log::{ChangeLog, ChangeLogFilter},
            task::CreateTask,
        },
    };
    use protocol::Role;
    use sea_orm::{ActiveModelTrait, Set};
    use uuid::Uuid;

    use super::*;
    use crate::services::{
        context::Actor, tasks::TaskService, test_utils, workspaces::WorkspaceService,
    };

    async fn legacy_user(db: &DBService, email: &str, role: Role) {
        let now = Utc::now();
        user::ActiveModel {
            uuid: Set(Uuid::new_v4()),
            workspace_id: Set(None),
            team_id: Set(None),
            name: Set(email.to_string()),
            email: Set(email.to_string()),
            role: Set(role.to_string()),
            profile_picture: Set(None),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&db.pool)
        .await
        .unwrap();
    }

    async fn legacy_task(db: &DBService, title: &str) {
        let now = Utc::now();
        task::ActiveModel {
            uuid: Set(Uuid::new_v4()),
            workspace_id: Set(None),
            team_id: Set(None),
            created_by: Set(None),
            title: Set(title.to_string()),
            description: Set(None),
            status: Set("todo".to_string()),
            priority: Set("medium".to_string()),
            due_date: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&db.pool)
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn second_run_changes_nothing() {
        let db = test_utils::setup_db().await;
        legacy_user(&db, "root@corp.io", Role::Admin).await;
        legacy_user(&db, "ana@corp.io", Role::Member).await;
        legacy_task(&db, "Old task").await;

        let first = migrate_to_workspaces(&db, "Acme").await.unwrap();
        assert!(first.created_workspace);
        assert_eq!(first.workspace.name, "Acme");
        assert_eq!(first.workspace.workspace_type, WorkspaceType::Core);
        assert!(first.workspace.owner_id.is_some());
        assert_eq!(first.assigned.users, 2);
        assert_eq!(first.assigned.tasks, 1);
        assert_eq!(first.usage.users, 2);
        assert_eq!(first.usage.tasks, 1);
        assert_eq!(first.users_without_workspace, 0);

        let second = migrate_to_workspaces(&db, "Ignored").await.unwrap();
        assert!(!second.created_workspace);
        assert_eq!(second.workspace.id, first.workspace.id);
        assert_eq!(second.assigned.total(), 0);
        assert_eq!(second.usage, first.usage);
        assert_eq!(second.users_without_workspace, 0);
    }

    #[tokio::test]
    async fn backfilled_users_can_sign_in() {
        let db = test_utils::setup_db().await;
        legacy_user(&db, "root@corp.io", Role::Admin).await;
        migrate_to_workspaces(&db, "Acme").await.unwrap();

        let (actor, workspace) = Actor::resolve(&db.pool, "root@corp.io")
            .await
            .unwrap();
        assert_eq!(actor.workspace_type, WorkspaceType::Core);
        assert_eq!(workspace.name, "Acme");
    }

    #[tokio::test]
    async fn deleted_tenants_leave_nothing_for_the_next_run() {
        let db = test_utils::setup_db().await;
        legacy_user(&db, "root@corp.io", Role::Admin).await;
        migrate_to_workspaces(&db, "Acme").await.unwrap();
        let (root, _) = Actor::resolve(&db.pool, "root@corp.io").await.unwrap();

        let (garage, workspace) =
            test_utils::workspace(&db, "Garage", WorkspaceType::Community).await;
        let owner = test_utils::actor(&db, &garage, "own@garage.io", Role::CommunityAdmin).await;
        TaskService::new()
            .create(&db, &owner, &CreateTask { title: "Garage private".into(), ..Default::default() })
            .await
            .unwrap();
        test_utils::flush_outbox(&db).await;
        let deletion = WorkspaceService::new().delete(&db, &root, workspace.id).await.unwrap();
        assert_eq!(deletion.deleted.change_logs, 1);

        let (shed, _) = test_utils::workspace(&db, "Shed", WorkspaceType::Community).await;
        let shed_owner = test_utils::actor(&db, &shed, "own@shed.io", Role::CommunityAdmin).await;
        WorkspaceService::new().delete_my_workspace(&db, &shed_owner).await.unwrap();
        test_utils::flush_outbox(&db).await;

        let second = migrate_to_workspaces(&db, "Acme").await.unwrap();
        assert_eq!(second.assigned.change_logs, 0);
        assert_eq!(second.assigned.total(), 0);

        let filter = ChangeLogFilter { search: Some("Garage private".into()), ..Default::default() };
        let leaked = ChangeLog::page(&db.pool, &root.scope, &filter, 1, 50).await.unwrap();
        assert_eq!(leaked.total, 0);
    }
}
