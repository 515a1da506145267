use std::sync::Arc;

use db::{
    DBService, WorkspaceScope,
    models::{
        user::{CreateUser, User},
        workspace::{CreateWorkspace, Workspace},
    },
};
use protocol::{Role, WorkspaceType};
use sea_orm::Database;
use sea_orm_migration::MigratorTrait;
use utils::event_hub::EventHub;

use super::{
    config::OutboxConfig,
    context::Actor,
    events::{EventService, FlushReport},
};

pub async fn setup_db() -> DBService {
    let pool = Database::connect("sqlite::memory:").await.unwrap();
    db_migration::Migrator::up(&pool, None).await.unwrap();
    DBService::from_pool(pool)
}

pub async fn workspace(
    db: &DBService,
    name: &str,
    workspace_type: WorkspaceType,
) -> (WorkspaceScope, Workspace) {
    let workspace = Workspace::create(
        &db.pool,
        &CreateWorkspace {
            name: name.to_string(),
            workspace_type: Some(workspace_type),
            owner_id: None,
            limits: None,
        },
    )
    .await
    .unwrap();
    (WorkspaceScope::new(row_id(db, &workspace).await, workspace.id), workspace)
}

pub async fn core_workspace(db: &DBService, name: &str) -> (WorkspaceScope, Workspace) {
    workspace(db, name, WorkspaceType::Core).await
}

async fn row_id(db: &DBService, workspace: &Workspace) -> i64 {
    WorkspaceScope::resolve(&db.pool, workspace.id)
        .await
        .unwrap()
        .unwrap()
        .row_id
}

/// Inserts a user directly and returns them as an acting session.
pub async fn actor(db: &DBService, scope: &WorkspaceScope, email: &str, role: Role) -> Actor {
    User::create(
        &db.pool,
        scope,
        &CreateUser {
            name: email.split('@').next().unwrap_or(email).to_string(),
            email: email.to_string(),
            role: Some(role),
            team_id: None,
            profile_picture: None,
        },
    )
    .await
    .unwrap();
    Actor::resolve(&db.pool, email).await.unwrap().0
}

/// Reloads an actor after their team or role changed.
pub async fn refresh(db: &DBService, actor: &Actor) -> Actor {
    Actor::resolve(&db.pool, &actor.user.email).await.unwrap().0
}

/// Drains the outbox once, materializing audit rows and notifications.
pub async fn flush_outbox(db: &DBService) -> FlushReport {
    EventService::detached(db.clone(), Arc::new(EventHub::new()), OutboxConfig::default())
        .flush_pending()
        .await
        .unwrap()
}
