use db::{
    DBService, TransactionTrait,
    events::{ChangeLogDraft, ChangeSet},
    models::{
        user::{CreateUser, UpdateUser, User},
        workspace::{UsageCounter, Workspace},
    },
};
use protocol::{
    Action, ChangeLogEventType, Resource, Role,
    realtime::{USER_CREATED, USER_DELETED, USER_UPDATED},
};
use uuid::Uuid;

use super::{
    activity::{Activity, diff, snapshot},
    context::Actor,
    error::{Result, ServiceError},
    workspaces::ensure_capacity,
};

pub(crate) fn validate_identity(name: &str, email: &str) -> std::result::Result<(), String> {
    if name.trim().is_empty() {
        return Err("Name is required".to_string());
    }
    let email = email.trim();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(()),
        _ => Err(format!("Invalid email address '{email}'")),
    }
}

#[derive(Clone, Default)]
pub struct UserService;

impl UserService {
    pub fn new() -> Self {
        Self
    }

    pub async fn list(&self, db: &DBService, actor: &Actor) -> Result<Vec<User>> {
        actor.require(Resource::User, Action::Read)?;
        Ok(User::find_all(&db.pool, &actor.scope).await?)
    }

    pub async fn get(&self, db: &DBService, actor: &Actor, id: Uuid) -> Result<User> {
        actor.require(Resource::User, Action::Read)?;
        User::find_by_id(&db.pool, &actor.scope, id)
            .await?
            .ok_or(ServiceError::NotFound("User"))
    }

    fn ensure_can_assign(actor: &Actor, role: Role) -> Result<()> {
        if actor.role().can_assign(actor.workspace_type, role) {
            Ok(())
        } else {
            Err(ServiceError::Forbidden(format!(
                "A {} cannot manage {} accounts",
                actor.role(),
                role
            )))
        }
    }

    pub async fn create(&self, db: &DBService, actor: &Actor, data: &CreateUser) -> Result<User> {
        actor.require(Resource::User, Action::Create)?;
        validate_identity(&data.name, &data.email).map_err(ServiceError::Validation)?;
        Self::ensure_can_assign(actor, data.role.unwrap_or_default())?;

        let tx = db.pool.begin().await?;
        ensure_capacity(&tx, &actor.scope, UsageCounter::Users, 1).await?;
        let user = User::create(&tx, &actor.scope, data).await?;
        Workspace::adjust_usage(&tx, &actor.scope, UsageCounter::Users, 1).await?;
        Activity::new(USER_CREATED, actor, "user", user.id)
            .entity(&user)?
            .changelog(
                ChangeLogDraft::new(
                    ChangeLogEventType::UserCreated,
                    "create",
                    format!("Created user {} ({})", user.name, user.role),
                )
                .target(user.id, &user.name),
            )
            .enqueue(&tx)
            .await?;
        tx.commit().await?;

        tracing::info!(user_id = %user.id, role = %user.role, "user created");
        Ok(user)
    }

    /// Anyone may edit their own name, email and picture. Role, team and
    /// activation changes need user-management rights over both the old and
    /// the new role.
    pub async fn update(
        &self,
        db: &DBService,
        actor: &Actor,
        id: Uuid,
        data: &UpdateUser,
    ) -> Result<User> {
        let administrative =
            data.role.is_some() || data.team_id.is_some() || data.is_active.is_some();
        if id != actor.id() || administrative {
            actor.require(Resource::User, Action::Update)?;
        }
        if id == actor.id() && (data.role.is_some() || data.is_active == Some(false)) {
            return Err(ServiceError::Conflict(
                "You cannot change your own role or deactivate yourself".to_string(),
            ));
        }
        if let Some(name) = &data.name
            && name.trim().is_empty()
        {
            return Err(ServiceError::Validation("Name is required".to_string()));
        }
        if let Some(email) = &data.email {
            validate_identity("-", email).map_err(ServiceError::Validation)?;
        }

        let tx = db.pool.begin().await?;
        let before = User::find_by_id(&tx, &actor.scope, id)
            .await?
            .ok_or(ServiceError::NotFound("User"))?;
        if id != actor.id() {
            Self::ensure_can_assign(actor, before.role)?;
        }
        if let Some(role) = data.role {
            Self::ensure_can_assign(actor, role)?;
        }
        let user = User::update(&tx, &actor.scope, id, data).await?;

        let changes = diff(&snapshot(&before)?, &snapshot(&user)?);
        if !changes.is_empty() {
            let draft = if before.role != user.role {
                ChangeLogDraft::new(
                    ChangeLogEventType::UserRoleChanged,
                    "role_change",
                    format!("Changed role of {} from {} to {}", user.name, before.role, user.role),
                )
            } else {
                ChangeLogDraft::new(
                    ChangeLogEventType::UserUpdated,
                    "update",
                    format!("Updated user {}", user.name),
                )
            };
            Activity::new(USER_UPDATED, actor, "user", user.id)
                .entity(&user)?
                .changelog(draft.target(user.id, &user.name).changes(changes))
                .enqueue(&tx)
                .await?;
        }
        tx.commit().await?;
        Ok(user)
    }

    pub async fn delete(&self, db: &DBService, actor: &Actor, id: Uuid) -> Result<()> {
        actor.require(Resource::User, Action::Delete)?;
        if id == actor.id() {
            return Err(ServiceError::Conflict("You cannot delete your own account".to_string()));
        }

        let tx = db.pool.begin().await?;
        let user = User::find_by_id(&tx, &actor.scope, id)
            .await?
            .ok_or(ServiceError::NotFound("User"))?;
        Self::ensure_can_assign(actor, user.role)?;
        User::delete(&tx, &actor.scope, id).await?;
        Workspace::adjust_usage(&tx, &actor.scope, UsageCounter::Users, -1).await?;
        Activity::new(USER_DELETED, actor, "user", user.id)
            .changelog(
                ChangeLogDraft::new(
                    ChangeLogEventType::UserDeleted,
                    "delete",
                    format!("Deleted user {} ({})", user.name, user.email),
                )
                .target(user.id, &user.name)
                .changes(ChangeSet { before: Some(snapshot(&user)?), after: None }),
            )
            .enqueue(&tx)
            .await?;
        tx.commit().await?;

        tracing::info!(user_id = %user.id, "user deleted");
        Ok(())
    }
}
