use db::{
    DBService, TransactionTrait,
    events::{ChangeLogDraft, ChangeSet},
    models::{
        team::{CreateTeam, Team, UpdateTeam},
        user::User,
        workspace::{UsageCounter, Workspace},
    },
};
use protocol::{
    Action, ChangeLogEventType, NotificationType, Resource, Role,
    realtime::{TEAM_CREATED, TEAM_DELETED, TEAM_UPDATED, USER_UPDATED},
};
use uuid::Uuid;

use super::{
    activity::{Activity, diff, snapshot},
    context::Actor,
    error::{Result, ServiceError},
    workspaces::ensure_capacity,
};

#[derive(Clone, Default)]
pub struct TeamService;

impl TeamService {
    pub fn new() -> Self {
        Self
    }

    pub async fn list(&self, db: &DBService, actor: &Actor) -> Result<Vec<Team>> {
        actor.require(Resource::Team, Action::Read)?;
        Ok(Team::find_all(&db.pool, &actor.scope).await?)
    }

    pub async fn get(&self, db: &DBService, actor: &Actor, id: Uuid) -> Result<Team> {
        actor.require(Resource::Team, Action::Read)?;
        Team::find_by_id(&db.pool, &actor.scope, id)
            .await?
            .ok_or(ServiceError::NotFound("Team"))
    }

    /// Team leads may only manage the team they lead.
    fn ensure_manages(actor: &Actor, team: &Team) -> Result<()> {
        actor.require(Resource::Team, Action::Update)?;
        if actor.role() == Role::TeamLead && team.lead_id != Some(actor.id()) {
            return Err(ServiceError::Forbidden(
                "Team leads can only manage their own team".to_string(),
            ));
        }
        Ok(())
    }

    pub async fn create(&self, db: &DBService, actor: &Actor, data: &CreateTeam) -> Result<Team> {
        actor.require(Resource::Team, Action::Create)?;
        if data.name.trim().is_empty() {
            return Err(ServiceError::Validation("Team name is required".to_string()));
        }

        let tx = db.pool.begin().await?;
        ensure_capacity(&tx, &actor.scope, UsageCounter::Teams, 1).await?;
        let team = Team::create(&tx, &actor.scope, Some(actor.row_id), data).await?;
        Workspace::adjust_usage(&tx, &actor.scope, UsageCounter::Teams, 1).await?;
        Activity::new(TEAM_CREATED, actor, "team", team.id)
            .entity(&team)?
            .changelog(
                ChangeLogDraft::new(
                    ChangeLogEventType::TeamCreated,
                    "create",
                    format!("Created team {} with {} members", team.name, team.members.len()),
                )
                .target(team.id, &team.name),
            )
            .notify(
                team.members.iter().copied(),
                NotificationType::TeamAdded,
                format!("{} added you to team {}", actor.user.name, team.name),
                None,
            )
            .enqueue(&tx)
            .await?;
        tx.commit().await?;

        tracing::info!(team_id = %team.id, "team created");
        Ok(team)
    }

    pub async fn update(
        &self,
        db: &DBService,
        actor: &Actor,
        id: Uuid,
        data: &UpdateTeam,
    ) -> Result<Team> {
        if matches!(data.name.as_deref(), Some(name) if name.trim().is_empty()) {
            return Err(ServiceError::Validation("Team name is required".to_string()));
        }

        let tx = db.pool.begin().await?;
        let before = Team::find_by_id(&tx, &actor.scope, id)
            .await?
            .ok_or(ServiceError::NotFound("Team"))?;
        Self::ensure_manages(actor, &before)?;
        let (team, membership) = Team::update(&tx, &actor.scope, id, data).await?;

        let changes = diff(&snapshot(&before)?, &snapshot(&team)?);
        if !changes.is_empty() {
            let pin_only = changes
                .after
                .as_ref()
                .and_then(|after| after.as_object())
                .is_some_and(|after| after.len() == 1 && after.contains_key("pinned"));
            let draft = if pin_only {
                let verb = if team.pinned { "Pinned" } else { "Unpinned" };
                ChangeLogDraft::new(
                    ChangeLogEventType::TeamPinChanged,
                    "pin",
                    format!("{verb} team {}", team.name),
                )
            } else {
                ChangeLogDraft::new(
                    ChangeLogEventType::TeamUpdated,
                    "update",
                    format!("Updated team {}", team.name),
                )
            };
            let mut draft = draft.target(team.id, &team.name).changes(changes);
            if !membership.added.is_empty() || !membership.removed.is_empty() {
                draft = draft.metadata(snapshot(&membership)?);
            }
            Activity::new(TEAM_UPDATED, actor, "team", team.id)
                .entity(&team)?
                .changelog(draft)
                .notify(
                    membership.added.iter().copied(),
                    NotificationType::TeamAdded,
                    format!("{} added you to team {}", actor.user.name, team.name),
                    None,
                )
                .enqueue(&tx)
                .await?;
        }
        tx.commit().await?;
        Ok(team)
    }

    pub async fn set_pinned(
        &self,
        db: &DBService,
        actor: &Actor,
        id: Uuid,
        pinned: bool,
    ) -> Result<Team> {
        self.update(db, actor, id, &UpdateTeam { pinned: Some(pinned), ..Default::default() })
            .await
    }

    pub async fn delete(&self, db: &DBService, actor: &Actor, id: Uuid) -> Result<()> {
        actor.require(Resource::Team, Action::Delete)?;

        let tx = db.pool.begin().await?;
        let team = Team::find_by_id(&tx, &actor.scope, id)
            .await?
            .ok_or(ServiceError::NotFound("Team"))?;
        Team::delete(&tx, &actor.scope, id).await?;
        Workspace::adjust_usage(&tx, &actor.scope, UsageCounter::Teams, -1).await?;
        Activity::new(TEAM_DELETED, actor, "team", team.id)
            .changelog(
                ChangeLogDraft::new(
                    ChangeLogEventType::TeamDeleted,
                    "delete",
                    format!("Deleted team {}", team.name),
                )
                .target(team.id, &team.name)
                .changes(ChangeSet { before: Some(snapshot(&team)?), after: None }),
            )
            .enqueue(&tx)
            .await?;
        tx.commit().await?;

        tracing::info!(team_id = %team.id, "team deleted");
        Ok(())
    }

    /// Adding an existing member is a no-op that returns the team unchanged.
    /// A member of another team moves: the old membership goes in the same
    /// transaction.
    pub async fn add_member(
        &self,
        db: &DBService,
        actor: &Actor,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<Team> {
        let tx = db.pool.begin().await?;
        let current = Team::find_by_id(&tx, &actor.scope, id)
            .await?
            .ok_or(ServiceError::NotFound("Team"))?;
        Self::ensure_manages(actor, &current)?;
        let (team, outcome) = Team::add_member(&tx, &actor.scope, id, user_id).await?;
        if outcome.added {
            Activity::new(TEAM_UPDATED, actor, "team", team.id)
                .entity(&team)?
                .changelog(
                    ChangeLogDraft::new(
                        ChangeLogEventType::TeamMemberAdded,
                        "add_member",
                        format!("Added a member to team {}", team.name),
                    )
                    .target(team.id, &team.name)
                    .metadata(serde_json::json!({ "user_id": user_id })),
                )
                .notify(
                    [user_id],
                    NotificationType::TeamAdded,
                    format!("{} added you to team {}", actor.user.name, team.name),
                    None,
                )
                .enqueue(&tx)
                .await?;

            for left_id in &outcome.left {
                let Some(left) = Team::find_by_id(&tx, &actor.scope, *left_id).await? else {
                    continue;
                };
                Activity::new(TEAM_UPDATED, actor, "team", left.id)
                    .entity(&left)?
                    .changelog(
                        ChangeLogDraft::new(
                            ChangeLogEventType::TeamMemberRemoved,
                            "remove_member",
                            format!("Moved a member from team {} to {}", left.name, team.name),
                        )
                        .target(left.id, &left.name)
                        .metadata(serde_json::json!({ "user_id": user_id, "moved_to": team.id })),
                    )
                    .enqueue(&tx)
                    .await?;
            }

            let user = User::find_by_id(&tx, &actor.scope, user_id)
                .await?
                .ok_or(ServiceError::NotFound("User"))?;
            Activity::new(USER_UPDATED, actor, "user", user.id)
                .entity(&user)?
                .enqueue(&tx)
                .await?;
        }
        tx.commit().await?;
        Ok(team)
    }

    pub async fn remove_member(
        &self,
        db: &DBService,
        actor: &Actor,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<Team> {
        let tx = db.pool.begin().await?;
        let current = Team::find_by_id(&tx, &actor.scope, id)
            .await?
            .ok_or(ServiceError::NotFound("Team"))?;
        Self::ensure_manages(actor, &current)?;
        let (team, removed) = Team::remove_member(&tx, &actor.scope, id, user_id).await?;
        if !removed {
            return Err(ServiceError::NotFound("Team member"));
        }
        Activity::new(TEAM_UPDATED, actor, "team", team.id)
            .entity(&team)?
            .changelog(
                ChangeLogDraft::new(
                    ChangeLogEventType::TeamMemberRemoved,
                    "remove_member",
                    format!("Removed a member from team {}", team.name),
                )
                .target(team.id, &team.name)
                .metadata(serde_json::json!({ "user_id": user_id })),
            )
            .enqueue(&tx)
            .await?;
        tx.commit().await?;
        Ok(team)
    }
}
