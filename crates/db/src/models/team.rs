use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set,
};
use sea_orm::sea_query::Expr;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;
use utils::serde_helpers::double_option;
use uuid::Uuid;

use crate::{
    entities::{task, team, team_member, user},
    models::{ids, user::insert_membership},
    scope::WorkspaceScope,
};

#[derive(Debug, Error)]
pub enum TeamError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error("Team not found")]
    TeamNotFound,
    #[error("User {0} not found in this workspace")]
    UserNotFound(Uuid),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct Team {
    pub id: Uuid,
    pub workspace_id: Option<Uuid>,
    pub name: String,
    pub description: Option<String>,
    pub members: Vec<Uuid>,
    pub hr_id: Option<Uuid>,
    pub lead_id: Option<Uuid>,
    pub pinned: bool,
    pub created_by: Option<Uuid>,
    #[ts(type = "Date")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "Date")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct CreateTeam {
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub members: Vec<Uuid>,
    pub hr_id: Option<Uuid>,
    pub lead_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct UpdateTeam {
    pub name: Option<String>,
    #[serde(
        default,
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    #[ts(optional, type = "string | null")]
    pub description: Option<Option<String>>,
    #[serde(
        default,
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    #[ts(optional, type = "string | null")]
    pub hr_id: Option<Option<Uuid>>,
    #[serde(
        default,
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    #[ts(optional, type = "string | null")]
    pub lead_id: Option<Option<Uuid>>,
    pub pinned: Option<bool>,
    /// Replaces the member list when present.
    pub members: Option<Vec<Uuid>>,
}

/// Membership delta produced by an update, for notification fan-out.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MembershipChange {
    pub added: Vec<Uuid>,
    pub removed: Vec<Uuid>,
}

/// Outcome of [`Team::add_member`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemberAdded {
    /// `false` when the user already was a member.
    pub added: bool,
    /// Teams the user left to join this one.
    pub left: Vec<Uuid>,
}

impl Team {
    async fn from_model<C: ConnectionTrait>(db: &C, model: team::Model) -> Result<Self, DbErr> {
        let workspace_id = match model.workspace_id {
            Some(id) => ids::workspace_uuid_by_id(db, id).await?,
            None => None,
        };
        let member_rows = Self::member_row_ids(db, model.id).await?;
        let mut lookup: Vec<i64> = member_rows.clone();
        lookup.extend(model.hr_id);
        lookup.extend(model.lead_id);
        lookup.extend(model.created_by);
        let uuids = ids::user_uuids_by_ids(db, &lookup).await?;
        let resolve = |id: Option<i64>| id.and_then(|id| uuids.get(&id).copied());

        Ok(Self {
            id: model.uuid,
            workspace_id,
            name: model.name,
            description: model.description,
            members: member_rows
                .iter()
                .filter_map(|id| uuids.get(id).copied())
                .collect(),
            hr_id: resolve(model.hr_id),
            lead_id: resolve(model.lead_id),
            pinned: model.pinned,
            created_by: resolve(model.created_by),
            created_at: model.created_at.into(),
            updated_at: model.updated_at.into(),
        })
    }

    async fn member_row_ids<C: ConnectionTrait>(db: &C, team_row_id: i64) -> Result<Vec<i64>, DbErr> {
        team_member::Entity::find()
            .select_only()
            .column(team_member::Column::UserId)
            .filter(team_member::Column::TeamId.eq(team_row_id))
            .order_by_asc(team_member::Column::Id)
            .into_tuple()
            .all(db)
            .await
    }

    async fn find_model<C: ConnectionTrait>(
        db: &C,
        scope: &WorkspaceScope,
        id: Uuid,
    ) -> Result<Option<team::Model>, DbErr> {
        team::Entity::find()
            .filter(team::Column::Uuid.eq(id))
            .filter(team::Column::WorkspaceId.eq(scope.row_id))
            .one(db)
            .await
    }

    /// Pinned teams first, then by name.
    pub async fn find_all<C: ConnectionTrait>(
        db: &C,
        scope: &WorkspaceScope,
    ) -> Result<Vec<Self>, DbErr> {
        let models = team::Entity::find()
            .filter(team::Column::WorkspaceId.eq(scope.row_id))
            .order_by_desc(team::Column::Pinned)
            .order_by_asc(team::Column::Name)
            .order_by_asc(team::Column::Id)
            .all(db)
            .await?;

        let mut teams = Vec::with_capacity(models.len());
        for model in models {
            teams.push(Self::from_model(db, model).await?);
        }
        Ok(teams)
    }

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

    pub async fn count<C: ConnectionTrait>(db: &C, scope: &WorkspaceScope) -> Result<u64, DbErr> {
        team::Entity::find()
            .filter(team::Column::WorkspaceId.eq(scope.row_id))
            .count(db)
            .await
    }

    async fn resolve_user<C: ConnectionTrait>(
        db: &C,
        scope: &WorkspaceScope,
        id: Uuid,
    ) -> Result<i64, TeamError> {
        ids::user_id_in_scope(db, scope, id)
            .await?
            .ok_or(TeamError::UserNotFound(id))
    }

    async fn resolve_optional_user<C: ConnectionTrait>(
        db: &C,
        scope: &WorkspaceScope,
        id: Option<Uuid>,
    ) -> Result<Option<i64>, TeamError> {
        match id {
            Some(id) => Ok(Some(Self::resolve_user(db, scope, id).await?)),
            None => Ok(None),
        }
    }

    pub async fn create<C: ConnectionTrait>(
        db: &C,
        scope: &WorkspaceScope,
        created_by: Option<i64>,
        data: &CreateTeam,
    ) -> Result<Self, TeamError> {
        let hr_id = Self::resolve_optional_user(db, scope, data.hr_id).await?;
        let lead_id = Self::resolve_optional_user(db, scope, data.lead_id).await?;
        let mut member_rows = Vec::with_capacity(data.members.len());
        for member in &data.members {
            member_rows.push(Self::resolve_user(db, scope, *member).await?);
        }

        let now = Utc::now();
        let active = team::ActiveModel {
            uuid: Set(Uuid::new_v4()),
            workspace_id: Set(Some(scope.row_id)),
            name: Set(data.name.trim().to_string()),
            description: Set(data.description.clone()),
            hr_id: Set(hr_id),
            lead_id: Set(lead_id),
            pinned: Set(false),
            created_by: Set(created_by),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
            ..Default::default()
        };
        let model = active.insert(db).await?;
        for user_row_id in member_rows {
            attach_member(db, model.id, user_row_id).await?;
        }
        Ok(Self::from_model(db, model).await?)
    }

    pub async fn update<C: ConnectionTrait>(
        db: &C,
        scope: &WorkspaceScope,
        id: Uuid,
        data: &UpdateTeam,
    ) -> Result<(Self, MembershipChange), TeamError> {
        let record = Self::find_model(db, scope, id)
            .await?
            .ok_or(TeamError::TeamNotFound)?;
        let team_row_id = record.id;

        let mut active: team::ActiveModel = record.into();
        if let Some(name) = &data.name {
            active.name = Set(name.trim().to_string());
        }
        if let Some(description) = &data.description {
            active.description = Set(description.clone());
        }
        if let Some(hr_id) = data.hr_id {
            active.hr_id = Set(Self::resolve_optional_user(db, scope, hr_id).await?);
        }
        if let Some(lead_id) = data.lead_id {
            active.lead_id = Set(Self::resolve_optional_user(db, scope, lead_id).await?);
        }
        if let Some(pinned) = data.pinned {
            active.pinned = Set(pinned);
        }
        active.updated_at = Set(Utc::now().into());
        let updated = active.update(db).await?;

        let mut change = MembershipChange::default();
        if let Some(members) = &data.members {
            let current = Self::member_row_ids(db, team_row_id).await?;
            let mut wanted = Vec::with_capacity(members.len());
            for member in members {
                wanted.push((*member, Self::resolve_user(db, scope, *member).await?));
            }
            for (uuid, row_id) in &wanted {
                if !current.contains(row_id) {
                    attach_member(db, team_row_id, *row_id).await?;
                    change.added.push(*uuid);
                }
            }
            let removed: Vec<i64> = current
                .into_iter()
                .filter(|row_id| !wanted.iter().any(|(_, wanted_row)| wanted_row == row_id))
                .collect();
            let removed_uuids = ids::user_uuids_by_ids(db, &removed).await?;
            for row_id in removed {
                detach_member(db, team_row_id, row_id).await?;
                if let Some(uuid) = removed_uuids.get(&row_id) {
                    change.removed.push(*uuid);
                }
            }
        }

        Ok((Self::from_model(db, updated).await?, change))
    }

    /// A user belongs to one team at a time, so joining drops any other
    /// membership.
    pub async fn add_member<C: ConnectionTrait>(
        db: &C,
        scope: &WorkspaceScope,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<(Self, MemberAdded), TeamError> {
        let record = Self::find_model(db, scope, id)
            .await?
            .ok_or(TeamError::TeamNotFound)?;
        let user_row_id = Self::resolve_user(db, scope, user_id).await?;
        let attached = attach_member(db, record.id, user_row_id).await?;
        let mut left = Vec::with_capacity(attached.left.len());
        for team_row_id in attached.left {
            left.extend(ids::team_uuid_by_id(db, team_row_id).await?);
        }
        let outcome = MemberAdded { added: attached.added, left };
        Ok((Self::from_model(db, record).await?, outcome))
    }

    /// Returns `false` when the user was not a member.
    pub async fn remove_member<C: ConnectionTrait>(
        db: &C,
        scope: &WorkspaceScope,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<(Self, bool), TeamError> {
        let record = Self::find_model(db, scope, id)
            .await?
            .ok_or(TeamError::TeamNotFound)?;
        let user_row_id = Self::resolve_user(db, scope, user_id).await?;
        let removed = detach_member(db, record.id, user_row_id).await?;
        Ok((Self::from_model(db, record).await?, removed))
    }

    pub async fn delete<C: ConnectionTrait>(
        db: &C,
        scope: &WorkspaceScope,
        id: Uuid,
    ) -> Result<u64, DbErr> {
        let Some(record) = Self::find_model(db, scope, id).await? else {
            return Ok(0);
        };
        team_member::Entity::delete_many()
            .filter(team_member::Column::TeamId.eq(record.id))
            .exec(db)
            .await?;
        user::Entity::update_many()
            .col_expr(user::Column::TeamId, Expr::value(None::<i64>))
            .filter(user::Column::TeamId.eq(record.id))
            .exec(db)
            .await?;
        task::Entity::update_many()
            .col_expr(task::Column::TeamId, Expr::value(None::<i64>))
            .filter(task::Column::TeamId.eq(record.id))
            .exec(db)
            .await?;
        let result = team::Entity::delete_by_id(record.id).exec(db).await?;
        Ok(result.rows_affected)
    }

    /// Team names by uuid, for display in client views and exports.
    pub async fn names<C: ConnectionTrait>(
        db: &C,
        scope: &WorkspaceScope,
    ) -> Result<HashMap<Uuid, String>, DbErr> {
        let rows: Vec<(Uuid, String)> = team::Entity::find()
            .select_only()
            .column(team::Column::Uuid)
            .column(team::Column::Name)
            .filter(team::Column::WorkspaceId.eq(scope.row_id))
            .into_tuple()
            .all(db)
            .await?;
        Ok(rows.into_iter().collect())
    }
}

struct Attached {
    added: bool,
    left: Vec<i64>,
}

/// Adds the membership row, drops memberships in other teams and makes this
/// the user's current team.
async fn attach_member<C: ConnectionTrait>(
    db: &C,
    team_row_id: i64,
    user_row_id: i64,
) -> Result<Attached, DbErr> {
    let left: Vec<i64> = team_member::Entity::find()
        .select_only()
        .column(team_member::Column::TeamId)
        .filter(team_member::Column::UserId.eq(user_row_id))
        .filter(team_member::Column::TeamId.ne(team_row_id))
        .into_tuple()
        .all(db)
        .await?;
    if !left.is_empty() {
        team_member::Entity::delete_many()
            .filter(team_member::Column::UserId.eq(user_row_id))
            .filter(team_member::Column::TeamId.ne(team_row_id))
            .exec(db)
            .await?;
    }
    let added = insert_membership(db, team_row_id, user_row_id).await?;
    user::Entity::update_many()
        .col_expr(user::Column::TeamId, Expr::value(team_row_id))
        .filter(user::Column::Id.eq(user_row_id))
        .exec(db)
        .await?;
    Ok(Attached { added, left })
}

/// Drops the membership row and clears `users.team_id` if it pointed here.
async fn detach_member<C: ConnectionTrait>(
    db: &C,
    team_row_id: i64,
    user_row_id: i64,
) -> Result<bool, DbErr> {
    let result = team_member::Entity::delete_many()
        .filter(team_member::Column::TeamId.eq(team_row_id))
        .filter(team_member::Column::UserId.eq(user_row_id))
        .exec(db)
        .await?;
    user::Entity::update_many()
        .col_expr(user::Column::TeamId, Expr::value(None::<i64>))
        .filter(user::Column::Id.eq(user_row_id))
        .filter(user::Column::TeamId.eq(team_row_id))
        .exec(db)
        .await?;
    Ok(result.rows_affected > 0)
}

#[cfg(test)]
mod tests {
    use protocol::Role;

    use super::*;
    use crate::{
        models::{fixtures, user::User},
        test_utils::setup_db,
    };

    #[tokio::test]
    async fn membership_keeps_user_team_in_sync() {
        let db = setup_db().await;
        let scope = fixtures::workspace(&db, "One").await;
        let ana = fixtures::user(&db, &scope, "ana@one.io", Role::Member).await;
        let bob = fixtures::user(&db, &scope, "bob@one.io", Role::TeamLead).await;

        let team = Team::create(
            &db,
            &scope,
            None,
            &CreateTeam {
                name: "Platform".into(),
                members: vec![ana.id],
                lead_id: Some(bob.id),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(team.members, vec![ana.id]);
        assert_eq!(team.lead_id, Some(bob.id));

        let (team, outcome) = Team::add_member(&db, &scope, team.id, bob.id).await.unwrap();
        assert!(outcome.added);
        assert_eq!(team.members, vec![ana.id, bob.id]);
        let (_, again) = Team::add_member(&db, &scope, team.id, bob.id).await.unwrap();
        assert_eq!(again, MemberAdded::default());

        let bob_now = User::find_by_id(&db, &scope, bob.id).await.unwrap().unwrap();
        assert_eq!(bob_now.team_id, Some(team.id));

        let (team, removed) = Team::remove_member(&db, &scope, team.id, ana.id).await.unwrap();
        assert!(removed);
        assert_eq!(team.members, vec![bob.id]);
        let ana_now = User::find_by_id(&db, &scope, ana.id).await.unwrap().unwrap();
        assert_eq!(ana_now.team_id, None);
    }

    #[tokio::test]
    async fn joining_a_team_leaves_the_previous_one() {
        let db = setup_db().await;
        let scope = fixtures::workspace(&db, "One").await;
        let ana = fixtures::user(&db, &scope, "ana@one.io", Role::Member).await;
        let design = Team::create(
            &db,
            &scope,
            None,
            &CreateTeam { name: "Design".into(), members: vec![ana.id], ..Default::default() },
        )
        .await
        .unwrap();
        let platform = Team::create(&db, &scope, None, &CreateTeam { name: "Platform".into(), ..Default::default() })
            .await
            .unwrap();

        let (platform, outcome) = Team::add_member(&db, &scope, platform.id, ana.id).await.unwrap();
        assert!(outcome.added);
        assert_eq!(outcome.left, vec![design.id]);
        assert_eq!(platform.members, vec![ana.id]);

        let ana_row = ids::user_id_in_scope(&db, &scope, ana.id).await.unwrap().unwrap();
        let memberships = team_member::Entity::find()
            .filter(team_member::Column::UserId.eq(ana_row))
            .count(&db)
            .await
            .unwrap();
        assert_eq!(memberships, 1);
        let design = Team::find_by_id(&db, &scope, design.id).await.unwrap().unwrap();
        assert!(design.members.is_empty());
        let ana_now = User::find_by_id(&db, &scope, ana.id).await.unwrap().unwrap();
        assert_eq!(ana_now.team_id, Some(platform.id));
    }

    #[tokio::test]
    async fn replacing_members_reports_the_delta() {
        let db = setup_db().await;
        let scope = fixtures::workspace(&db, "One").await;
        let ana = fixtures::user(&db, &scope, "ana@one.io", Role::Member).await;
        let bob = fixtures::user(&db, &scope, "bob@one.io", Role::Member).await;
        let team = Team::create(
            &db,
            &scope,
            None,
            &CreateTeam { name: "Core".into(), members: vec![ana.id], ..Default::default() },
        )
        .await
        .unwrap();

        let (team, change) = Team::update(
            &db,
            &scope,
            team.id,
            &UpdateTeam { members: Some(vec![bob.id]), pinned: Some(true), ..Default::default() },
        )
        .await
        .unwrap();
        assert_eq!(change.added, vec![bob.id]);
        assert_eq!(change.removed, vec![ana.id]);
        assert!(team.pinned);
    }

    #[tokio::test]
    async fn foreign_users_cannot_join() {
        let db = setup_db().await;
        let w1 = fixtures::workspace(&db, "One").await;
        let w2 = fixtures::workspace(&db, "Two").await;
        let outsider = fixtures::user(&db, &w2, "eve@two.io", Role::Member).await;
        let team = Team::create(&db, &w1, None, &CreateTeam { name: "A".into(), ..Default::default() })
            .await
            .unwrap();

        assert!(matches!(
            Team::add_member(&db, &w1, team.id, outsider.id).await,
            Err(TeamError::UserNotFound(_))
        ));
        assert!(Team::find_by_id(&db, &w2, team.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn pinned_teams_sort_first_and_delete_detaches_users() {
        let db = setup_db().await;
        let scope = fixtures::workspace(&db, "One").await;
        let ana = fixtures::user(&db, &scope, "ana@one.io", Role::Member).await;
        Team::create(&db, &scope, None, &CreateTeam { name: "Alpha".into(), ..Default::default() })
            .await
            .unwrap();
        let zulu = Team::create(
            &db,
            &scope,
            None,
            &CreateTeam { name: "Zulu".into(), members: vec![ana.id], ..Default::default() },
        )
        .await
        .unwrap();
        Team::update(&db, &scope, zulu.id, &UpdateTeam { pinned: Some(true), ..Default::default() })
            .await
            .unwrap();

        let names: Vec<String> = Team::find_all(&db, &scope)
            .await
            .unwrap()
            .into_iter()
            .map(|team| team.name)
            .collect();
        assert_eq!(names, vec!["Zulu".to_string(), "Alpha".to_string()]);

        assert_eq!(Team::delete(&db, &scope, zulu.id).await.unwrap(), 1);
        let ana = User::find_by_id(&db, &scope, ana.id).await.unwrap().unwrap();
        assert_eq!(ana.team_id, None);
    }
}
