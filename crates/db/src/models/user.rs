use std::collections::HashSet;

use chrono::{DateTime, Utc};
use protocol::Role;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set,
};
use sea_orm::sea_query::Expr;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;
use utils::{serde_helpers::double_option, text::normalize_email};
use uuid::Uuid;

use crate::{
    entities::{notification, task, task_assignee, task_comment, team, team_member, user},
    models::{ids, parse_enum},
    scope::WorkspaceScope,
};

#[derive(Debug, Error)]
pub enum UserError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error("User not found")]
    UserNotFound,
    #[error("Email {0} is already registered")]
    EmailTaken(String),
    #[error("Team not found")]
    TeamNotFound,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct User {
    pub id: Uuid,
    pub workspace_id: Option<Uuid>,
    pub team_id: Option<Uuid>,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub profile_picture: Option<String>,
    pub is_active: bool,
    #[ts(type = "Date")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "Date")]
    pub updated_at: DateTime<Utc>,
}

/// A user together with the row ids the service layer needs for scoped
/// writes and visibility checks.
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub row_id: i64,
    pub workspace_row_id: Option<i64>,
    pub team_row_id: Option<i64>,
    pub user: User,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateUser {
    pub name: String,
    pub email: String,
    pub role: Option<Role>,
    pub team_id: Option<Uuid>,
    pub profile_picture: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct UpdateUser {
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<Role>,
    #[serde(
        default,
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    #[ts(optional, type = "string | null")]
    pub team_id: Option<Option<Uuid>>,
    pub profile_picture: Option<String>,
    pub is_active: Option<bool>,
}

impl User {
    async fn from_model<C: ConnectionTrait>(db: &C, model: user::Model) -> Result<Self, DbErr> {
        let workspace_id = match model.workspace_id {
            Some(id) => ids::workspace_uuid_by_id(db, id).await?,
            None => None,
        };
        let team_id = ids::optional_team_uuid(db, model.team_id).await?;
        Ok(Self {
            id: model.uuid,
            workspace_id,
            team_id,
            name: model.name,
            email: model.email,
            role: parse_enum("role", &model.role)?,
            profile_picture: model.profile_picture,
            is_active: model.is_active,
            created_at: model.created_at.into(),
            updated_at: model.updated_at.into(),
        })
    }

    async fn record_from_model<C: ConnectionTrait>(
        db: &C,
        model: user::Model,
    ) -> Result<UserRecord, DbErr> {
        let row_id = model.id;
        let workspace_row_id = model.workspace_id;
        let team_row_id = model.team_id;
        Ok(UserRecord {
            row_id,
            workspace_row_id,
            team_row_id,
            user: Self::from_model(db, model).await?,
        })
    }

    pub async fn find_all<C: ConnectionTrait>(
        db: &C,
        scope: &WorkspaceScope,
    ) -> Result<Vec<Self>, DbErr> {
        let models = user::Entity::find()
            .filter(user::Column::WorkspaceId.eq(scope.row_id))
            .order_by_asc(user::Column::Name)
            .order_by_asc(user::Column::Id)
            .all(db)
            .await?;

        let mut users = Vec::with_capacity(models.len());
        for model in models {
            users.push(Self::from_model(db, model).await?);
        }
        Ok(users)
    }

    pub async fn find_by_id<C: ConnectionTrait>(
        db: &C,
        scope: &WorkspaceScope,
        id: Uuid,
    ) -> Result<Option<Self>, DbErr> {
        Ok(Self::find_record(db, scope, id).await?.map(|record| record.user))
    }

    pub async fn find_record<C: ConnectionTrait>(
        db: &C,
        scope: &WorkspaceScope,
        id: Uuid,
    ) -> Result<Option<UserRecord>, DbErr> {
        let model = user::Entity::find()
            .filter(user::Column::Uuid.eq(id))
            .filter(user::Column::WorkspaceId.eq(scope.row_id))
            .one(db)
            .await?;
        match model {
            Some(model) => Ok(Some(Self::record_from_model(db, model).await?)),
            None => Ok(None),
        }
    }

    /// Emails are unique across the installation, so session lookup is unscoped.
    pub async fn find_record_by_email<C: ConnectionTrait>(
        db: &C,
        email: &str,
    ) -> Result<Option<UserRecord>, DbErr> {
        let model = user::Entity::find()
            .filter(user::Column::Email.eq(normalize_email(email)))
            .one(db)
            .await?;
        match model {
            Some(model) => Ok(Some(Self::record_from_model(db, model).await?)),
            None => Ok(None),
        }
    }

    pub async fn row_id_unscoped<C: ConnectionTrait>(
        db: &C,
        id: Uuid,
    ) -> Result<Option<i64>, DbErr> {
        user::Entity::find()
            .select_only()
            .column(user::Column::Id)
            .filter(user::Column::Uuid.eq(id))
            .into_tuple()
            .one(db)
            .await
    }

    pub async fn email_taken<C: ConnectionTrait>(
        db: &C,
        email: &str,
        except_row_id: Option<i64>,
    ) -> Result<bool, DbErr> {
        let mut query = user::Entity::find().filter(user::Column::Email.eq(normalize_email(email)));
        if let Some(row_id) = except_row_id {
            query = query.filter(user::Column::Id.ne(row_id));
        }
        Ok(query.count(db).await? > 0)
    }

    /// Which of `emails` (normalized) already belong to some user.
    pub async fn existing_emails<C: ConnectionTrait>(
        db: &C,
        emails: &[String],
    ) -> Result<HashSet<String>, DbErr> {
        if emails.is_empty() {
            return Ok(HashSet::new());
        }
        let normalized: Vec<String> = emails.iter().map(|email| normalize_email(email)).collect();
        let found: Vec<String> = user::Entity::find()
            .select_only()
            .column(user::Column::Email)
            .filter(user::Column::Email.is_in(normalized))
            .into_tuple()
            .all(db)
            .await?;
        Ok(found.into_iter().collect())
    }

    pub async fn count<C: ConnectionTrait>(db: &C, scope: &WorkspaceScope) -> Result<u64, DbErr> {
        user::Entity::find()
            .filter(user::Column::WorkspaceId.eq(scope.row_id))
            .count(db)
            .await
    }

    pub async fn create<C: ConnectionTrait>(
        db: &C,
        scope: &WorkspaceScope,
        data: &CreateUser,
    ) -> Result<Self, UserError> {
        let email = normalize_email(&data.email);
        if Self::email_taken(db, &email, None).await? {
            return Err(UserError::EmailTaken(email));
        }
        let team_row_id = match data.team_id {
            Some(team_id) => Some(
                ids::team_id_in_scope(db, scope, team_id)
                    .await?
                    .ok_or(UserError::TeamNotFound)?,
            ),
            None => None,
        };

        let now = Utc::now();
        let active = user::ActiveModel {
            uuid: Set(Uuid::new_v4()),
            workspace_id: Set(Some(scope.row_id)),
            team_id: Set(team_row_id),
            name: Set(data.name.trim().to_string()),
            email: Set(email),
            role: Set(data.role.unwrap_or_default().to_string()),
            profile_picture: Set(data.profile_picture.clone()),
            is_active: Set(true),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
            ..Default::default()
        };
        let model = active.insert(db).await?;
        if let Some(team_row_id) = team_row_id {
            insert_membership(db, team_row_id, model.id).await?;
        }
        Ok(Self::from_model(db, model).await?)
    }

    pub async fn update<C: ConnectionTrait>(
        db: &C,
        scope: &WorkspaceScope,
        id: Uuid,
        data: &UpdateUser,
    ) -> Result<Self, UserError> {
        let record = user::Entity::find()
            .filter(user::Column::Uuid.eq(id))
            .filter(user::Column::WorkspaceId.eq(scope.row_id))
            .one(db)
            .await?
            .ok_or(UserError::UserNotFound)?;
        let row_id = record.id;
        let previous_team = record.team_id;

        let mut active: user::ActiveModel = record.into();
        if let Some(name) = &data.name {
            active.name = Set(name.trim().to_string());
        }
        if let Some(email) = &data.email {
            let email = normalize_email(email);
            if Self::email_taken(db, &email, Some(row_id)).await? {
                return Err(UserError::EmailTaken(email));
            }
            active.email = Set(email);
        }
        if let Some(role) = data.role {
            active.role = Set(role.to_string());
        }
        if let Some(picture) = &data.profile_picture {
            active.profile_picture = Set(Some(picture.clone()).filter(|p| !p.is_empty()));
        }
        if let Some(is_active) = data.is_active {
            active.is_active = Set(is_active);
        }
        let mut next_team = previous_team;
        if let Some(team_id) = data.team_id {
            next_team = match team_id {
                Some(team_id) => Some(
                    ids::team_id_in_scope(db, scope, team_id)
                        .await?
                        .ok_or(UserError::TeamNotFound)?,
                ),
                None => None,
            };
            active.team_id = Set(next_team);
        }
        active.updated_at = Set(Utc::now().into());
        let updated = active.update(db).await?;

        if next_team != previous_team {
            if let Some(old) = previous_team {
                team_member::Entity::delete_many()
                    .filter(team_member::Column::TeamId.eq(old))
                    .filter(team_member::Column::UserId.eq(row_id))
                    .exec(db)
                    .await?;
            }
            if let Some(new) = next_team {
                insert_membership(db, new, row_id).await?;
            }
        }

        Ok(Self::from_model(db, updated).await?)
    }

    /// Removes the user and every reference to them inside the workspace.
    pub async fn delete<C: ConnectionTrait>(
        db: &C,
        scope: &WorkspaceScope,
        id: Uuid,
    ) -> Result<u64, DbErr> {
        let Some(row_id) = ids::user_id_in_scope(db, scope, id).await? else {
            return Ok(0);
        };

        team_member::Entity::delete_many()
            .filter(team_member::Column::UserId.eq(row_id))
            .exec(db)
            .await?;
        task_assignee::Entity::delete_many()
            .filter(task_assignee::Column::UserId.eq(row_id))
            .exec(db)
            .await?;
        notification::Entity::delete_many()
            .filter(notification::Column::UserId.eq(row_id))
            .exec(db)
            .await?;
        for column in [team::Column::HrId, team::Column::LeadId, team::Column::CreatedBy] {
            team::Entity::update_many()
                .col_expr(column, Expr::value(None::<i64>))
                .filter(column.eq(row_id))
                .exec(db)
                .await?;
        }
        task::Entity::update_many()
            .col_expr(task::Column::CreatedBy, Expr::value(None::<i64>))
            .filter(task::Column::CreatedBy.eq(row_id))
            .exec(db)
            .await?;
        task_comment::Entity::update_many()
            .col_expr(task_comment::Column::AuthorId, Expr::value(None::<i64>))
            .filter(task_comment::Column::AuthorId.eq(row_id))
            .exec(db)
            .await?;

        let result = user::Entity::delete_by_id(row_id).exec(db).await?;
        Ok(result.rows_affected)
    }

    /// Users without a workspace, left behind by single-tenant installs.
    pub async fn count_without_workspace<C: ConnectionTrait>(db: &C) -> Result<u64, DbErr> {
        user::Entity::find()
            .filter(user::Column::WorkspaceId.is_null())
            .count(db)
            .await
    }

    /// Oldest admin anywhere, used to pick the owner of the CORE workspace.
    pub async fn oldest_admin_row_id<C: ConnectionTrait>(db: &C) -> Result<Option<i64>, DbErr> {
        user::Entity::find()
            .select_only()
            .column(user::Column::Id)
            .filter(user::Column::Role.eq(Role::Admin.to_string()))
            .order_by_asc(user::Column::CreatedAt)
            .order_by_asc(user::Column::Id)
            .into_tuple()
            .one(db)
            .await
    }
}

pub(crate) async fn insert_membership<C: ConnectionTrait>(
    db: &C,
    team_row_id: i64,
    user_row_id: i64,
) -> Result<bool, DbErr> {
    let exists = team_member::Entity::find()
        .filter(team_member::Column::TeamId.eq(team_row_id))
        .filter(team_member::Column::UserId.eq(user_row_id))
        .count(db)
        .await?
        > 0;
    if exists {
        return Ok(false);
    }
    team_member::ActiveModel {
        team_id: Set(team_row_id),
        user_id: Set(user_row_id),
        created_at: Set(Utc::now().into()),
        ..Default::default()
    }
    .insert(db)
    .await?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::{
            fixtures,
            team::{CreateTeam, Team},
        },
        test_utils::setup_db,
    };

    #[tokio::test]
    async fn emails_are_unique_and_normalized() {
        let db = setup_db().await;
        let w1 = fixtures::workspace(&db, "One").await;
        let w2 = fixtures::workspace(&db, "Two").await;

        let ana = fixtures::user(&db, &w1, "  Ana@One.io ", Role::Member).await;
        assert_eq!(ana.email, "ana@one.io");

        let duplicate = User::create(
            &db,
            &w2,
            &CreateUser {
                name: "Other Ana".into(),
                email: "ANA@one.io".into(),
                role: None,
                team_id: None,
                profile_picture: None,
            },
        )
        .await;
        assert!(matches!(duplicate, Err(UserError::EmailTaken(_))));

        let record = User::find_record_by_email(&db, "ana@ONE.io").await.unwrap().unwrap();
        assert_eq!(record.user.id, ana.id);
        assert_eq!(record.workspace_row_id, Some(w1.row_id));
    }

    #[tokio::test]
    async fn users_are_invisible_across_workspaces() {
        let db = setup_db().await;
        let w1 = fixtures::workspace(&db, "One").await;
        let w2 = fixtures::workspace(&db, "Two").await;
        let ana = fixtures::user(&db, &w1, "ana@one.io", Role::Member).await;

        assert!(User::find_by_id(&db, &w2, ana.id).await.unwrap().is_none());
        assert!(User::find_all(&db, &w2).await.unwrap().is_empty());
        assert_eq!(User::delete(&db, &w2, ana.id).await.unwrap(), 0);
        assert!(matches!(
            User::update(&db, &w2, ana.id, &UpdateUser::default()).await,
            Err(UserError::UserNotFound)
        ));
    }

    #[tokio::test]
    async fn changing_team_moves_membership() {
        let db = setup_db().await;
        let scope = fixtures::workspace(&db, "One").await;
        let ana = fixtures::user(&db, &scope, "ana@one.io", Role::Member).await;
        let red = Team::create(&db, &scope, None, &CreateTeam { name: "Red".into(), ..Default::default() })
            .await
            .unwrap();
        let blue = Team::create(&db, &scope, None, &CreateTeam { name: "Blue".into(), ..Default::default() })
            .await
            .unwrap();

        let patch = |team: Option<Uuid>| UpdateUser { team_id: Some(team), ..Default::default() };
        let ana = User::update(&db, &scope, ana.id, &patch(Some(red.id))).await.unwrap();
        assert_eq!(ana.team_id, Some(red.id));
        let ana = User::update(&db, &scope, ana.id, &patch(Some(blue.id))).await.unwrap();
        assert_eq!(ana.team_id, Some(blue.id));

        let red = Team::find_by_id(&db, &scope, red.id).await.unwrap().unwrap();
        let blue = Team::find_by_id(&db, &scope, blue.id).await.unwrap().unwrap();
        assert!(red.members.is_empty());
        assert_eq!(blue.members, vec![ana.id]);

        let ana = User::update(&db, &scope, ana.id, &patch(None)).await.unwrap();
        assert_eq!(ana.team_id, None);
    }
}
