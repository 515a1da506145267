use chrono::{DateTime, Utc};
use protocol::NotificationType;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, sea_query::Expr,
};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::{
    entities::notification,
    events::NotificationDraft,
    models::{ids, parse_enum},
    scope::WorkspaceScope,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub notification_type: NotificationType,
    pub title: String,
    pub message: String,
    pub task_id: Option<Uuid>,
    pub is_read: bool,
    #[ts(type = "Date | null")]
    pub read_at: Option<DateTime<Utc>>,
    #[ts(type = "Date")]
    pub created_at: DateTime<Utc>,
}

impl Notification {
    async fn from_model<C: ConnectionTrait>(
        db: &C,
        model: notification::Model,
        user_id: Uuid,
    ) -> Result<Self, DbErr> {
        Ok(Self {
            id: model.uuid,
            user_id,
            notification_type: parse_enum("notification_type", &model.notification_type)?,
            title: model.title,
            message: model.message,
            task_id: match model.task_id {
                Some(id) => ids::task_uuid_by_id(db, id).await?,
                None => None,
            },
            is_read: model.read_at.is_some(),
            read_at: model.read_at.map(Into::into),
            created_at: model.created_at.into(),
        })
    }

    /// Newest first.
    pub async fn list_for_user<C: ConnectionTrait>(
        db: &C,
        scope: &WorkspaceScope,
        user_row_id: i64,
        user_id: Uuid,
        unread_only: bool,
        limit: u64,
    ) -> Result<Vec<Self>, DbErr> {
        let mut select = notification::Entity::find()
            .filter(notification::Column::WorkspaceId.eq(scope.row_id))
            .filter(notification::Column::UserId.eq(user_row_id));
        if unread_only {
            select = select.filter(notification::Column::ReadAt.is_null());
        }
        let models = select
            .order_by_desc(notification::Column::CreatedAt)
            .order_by_desc(notification::Column::Id)
            .limit(limit)
            .all(db)
            .await?;

        let mut notifications = Vec::with_capacity(models.len());
        for model in models {
            notifications.push(Self::from_model(db, model, user_id).await?);
        }
        Ok(notifications)
    }

    pub async fn unread_count<C: ConnectionTrait>(
        db: &C,
        scope: &WorkspaceScope,
        user_row_id: i64,
    ) -> Result<u64, DbErr> {
        notification::Entity::find()
            .filter(notification::Column::WorkspaceId.eq(scope.row_id))
            .filter(notification::Column::UserId.eq(user_row_id))
            .filter(notification::Column::ReadAt.is_null())
            .count(db)
            .await
    }

    /// Marks the listed notifications read, or every unread one when the list
    /// is empty. Already-read rows are not touched, so repeating the call
    /// reports 0.
    pub async fn mark_read<C: ConnectionTrait>(
        db: &C,
        scope: &WorkspaceScope,
        user_row_id: i64,
        notification_ids: &[Uuid],
    ) -> Result<u64, DbErr> {
        let mut update = notification::Entity::update_many()
            .col_expr(notification::Column::ReadAt, Expr::value(Utc::now()))
            .filter(notification::Column::WorkspaceId.eq(scope.row_id))
            .filter(notification::Column::UserId.eq(user_row_id))
            .filter(notification::Column::ReadAt.is_null());
        if !notification_ids.is_empty() {
            update = update.filter(notification::Column::Uuid.is_in(notification_ids.to_vec()));
        }
        let result = update.exec(db).await?;
        Ok(result.rows_affected)
    }

    pub async fn delete<C: ConnectionTrait>(
        db: &C,
        scope: &WorkspaceScope,
        user_row_id: i64,
        id: Uuid,
    ) -> Result<u64, DbErr> {
        let result = notification::Entity::delete_many()
            .filter(notification::Column::Uuid.eq(id))
            .filter(notification::Column::WorkspaceId.eq(scope.row_id))
            .filter(notification::Column::UserId.eq(user_row_id))
            .exec(db)
            .await?;
        Ok(result.rows_affected)
    }

    /// Materializes one outbox draft. Returns `None` when the recipient no
    /// longer exists in the workspace or the row was already written for
    /// this `source_event_id`.
    pub async fn create_from_draft<C: ConnectionTrait>(
        db: &C,
        scope: &WorkspaceScope,
        draft: &NotificationDraft,
        source_event_id: Uuid,
    ) -> Result<Option<Self>, DbErr> {
        let Some(user_row_id) = ids::user_id_in_scope(db, scope, draft.user_id).await? else {
            tracing::debug!(user_id = %draft.user_id, "notification recipient gone, skipping");
            return Ok(None);
        };

        let existing = notification::Entity::find()
            .filter(notification::Column::SourceEventId.eq(source_event_id))
            .filter(notification::Column::UserId.eq(user_row_id))
            .count(db)
            .await?;
        if existing > 0 {
            return Ok(None);
        }

        let task_row_id = match draft.task_id {
            Some(task_id) => ids::task_id_in_scope(db, scope, task_id).await?,
            None => None,
        };
        let active = notification::ActiveModel {
            uuid: Set(Uuid::new_v4()),
            workspace_id: Set(Some(scope.row_id)),
            user_id: Set(user_row_id),
            notification_type: Set(draft.notification_type.to_string()),
            title: Set(draft.title.clone()),
            message: Set(draft.message.clone()),
            task_id: Set(task_row_id),
            read_at: Set(None),
            created_at: Set(Utc::now().into()),
            source_event_id: Set(Some(source_event_id)),
            ..Default::default()
        };
        let model = active.insert(db).await?;
        Ok(Some(Self::from_model(db, model, draft.user_id).await?))
    }
}

#[cfg(test)]
mod tests {
    use protocol::Role;

    use super::*;
    use crate::{models::fixtures, test_utils::setup_db};

    fn draft(user_id: Uuid, title: &str) -> NotificationDraft {
        NotificationDraft {
            user_id,
            notification_type: NotificationType::TaskAssigned,
            title: title.to_string(),
            message: format!("{title} message"),
            task_id: None,
        }
    }

    #[tokio::test]
    async fn drafts_are_materialized_once_per_event() {
        let db = setup_db().await;
        let scope = fixtures::workspace(&db, "One").await;
        let bob = fixtures::user(&db, &scope, "bob@one.io", Role::Member).await;
        let event = Uuid::new_v4();

        let first = Notification::create_from_draft(&db, &scope, &draft(bob.id, "A"), event)
            .await
            .unwrap();
        assert!(first.is_some());
        let again = Notification::create_from_draft(&db, &scope, &draft(bob.id, "A"), event)
            .await
            .unwrap();
        assert!(again.is_none());

        let bob_row = ids::user_id_in_scope(&db, &scope, bob.id).await.unwrap().unwrap();
        assert_eq!(Notification::unread_count(&db, &scope, bob_row).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn mark_all_read_is_idempotent() {
        let db = setup_db().await;
        let scope = fixtures::workspace(&db, "One").await;
        let bob = fixtures::user(&db, &scope, "bob@one.io", Role::Member).await;
        let bob_row = ids::user_id_in_scope(&db, &scope, bob.id).await.unwrap().unwrap();
        for title in ["A", "B", "C"] {
            Notification::create_from_draft(&db, &scope, &draft(bob.id, title), Uuid::new_v4())
                .await
                .unwrap();
        }

        let listed = Notification::list_for_user(&db, &scope, bob_row, bob.id, false, 50)
            .await
            .unwrap();
        assert_eq!(listed.len(), 3);
        assert_eq!(
            Notification::mark_read(&db, &scope, bob_row, &[listed[0].id]).await.unwrap(),
            1
        );
        assert_eq!(Notification::mark_read(&db, &scope, bob_row, &[]).await.unwrap(), 2);
        assert_eq!(Notification::mark_read(&db, &scope, bob_row, &[]).await.unwrap(), 0);

        let unread = Notification::list_for_user(&db, &scope, bob_row, bob.id, true, 50)
            .await
            .unwrap();
        assert!(unread.is_empty());
    }

    #[tokio::test]
    async fn users_only_touch_their_own_inbox() {
        let db = setup_db().await;
        let scope = fixtures::workspace(&db, "One").await;
        let ana = fixtures::user(&db, &scope, "ana@one.io", Role::Member).await;
        let bob = fixtures::user(&db, &scope, "bob@one.io", Role::Member).await;
        let ana_row = ids::user_id_in_scope(&db, &scope, ana.id).await.unwrap().unwrap();
        let note = Notification::create_from_draft(&db, &scope, &draft(bob.id, "B"), Uuid::new_v4())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(Notification::delete(&db, &scope, ana_row, note.id).await.unwrap(), 0);
        assert_eq!(Notification::mark_read(&db, &scope, ana_row, &[note.id]).await.unwrap(), 0);
    }
}
