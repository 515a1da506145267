use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
    Set,
};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::{
    entities::task_comment,
    models::ids,
    scope::WorkspaceScope,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct TaskComment {
    pub id: Uuid,
    pub task_id: Uuid,
    pub author_id: Option<Uuid>,
    pub content: String,
    pub mentions: Vec<Uuid>,
    #[ts(type = "Date")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "Date")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct CreateTaskComment {
    pub content: String,
    /// Explicit mentions; `@handle` tokens in `content` are resolved on top.
    #[serde(default)]
    pub mentions: Vec<Uuid>,
}

impl TaskComment {
    fn from_model(model: task_comment::Model, task_id: Uuid, author_id: Option<Uuid>) -> Self {
        let mentions = serde_json::from_value::<Vec<Uuid>>(model.mentions).unwrap_or_default();
        Self {
            id: model.uuid,
            task_id,
            author_id,
            content: model.content,
            mentions,
            created_at: model.created_at.into(),
            updated_at: model.updated_at.into(),
        }
    }

    /// Oldest first.
    pub async fn find_by_task<C: ConnectionTrait>(
        db: &C,
        scope: &WorkspaceScope,
        task_row_id: i64,
        task_id: Uuid,
    ) -> Result<Vec<Self>, DbErr> {
        let models = task_comment::Entity::find()
            .filter(task_comment::Column::TaskId.eq(task_row_id))
            .filter(task_comment::Column::WorkspaceId.eq(scope.row_id))
            .order_by_asc(task_comment::Column::CreatedAt)
            .order_by_asc(task_comment::Column::Id)
            .all(db)
            .await?;

        let author_rows: Vec<i64> = models.iter().filter_map(|m| m.author_id).collect();
        let authors = ids::user_uuids_by_ids(db, &author_rows).await?;
        Ok(models
            .into_iter()
            .map(|model| {
                let author = model.author_id.and_then(|id| authors.get(&id).copied());
                Self::from_model(model, task_id, author)
            })
            .collect())
    }

    /// `mentions` must already be resolved to users of this workspace.
    pub async fn create<C: ConnectionTrait>(
        db: &C,
        scope: &WorkspaceScope,
        task_row_id: i64,
        task_id: Uuid,
        author_row_id: i64,
        content: &str,
        mentions: &[Uuid],
    ) -> Result<Self, DbErr> {
        let now = Utc::now();
        let mentions_json =
            serde_json::to_value(mentions).map_err(|err| DbErr::Custom(err.to_string()))?;
        let active = task_comment::ActiveModel {
            uuid: Set(Uuid::new_v4()),
            workspace_id: Set(Some(scope.row_id)),
            task_id: Set(task_row_id),
            author_id: Set(Some(author_row_id)),
            content: Set(content.trim().to_string()),
            mentions: Set(mentions_json),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
            ..Default::default()
        };
        let model = active.insert(db).await?;
        let author = ids::user_uuid_by_id(db, author_row_id).await?;
        Ok(Self::from_model(model, task_id, author))
    }
}

#[cfg(test)]
mod tests {
    use protocol::Role;

    use super::*;
    use crate::{
        models::{
            fixtures,
            task::{CreateTask, Task},
        },
        test_utils::setup_db,
    };

    #[tokio::test]
    async fn comments_list_in_order_with_mentions() {
        let db = setup_db().await;
        let scope = fixtures::workspace(&db, "One").await;
        let ana = fixtures::user(&db, &scope, "ana@one.io", Role::Admin).await;
        let bob = fixtures::user(&db, &scope, "bob@one.io", Role::Member).await;
        let ana_row = ids::user_id_in_scope(&db, &scope, ana.id).await.unwrap().unwrap();
        let task = Task::create(
            &db,
            &scope,
            ana_row,
            &CreateTask { title: "Discuss".into(), ..Default::default() },
        )
        .await
        .unwrap();
        let task_row = ids::task_id_in_scope(&db, &scope, task.id).await.unwrap().unwrap();

        TaskComment::create(&db, &scope, task_row, task.id, ana_row, " first ", &[bob.id])
            .await
            .unwrap();
        TaskComment::create(&db, &scope, task_row, task.id, ana_row, "second", &[])
            .await
            .unwrap();

        let comments = TaskComment::find_by_task(&db, &scope, task_row, task.id).await.unwrap();
        assert_eq!(comments.len(), 2);
        assert_eq!(comments[0].content, "first");
        assert_eq!(comments[0].mentions, vec![bob.id]);
        assert_eq!(comments[0].author_id, Some(ana.id));
        assert!(comments[1].mentions.is_empty());

        let other = fixtures::workspace(&db, "Two").await;
        assert!(
            TaskComment::find_by_task(&db, &other, task_row, task.id)
                .await
                .unwrap()
                .is_empty()
        );
    }
}
