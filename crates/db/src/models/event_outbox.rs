use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set,
};
use serde_json::Value;
use uuid::Uuid;

use crate::{entities::event_outbox, events::ActivityPayload};

pub struct EventOutbox;

impl EventOutbox {
    /// Queues a secondary effect. Call inside the transaction that performs
    /// the primary write. Returns the entry uuid, which later becomes the
    /// `source_event_id` of everything materialized from it.
    pub async fn enqueue<C: ConnectionTrait>(
        db: &C,
        event_type: &str,
        entity_type: &str,
        entity_uuid: Uuid,
        payload: Value,
    ) -> Result<Uuid, DbErr> {
        let uuid = Uuid::new_v4();
        let active = event_outbox::ActiveModel {
            uuid: Set(uuid),
            event_type: Set(event_type.to_string()),
            entity_type: Set(entity_type.to_string()),
            entity_uuid: Set(entity_uuid),
            payload: Set(payload),
            created_at: Set(Utc::now().into()),
            published_at: Set(None),
            attempts: Set(0),
            last_error: Set(None),
            ..Default::default()
        };

        active.insert(db).await?;
        Ok(uuid)
    }

    pub async fn enqueue_activity<C: ConnectionTrait>(
        db: &C,
        event_type: &str,
        payload: &ActivityPayload,
    ) -> Result<Uuid, DbErr> {
        let entity_uuid = payload
            .entity_id
            .or(payload.workspace_id)
            .unwrap_or_else(Uuid::nil);
        let value =
            serde_json::to_value(payload).map_err(|err| DbErr::Custom(err.to_string()))?;
        Self::enqueue(db, event_type, &payload.entity_type, entity_uuid, value).await
    }

    /// Unpublished entries that still have retries left, oldest first.
    pub async fn fetch_unpublished<C: ConnectionTrait>(
        db: &C,
        limit: u64,
        max_attempts: i32,
    ) -> Result<Vec<event_outbox::Model>, DbErr> {
        event_outbox::Entity::find()
            .filter(event_outbox::Column::PublishedAt.is_null())
            .filter(event_outbox::Column::Attempts.lt(max_attempts))
            .order_by_asc(event_outbox::Column::CreatedAt)
            .order_by_asc(event_outbox::Column::Id)
            .limit(limit)
            .all(db)
            .await
    }

    pub async fn mark_published<C: ConnectionTrait>(db: &C, id: i64) -> Result<(), DbErr> {
        let record =
            event_outbox::Entity::find_by_id(id)
                .one(db)
                .await?
                .ok_or(DbErr::RecordNotFound(
                    "Event outbox record not found".to_string(),
                ))?;

        let mut active: event_outbox::ActiveModel = record.into();
        active.published_at = Set(Some(Utc::now().into()));
        active.update(db).await?;
        Ok(())
    }

    /// Records a failed dispatch and returns the new attempt count.
    pub async fn mark_failed<C: ConnectionTrait>(
        db: &C,
        id: i64,
        error: &str,
    ) -> Result<i32, DbErr> {
        let record =
            event_outbox::Entity::find_by_id(id)
                .one(db)
                .await?
                .ok_or(DbErr::RecordNotFound(
                    "Event outbox record not found".to_string(),
                ))?;

        let attempts = record.attempts + 1;
        let mut active: event_outbox::ActiveModel = record.into();
        active.attempts = Set(attempts);
        active.last_error = Set(Some(error.to_string()));
        active.update(db).await?;
        Ok(attempts)
    }

    pub async fn dead_letter_count<C: ConnectionTrait>(
        db: &C,
        max_attempts: i32,
    ) -> Result<u64, DbErr> {
        event_outbox::Entity::find()
            .filter(event_outbox::Column::PublishedAt.is_null())
            .filter(event_outbox::Column::Attempts.gte(max_attempts))
            .count(db)
            .await
    }
}
