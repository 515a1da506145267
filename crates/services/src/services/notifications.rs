use db::{
    DBService, TransactionTrait,
    events::ChangeLogDraft,
    models::notification::Notification,
};
use protocol::{Action, ChangeLogEventType, Resource, realtime::NOTIFICATIONS_READ};
use serde::Serialize;
use ts_rs::TS;
use uuid::Uuid;

use super::{
    activity::Activity,
    context::Actor,
    error::{Result, ServiceError},
};

pub const DEFAULT_LIMIT: u64 = 50;
pub const MAX_LIMIT: u64 = 200;

#[derive(Debug, Clone, Serialize, TS)]
pub struct NotificationList {
    pub notifications: Vec<Notification>,
    pub unread_count: u64,
}

#[derive(Debug, Clone, Copy, Serialize, TS)]
pub struct MarkReadResult {
    pub updated: u64,
}

#[derive(Clone, Default)]
pub struct NotificationService;

impl NotificationService {
    pub fn new() -> Self {
        Self
    }

    pub async fn list(
        &self,
        db: &DBService,
        actor: &Actor,
        unread_only: bool,
        limit: Option<u64>,
    ) -> Result<NotificationList> {
        actor.require(Resource::Notification, Action::Read)?;
        let limit = limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
        let notifications = Notification::list_for_user(
            &db.pool,
            &actor.scope,
            actor.row_id,
            actor.id(),
            unread_only,
            limit,
        )
        .await?;
        let unread_count = Notification::unread_count(&db.pool, &actor.scope, actor.row_id).await?;
        Ok(NotificationList { notifications, unread_count })
    }

    /// Marks the listed notifications (all unread ones when empty) read.
    /// Repeating the call updates nothing and records nothing.
    pub async fn mark_read(
        &self,
        db: &DBService,
        actor: &Actor,
        notification_ids: &[Uuid],
    ) -> Result<MarkReadResult> {
        actor.require(Resource::Notification, Action::Update)?;

        let tx = db.pool.begin().await?;
        let updated = Notification::mark_read(&tx, &actor.scope, actor.row_id, notification_ids).await?;
        if updated > 0 {
            let scope = if notification_ids.is_empty() { "all" } else { "selected" };
            Activity::new(NOTIFICATIONS_READ, actor, "notification", actor.id())
                .for_recipient(actor.id())
                .entity(&serde_json::json!({
                    "user_id": actor.id(),
                    "notification_ids": notification_ids,
                    "updated": updated,
                }))?
                .changelog(
                    ChangeLogDraft::new(
                        ChangeLogEventType::NotificationsRead,
                        "mark_read",
                        format!("Marked {updated} notification(s) as read"),
                    )
                    .metadata(serde_json::json!({ "scope": scope, "updated": updated })),
                )
                .enqueue(&tx)
                .await?;
        }
        tx.commit().await?;
        Ok(MarkReadResult { updated })
    }

    pub async fn delete(&self, db: &DBService, actor: &Actor, id: Uuid) -> Result<()> {
        actor.require(Resource::Notification, Action::Delete)?;
        let deleted = Notification::delete(&db.pool, &actor.scope, actor.row_id, id).await?;
        if deleted == 0 {
            return Err(ServiceError::NotFound("Notification"));
        }
        Ok(())
    }
}
