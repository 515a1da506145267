//! Builds the outbox payload a mutation enqueues next to its primary write.

use db::{
    ConnectionTrait,
    events::{ActivityPayload, ChangeLogDraft, ChangeSet, NotificationDraft},
    models::{event_outbox::EventOutbox, task::Task},
};
use protocol::NotificationType;
use serde::Serialize;
use uuid::Uuid;

use super::{context::Actor, error::Result};

/// Snapshot helper for `changes.before/after`.
pub fn snapshot<T: Serialize>(value: &T) -> Result<serde_json::Value> {
    Ok(serde_json::to_value(value)?)
}

/// Only the fields that differ between two snapshots, as a `ChangeSet`.
pub fn diff(before: &serde_json::Value, after: &serde_json::Value) -> ChangeSet {
    let (Some(before), Some(after)) = (before.as_object(), after.as_object()) else {
        return ChangeSet {
            before: Some(before.clone()),
            after: Some(after.clone()),
        };
    };
    let mut old = serde_json::Map::new();
    let mut new = serde_json::Map::new();
    for (key, value) in after {
        if key == "updated_at" {
            continue;
        }
        let previous = before.get(key).cloned().unwrap_or(serde_json::Value::Null);
        if &previous != value {
            old.insert(key.clone(), previous);
            new.insert(key.clone(), value.clone());
        }
    }
    if old.is_empty() {
        return ChangeSet::default();
    }
    ChangeSet {
        before: Some(old.into()),
        after: Some(new.into()),
    }
}

pub struct Activity {
    topic: &'static str,
    actor_id: Option<Uuid>,
    payload: ActivityPayload,
}

impl Activity {
    pub fn new(topic: &'static str, actor: &Actor, entity_type: &str, entity_id: Uuid) -> Self {
        Self {
            topic,
            actor_id: Some(actor.id()),
            payload: ActivityPayload {
                workspace_id: Some(actor.workspace_id()),
                actor: Some(actor.actor_ref()),
                entity_type: entity_type.to_string(),
                entity_id: Some(entity_id),
                entity: None,
                changelog: None,
                notifications: Vec::new(),
                audience: None,
                recipient_id: None,
            },
        }
    }

    /// Events about a workspace other than the actor's own.
    pub fn in_workspace(mut self, workspace_id: Option<Uuid>) -> Self {
        self.payload.workspace_id = workspace_id;
        self
    }

    pub fn entity<T: Serialize>(mut self, entity: &T) -> Result<Self> {
        self.payload.entity = Some(serde_json::to_value(entity)?);
        Ok(self)
    }

    /// Restricts the realtime payload to viewers who can see `task`.
    pub fn audience(mut self, task: &Task) -> Self {
        self.payload.audience = Some(task.audience());
        self
    }

    /// Delivers the realtime event to `user_id` only.
    pub fn for_recipient(mut self, user_id: Uuid) -> Self {
        self.payload.recipient_id = Some(user_id);
        self
    }

    pub fn changelog(mut self, draft: ChangeLogDraft) -> Self {
        self.payload.changelog = Some(draft);
        self
    }

    /// Queues one notification per recipient. The actor and users who
    /// already have a notification in this activity are skipped, so call
    /// the most specific kind first.
    pub fn notify(
        mut self,
        recipients: impl IntoIterator<Item = Uuid>,
        notification_type: NotificationType,
        message: impl Into<String>,
        task_id: Option<Uuid>,
    ) -> Self {
        let message = message.into();
        for user_id in recipients {
            if Some(user_id) == self.actor_id
                || self.payload.notifications.iter().any(|n| n.user_id == user_id)
            {
                continue;
            }
            self.payload.notifications.push(NotificationDraft {
                user_id,
                notification_type,
                title: notification_type.default_title().to_string(),
                message: message.clone(),
                task_id,
            });
        }
        self
    }

    pub fn payload(&self) -> &ActivityPayload {
        &self.payload
    }

    pub async fn enqueue<C: ConnectionTrait>(self, db: &C) -> Result<Uuid> {
        Ok(EventOutbox::enqueue_activity(db, self.topic, &self.payload).await?)
    }
}

#[cfg(test)]
mod tests {
    use db::{WorkspaceScope, models::user::{User, UserRecord}};
    use protocol::{Role, WorkspaceType, realtime::TASK_UPDATED};
    use serde_json::json;

    use super::*;

    fn actor() -> Actor {
        let now = chrono::Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            workspace_id: None,
            team_id: None,
            name: "Ana".into(),
            email: "ana@one.io".into(),
            role: Role::Admin,
            profile_picture: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        Actor::new(
            UserRecord { row_id: 1, workspace_row_id: Some(1), team_row_id: None, user },
            WorkspaceScope::new(1, Uuid::new_v4()),
            WorkspaceType::Core,
        )
    }

    #[test]
    fn actor_is_never_notified_and_first_kind_wins() {
        let ana = actor();
        let bob = Uuid::new_v4();
        let activity = Activity::new(TASK_UPDATED, &ana, "task", Uuid::new_v4())
            .notify([bob, ana.id()], NotificationType::TaskCompleted, "done", None)
            .notify([bob], NotificationType::TaskStatusChanged, "moved", None);

        let drafts = &activity.payload().notifications;
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].user_id, bob);
        assert_eq!(drafts[0].notification_type, NotificationType::TaskCompleted);
        assert_eq!(drafts[0].title, "Task completed");
    }

    #[test]
    fn diff_keeps_only_changed_fields() {
        let before = json!({ "title": "a", "status": "todo", "updated_at": "x" });
        let after = json!({ "title": "a", "status": "done", "updated_at": "y" });
        let changes = diff(&before, &after);
        assert_eq!(changes.before, Some(json!({ "status": "todo" })));
        assert_eq!(changes.after, Some(json!({ "status": "done" })));
        assert!(diff(&before, &before).is_empty());
    }
}
