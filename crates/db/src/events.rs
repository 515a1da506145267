//! Payloads stored in `event_outbox.payload`.
//!
//! The outbox `event_type` is the realtime topic (see
//! `protocol::realtime`); the payload carries everything the dispatcher
//! needs to materialize the audit entry and notifications without touching
//! the primary rows again.

use protocol::{ChangeLogEventType, NotificationType, Role, TargetType, TaskAudience};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use ts_rs::TS;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct ActorRef {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
pub struct ChangeSet {
    pub before: Option<Value>,
    pub after: Option<Value>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.before.is_none() && self.after.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeLogDraft {
    pub event_type: ChangeLogEventType,
    pub target_type: TargetType,
    pub target_id: Option<Uuid>,
    pub target_name: Option<String>,
    pub action: String,
    pub description: String,
    pub changes: Option<ChangeSet>,
    pub metadata: Option<Value>,
}

impl ChangeLogDraft {
    pub fn new(
        event_type: ChangeLogEventType,
        action: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            event_type,
            target_type: event_type.target_type(),
            target_id: None,
            target_name: None,
            action: action.into(),
            description: description.into(),
            changes: None,
            metadata: None,
        }
    }

    pub fn target(mut self, id: Uuid, name: impl Into<String>) -> Self {
        self.target_id = Some(id);
        self.target_name = Some(name.into());
        self
    }

    pub fn changes(mut self, changes: ChangeSet) -> Self {
        self.changes = (!changes.is_empty()).then_some(changes);
        self
    }

    pub fn metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationDraft {
    pub user_id: Uuid,
    pub notification_type: NotificationType,
    pub title: String,
    pub message: String,
    pub task_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityPayload {
    pub workspace_id: Option<Uuid>,
    pub actor: Option<ActorRef>,
    pub entity_type: String,
    pub entity_id: Option<Uuid>,
    /// Entity as the REST API returns it after the change; `None` on delete.
    pub entity: Option<Value>,
    pub changelog: Option<ChangeLogDraft>,
    #[serde(default)]
    pub notifications: Vec<NotificationDraft>,
    /// Narrows task-scoped events to the viewers who can see the task.
    #[serde(default)]
    pub audience: Option<TaskAudience>,
    /// Delivers the event to this user only.
    #[serde(default)]
    pub recipient_id: Option<Uuid>,
}
