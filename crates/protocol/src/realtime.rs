use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use ts_rs::TS;
use uuid::Uuid;

use crate::{
    policy::{Action, Resource, TaskVisibility, authorize, task_visibility},
    roles::{Role, WorkspaceType},
};

pub const TASK_CREATED: &str = "task:created";
pub const TASK_UPDATED: &str = "task:updated";
pub const TASK_DELETED: &str = "task:deleted";
pub const TASK_COMMENTED: &str = "task:commented";

pub const TEAM_CREATED: &str = "team:created";
pub const TEAM_UPDATED: &str = "team:updated";
pub const TEAM_DELETED: &str = "team:deleted";

pub const USER_CREATED: &str = "user:created";
pub const USER_UPDATED: &str = "user:updated";
pub const USER_DELETED: &str = "user:deleted";
pub const USERS_IMPORTED: &str = "user:imported";

pub const WORKSPACE_CREATED: &str = "workspace:created";
pub const WORKSPACE_UPDATED: &str = "workspace:updated";
pub const WORKSPACE_DELETED: &str = "workspace:deleted";

pub const NOTIFICATION_CREATED: &str = "notification:created";
pub const NOTIFICATIONS_READ: &str = "notification:read";

pub const CHANGELOG_CLEARED: &str = "changelog:cleared";
pub const CHANGELOG_EXPORTED: &str = "changelog:exported";

/// Sent to a subscriber that fell behind the broadcast buffer; the client
/// must reload its lists over REST.
pub const RESYNC: &str = "resync";
/// First frame of every realtime session.
pub const CONNECTED: &str = "connected";

/// Who a task-scoped event concerns, for viewers without workspace-wide
/// task visibility.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskAudience {
    pub team_id: Option<Uuid>,
    /// Assignees and the creator.
    pub users: Vec<Uuid>,
}

impl TaskAudience {
    pub fn new(
        team_id: Option<Uuid>,
        assigned_to: impl IntoIterator<Item = Uuid>,
        created_by: Option<Uuid>,
    ) -> Self {
        let mut users: Vec<Uuid> = assigned_to.into_iter().collect();
        users.extend(created_by);
        Self { team_id, users }
    }

    pub fn admits(&self, user_id: Uuid, team_id: Option<Uuid>, visibility: TaskVisibility) -> bool {
        match visibility {
            TaskVisibility::Workspace => true,
            TaskVisibility::Team => {
                self.users.contains(&user_id) || (team_id.is_some() && self.team_id == team_id)
            }
            TaskVisibility::Own => self.users.contains(&user_id),
        }
    }
}

/// The identity of one realtime session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subscriber {
    pub workspace_id: Uuid,
    pub user_id: Uuid,
    pub team_id: Option<Uuid>,
    pub role: Role,
    pub tier: WorkspaceType,
}

impl Subscriber {
    fn can_read(&self, resource: Resource) -> bool {
        authorize(self.role, self.tier, resource, Action::Read)
    }
}

fn resource_of(entity_type: &str) -> Option<Resource> {
    match entity_type {
        "task" | "comment" => Some(Resource::Task),
        "team" => Some(Resource::Team),
        "user" => Some(Resource::User),
        "notification" => Some(Resource::Notification),
        "changelog" => Some(Resource::ChangeLog),
        "workspace" => Some(Resource::Workspace),
        _ => None,
    }
}

/// A server-confirmed state change pushed to connected sessions.
///
/// `data` carries the entity as the REST API would return it after the
/// change; it is `None` for deletions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct RealtimeEvent {
    pub event: String,
    pub workspace_id: Option<Uuid>,
    pub entity_type: String,
    pub entity_id: Option<Uuid>,
    /// Set when the event concerns a single user (their notifications).
    pub recipient_id: Option<Uuid>,
    pub data: Option<Value>,
    #[ts(type = "Date")]
    pub emitted_at: DateTime<Utc>,
    #[serde(skip)]
    #[ts(skip)]
    pub audience: Option<TaskAudience>,
}

impl RealtimeEvent {
    pub fn new(
        event: impl Into<String>,
        workspace_id: Option<Uuid>,
        entity_type: impl Into<String>,
        entity_id: Option<Uuid>,
        data: Option<Value>,
    ) -> Self {
        Self {
            event: event.into(),
            workspace_id,
            entity_type: entity_type.into(),
            entity_id,
            recipient_id: None,
            data,
            emitted_at: Utc::now(),
            audience: None,
        }
    }

    pub fn with_audience(mut self, audience: Option<TaskAudience>) -> Self {
        self.audience = audience;
        self
    }

    pub fn for_recipient(mut self, recipient_id: Uuid) -> Self {
        self.recipient_id = Some(recipient_id);
        self
    }

    pub fn resync() -> Self {
        Self::new(RESYNC, None, "system", None, None)
    }

    pub fn connected(workspace_id: Uuid) -> Self {
        Self::new(CONNECTED, Some(workspace_id), "system", None, None)
    }

    /// Events after which a client must reload its lists over REST.
    pub fn requires_reload(&self) -> bool {
        self.event == RESYNC || self.event == CONNECTED
    }

    pub fn is_deletion(&self) -> bool {
        self.event.ends_with(":deleted")
    }

    /// Whether a session of `user_id` in `workspace_id` may receive this event.
    pub fn is_visible_to(&self, workspace_id: Uuid, user_id: Uuid) -> bool {
        if self.event == RESYNC {
            return true;
        }
        if self.workspace_id != Some(workspace_id) {
            return false;
        }
        match self.recipient_id {
            Some(recipient) => recipient == user_id,
            None => true,
        }
    }

    /// What `subscriber` receives of this event: nothing when it belongs to
    /// another workspace or user, an id-only invalidation when the role may
    /// not read the entity, otherwise the event itself.
    pub fn view_for(&self, subscriber: &Subscriber) -> Option<RealtimeEvent> {
        if !self.is_visible_to(subscriber.workspace_id, subscriber.user_id) {
            return None;
        }
        let readable = match resource_of(&self.entity_type) {
            None => true,
            Some(resource) if !subscriber.can_read(resource) => false,
            Some(Resource::Task) => self.audience.as_ref().is_none_or(|audience| {
                audience.admits(
                    subscriber.user_id,
                    subscriber.team_id,
                    task_visibility(subscriber.role),
                )
            }),
            Some(_) => true,
        };
        if readable {
            Some(self.clone())
        } else {
            Some(self.redacted())
        }
    }

    /// The event without its entity. Clients drop their cached copy.
    pub fn redacted(&self) -> Self {
        Self {
            data: None,
            audience: None,
            ..self.clone()
        }
    }

    /// An event that names an entity without carrying it.
    pub fn is_invalidation(&self) -> bool {
        self.data.is_none() && self.entity_id.is_some() && !self.is_deletion()
    }
}
