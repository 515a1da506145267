//! Types shared by the TaskFlow server and its clients.
//!
//! Closed enums that cross the wire (changelog event and target types,
//! notification types, roles) live here so the backend emitters, the REST
//! filters and the client gating all compile against one definition.

pub mod changelog;
pub mod notification;
pub mod policy;
pub mod realtime;
pub mod roles;
pub mod task;

pub use changelog::{ChangeLogEventType, EventTypeCatalog, EventTypeInfo, TargetType};
pub use notification::NotificationType;
pub use policy::{Action, Resource, TaskVisibility, authorize, task_visibility};
pub use realtime::{RealtimeEvent, Subscriber, TaskAudience};
pub use roles::{Role, WorkspaceType};
pub use task::{TaskPriority, TaskStatus};
