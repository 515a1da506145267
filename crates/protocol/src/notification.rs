use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};
use ts_rs::TS;

#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    TS,
    EnumString,
    EnumIter,
    Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum NotificationType {
    TaskAssigned,
    TaskUpdated,
    TaskStatusChanged,
    TaskCompleted,
    CommentAdded,
    Mention,
    TeamAdded,
}

impl NotificationType {
    pub fn default_title(&self) -> &'static str {
        match self {
            NotificationType::TaskAssigned => "New task assigned",
            NotificationType::TaskUpdated => "Task updated",
            NotificationType::TaskStatusChanged => "Task status changed",
            NotificationType::TaskCompleted => "Task completed",
            NotificationType::CommentAdded => "New comment",
            NotificationType::Mention => "You were mentioned",
            NotificationType::TeamAdded => "Added to team",
        }
    }
}

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn seven_notification_types() {
        assert_eq!(NotificationType::iter().count(), 7);
        assert_eq!(NotificationType::CommentAdded.to_string(), "comment_added");
    }
}
