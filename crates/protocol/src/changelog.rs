use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
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
pub enum ChangeLogEventType {
    UserCreated,
    UserUpdated,
    UserDeleted,
    UserRoleChanged,
    UserBulkImported,
    TaskCreated,
    TaskUpdated,
    TaskDeleted,
    TaskStatusChanged,
    TaskAssigned,
    TaskUnassigned,
    TaskCommentAdded,
    TeamCreated,
    TeamUpdated,
    TeamDeleted,
    TeamMemberAdded,
    TeamMemberRemoved,
    TeamPinChanged,
    WorkspaceCreated,
    WorkspaceUpdated,
    WorkspaceDeleted,
    WorkspaceActivated,
    WorkspaceDeactivated,
    NotificationsRead,
    ChangelogCleared,
    ChangelogExported,
}

impl ChangeLogEventType {
    pub fn target_type(&self) -> TargetType {
        use ChangeLogEventType::*;
        match self {
            UserCreated | UserUpdated | UserDeleted | UserRoleChanged | UserBulkImported => {
                TargetType::User
            }
            TaskCreated | TaskUpdated | TaskDeleted | TaskStatusChanged | TaskAssigned
            | TaskUnassigned => TargetType::Task,
            TaskCommentAdded => TargetType::Comment,
            TeamCreated | TeamUpdated | TeamDeleted | TeamMemberAdded | TeamMemberRemoved
            | TeamPinChanged => TargetType::Team,
            WorkspaceCreated | WorkspaceUpdated | WorkspaceDeleted | WorkspaceActivated
            | WorkspaceDeactivated => TargetType::Workspace,
            NotificationsRead => TargetType::Notification,
            ChangelogCleared | ChangelogExported => TargetType::Changelog,
        }
    }

    /// Human label used by filter dropdowns and CSV exports.
    pub fn label(&self) -> String {
        let raw = self.to_string();
        let mut words = raw.split('_');
        let mut label = String::with_capacity(raw.len());
        if let Some(first) = words.next() {
            let mut chars = first.chars();
            if let Some(c) = chars.next() {
                label.extend(c.to_uppercase());
                label.push_str(chars.as_str());
            }
        }
        for word in words {
            label.push(' ');
            label.push_str(word);
        }
        label
    }
}

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
pub enum TargetType {
    User,
    Task,
    Team,
    Workspace,
    Comment,
    Notification,
    Changelog,
    System,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct EventTypeInfo {
    pub value: ChangeLogEventType,
    pub label: String,
    pub target_type: TargetType,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct EventTypeCatalog {
    pub event_types: Vec<EventTypeInfo>,
    pub target_types: Vec<TargetType>,
}

pub fn catalog() -> EventTypeCatalog {
    EventTypeCatalog {
        event_types: ChangeLogEventType::iter()
            .map(|value| EventTypeInfo {
                value,
                label: value.label(),
                target_type: value.target_type(),
            })
            .collect(),
        target_types: TargetType::iter().collect(),
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn enum_sizes_are_fixed() {
        assert_eq!(ChangeLogEventType::iter().count(), 26);
        assert_eq!(TargetType::iter().count(), 8);
    }

    #[test]
    fn every_event_type_parses_from_its_wire_name() {
        for event in ChangeLogEventType::iter() {
            let wire = serde_json::to_value(event).unwrap();
            assert_eq!(wire.as_str().unwrap(), event.to_string());
            assert_eq!(ChangeLogEventType::from_str(&event.to_string()).unwrap(), event);
        }
    }

    #[test]
    fn labels_are_sentence_case() {
        assert_eq!(ChangeLogEventType::TaskStatusChanged.label(), "Task status changed");
        assert_eq!(ChangeLogEventType::UserCreated.label(), "User created");
    }

    #[test]
    fn catalog_lists_everything_once() {
        let catalog = catalog();
        assert_eq!(catalog.event_types.len(), 26);
        assert_eq!(catalog.target_types.len(), 8);
        let comment = catalog
            .event_types
            .iter()
            .find(|info| info.value == ChangeLogEventType::TaskCommentAdded)
            .unwrap();
        assert_eq!(comment.target_type, TargetType::Comment);
    }
}
