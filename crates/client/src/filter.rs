use chrono::{DateTime, Utc};
use db::models::task::Task;
use protocol::{TaskPriority, TaskStatus};
use uuid::Uuid;

pub fn is_overdue(task: &Task, now: DateTime<Utc>) -> bool {
    task.status != TaskStatus::Done && task.due_date.is_some_and(|due| due < now)
}

/// List filters applied to the locally held tasks. Unset fields match
/// everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub assignee: Option<Uuid>,
    pub team_id: Option<Uuid>,
    /// Case-insensitive substring of title or description.
    pub search: Option<String>,
    pub overdue_only: bool,
}

impl TaskFilter {
    pub fn matches(&self, task: &Task, now: DateTime<Utc>) -> bool {
        if self.status.is_some_and(|status| task.status != status) {
            return false;
        }
        if self.priority.is_some_and(|priority| task.priority != priority) {
            return false;
        }
        if self
            .assignee
            .is_some_and(|assignee| !task.assigned_to.contains(&assignee))
        {
            return false;
        }
        if self.team_id.is_some() && task.team_id != self.team_id {
            return false;
        }
        if self.overdue_only && !is_overdue(task, now) {
            return false;
        }
        match self.search.as_deref().map(str::trim) {
            Some(needle) if !needle.is_empty() => {
                let needle = needle.to_lowercase();
                task.title.to_lowercase().contains(&needle)
                    || task
                        .description
                        .as_deref()
                        .is_some_and(|description| description.to_lowercase().contains(&needle))
            }
            _ => true,
        }
    }

    pub fn apply<'a, I>(&self, tasks: I, now: DateTime<Utc>) -> Vec<&'a Task>
    where
        I: IntoIterator<Item = &'a Task>,
    {
        tasks
            .into_iter()
            .filter(|task| self.matches(task, now))
            .collect()
    }
}
