use std::cmp::Reverse;

use db::models::task::{Task, UpdateTask};
use protocol::TaskStatus;
use strum::IntoEnumIterator;

#[derive(Debug, Clone)]
pub struct Column<'a> {
    pub status: TaskStatus,
    pub tasks: Vec<&'a Task>,
}

/// One column per status, in workflow order, even when empty. Within a
/// column: highest priority first, then earliest due date (undated last),
/// then oldest.
pub fn board<'a, I>(tasks: I) -> Vec<Column<'a>>
where
    I: IntoIterator<Item = &'a Task>,
{
    let mut columns: Vec<Column<'a>> = TaskStatus::iter()
        .map(|status| Column {
            status,
            tasks: Vec::new(),
        })
        .collect();

    for task in tasks {
        if let Some(column) = columns.iter_mut().find(|column| column.status == task.status) {
            column.tasks.push(task);
        }
    }

    for column in &mut columns {
        column.tasks.sort_by_key(|task| {
            (
                Reverse(task.priority),
                task.due_date.is_none(),
                task.due_date,
                task.created_at,
            )
        });
    }
    columns
}

/// The patch a card drop sends. Any status may move to any other.
pub fn move_to(status: TaskStatus) -> UpdateTask {
    UpdateTask {
        status: Some(status),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use protocol::TaskPriority;
    use uuid::Uuid;

    use super::*;

    fn task(title: &str, status: TaskStatus, priority: TaskPriority, due_in_days: Option<i64>) -> Task {
        let now = Utc::now();
        Task {
            id: Uuid::new_v4(),
            workspace_id: Some(Uuid::new_v4()),
            team_id: None,
            title: title.to_string(),
            description: None,
            status,
            priority,
            assigned_to: vec![],
            due_date: due_in_days.map(|days| now + Duration::days(days)),
            created_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn every_status_gets_a_column_in_order() {
        let tasks: Vec<Task> = Vec::new();
        let columns = board(&tasks);
        let statuses: Vec<TaskStatus> = columns.iter().map(|column| column.status).collect();
        assert_eq!(
            statuses,
            vec![TaskStatus::Todo, TaskStatus::InProgress, TaskStatus::Review, TaskStatus::Done]
        );
    }

    #[test]
    fn cards_sort_by_priority_then_due_date() {
        let tasks = vec![
            task("undated", TaskStatus::Todo, TaskPriority::High, None),
            task("later", TaskStatus::Todo, TaskPriority::High, Some(5)),
            task("sooner", TaskStatus::Todo, TaskPriority::High, Some(1)),
            task("urgent", TaskStatus::Todo, TaskPriority::Urgent, None),
            task("low", TaskStatus::Todo, TaskPriority::Low, Some(0)),
            task("shipped", TaskStatus::Done, TaskPriority::Low, None),
        ];

        let columns = board(&tasks);
        let todo: Vec<&str> = columns[0].tasks.iter().map(|task| task.title.as_str()).collect();
        assert_eq!(todo, vec!["urgent", "sooner", "later", "undated", "low"]);
        assert_eq!(columns[3].tasks.len(), 1);
    }

    #[test]
    fn moving_a_card_only_patches_status() {
        let patch = move_to(TaskStatus::Done);
        assert_eq!(patch.status, Some(TaskStatus::Done));
        assert!(patch.title.is_none());
        assert!(patch.due_date.is_none());
    }
}
