use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use db::models::{task::Task, team::Team};
use protocol::{TaskPriority, TaskStatus};
use serde::Serialize;
use uuid::Uuid;

use crate::filter::is_overdue;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamLoad {
    pub team_id: Uuid,
    pub name: String,
    pub open: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardSummary {
    pub total: usize,
    pub by_status: BTreeMap<String, usize>,
    pub by_priority: BTreeMap<String, usize>,
    pub overdue: usize,
    /// Open tasks due within the next seven days.
    pub due_this_week: usize,
    /// Percentage of tasks done, 0 when there are none.
    pub completion_rate: f64,
    pub my_open: usize,
    pub teams: Vec<TeamLoad>,
}

pub fn summarize<'a, I>(tasks: I, teams: &[Team], me: Uuid, now: DateTime<Utc>) -> DashboardSummary
where
    I: IntoIterator<Item = &'a Task>,
{
    let week_end = now + Duration::days(7);
    let mut by_status: BTreeMap<String, usize> = BTreeMap::new();
    let mut by_priority: BTreeMap<String, usize> = BTreeMap::new();
    let mut open_by_team: BTreeMap<Uuid, usize> = BTreeMap::new();
    let (mut total, mut done, mut overdue, mut due_this_week, mut my_open) = (0, 0, 0, 0, 0);

    for task in tasks {
        total += 1;
        *by_status.entry(task.status.to_string()).or_default() += 1;
        *by_priority.entry(task.priority.to_string()).or_default() += 1;

        if task.status == TaskStatus::Done {
            done += 1;
            continue;
        }
        if is_overdue(task, now) {
            overdue += 1;
        } else if task.due_date.is_some_and(|due| due <= week_end) {
            due_this_week += 1;
        }
        if task.assigned_to.contains(&me) {
            my_open += 1;
        }
        if let Some(team_id) = task.team_id {
            *open_by_team.entry(team_id).or_default() += 1;
        }
    }

    let mut teams: Vec<TeamLoad> = teams
        .iter()
        .map(|team| TeamLoad {
            team_id: team.id,
            name: team.name.clone(),
            open: open_by_team.get(&team.id).copied().unwrap_or_default(),
        })
        .collect();
    teams.sort_by(|a, b| b.open.cmp(&a.open).then_with(|| a.name.cmp(&b.name)));

    let completion_rate = if total == 0 {
        0.0
    } else {
        (done as f64 / total as f64 * 1000.0).round() / 10.0
    };

    DashboardSummary {
        total,
        by_status,
        by_priority,
        overdue,
        due_this_week,
        completion_rate,
        my_open,
        teams,
    }
}

impl DashboardSummary {
    pub fn count_for(&self, status: TaskStatus) -> usize {
        self.by_status.get(&status.to_string()).copied().unwrap_or_default()
    }

    pub fn count_for_priority(&self, priority: TaskPriority) -> usize {
        self.by_priority
            .get(&priority.to_string())
            .copied()
            .unwrap_or_default()
    }
}
