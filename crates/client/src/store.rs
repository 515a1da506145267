//! Client-side copy of the workspace's tasks, teams and users, kept current
//! by applying realtime events in arrival order.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use db::models::{task::Task, team::Team, user::User};
use protocol::{RealtimeEvent, TaskVisibility, realtime::USERS_IMPORTED, task_visibility};
use serde::{Deserialize, de::DeserializeOwned};
use uuid::Uuid;

use crate::{api::TaskflowClient, error::ClientError};

/// Who the store is rendering for. The server broadcasts task events to the
/// whole workspace, so narrower roles drop what their lists would not show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewer {
    pub user_id: Uuid,
    pub team_id: Option<Uuid>,
    pub visibility: TaskVisibility,
}

impl Viewer {
    pub fn for_user(user: &User) -> Self {
        Self {
            user_id: user.id,
            team_id: user.team_id,
            visibility: task_visibility(user.role),
        }
    }

    pub fn can_see(&self, task: &Task) -> bool {
        let own = task.assigned_to.contains(&self.user_id) || task.created_by == Some(self.user_id);
        match self.visibility {
            TaskVisibility::Workspace => true,
            TaskVisibility::Team => {
                own || (self.team_id.is_some() && task.team_id == self.team_id)
            }
            TaskVisibility::Own => own,
        }
    }
}

/// What applying one event did to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Upserted(usize),
    Removed,
    /// The event cannot be applied incrementally; reload over REST.
    Reload,
    Ignored,
}

trait Versioned {
    fn id(&self) -> Uuid;
    fn workspace_id(&self) -> Option<Uuid>;
    fn updated_at(&self) -> DateTime<Utc>;
}

macro_rules! versioned {
    ($($ty:ty),*) => {
        $(impl Versioned for $ty {
            fn id(&self) -> Uuid {
                self.id
            }

            fn workspace_id(&self) -> Option<Uuid> {
                self.workspace_id
            }

            fn updated_at(&self) -> DateTime<Utc> {
                self.updated_at
            }
        })*
    };
}

versioned!(Task, Team, User);

/// Inserts unless the cached copy is newer. Returns whether it changed.
fn upsert<T: Versioned>(map: &mut HashMap<Uuid, T>, incoming: T) -> bool {
    if let Some(current) = map.get(&incoming.id())
        && current.updated_at() > incoming.updated_at()
    {
        return false;
    }
    map.insert(incoming.id(), incoming);
    true
}

fn replace<T: Versioned>(map: &mut HashMap<Uuid, T>, workspace_id: Uuid, items: Vec<T>) {
    map.clear();
    map.extend(
        items
            .into_iter()
            .filter(|item| item.workspace_id() == Some(workspace_id))
            .map(|item| (item.id(), item)),
    );
}

fn payload<T: DeserializeOwned>(event: &RealtimeEvent) -> Option<T> {
    let data = event.data.clone()?;
    match serde_json::from_value(data) {
        Ok(value) => Some(value),
        Err(err) => {
            tracing::warn!(event = %event.event, error = %err, "malformed realtime payload");
            None
        }
    }
}

#[derive(Deserialize)]
struct ImportedUsers {
    users: Vec<User>,
}

#[derive(Debug, Clone)]
pub struct LiveStore {
    workspace_id: Uuid,
    viewer: Viewer,
    tasks: HashMap<Uuid, Task>,
    teams: HashMap<Uuid, Team>,
    users: HashMap<Uuid, User>,
}

impl LiveStore {
    pub fn new(workspace_id: Uuid, viewer: Viewer) -> Self {
        Self {
            workspace_id,
            viewer,
            tasks: HashMap::new(),
            teams: HashMap::new(),
            users: HashMap::new(),
        }
    }

    pub fn workspace_id(&self) -> Uuid {
        self.workspace_id
    }

    pub fn viewer(&self) -> &Viewer {
        &self.viewer
    }

    pub fn task(&self, id: Uuid) -> Option<&Task> {
        self.tasks.get(&id)
    }

    pub fn team(&self, id: Uuid) -> Option<&Team> {
        self.teams.get(&id)
    }

    pub fn user(&self, id: Uuid) -> Option<&User> {
        self.users.get(&id)
    }

    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values()
    }

    pub fn teams(&self) -> impl Iterator<Item = &Team> {
        self.teams.values()
    }

    pub fn users(&self) -> impl Iterator<Item = &User> {
        self.users.values()
    }

    pub fn replace_tasks(&mut self, tasks: Vec<Task>) {
        let viewer = self.viewer;
        replace(
            &mut self.tasks,
            self.workspace_id,
            tasks.into_iter().filter(|task| viewer.can_see(task)).collect(),
        );
    }

    pub fn replace_teams(&mut self, teams: Vec<Team>) {
        replace(&mut self.teams, self.workspace_id, teams);
    }

    pub fn replace_users(&mut self, users: Vec<User>) {
        replace(&mut self.users, self.workspace_id, users);
    }

    /// Refetches every list. Roles without user access get an empty
    /// directory instead of an error.
    pub async fn reload(&mut self, client: &TaskflowClient) -> Result<(), ClientError> {
        let tasks = client.list_tasks(&Default::default()).await?;
        let teams = client.list_teams().await?;
        let users = match client.list_users().await {
            Ok(users) => users,
            Err(err) if err.is_forbidden() => Vec::new(),
            Err(err) => return Err(err),
        };
        self.replace_tasks(tasks);
        self.replace_teams(teams);
        self.replace_users(users);
        tracing::debug!(
            tasks = self.tasks.len(),
            teams = self.teams.len(),
            users = self.users.len(),
            "live store reloaded"
        );
        Ok(())
    }

    pub fn apply(&mut self, event: &RealtimeEvent) -> Applied {
        if event.requires_reload() {
            return Applied::Reload;
        }
        if event.workspace_id != Some(self.workspace_id) {
            return Applied::Ignored;
        }

        if event.event == USERS_IMPORTED {
            let Some(imported) = payload::<ImportedUsers>(event) else {
                return Applied::Reload;
            };
            let workspace_id = self.workspace_id;
            let users = &mut self.users;
            let count = imported
                .users
                .into_iter()
                .filter(|user| user.workspace_id == Some(workspace_id))
                .filter(|user| upsert(users, user.clone()))
                .count();
            return Applied::Upserted(count);
        }

        match event.entity_type.as_str() {
            "task" => self.apply_task(event),
            "team" => self.apply_entity(event, |store| &mut store.teams),
            "user" => self.apply_entity(event, |store| &mut store.users),
            _ => Applied::Ignored,
        }
    }

    fn apply_task(&mut self, event: &RealtimeEvent) -> Applied {
        // Invalidations name a task this viewer may no longer see.
        if event.is_deletion() || event.is_invalidation() {
            return self.remove(event.entity_id, |store| &mut store.tasks);
        }
        let Some(task) = payload::<Task>(event) else {
            return Applied::Reload;
        };
        if task.workspace_id != Some(self.workspace_id) {
            return Applied::Ignored;
        }
        if !self.viewer.can_see(&task) {
            // Reassigned away from the viewer.
            return self.remove(Some(task.id), |store| &mut store.tasks);
        }
        if upsert(&mut self.tasks, task) {
            Applied::Upserted(1)
        } else {
            Applied::Ignored
        }
    }

    fn apply_entity<T, F>(&mut self, event: &RealtimeEvent, map: F) -> Applied
    where
        T: Versioned + DeserializeOwned,
        F: Fn(&mut Self) -> &mut HashMap<Uuid, T>,
    {
        if event.is_deletion() || event.is_invalidation() {
            return self.remove(event.entity_id, map);
        }
        let Some(entity) = payload::<T>(event) else {
            return Applied::Reload;
        };
        if entity.workspace_id() != Some(self.workspace_id) {
            return Applied::Ignored;
        }
        if upsert(map(self), entity) {
            Applied::Upserted(1)
        } else {
            Applied::Ignored
        }
    }

    fn remove<T, F>(&mut self, id: Option<Uuid>, map: F) -> Applied
    where
        F: Fn(&mut Self) -> &mut HashMap<Uuid, T>,
    {
        match id.and_then(|id| map(self).remove(&id)) {
            Some(_) => Applied::Removed,
            None => Applied::Ignored,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use protocol::{
        Role, TaskPriority, TaskStatus,
        realtime::{
            CONNECTED, TASK_CREATED, TASK_DELETED, TASK_UPDATED, TEAM_DELETED, USER_UPDATED,
        },
    };
    use serde_json::json;

    use super::*;

    fn task(workspace_id: Uuid, assigned_to: Vec<Uuid>) -> Task {
        let now = Utc::now();
        Task {
            id: Uuid::new_v4(),
            workspace_id: Some(workspace_id),
            team_id: None,
            title: "Ship it".to_string(),
            description: None,
            status: TaskStatus::Todo,
            priority: TaskPriority::Medium,
            assigned_to,
            due_date: None,
            created_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn user(workspace_id: Uuid, role: Role) -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            workspace_id: Some(workspace_id),
            team_id: None,
            name: "Ana".to_string(),
            email: format!("{}@acme.io", Uuid::new_v4()),
            role,
            profile_picture: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    fn task_event(name: &str, task: &Task) -> RealtimeEvent {
        RealtimeEvent::new(
            name,
            task.workspace_id,
            "task",
            Some(task.id),
            Some(serde_json::to_value(task).unwrap()),
        )
    }

    fn admin_store(ws: Uuid) -> LiveStore {
        LiveStore::new(ws, Viewer::for_user(&user(ws, Role::Admin)))
    }

    #[test]
    fn created_updated_and_deleted_tasks_track_the_server() {
        let ws = Uuid::new_v4();
        let mut store = admin_store(ws);
        let mut created = task(ws, vec![]);

        assert_eq!(store.apply(&task_event(TASK_CREATED, &created)), Applied::Upserted(1));

        created.title = "Ship it today".to_string();
        created.updated_at += Duration::seconds(1);
        assert_eq!(store.apply(&task_event(TASK_UPDATED, &created)), Applied::Upserted(1));
        assert_eq!(store.task(created.id).unwrap().title, "Ship it today");

        let deleted = RealtimeEvent::new(TASK_DELETED, Some(ws), "task", Some(created.id), None);
        assert_eq!(store.apply(&deleted), Applied::Removed);
        assert!(store.task(created.id).is_none());
        assert_eq!(store.apply(&deleted), Applied::Ignored);
    }

    #[test]
    fn stale_updates_do_not_overwrite_newer_copies() {
        let ws = Uuid::new_v4();
        let mut store = admin_store(ws);
        let mut current = task(ws, vec![]);
        current.title = "Newer".to_string();
        store.replace_tasks(vec![current.clone()]);

        let mut stale = current.clone();
        stale.title = "Older".to_string();
        stale.updated_at -= Duration::seconds(30);

        assert_eq!(store.apply(&task_event(TASK_UPDATED, &stale)), Applied::Ignored);
        assert_eq!(store.task(current.id).unwrap().title, "Newer");
    }

    #[test]
    fn foreign_workspace_events_are_ignored() {
        let ws = Uuid::new_v4();
        let mut store = admin_store(ws);
        let foreign = task(Uuid::new_v4(), vec![]);

        assert_eq!(store.apply(&task_event(TASK_CREATED, &foreign)), Applied::Ignored);
        store.replace_tasks(vec![foreign]);
        assert_eq!(store.tasks().count(), 0);
    }

    #[test]
    fn members_drop_tasks_reassigned_away_from_them() {
        let ws = Uuid::new_v4();
        let member = user(ws, Role::Member);
        let mut store = LiveStore::new(ws, Viewer::for_user(&member));

        let unrelated = task(ws, vec![Uuid::new_v4()]);
        assert_eq!(store.apply(&task_event(TASK_CREATED, &unrelated)), Applied::Ignored);

        let mut mine = task(ws, vec![member.id]);
        assert_eq!(store.apply(&task_event(TASK_CREATED, &mine)), Applied::Upserted(1));

        mine.assigned_to = vec![Uuid::new_v4()];
        mine.updated_at += Duration::seconds(1);
        assert_eq!(store.apply(&task_event(TASK_UPDATED, &mine)), Applied::Removed);
        assert!(store.task(mine.id).is_none());
    }

    #[test]
    fn id_only_updates_evict_the_cached_task() {
        let ws = Uuid::new_v4();
        let member = user(ws, Role::Member);
        let mut store = LiveStore::new(ws, Viewer::for_user(&member));
        let mine = task(ws, vec![member.id]);
        store.replace_tasks(vec![mine.clone()]);

        let hidden = RealtimeEvent::new(TASK_UPDATED, Some(ws), "task", Some(mine.id), None);
        assert_eq!(store.apply(&hidden), Applied::Removed);
        assert!(store.task(mine.id).is_none());

        let unseen = RealtimeEvent::new(TASK_CREATED, Some(ws), "task", Some(Uuid::new_v4()), None);
        assert_eq!(store.apply(&unseen), Applied::Ignored);
    }

    #[test]
    fn team_leads_see_their_team_and_their_own_tasks() {
        let ws = Uuid::new_v4();
        let team_id = Uuid::new_v4();
        let mut lead = user(ws, Role::TeamLead);
        lead.team_id = Some(team_id);
        let viewer = Viewer::for_user(&lead);

        let mut team_task = task(ws, vec![]);
        team_task.team_id = Some(team_id);
        let mut created = task(ws, vec![]);
        created.created_by = Some(lead.id);
        let other = task(ws, vec![]);

        assert!(viewer.can_see(&team_task));
        assert!(viewer.can_see(&created));
        assert!(!viewer.can_see(&other));
    }

    #[test]
    fn user_events_and_bulk_imports_update_the_directory() {
        let ws = Uuid::new_v4();
        let mut store = admin_store(ws);
        let mut ana = user(ws, Role::Member);
        let bob = user(ws, Role::Member);

        let imported = RealtimeEvent::new(
            USERS_IMPORTED,
            Some(ws),
            "user",
            None,
            Some(json!({ "users": [ana, bob] })),
        );
        assert_eq!(store.apply(&imported), Applied::Upserted(2));

        ana.name = "Ana Maria".to_string();
        ana.updated_at += Duration::seconds(1);
        let updated = RealtimeEvent::new(
            USER_UPDATED,
            Some(ws),
            "user",
            Some(ana.id),
            Some(serde_json::to_value(&ana).unwrap()),
        );
        assert_eq!(store.apply(&updated), Applied::Upserted(1));
        assert_eq!(store.user(ana.id).unwrap().name, "Ana Maria");
        assert_eq!(store.users().count(), 2);
    }

    #[test]
    fn reload_signals_and_broken_payloads_ask_for_a_reload() {
        let ws = Uuid::new_v4();
        let mut store = admin_store(ws);

        assert_eq!(store.apply(&RealtimeEvent::connected(ws)), Applied::Reload);
        assert_eq!(store.apply(&RealtimeEvent::resync()), Applied::Reload);

        let broken = RealtimeEvent::new(
            TASK_UPDATED,
            Some(ws),
            "task",
            Some(Uuid::new_v4()),
            Some(json!({ "title": 7 })),
        );
        assert_eq!(store.apply(&broken), Applied::Reload);

        let unknown = RealtimeEvent::new(TEAM_DELETED, Some(ws), "team", Some(Uuid::new_v4()), None);
        assert_eq!(store.apply(&unknown), Applied::Ignored);
        assert_eq!(RealtimeEvent::connected(ws).event, CONNECTED);
    }
}
