use db::{
    ConnectionTrait, DBService, TransactionTrait, WorkspaceScope,
    events::{ChangeLogDraft, ChangeSet},
    models::{
        ids,
        task::{CreateTask, Task, TaskQuery, UpdateTask},
        task_comment::{CreateTaskComment, TaskComment},
        user::User,
        workspace::{UsageCounter, Workspace},
    },
};
use protocol::{
    Action, ChangeLogEventType, NotificationType, Resource, TaskStatus,
    realtime::{TASK_COMMENTED, TASK_CREATED, TASK_DELETED, TASK_UPDATED},
};
use utils::text::{extract_mentions, mention_matches};
use uuid::Uuid;

use super::{
    activity::{Activity, diff, snapshot},
    context::Actor,
    error::{Result, ServiceError},
    workspaces::ensure_capacity,
};

/// Assignees and creator, the people who follow a task.
fn watchers(task: &Task) -> Vec<Uuid> {
    let mut watchers = task.assigned_to.clone();
    if let Some(creator) = task.created_by
        && !watchers.contains(&creator)
    {
        watchers.push(creator);
    }
    watchers
}

/// Explicit mention ids plus `@handle` tokens, resolved to users of the
/// workspace. Unknown ids and handles are dropped.
async fn resolve_mentions<C: ConnectionTrait>(
    db: &C,
    scope: &WorkspaceScope,
    content: &str,
    explicit: &[Uuid],
) -> Result<Vec<Uuid>> {
    let known = ids::user_ids_in_scope(db, scope, explicit).await?;
    let mut mentioned: Vec<Uuid> = Vec::new();
    for id in explicit {
        if known.contains_key(id) && !mentioned.contains(id) {
            mentioned.push(*id);
        }
    }

    let handles = extract_mentions(content);
    if !handles.is_empty() {
        for user in User::find_all(db, scope).await? {
            if handles.iter().any(|handle| mention_matches(handle, &user.email))
                && !mentioned.contains(&user.id)
            {
                mentioned.push(user.id);
            }
        }
    }
    Ok(mentioned)
}

#[derive(Clone, Default)]
pub struct TaskService;

impl TaskService {
    pub fn new() -> Self {
        Self
    }

    pub async fn list(&self, db: &DBService, actor: &Actor, query: &TaskQuery) -> Result<Vec<Task>> {
        actor.require(Resource::Task, Action::Read)?;
        Ok(Task::find_visible(&db.pool, &actor.scope, &actor.task_viewer(), query).await?)
    }

    pub async fn get(&self, db: &DBService, actor: &Actor, id: Uuid) -> Result<Task> {
        actor.require(Resource::Task, Action::Read)?;
        Self::visible(&db.pool, actor, id).await
    }

    async fn visible<C: ConnectionTrait>(db: &C, actor: &Actor, id: Uuid) -> Result<Task> {
        Task::find_visible_by_id(db, &actor.scope, &actor.task_viewer(), id)
            .await?
            .ok_or(ServiceError::NotFound("Task"))
    }

    pub async fn create(&self, db: &DBService, actor: &Actor, data: &CreateTask) -> Result<Task> {
        actor.require(Resource::Task, Action::Create)?;
        if data.title.trim().is_empty() {
            return Err(ServiceError::Validation("Task title is required".to_string()));
        }

        let tx = db.pool.begin().await?;
        ensure_capacity(&tx, &actor.scope, UsageCounter::Tasks, 1).await?;
        let task = Task::create(&tx, &actor.scope, actor.row_id, data).await?;
        Workspace::adjust_usage(&tx, &actor.scope, UsageCounter::Tasks, 1).await?;
        Activity::new(TASK_CREATED, actor, "task", task.id)
            .entity(&task)?
            .audience(&task)
            .changelog(
                ChangeLogDraft::new(
                    ChangeLogEventType::TaskCreated,
                    "create",
                    format!("Created task \"{}\"", task.title),
                )
                .target(task.id, &task.title),
            )
            .notify(
                task.assigned_to.iter().copied(),
                NotificationType::TaskAssigned,
                format!("{} assigned you to \"{}\"", actor.user.name, task.title),
                Some(task.id),
            )
            .enqueue(&tx)
            .await?;
        tx.commit().await?;

        tracing::debug!(task_id = %task.id, "task created");
        Ok(task)
    }

    pub async fn update(
        &self,
        db: &DBService,
        actor: &Actor,
        id: Uuid,
        data: &UpdateTask,
    ) -> Result<Task> {
        actor.require(Resource::Task, Action::Update)?;
        if matches!(data.title.as_deref(), Some(title) if title.trim().is_empty()) {
            return Err(ServiceError::Validation("Task title is required".to_string()));
        }

        let tx = db.pool.begin().await?;
        Self::visible(&tx, actor, id).await?;
        let (before, task) = Task::update(&tx, &actor.scope, id, data).await?;

        let changes = diff(&snapshot(&before)?, &snapshot(&task)?);
        if changes.is_empty() {
            tx.commit().await?;
            return Ok(task);
        }

        let added: Vec<Uuid> = task
            .assigned_to
            .iter()
            .copied()
            .filter(|id| !before.assigned_to.contains(id))
            .collect();
        let removed: Vec<Uuid> = before
            .assigned_to
            .iter()
            .copied()
            .filter(|id| !task.assigned_to.contains(id))
            .collect();
        let status_changed = before.status != task.status;
        let other_fields_changed = changes
            .after
            .as_ref()
            .and_then(|after| after.as_object())
            .is_some_and(|after| {
                after.keys().any(|key| key != "status" && key != "assigned_to")
            });

        let draft = if status_changed {
            ChangeLogDraft::new(
                ChangeLogEventType::TaskStatusChanged,
                "status_change",
                format!("Moved \"{}\" from {} to {}", task.title, before.status, task.status),
            )
        } else if !added.is_empty() {
            ChangeLogDraft::new(
                ChangeLogEventType::TaskAssigned,
                "assign",
                format!("Assigned {} user(s) to \"{}\"", added.len(), task.title),
            )
        } else if !removed.is_empty() && !other_fields_changed {
            ChangeLogDraft::new(
                ChangeLogEventType::TaskUnassigned,
                "unassign",
                format!("Unassigned {} user(s) from \"{}\"", removed.len(), task.title),
            )
        } else {
            ChangeLogDraft::new(
                ChangeLogEventType::TaskUpdated,
                "update",
                format!("Updated task \"{}\"", task.title),
            )
        };

        let mut activity = Activity::new(TASK_UPDATED, actor, "task", task.id)
            .entity(&task)?
            .audience(&task)
            .changelog(draft.target(task.id, &task.title).changes(changes))
            .notify(
                added,
                NotificationType::TaskAssigned,
                format!("{} assigned you to \"{}\"", actor.user.name, task.title),
                Some(task.id),
            );
        if status_changed {
            if task.status == TaskStatus::Done {
                activity = activity.notify(
                    task.created_by,
                    NotificationType::TaskCompleted,
                    format!("\"{}\" was completed by {}", task.title, actor.user.name),
                    Some(task.id),
                );
            }
            activity = activity.notify(
                watchers(&task),
                NotificationType::TaskStatusChanged,
                format!("{} moved \"{}\" to {}", actor.user.name, task.title, task.status),
                Some(task.id),
            );
        }
        if other_fields_changed {
            activity = activity.notify(
                task.assigned_to.iter().copied(),
                NotificationType::TaskUpdated,
                format!("{} updated \"{}\"", actor.user.name, task.title),
                Some(task.id),
            );
        }
        activity.enqueue(&tx).await?;
        tx.commit().await?;
        Ok(task)
    }

    pub async fn delete(&self, db: &DBService, actor: &Actor, id: Uuid) -> Result<()> {
        actor.require(Resource::Task, Action::Delete)?;

        let tx = db.pool.begin().await?;
        let task = Self::visible(&tx, actor, id).await?;
        Task::delete(&tx, &actor.scope, id).await?;
        Workspace::adjust_usage(&tx, &actor.scope, UsageCounter::Tasks, -1).await?;
        Activity::new(TASK_DELETED, actor, "task", task.id)
            .changelog(
                ChangeLogDraft::new(
                    ChangeLogEventType::TaskDeleted,
                    "delete",
                    format!("Deleted task \"{}\"", task.title),
                )
                .target(task.id, &task.title)
                .changes(ChangeSet { before: Some(snapshot(&task)?), after: None }),
            )
            .enqueue(&tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn comments(&self, db: &DBService, actor: &Actor, task_id: Uuid) -> Result<Vec<TaskComment>> {
        actor.require(Resource::Task, Action::Read)?;
        let task = Self::visible(&db.pool, actor, task_id).await?;
        let task_row_id = ids::task_id_in_scope(&db.pool, &actor.scope, task.id)
            .await?
            .ok_or(ServiceError::NotFound("Task"))?;
        Ok(TaskComment::find_by_task(&db.pool, &actor.scope, task_row_id, task.id).await?)
    }

    /// Anyone who can see a task may comment on it. Mentioned users get a
    /// `mention` notification; the remaining watchers get `comment_added`.
    pub async fn add_comment(
        &self,
        db: &DBService,
        actor: &Actor,
        task_id: Uuid,
        data: &CreateTaskComment,
    ) -> Result<TaskComment> {
        actor.require(Resource::Task, Action::Read)?;
        if data.content.trim().is_empty() {
            return Err(ServiceError::Validation("Comment cannot be empty".to_string()));
        }

        let tx = db.pool.begin().await?;
        let task = Self::visible(&tx, actor, task_id).await?;
        let task_row_id = ids::task_id_in_scope(&tx, &actor.scope, task.id)
            .await?
            .ok_or(ServiceError::NotFound("Task"))?;
        let mentions = resolve_mentions(&tx, &actor.scope, &data.content, &data.mentions).await?;
        let comment = TaskComment::create(
            &tx,
            &actor.scope,
            task_row_id,
            task.id,
            actor.row_id,
            &data.content,
            &mentions,
        )
        .await?;

        Activity::new(TASK_COMMENTED, actor, "comment", comment.id)
            .entity(&comment)?
            .audience(&task)
            .changelog(
                ChangeLogDraft::new(
                    ChangeLogEventType::TaskCommentAdded,
                    "comment",
                    format!("Commented on \"{}\"", task.title),
                )
                .target(task.id, &task.title)
                .metadata(serde_json::json!({
                    "comment_id": comment.id,
                    "mentions": comment.mentions,
                })),
            )
            .notify(
                mentions,
                NotificationType::Mention,
                format!("{} mentioned you on \"{}\"", actor.user.name, task.title),
                Some(task.id),
            )
            .notify(
                watchers(&task),
                NotificationType::CommentAdded,
                format!("{} commented on \"{}\"", actor.user.name, task.title),
                Some(task.id),
            )
            .enqueue(&tx)
            .await?;
        tx.commit().await?;
        Ok(comment)
    }
}

#[cfg(test)]
mod tests {
    use db::models::{
        change_log::{ChangeLog, ChangeLogFilter},
        notification::Notification,
    };
    use protocol::{Role, TaskPriority};

    use super::*;
    use crate::services::test_utils;

    fn new_task(title: &str, assigned_to: Vec<Uuid>) -> CreateTask {
        CreateTask { title: title.into(), assigned_to, ..Default::default() }
    }

    async fn kinds(db: &DBService, scope: &WorkspaceScope, actor: &Actor) -> Vec<NotificationType> {
        Notification::list_for_user(&db.pool, scope, actor.row_id, actor.id(), false, 50)
            .await
            .unwrap()
            .into_iter()
            .map(|n| n.notification_type)
            .collect()
    }

    #[tokio::test]
    async fn tasks_never_leak_across_workspaces() {
        let db = test_utils::setup_db().await;
        let (one, _) = test_utils::core_workspace(&db, "One").await;
        let (two, _) = test_utils::core_workspace(&db, "Two").await;
        let ana = test_utils::actor(&db, &one, "ana@one.io", Role::Admin).await;
        let zed = test_utils::actor(&db, &two, "zed@two.io", Role::Admin).await;
        let service = TaskService::new();

        let task = service.create(&db, &ana, &new_task("Secret", vec![])).await.unwrap();
        assert!(service.list(&db, &zed, &TaskQuery::default()).await.unwrap().is_empty());
        assert!(matches!(
            service.get(&db, &zed, task.id).await,
            Err(ServiceError::NotFound("Task"))
        ));
        assert!(matches!(
            service.update(&db, &zed, task.id, &UpdateTask::default()).await,
            Err(ServiceError::NotFound("Task"))
        ));
        assert!(matches!(
            service.create(&db, &zed, &new_task("Steal", vec![ana.id()])).await,
            Err(ServiceError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn members_see_only_their_tasks() {
        let db = test_utils::setup_db().await;
        let (scope, _) = test_utils::core_workspace(&db, "One").await;
        let admin = test_utils::actor(&db, &scope, "admin@one.io", Role::Admin).await;
        let ana = test_utils::actor(&db, &scope, "ana@one.io", Role::Member).await;
        let service = TaskService::new();

        service.create(&db, &admin, &new_task("Theirs", vec![])).await.unwrap();
        let assigned = service.create(&db, &admin, &new_task("Assigned", vec![ana.id()])).await.unwrap();
        let own = service.create(&db, &ana, &new_task("Own", vec![])).await.unwrap();

        let mut visible: Vec<Uuid> = service
            .list(&db, &ana, &TaskQuery::default())
            .await
            .unwrap()
            .into_iter()
            .map(|task| task.id)
            .collect();
        visible.sort();
        let mut expected = vec![assigned.id, own.id];
        expected.sort();
        assert_eq!(visible, expected);
        assert_eq!(service.list(&db, &admin, &TaskQuery::default()).await.unwrap().len(), 3);
        assert!(matches!(
            service.delete(&db, &ana, own.id).await,
            Err(ServiceError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn completion_notifies_creator_and_assignees() {
        let db = test_utils::setup_db().await;
        let (scope, _) = test_utils::core_workspace(&db, "One").await;
        let boss = test_utils::actor(&db, &scope, "boss@one.io", Role::Hr).await;
        let ana = test_utils::actor(&db, &scope, "ana@one.io", Role::Member).await;
        let bob = test_utils::actor(&db, &scope, "bob@one.io", Role::Member).await;
        let service = TaskService::new();

        let task = service
            .create(&db, &boss, &new_task("Ship", vec![ana.id(), bob.id()]))
            .await
            .unwrap();
        service
            .update(
                &db,
                &ana,
                task.id,
                &UpdateTask { status: Some(TaskStatus::Done), ..Default::default() },
            )
            .await
            .unwrap();
        test_utils::flush_outbox(&db).await;

        assert_eq!(kinds(&db, &scope, &boss).await, vec![NotificationType::TaskCompleted]);
        assert_eq!(
            kinds(&db, &scope, &bob).await,
            vec![NotificationType::TaskStatusChanged, NotificationType::TaskAssigned]
        );
        assert_eq!(kinds(&db, &scope, &ana).await, vec![NotificationType::TaskAssigned]);

        let log = ChangeLog::page(&db.pool, &scope, &ChangeLogFilter::default(), 1, 10)
            .await
            .unwrap();
        assert_eq!(log.total, 2);
        assert_eq!(log.entries[0].event_type, ChangeLogEventType::TaskStatusChanged);
    }

    #[tokio::test]
    async fn reassignment_and_field_edits_pick_the_right_kind() {
        let db = test_utils::setup_db().await;
        let (scope, _) = test_utils::core_workspace(&db, "One").await;
        let boss = test_utils::actor(&db, &scope, "boss@one.io", Role::Admin).await;
        let ana = test_utils::actor(&db, &scope, "ana@one.io", Role::Member).await;
        let bob = test_utils::actor(&db, &scope, "bob@one.io", Role::Member).await;
        let service = TaskService::new();

        let task = service.create(&db, &boss, &new_task("Plan", vec![ana.id()])).await.unwrap();
        service
            .update(
                &db,
                &boss,
                task.id,
                &UpdateTask {
                    assigned_to: Some(vec![ana.id(), bob.id()]),
                    priority: Some(TaskPriority::Urgent),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        // No-op updates enqueue nothing.
        service.update(&db, &boss, task.id, &UpdateTask::default()).await.unwrap();
        test_utils::flush_outbox(&db).await;

        assert_eq!(kinds(&db, &scope, &bob).await, vec![NotificationType::TaskAssigned]);
        assert_eq!(
            kinds(&db, &scope, &ana).await,
            vec![NotificationType::TaskUpdated, NotificationType::TaskAssigned]
        );
        let log = ChangeLog::page(&db.pool, &scope, &ChangeLogFilter::default(), 1, 10)
            .await
            .unwrap();
        assert_eq!(log.total, 2);
    }

    #[tokio::test]
    async fn mentions_win_over_comment_notifications() {
        let db = test_utils::setup_db().await;
        let (scope, _) = test_utils::core_workspace(&db, "One").await;
        let boss = test_utils::actor(&db, &scope, "boss@one.io", Role::Admin).await;
        let ana = test_utils::actor(&db, &scope, "ana@one.io", Role::Member).await;
        let bob = test_utils::actor(&db, &scope, "bob@one.io", Role::Member).await;
        let service = TaskService::new();

        let task = service
            .create(&db, &boss, &new_task("Review", vec![ana.id(), bob.id()]))
            .await
            .unwrap();
        let comment = service
            .add_comment(
                &db,
                &ana,
                task.id,
                &CreateTaskComment { content: "@bob can you check? cc @nobody".into(), mentions: vec![] },
            )
            .await
            .unwrap();
        assert_eq!(comment.mentions, vec![bob.id()]);
        test_utils::flush_outbox(&db).await;

        assert_eq!(
            kinds(&db, &scope, &bob).await,
            vec![NotificationType::Mention, NotificationType::TaskAssigned]
        );
        assert_eq!(kinds(&db, &scope, &boss).await, vec![NotificationType::CommentAdded]);
        assert_eq!(service.comments(&db, &boss, task.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn delete_releases_task_quota() {
        let db = test_utils::setup_db().await;
        let (scope, _) = test_utils::core_workspace(&db, "One").await;
        let boss = test_utils::actor(&db, &scope, "boss@one.io", Role::Admin).await;
        let service = TaskService::new();

        let task = service.create(&db, &boss, &new_task("Temp", vec![])).await.unwrap();
        assert_eq!(Workspace::usage(&db.pool, &scope).await.unwrap().0.tasks, 1);
        service.delete(&db, &boss, task.id).await.unwrap();
        assert_eq!(Workspace::usage(&db.pool, &scope).await.unwrap().0.tasks, 0);
        assert!(matches!(
            service.get(&db, &boss, task.id).await,
            Err(ServiceError::NotFound("Task"))
        ));
    }
}
