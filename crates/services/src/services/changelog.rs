use chrono::{Duration, Utc};
use db::{
    DBService, TransactionTrait,
    events::ChangeLogDraft,
    models::change_log::{
        ChangeLog, ChangeLogFilter, ChangeLogPage, ChangeLogStats, EXPORT_ROW_LIMIT, ExportRows,
    },
};
use protocol::{
    Action, ChangeLogEventType, EventTypeCatalog, Resource,
    realtime::{CHANGELOG_CLEARED, CHANGELOG_EXPORTED},
};
use serde::Serialize;
use ts_rs::TS;

use super::{
    activity::Activity,
    context::Actor,
    error::{Result, ServiceError},
};

pub const DEFAULT_PAGE_SIZE: u64 = 50;
pub const DEFAULT_STATS_DAYS: i64 = 30;
const MAX_STATS_DAYS: i64 = 365;

const CSV_HEADER: [&str; 10] = [
    "Date",
    "Event",
    "User",
    "Email",
    "Role",
    "Target Type",
    "Target",
    "Action",
    "Description",
    "Changes",
];

pub struct CsvExport {
    pub filename: String,
    pub body: String,
    pub rows: usize,
    /// More entries matched than one export holds.
    pub truncated: bool,
}

#[derive(Debug, Clone, Copy, Serialize, TS)]
pub struct ClearResult {
    pub deleted: u64,
}

/// Renders entries in the order given, one row per entry.
pub fn render_csv(entries: &[ChangeLog]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(CSV_HEADER)?;
    for entry in entries {
        let changes = match &entry.changes {
            Some(changes) => serde_json::to_string(changes)?,
            None => String::new(),
        };
        writer.write_record([
            entry.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            entry.event_type.label(),
            entry.user_name.clone().unwrap_or_default(),
            entry.user_email.clone().unwrap_or_default(),
            entry.user_role.map(|role| role.to_string()).unwrap_or_default(),
            entry.target_type.to_string(),
            entry.target_name.clone().unwrap_or_default(),
            entry.action.clone(),
            entry.description.clone(),
            changes,
        ])?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|err| ServiceError::Validation(format!("CSV export failed: {err}")))?;
    String::from_utf8(bytes)
        .map_err(|err| ServiceError::Validation(format!("CSV export failed: {err}")))
}

#[derive(Clone, Default)]
pub struct ChangeLogService;

impl ChangeLogService {
    pub fn new() -> Self {
        Self
    }

    pub async fn page(
        &self,
        db: &DBService,
        actor: &Actor,
        filter: &ChangeLogFilter,
        page: Option<u64>,
        limit: Option<u64>,
    ) -> Result<ChangeLogPage> {
        actor.require(Resource::ChangeLog, Action::Read)?;
        Ok(ChangeLog::page(
            &db.pool,
            &actor.scope,
            filter,
            page.unwrap_or(1),
            limit.unwrap_or(DEFAULT_PAGE_SIZE),
        )
        .await?)
    }

    pub async fn stats(&self, db: &DBService, actor: &Actor, days: Option<i64>) -> Result<ChangeLogStats> {
        actor.require(Resource::ChangeLog, Action::Read)?;
        let days = days.unwrap_or(DEFAULT_STATS_DAYS).clamp(1, MAX_STATS_DAYS);
        let since = Utc::now() - Duration::days(days);
        Ok(ChangeLog::stats(&db.pool, &actor.scope, since).await?)
    }

    pub fn event_types(&self, actor: &Actor) -> Result<EventTypeCatalog> {
        actor.require(Resource::ChangeLog, Action::Read)?;
        Ok(protocol::changelog::catalog())
    }

    /// Same filter as the paged list, rendered as CSV. The export itself is
    /// audited.
    pub async fn export_csv(
        &self,
        db: &DBService,
        actor: &Actor,
        filter: &ChangeLogFilter,
    ) -> Result<CsvExport> {
        actor.require(Resource::ChangeLog, Action::Export)?;
        let ExportRows { entries, truncated } =
            ChangeLog::export_rows(&db.pool, &actor.scope, filter, EXPORT_ROW_LIMIT).await?;
        if truncated {
            tracing::warn!(
                workspace_id = %actor.workspace_id(),
                limit = EXPORT_ROW_LIMIT,
                "changelog export truncated"
            );
        }
        let body = render_csv(&entries)?;

        let tx = db.pool.begin().await?;
        Activity::new(CHANGELOG_EXPORTED, actor, "changelog", actor.workspace_id())
            .changelog(
                ChangeLogDraft::new(
                    ChangeLogEventType::ChangelogExported,
                    "export",
                    format!("Exported {} changelog entries", entries.len()),
                )
                .metadata(serde_json::json!({
                    "rows": entries.len(),
                    "truncated": truncated,
                    "event_type": filter.event_type,
                    "target_type": filter.target_type,
                    "user_id": filter.user_id,
                    "search": filter.search,
                    "start_date": filter.start_date,
                    "end_date": filter.end_date,
                })),
            )
            .enqueue(&tx)
            .await?;
        tx.commit().await?;

        Ok(CsvExport {
            filename: format!("changelog-{}.csv", Utc::now().format("%Y-%m-%d")),
            body,
            rows: entries.len(),
            truncated,
        })
    }

    /// Deletes entries older than `days` days; `0` clears everything. The
    /// clear itself is recorded afterwards, so the log is never empty of it.
    pub async fn clear(&self, db: &DBService, actor: &Actor, days: Option<i64>) -> Result<ClearResult> {
        actor.require(Resource::ChangeLog, Action::Clear)?;
        let days = days.unwrap_or(0);
        if days < 0 {
            return Err(ServiceError::Validation("days must not be negative".to_string()));
        }
        let cutoff = Utc::now() - Duration::days(days);

        let tx = db.pool.begin().await?;
        let deleted = ChangeLog::delete_older_than(&tx, &actor.scope, cutoff).await?;
        Activity::new(CHANGELOG_CLEARED, actor, "changelog", actor.workspace_id())
            .entity(&serde_json::json!({ "deleted": deleted, "days": days }))?
            .changelog(
                ChangeLogDraft::new(
                    ChangeLogEventType::ChangelogCleared,
                    "clear",
                    format!("Cleared {deleted} changelog entries older than {days} days"),
                )
                .metadata(serde_json::json!({ "days": days, "deleted": deleted })),
            )
            .enqueue(&tx)
            .await?;
        tx.commit().await?;

        tracing::info!(workspace_id = %actor.workspace_id(), deleted, days, "changelog cleared");
        Ok(ClearResult { deleted })
    }
}

#[cfg(test)]
mod tests {
    use db::models::task::CreateTask;
    use protocol::{Role, TargetType};

    use super::*;
    use crate::services::{tasks::TaskService, test_utils};

    async fn seed(db: &DBService, actor: &Actor) {
        let tasks = TaskService::new();
        for title in ["Alpha", "Beta, with comma"] {
            tasks
                .create(db, actor, &CreateTask { title: title.into(), ..Default::default() })
                .await
                .unwrap();
        }
        test_utils::flush_outbox(db).await;
    }

    #[tokio::test]
    async fn export_matches_the_filtered_list() {
        let db = test_utils::setup_db().await;
        let (scope, _) = test_utils::core_workspace(&db, "One").await;
        let admin = test_utils::actor(&db, &scope, "admin@one.io", Role::Admin).await;
        seed(&db, &admin).await;
        let service = ChangeLogService::new();

        let filter = ChangeLogFilter { search: Some("comma".into()), ..Default::default() };
        let page = service.page(&db, &admin, &filter, None, None).await.unwrap();
        let export = service.export_csv(&db, &admin, &filter).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(export.rows, 1);
        assert!(!export.truncated);

        let mut reader = csv::Reader::from_reader(export.body.as_bytes());
        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 1);
        assert_eq!(&rows[0][1], "Task created");
        assert_eq!(&rows[0][6], "Beta, with comma");
        assert!(export.filename.ends_with(".csv"));
    }

    #[tokio::test]
    async fn clear_keeps_its_own_audit_entry() {
        let db = test_utils::setup_db().await;
        let (scope, _) = test_utils::core_workspace(&db, "One").await;
        let admin = test_utils::actor(&db, &scope, "admin@one.io", Role::Admin).await;
        seed(&db, &admin).await;
        let service = ChangeLogService::new();

        assert_eq!(service.clear(&db, &admin, Some(0)).await.unwrap().deleted, 2);
        test_utils::flush_outbox(&db).await;
        let page = service
            .page(&db, &admin, &ChangeLogFilter::default(), None, None)
            .await
            .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.entries[0].event_type, ChangeLogEventType::ChangelogCleared);
        assert_eq!(page.entries[0].target_type, TargetType::Changelog);
    }

    #[tokio::test]
    async fn hr_can_export_but_not_clear() {
        let db = test_utils::setup_db().await;
        let (scope, _) = test_utils::core_workspace(&db, "One").await;
        let hr = test_utils::actor(&db, &scope, "hr@one.io", Role::Hr).await;
        let lead = test_utils::actor(&db, &scope, "lead@one.io", Role::TeamLead).await;
        let service = ChangeLogService::new();

        service.export_csv(&db, &hr, &ChangeLogFilter::default()).await.unwrap();
        assert!(matches!(
            service.clear(&db, &hr, Some(30)).await,
            Err(ServiceError::Forbidden(_))
        ));
        assert!(service.event_types(&lead).is_err());
        assert_eq!(service.event_types(&hr).unwrap().event_types.len(), 26);
    }

    #[tokio::test]
    async fn stats_group_recent_entries() {
        let db = test_utils::setup_db().await;
        let (scope, _) = test_utils::core_workspace(&db, "One").await;
        let admin = test_utils::actor(&db, &scope, "admin@one.io", Role::Admin).await;
        seed(&db, &admin).await;

        let stats = ChangeLogService::new().stats(&db, &admin, Some(7)).await.unwrap();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.by_event_type.get("task_created"), Some(&2));
        assert_eq!(stats.top_actors[0].user_id, admin.id());
    }
}
