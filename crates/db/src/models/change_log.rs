use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use protocol::{ChangeLogEventType, Role, TargetType};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DbErr, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Select, Set,
};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::{
    entities::change_log,
    events::{ActorRef, ChangeLogDraft, ChangeSet},
    models::{ids, parse_enum},
    scope::WorkspaceScope,
};

/// Upper bound on rows written to a single CSV export.
pub const EXPORT_ROW_LIMIT: u64 = 10_000;
pub const MAX_PAGE_SIZE: u64 = 100;

/// Rows of one export. `truncated` is set when the filter matched more
/// than the limit.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportRows {
    pub entries: Vec<ChangeLog>,
    pub truncated: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct ChangeLog {
    pub id: Uuid,
    pub workspace_id: Option<Uuid>,
    pub event_type: ChangeLogEventType,
    pub user_id: Option<Uuid>,
    pub user_name: Option<String>,
    pub user_email: Option<String>,
    pub user_role: Option<Role>,
    pub target_type: TargetType,
    pub target_id: Option<Uuid>,
    pub target_name: Option<String>,
    pub action: String,
    pub description: String,
    pub changes: Option<ChangeSet>,
    #[ts(type = "Record<string, unknown> | null")]
    pub metadata: Option<serde_json::Value>,
    #[ts(type = "Date")]
    pub created_at: DateTime<Utc>,
}

/// Filters shared by the paged list and the CSV export.
#[derive(Debug, Clone, Default, Deserialize, TS)]
pub struct ChangeLogFilter {
    pub event_type: Option<ChangeLogEventType>,
    pub target_type: Option<TargetType>,
    pub user_id: Option<Uuid>,
    pub search: Option<String>,
    /// Inclusive, UTC.
    pub start_date: Option<NaiveDate>,
    /// Inclusive, UTC.
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, TS)]
pub struct ChangeLogPage {
    pub entries: Vec<ChangeLog>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
    pub total_pages: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
pub struct ActorCount {
    pub user_id: Uuid,
    pub user_name: Option<String>,
    pub count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, TS)]
pub struct ChangeLogStats {
    pub total: u64,
    pub by_event_type: BTreeMap<String, u64>,
    pub by_target_type: BTreeMap<String, u64>,
    /// Keyed by `YYYY-MM-DD`.
    pub by_day: BTreeMap<String, u64>,
    pub top_actors: Vec<ActorCount>,
}

const TOP_ACTORS: usize = 10;

fn start_of(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

impl ChangeLogFilter {
    fn apply(&self, select: Select<change_log::Entity>) -> Select<change_log::Entity> {
        let mut select = select;
        if let Some(event_type) = self.event_type {
            select = select.filter(change_log::Column::EventType.eq(event_type.to_string()));
        }
        if let Some(target_type) = self.target_type {
            select = select.filter(change_log::Column::TargetType.eq(target_type.to_string()));
        }
        if let Some(user_id) = self.user_id {
            select = select.filter(change_log::Column::UserId.eq(user_id));
        }
        if let Some(search) = self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            select = select.filter(
                Condition::any()
                    .add(change_log::Column::Description.contains(search))
                    .add(change_log::Column::TargetName.contains(search))
                    .add(change_log::Column::UserName.contains(search))
                    .add(change_log::Column::UserEmail.contains(search)),
            );
        }
        if let Some(start) = self.start_date {
            select = select.filter(change_log::Column::CreatedAt.gte(start_of(start)));
        }
        if let Some(end) = self.end_date {
            select = select.filter(change_log::Column::CreatedAt.lt(start_of(end) + Duration::days(1)));
        }
        select
    }
}

impl ChangeLog {
    fn from_model(model: change_log::Model, workspace_id: Option<Uuid>) -> Result<Self, DbErr> {
        let changes = match model.changes {
            Some(value) => Some(
                serde_json::from_value::<ChangeSet>(value)
                    .map_err(|err| DbErr::Custom(format!("invalid changes payload: {err}")))?,
            ),
            None => None,
        };
        let user_role = match model.user_role.as_deref() {
            Some(raw) => Some(parse_enum("user_role", raw)?),
            None => None,
        };
        Ok(Self {
            id: model.uuid,
            workspace_id,
            event_type: parse_enum("event_type", &model.event_type)?,
            user_id: model.user_id,
            user_name: model.user_name,
            user_email: model.user_email,
            user_role,
            target_type: parse_enum("target_type", &model.target_type)?,
            target_id: model.target_id,
            target_name: model.target_name,
            action: model.action,
            description: model.description,
            changes,
            metadata: model.metadata,
            created_at: model.created_at.into(),
        })
    }

    fn scoped(scope: &WorkspaceScope, filter: &ChangeLogFilter) -> Select<change_log::Entity> {
        filter
            .apply(change_log::Entity::find().filter(change_log::Column::WorkspaceId.eq(scope.row_id)))
            .order_by_desc(change_log::Column::CreatedAt)
            .order_by_desc(change_log::Column::Id)
    }

    /// Newest first; `page` is 1-based and `limit` is clamped to
    /// `1..=MAX_PAGE_SIZE`.
    pub async fn page<C: ConnectionTrait>(
        db: &C,
        scope: &WorkspaceScope,
        filter: &ChangeLogFilter,
        page: u64,
        limit: u64,
    ) -> Result<ChangeLogPage, DbErr> {
        let page = page.max(1);
        let limit = limit.clamp(1, MAX_PAGE_SIZE);
        let paginator = Self::scoped(scope, filter).paginate(db, limit);
        let counts = paginator.num_items_and_pages().await?;
        let models = paginator.fetch_page(page - 1).await?;

        let entries = models
            .into_iter()
            .map(|model| Self::from_model(model, Some(scope.uuid)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ChangeLogPage {
            entries,
            total: counts.number_of_items,
            page,
            limit,
            total_pages: counts.number_of_pages,
        })
    }

    /// Same filter as [`ChangeLog::page`], unpaged up to `limit` rows.
    pub async fn export_rows<C: ConnectionTrait>(
        db: &C,
        scope: &WorkspaceScope,
        filter: &ChangeLogFilter,
        limit: u64,
    ) -> Result<ExportRows, DbErr> {
        let mut entries = Self::scoped(scope, filter)
            .limit(limit.saturating_add(1))
            .all(db)
            .await?
            .into_iter()
            .map(|model| Self::from_model(model, Some(scope.uuid)))
            .collect::<Result<Vec<_>, _>>()?;
        let truncated = entries.len() as u64 > limit;
        entries.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(ExportRows { entries, truncated })
    }

    pub async fn stats<C: ConnectionTrait>(
        db: &C,
        scope: &WorkspaceScope,
        since: DateTime<Utc>,
    ) -> Result<ChangeLogStats, DbErr> {
        let rows: Vec<(String, String, Option<Uuid>, Option<String>, DateTime<Utc>)> =
            change_log::Entity::find()
                .select_only()
                .column(change_log::Column::EventType)
                .column(change_log::Column::TargetType)
                .column(change_log::Column::UserId)
                .column(change_log::Column::UserName)
                .column(change_log::Column::CreatedAt)
                .filter(change_log::Column::WorkspaceId.eq(scope.row_id))
                .filter(change_log::Column::CreatedAt.gte(since))
                .into_tuple()
                .all(db)
                .await?;

        let mut stats = ChangeLogStats {
            total: rows.len() as u64,
            ..Default::default()
        };
        let mut actors: HashMap<Uuid, (Option<String>, u64)> = HashMap::new();
        for (event_type, target_type, user_id, user_name, created_at) in rows {
            *stats.by_event_type.entry(event_type).or_default() += 1;
            *stats.by_target_type.entry(target_type).or_default() += 1;
            *stats
                .by_day
                .entry(created_at.date_naive().to_string())
                .or_default() += 1;
            if let Some(user_id) = user_id {
                let entry = actors.entry(user_id).or_insert((None, 0));
                if entry.0.is_none() {
                    entry.0 = user_name;
                }
                entry.1 += 1;
            }
        }

        let mut top: Vec<ActorCount> = actors
            .into_iter()
            .map(|(user_id, (user_name, count))| ActorCount { user_id, user_name, count })
            .collect();
        top.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.user_name.cmp(&b.user_name)));
        top.truncate(TOP_ACTORS);
        stats.top_actors = top;
        Ok(stats)
    }

    /// Deletes entries created before `cutoff`.
    pub async fn delete_older_than<C: ConnectionTrait>(
        db: &C,
        scope: &WorkspaceScope,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, DbErr> {
        let result = change_log::Entity::delete_many()
            .filter(change_log::Column::WorkspaceId.eq(scope.row_id))
            .filter(change_log::Column::CreatedAt.lt(cutoff))
            .exec(db)
            .await?;
        Ok(result.rows_affected)
    }

    /// Writes one audit entry. With a `source_event_id`, a second call for
    /// the same event is a no-op returning `None`.
    pub async fn record<C: ConnectionTrait>(
        db: &C,
        workspace_row_id: Option<i64>,
        actor: Option<&ActorRef>,
        draft: &ChangeLogDraft,
        source_event_id: Option<Uuid>,
    ) -> Result<Option<Self>, DbErr> {
        if let Some(source) = source_event_id {
            let existing = change_log::Entity::find()
                .filter(change_log::Column::SourceEventId.eq(source))
                .count(db)
                .await?;
            if existing > 0 {
                return Ok(None);
            }
        }

        let changes = match &draft.changes {
            Some(changes) => Some(
                serde_json::to_value(changes).map_err(|err| DbErr::Custom(err.to_string()))?,
            ),
            None => None,
        };
        let active = change_log::ActiveModel {
            uuid: Set(Uuid::new_v4()),
            workspace_id: Set(workspace_row_id),
            event_type: Set(draft.event_type.to_string()),
            user_id: Set(actor.map(|a| a.id)),
            user_name: Set(actor.map(|a| a.name.clone())),
            user_email: Set(actor.map(|a| a.email.clone())),
            user_role: Set(actor.map(|a| a.role.to_string())),
            target_type: Set(draft.target_type.to_string()),
            target_id: Set(draft.target_id),
            target_name: Set(draft.target_name.clone()),
            action: Set(draft.action.clone()),
            description: Set(draft.description.clone()),
            changes: Set(changes),
            metadata: Set(draft.metadata.clone()),
            created_at: Set(Utc::now().into()),
            source_event_id: Set(source_event_id),
            ..Default::default()
        };
        let model = active.insert(db).await?;
        let workspace_id = match model.workspace_id {
            Some(id) => ids::workspace_uuid_by_id(db, id).await?,
            None => None,
        };
        Ok(Some(Self::from_model(model, workspace_id)?))
    }
}
