use axum::{
    Extension, Router,
    extract::{Query, State},
    http::{HeaderName, HeaderValue, header},
    response::{IntoResponse, Json as ResponseJson, Response},
    routing::{delete, get},
};
use chrono::NaiveDate;
use db::models::change_log::{ChangeLogFilter, ChangeLogPage, ChangeLogStats};
use deployment::Deployment;
use protocol::{ChangeLogEventType, EventTypeCatalog, TargetType};
use serde::Deserialize;
use services::services::changelog::ClearResult;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{DeploymentImpl, error::ApiError, http::RequestContext};

/// Query string shared by the list and the export. Kept flat: urlencoded
/// values do not survive `#[serde(flatten)]` for non-string fields.
#[derive(Debug, Default, Deserialize)]
pub struct ChangeLogQuery {
    pub event_type: Option<ChangeLogEventType>,
    pub target_type: Option<TargetType>,
    pub user_id: Option<Uuid>,
    pub search: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

impl ChangeLogQuery {
    fn filter(&self) -> ChangeLogFilter {
        ChangeLogFilter {
            event_type: self.event_type,
            target_type: self.target_type,
            user_id: self.user_id,
            search: self.search.clone().filter(|s| !s.trim().is_empty()),
            start_date: self.start_date,
            end_date: self.end_date,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct DaysQuery {
    pub days: Option<i64>,
}

pub async fn get_changelog(
    State(deployment): State<DeploymentImpl>,
    Extension(ctx): Extension<RequestContext>,
    Query(query): Query<ChangeLogQuery>,
) -> Result<ResponseJson<ApiResponse<ChangeLogPage>>, ApiError> {
    let page = deployment
        .changelog()
        .page(deployment.db(), &ctx.actor, &query.filter(), query.page, query.limit)
        .await?;
    Ok(ResponseJson(ApiResponse::success(page)))
}

pub async fn get_stats(
    State(deployment): State<DeploymentImpl>,
    Extension(ctx): Extension<RequestContext>,
    Query(query): Query<DaysQuery>,
) -> Result<ResponseJson<ApiResponse<ChangeLogStats>>, ApiError> {
    let stats = deployment
        .changelog()
        .stats(deployment.db(), &ctx.actor, query.days)
        .await?;
    Ok(ResponseJson(ApiResponse::success(stats)))
}

pub async fn get_event_types(
    State(deployment): State<DeploymentImpl>,
    Extension(ctx): Extension<RequestContext>,
) -> Result<ResponseJson<ApiResponse<EventTypeCatalog>>, ApiError> {
    let catalog = deployment.changelog().event_types(&ctx.actor)?;
    Ok(ResponseJson(ApiResponse::success(catalog)))
}

const EXPORT_ROWS_HEADER: HeaderName = HeaderName::from_static("x-export-rows");
/// `true` when the export stopped at the row limit.
const EXPORT_TRUNCATED_HEADER: HeaderName = HeaderName::from_static("x-export-truncated");

fn truncated_flag(truncated: bool) -> HeaderValue {
    HeaderValue::from_static(if truncated { "true" } else { "false" })
}

pub async fn export_csv(
    State(deployment): State<DeploymentImpl>,
    Extension(ctx): Extension<RequestContext>,
    Query(query): Query<ChangeLogQuery>,
) -> Result<Response, ApiError> {
    let export = deployment
        .changelog()
        .export_csv(deployment.db(), &ctx.actor, &query.filter())
        .await?;
    tracing::debug!(rows = export.rows, truncated = export.truncated, "changelog exported");

    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{}\"", export.filename))
        .map_err(|err| ApiError::Internal(err.to_string()))?;
    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("text/csv; charset=utf-8")),
            (header::CONTENT_DISPOSITION, disposition),
            (EXPORT_ROWS_HEADER, HeaderValue::from(export.rows)),
            (EXPORT_TRUNCATED_HEADER, truncated_flag(export.truncated)),
        ],
        export.body,
    )
        .into_response())
}

pub async fn clear_changelog(
    State(deployment): State<DeploymentImpl>,
    Extension(ctx): Extension<RequestContext>,
    Query(query): Query<DaysQuery>,
) -> Result<ResponseJson<ApiResponse<ClearResult>>, ApiError> {
    let result = deployment
        .changelog()
        .clear(deployment.db(), &ctx.actor, query.days)
        .await?;
    Ok(ResponseJson(ApiResponse::success(result)))
}

pub fn router() -> Router<DeploymentImpl> {
    let inner = Router::new()
        .route("/", get(get_changelog))
        .route("/stats", get(get_stats))
        .route("/event-types", get(get_event_types))
        .route("/export", get(export_csv))
        .route("/clear", delete(clear_changelog));

    Router::new().nest("/changelog", inner)
}
