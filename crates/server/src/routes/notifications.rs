use axum::{
    Extension, Json, Router,
    extract::{Path, Query, State},
    response::Json as ResponseJson,
    routing::{delete, get},
};
use deployment::Deployment;
use serde::Deserialize;
use services::services::notifications::{MarkReadResult, NotificationList};
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{DeploymentImpl, error::ApiError, http::RequestContext};

#[derive(Debug, Default, Deserialize)]
pub struct NotificationQuery {
    #[serde(default)]
    pub unread_only: bool,
    pub limit: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MarkReadRequest {
    /// Empty marks every unread notification of the caller.
    #[serde(default)]
    pub notification_ids: Vec<Uuid>,
}

pub async fn get_notifications(
    State(deployment): State<DeploymentImpl>,
    Extension(ctx): Extension<RequestContext>,
    Query(query): Query<NotificationQuery>,
) -> Result<ResponseJson<ApiResponse<NotificationList>>, ApiError> {
    let list = deployment
        .notifications()
        .list(deployment.db(), &ctx.actor, query.unread_only, query.limit)
        .await?;
    Ok(ResponseJson(ApiResponse::success(list)))
}

pub async fn mark_read(
    State(deployment): State<DeploymentImpl>,
    Extension(ctx): Extension<RequestContext>,
    Json(payload): Json<MarkReadRequest>,
) -> Result<ResponseJson<ApiResponse<MarkReadResult>>, ApiError> {
    let result = deployment
        .notifications()
        .mark_read(deployment.db(), &ctx.actor, &payload.notification_ids)
        .await?;
    Ok(ResponseJson(ApiResponse::success(result)))
}

pub async fn delete_notification(
    State(deployment): State<DeploymentImpl>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    deployment
        .notifications()
        .delete(deployment.db(), &ctx.actor, id)
        .await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

pub fn router() -> Router<DeploymentImpl> {
    let inner = Router::new()
        .route("/", get(get_notifications).patch(mark_read))
        .route("/{id}", delete(delete_notification));

    Router::new().nest("/notifications", inner)
}
