use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    response::Json as ResponseJson,
    routing::{delete, get, patch},
};
use db::models::workspace::{CreateWorkspace, UpdateWorkspace, Workspace};
use deployment::Deployment;
use services::services::workspaces::WorkspaceDeletion;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{DeploymentImpl, error::ApiError, http::RequestContext};

pub async fn get_workspaces(
    State(deployment): State<DeploymentImpl>,
    Extension(ctx): Extension<RequestContext>,
) -> Result<ResponseJson<ApiResponse<Vec<Workspace>>>, ApiError> {
    let workspaces = deployment
        .workspaces()
        .list(deployment.db(), &ctx.actor)
        .await?;
    Ok(ResponseJson(ApiResponse::success(workspaces)))
}

pub async fn get_workspace(
    State(deployment): State<DeploymentImpl>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Workspace>>, ApiError> {
    let workspace = deployment
        .workspaces()
        .get(deployment.db(), &ctx.actor, id)
        .await?;
    Ok(ResponseJson(ApiResponse::success(workspace)))
}

pub async fn get_my_workspace(
    State(deployment): State<DeploymentImpl>,
    Extension(ctx): Extension<RequestContext>,
) -> Result<ResponseJson<ApiResponse<Workspace>>, ApiError> {
    let workspace = deployment
        .workspaces()
        .my_workspace(deployment.db(), &ctx.actor)
        .await?;
    Ok(ResponseJson(ApiResponse::success(workspace)))
}

pub async fn create_workspace(
    State(deployment): State<DeploymentImpl>,
    Extension(ctx): Extension<RequestContext>,
    Json(payload): Json<CreateWorkspace>,
) -> Result<ResponseJson<ApiResponse<Workspace>>, ApiError> {
    let community_limits = deployment.config().read().await.community_limits;
    let workspace = deployment
        .workspaces()
        .create(deployment.db(), &ctx.actor, &payload, &community_limits)
        .await?;
    Ok(ResponseJson(ApiResponse::success(workspace)))
}

pub async fn update_workspace(
    State(deployment): State<DeploymentImpl>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateWorkspace>,
) -> Result<ResponseJson<ApiResponse<Workspace>>, ApiError> {
    let workspace = deployment
        .workspaces()
        .update(deployment.db(), &ctx.actor, id, &payload)
        .await?;
    Ok(ResponseJson(ApiResponse::success(workspace)))
}

pub async fn toggle_status(
    State(deployment): State<DeploymentImpl>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Workspace>>, ApiError> {
    let workspace = deployment
        .workspaces()
        .toggle_status(deployment.db(), &ctx.actor, id)
        .await?;
    let message = if workspace.is_active {
        "Workspace activated"
    } else {
        "Workspace deactivated"
    };
    Ok(ResponseJson(ApiResponse::success_with_message(workspace, message)))
}

pub async fn delete_workspace(
    State(deployment): State<DeploymentImpl>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<WorkspaceDeletion>>, ApiError> {
    let deletion = deployment
        .workspaces()
        .delete(deployment.db(), &ctx.actor, id)
        .await?;
    Ok(ResponseJson(ApiResponse::success(deletion)))
}

pub async fn delete_my_workspace(
    State(deployment): State<DeploymentImpl>,
    Extension(ctx): Extension<RequestContext>,
) -> Result<ResponseJson<ApiResponse<WorkspaceDeletion>>, ApiError> {
    let deletion = deployment
        .workspaces()
        .delete_my_workspace(deployment.db(), &ctx.actor)
        .await?;
    Ok(ResponseJson(ApiResponse::success(deletion)))
}

pub fn router() -> Router<DeploymentImpl> {
    let inner = Router::new()
        .route("/", get(get_workspaces).post(create_workspace))
        .route("/my-workspace", get(get_my_workspace))
        .route("/my-workspace/delete", delete(delete_my_workspace))
        .route(
            "/{id}",
            get(get_workspace).put(update_workspace).delete(delete_workspace),
        )
        .route("/{id}/toggle-status", patch(toggle_status));

    Router::new().nest("/workspaces", inner)
}
