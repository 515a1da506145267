use axum::{
    Extension, Json, Router,
    extract::{Path, Query, State},
    response::Json as ResponseJson,
    routing::get,
};
use db::models::{
    task::{CreateTask, Task, TaskQuery, UpdateTask},
    task_comment::{CreateTaskComment, TaskComment},
};
use deployment::Deployment;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{DeploymentImpl, error::ApiError, http::RequestContext};

pub async fn get_tasks(
    State(deployment): State<DeploymentImpl>,
    Extension(ctx): Extension<RequestContext>,
    Query(query): Query<TaskQuery>,
) -> Result<ResponseJson<ApiResponse<Vec<Task>>>, ApiError> {
    let tasks = deployment
        .tasks()
        .list(deployment.db(), &ctx.actor, &query)
        .await?;
    Ok(ResponseJson(ApiResponse::success(tasks)))
}

pub async fn get_task(
    State(deployment): State<DeploymentImpl>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Task>>, ApiError> {
    let task = deployment.tasks().get(deployment.db(), &ctx.actor, id).await?;
    Ok(ResponseJson(ApiResponse::success(task)))
}

pub async fn create_task(
    State(deployment): State<DeploymentImpl>,
    Extension(ctx): Extension<RequestContext>,
    Json(payload): Json<CreateTask>,
) -> Result<ResponseJson<ApiResponse<Task>>, ApiError> {
    tracing::debug!(
        "Creating task '{}' in workspace {}",
        payload.title,
        ctx.actor.workspace_id()
    );
    let task = deployment
        .tasks()
        .create(deployment.db(), &ctx.actor, &payload)
        .await?;
    Ok(ResponseJson(ApiResponse::success(task)))
}

pub async fn update_task(
    State(deployment): State<DeploymentImpl>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateTask>,
) -> Result<ResponseJson<ApiResponse<Task>>, ApiError> {
    let task = deployment
        .tasks()
        .update(deployment.db(), &ctx.actor, id, &payload)
        .await?;
    Ok(ResponseJson(ApiResponse::success(task)))
}

pub async fn delete_task(
    State(deployment): State<DeploymentImpl>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    deployment.tasks().delete(deployment.db(), &ctx.actor, id).await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

pub async fn get_comments(
    State(deployment): State<DeploymentImpl>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Vec<TaskComment>>>, ApiError> {
    let comments = deployment
        .tasks()
        .comments(deployment.db(), &ctx.actor, id)
        .await?;
    Ok(ResponseJson(ApiResponse::success(comments)))
}

pub async fn add_comment(
    State(deployment): State<DeploymentImpl>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<Uuid>,
    Json(payload): Json<CreateTaskComment>,
) -> Result<ResponseJson<ApiResponse<TaskComment>>, ApiError> {
    let comment = deployment
        .tasks()
        .add_comment(deployment.db(), &ctx.actor, id, &payload)
        .await?;
    Ok(ResponseJson(ApiResponse::success(comment)))
}

pub fn router() -> Router<DeploymentImpl> {
    let task_id_router = Router::new()
        .route("/", get(get_task).patch(update_task).delete(delete_task))
        .route("/comments", get(get_comments).post(add_comment));

    let inner = Router::new()
        .route("/", get(get_tasks).post(create_task))
        .nest("/{id}", task_id_router);

    Router::new().nest("/tasks", inner)
}
