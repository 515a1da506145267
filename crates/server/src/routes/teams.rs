use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    response::Json as ResponseJson,
    routing::{delete, get, post},
};
use db::models::team::{CreateTeam, Team, UpdateTeam};
use deployment::Deployment;
use serde::Deserialize;
use ts_rs::TS;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{DeploymentImpl, error::ApiError, http::RequestContext};

#[derive(Debug, Deserialize, TS)]
pub struct AddMemberRequest {
    pub user_id: Uuid,
}

pub async fn get_teams(
    State(deployment): State<DeploymentImpl>,
    Extension(ctx): Extension<RequestContext>,
) -> Result<ResponseJson<ApiResponse<Vec<Team>>>, ApiError> {
    let teams = deployment.teams().list(deployment.db(), &ctx.actor).await?;
    Ok(ResponseJson(ApiResponse::success(teams)))
}

pub async fn get_team(
    State(deployment): State<DeploymentImpl>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Team>>, ApiError> {
    let team = deployment.teams().get(deployment.db(), &ctx.actor, id).await?;
    Ok(ResponseJson(ApiResponse::success(team)))
}

pub async fn create_team(
    State(deployment): State<DeploymentImpl>,
    Extension(ctx): Extension<RequestContext>,
    Json(payload): Json<CreateTeam>,
) -> Result<ResponseJson<ApiResponse<Team>>, ApiError> {
    let team = deployment
        .teams()
        .create(deployment.db(), &ctx.actor, &payload)
        .await?;
    Ok(ResponseJson(ApiResponse::success(team)))
}

pub async fn update_team(
    State(deployment): State<DeploymentImpl>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateTeam>,
) -> Result<ResponseJson<ApiResponse<Team>>, ApiError> {
    let team = deployment
        .teams()
        .update(deployment.db(), &ctx.actor, id, &payload)
        .await?;
    Ok(ResponseJson(ApiResponse::success(team)))
}

pub async fn delete_team(
    State(deployment): State<DeploymentImpl>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    deployment.teams().delete(deployment.db(), &ctx.actor, id).await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

pub async fn add_member(
    State(deployment): State<DeploymentImpl>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AddMemberRequest>,
) -> Result<ResponseJson<ApiResponse<Team>>, ApiError> {
    let team = deployment
        .teams()
        .add_member(deployment.db(), &ctx.actor, id, payload.user_id)
        .await?;
    Ok(ResponseJson(ApiResponse::success(team)))
}

pub async fn remove_member(
    State(deployment): State<DeploymentImpl>,
    Extension(ctx): Extension<RequestContext>,
    Path((id, user_id)): Path<(Uuid, Uuid)>,
) -> Result<ResponseJson<ApiResponse<Team>>, ApiError> {
    let team = deployment
        .teams()
        .remove_member(deployment.db(), &ctx.actor, id, user_id)
        .await?;
    Ok(ResponseJson(ApiResponse::success(team)))
}

pub fn router() -> Router<DeploymentImpl> {
    let team_id_router = Router::new()
        .route("/", get(get_team).patch(update_team).delete(delete_team))
        .route("/members", post(add_member))
        .route("/members/{user_id}", delete(remove_member));

    let inner = Router::new()
        .route("/", get(get_teams).post(create_team))
        .nest("/{id}", team_id_router);

    Router::new().nest("/teams", inner)
}
