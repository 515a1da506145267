use axum::{Extension, Router, response::Json as ResponseJson, routing::get};
use db::models::{user::User, workspace::Workspace};
use protocol::Role;
use serde::Serialize;
use ts_rs::TS;
use utils::response::ApiResponse;

use crate::{DeploymentImpl, error::ApiError, http::RequestContext};

#[derive(Debug, Serialize, TS)]
pub struct MeResponse {
    pub user: User,
    pub workspace: Workspace,
    /// Roles this user may hand out, for UI gating.
    pub assignable_roles: Vec<Role>,
}

pub async fn get_me(
    Extension(ctx): Extension<RequestContext>,
) -> Result<ResponseJson<ApiResponse<MeResponse>>, ApiError> {
    let assignable_roles = ctx
        .actor
        .role()
        .assignable_roles(ctx.actor.workspace_type)
        .to_vec();
    Ok(ResponseJson(ApiResponse::success(MeResponse {
        user: ctx.actor.user,
        workspace: ctx.workspace,
        assignable_roles,
    })))
}

pub fn router() -> Router<DeploymentImpl> {
    Router::new().route("/me", get(get_me))
}
