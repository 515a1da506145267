use axum::{
    Extension, Json, Router,
    extract::{Multipart, Path, State},
    http::{HeaderValue, header},
    response::{IntoResponse, Json as ResponseJson, Response},
    routing::{get, post},
};
use db::models::user::{CreateUser, UpdateUser, User};
use deployment::Deployment;
use services::services::bulk_import::{
    BulkImportResult, JsonImport, JsonTemplate, TEMPLATE_FILENAME,
};
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{DeploymentImpl, error::ApiError, http::RequestContext};

const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

pub async fn get_users(
    State(deployment): State<DeploymentImpl>,
    Extension(ctx): Extension<RequestContext>,
) -> Result<ResponseJson<ApiResponse<Vec<User>>>, ApiError> {
    let users = deployment.users().list(deployment.db(), &ctx.actor).await?;
    Ok(ResponseJson(ApiResponse::success(users)))
}

pub async fn get_user(
    State(deployment): State<DeploymentImpl>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<User>>, ApiError> {
    let user = deployment.users().get(deployment.db(), &ctx.actor, id).await?;
    Ok(ResponseJson(ApiResponse::success(user)))
}

pub async fn create_user(
    State(deployment): State<DeploymentImpl>,
    Extension(ctx): Extension<RequestContext>,
    Json(payload): Json<CreateUser>,
) -> Result<ResponseJson<ApiResponse<User>>, ApiError> {
    let user = deployment
        .users()
        .create(deployment.db(), &ctx.actor, &payload)
        .await?;
    Ok(ResponseJson(ApiResponse::success(user)))
}

pub async fn update_user(
    State(deployment): State<DeploymentImpl>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateUser>,
) -> Result<ResponseJson<ApiResponse<User>>, ApiError> {
    let user = deployment
        .users()
        .update(deployment.db(), &ctx.actor, id, &payload)
        .await?;
    Ok(ResponseJson(ApiResponse::success(user)))
}

pub async fn delete_user(
    State(deployment): State<DeploymentImpl>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    deployment.users().delete(deployment.db(), &ctx.actor, id).await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

pub async fn import_json(
    State(deployment): State<DeploymentImpl>,
    Extension(ctx): Extension<RequestContext>,
    Json(payload): Json<JsonImport>,
) -> Result<ResponseJson<ApiResponse<BulkImportResult>>, ApiError> {
    let result = deployment
        .bulk_import()
        .import_json(deployment.db(), &ctx.actor, &payload)
        .await?;
    Ok(ResponseJson(ApiResponse::success(result)))
}

/// Reads the first file part of the upload.
async fn read_upload(multipart: &mut Multipart) -> Result<Vec<u8>, ApiError> {
    while let Some(field) = multipart.next_field().await? {
        if field.file_name().is_some() || field.name() == Some("file") {
            let bytes = field.bytes().await?;
            if bytes.is_empty() {
                return Err(ApiError::BadRequest("Uploaded file is empty".to_string()));
            }
            return Ok(bytes.to_vec());
        }
    }
    Err(ApiError::BadRequest("No file provided".to_string()))
}

pub async fn import_excel(
    State(deployment): State<DeploymentImpl>,
    Extension(ctx): Extension<RequestContext>,
    mut multipart: Multipart,
) -> Result<ResponseJson<ApiResponse<BulkImportResult>>, ApiError> {
    let bytes = read_upload(&mut multipart).await?;
    let result = deployment
        .bulk_import()
        .import_excel(deployment.db(), &ctx.actor, &bytes)
        .await?;
    Ok(ResponseJson(ApiResponse::success(result)))
}

pub async fn excel_template(
    State(deployment): State<DeploymentImpl>,
    Extension(ctx): Extension<RequestContext>,
) -> Result<Response, ApiError> {
    let bytes = deployment.bulk_import().excel_template(&ctx.actor)?;
    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{TEMPLATE_FILENAME}\""))
        .map_err(|err| ApiError::Internal(err.to_string()))?;
    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(XLSX_CONTENT_TYPE)),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}

pub async fn json_template(
    State(deployment): State<DeploymentImpl>,
    Extension(ctx): Extension<RequestContext>,
) -> Result<ResponseJson<ApiResponse<JsonTemplate>>, ApiError> {
    let template = deployment.bulk_import().json_template(&ctx.actor)?;
    Ok(ResponseJson(ApiResponse::success(template)))
}

pub fn router() -> Router<DeploymentImpl> {
    let bulk_import = Router::new()
        .route("/json", post(import_json))
        .route("/excel", post(import_excel))
        .route("/template", get(excel_template))
        .route("/template-json", get(json_template));

    let inner = Router::new()
        .route("/", get(get_users).post(create_user))
        .route("/{id}", get(get_user).put(update_user).delete(delete_user))
        .nest("/bulk-import", bulk_import);

    Router::new().nest("/users", inner)
}
