use axum::{
    Json,
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use db::DbErr;
use deployment::DeploymentError;
use services::services::error::ServiceError;
use thiserror::Error;
use utils::response::ApiResponse;

#[derive(Debug, Error, ts_rs::TS)]
#[ts(type = "string")]
pub enum ApiError {
    #[error(transparent)]
    Service(#[from] ServiceError),
    #[error(transparent)]
    Deployment(#[from] DeploymentError),
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error("Multipart error: {0}")]
    Multipart(#[from] MultipartError),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Internal server error: {0}")]
    Internal(String),
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
}

impl From<&'static str> for ApiError {
    fn from(msg: &'static str) -> Self {
        ApiError::BadRequest(msg.to_string())
    }
}

impl ApiError {
    fn status_and_type(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::Service(err) => match err {
                ServiceError::Database(DbErr::RecordNotFound(_)) => {
                    (StatusCode::NOT_FOUND, "DatabaseError")
                }
                ServiceError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "DatabaseError"),
                ServiceError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "Unauthorized"),
                ServiceError::Forbidden(_) => (StatusCode::FORBIDDEN, "ForbiddenError"),
                ServiceError::NotFound(_) => (StatusCode::NOT_FOUND, "NotFound"),
                ServiceError::Conflict(_) => (StatusCode::CONFLICT, "ConflictError"),
                ServiceError::LimitReached { .. } => (StatusCode::CONFLICT, "LimitReached"),
                ServiceError::Validation(_) => (StatusCode::BAD_REQUEST, "ValidationError"),
                ServiceError::Spreadsheet(_) => (StatusCode::BAD_REQUEST, "SpreadsheetError"),
                ServiceError::Csv(_) => (StatusCode::INTERNAL_SERVER_ERROR, "CsvError"),
                ServiceError::Json(_) => (StatusCode::INTERNAL_SERVER_ERROR, "SerializationError"),
            },
            ApiError::Deployment(_) => (StatusCode::INTERNAL_SERVER_ERROR, "DeploymentError"),
            ApiError::Database(db_err) => match db_err {
                DbErr::RecordNotFound(_) => (StatusCode::NOT_FOUND, "DatabaseError"),
                _ => (StatusCode::INTERNAL_SERVER_ERROR, "DatabaseError"),
            },
            ApiError::Multipart(_) => (StatusCode::BAD_REQUEST, "MultipartError"),
            ApiError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "Unauthorized"),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NotFound"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "InternalError"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BadRequest"),
            ApiError::Conflict(_) => (StatusCode::CONFLICT, "ConflictError"),
            ApiError::Forbidden(_) => (StatusCode::FORBIDDEN, "ForbiddenError"),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status_and_type().0
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status_code, error_type) = self.status_and_type();

        let error_message = match &self {
            ApiError::Service(err) if !status_code.is_server_error() => err.to_string(),
            ApiError::Multipart(_) => {
                "Failed to upload file. Please ensure the file is valid and try again.".to_string()
            }
            ApiError::Unauthorized(msg) => msg.clone(),
            ApiError::NotFound(msg) => msg.clone(),
            ApiError::BadRequest(msg) => msg.clone(),
            ApiError::Conflict(msg) => msg.clone(),
            ApiError::Forbidden(msg) => msg.clone(),
            _ => "Something went wrong. Please try again.".to_string(),
        };

        if status_code.is_server_error() {
            tracing::error!(
                status = %status_code,
                error_type,
                error = %self,
                "API request failed"
            );
        }
        let response = ApiResponse::<()>::error(&error_message);
        (status_code, Json(response)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use axum::body::to_bytes;
    use db::models::workspace::UsageCounter;

    use super::*;

    #[test]
    fn api_error_maps_to_expected_http_statuses() {
        assert_eq!(
            ApiError::BadRequest("bad".to_string()).into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::Unauthorized("no".to_string()).into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::Forbidden("nope".to_string()).into_response().status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiError::NotFound("missing".to_string()).into_response().status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::Conflict("conflict".to_string()).into_response().status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::Internal("boom".to_string()).into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn service_errors_map_to_expected_http_statuses() {
        let cases = [
            (ServiceError::Unauthorized("x".into()), StatusCode::UNAUTHORIZED),
            (ServiceError::forbidden(), StatusCode::FORBIDDEN),
            (ServiceError::NotFound("Task"), StatusCode::NOT_FOUND),
            (ServiceError::Conflict("dup".into()), StatusCode::CONFLICT),
            (
                ServiceError::LimitReached { counter: UsageCounter::Tasks, limit: 100 },
                StatusCode::CONFLICT,
            ),
            (ServiceError::Validation("bad".into()), StatusCode::BAD_REQUEST),
            (ServiceError::Spreadsheet("bad".into()), StatusCode::BAD_REQUEST),
            (
                ServiceError::Database(DbErr::Custom("down".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }

    #[tokio::test]
    async fn client_errors_keep_their_message_and_server_errors_hide_it() {
        let response = ApiError::from(ServiceError::NotFound("Task")).into_response();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["message"], "Task not found");

        let response =
            ApiError::from(ServiceError::Database(DbErr::Custom("secret dsn".into()))).into_response();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert!(!json["message"].as_str().unwrap().contains("secret"));
    }
}
