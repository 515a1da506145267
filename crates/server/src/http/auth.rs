use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};
use db::models::workspace::Workspace;
use deployment::Deployment;
use services::services::{context::Actor, error::ServiceError};
use url::form_urlencoded;
use utils::jwt::verify_token;

use crate::{DeploymentImpl, error::ApiError};

const DEV_EMAIL_HEADER: &str = "x-user-email";

/// The resolved caller, inserted as a request extension for every `/api`
/// route.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub actor: Actor,
    pub workspace: Workspace,
}

fn parse_authorization_bearer(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    let (prefix, rest) = trimmed.split_once(' ')?;
    if !prefix.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = rest.trim();
    if token.is_empty() {
        return None;
    }
    Some(token)
}

fn extract_query_token(req: &Request) -> Option<String> {
    let query = req.uri().query()?;
    for (key, value) in form_urlencoded::parse(query.as_bytes()) {
        if key == "token" {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                return None;
            }
            return Some(trimmed.to_string());
        }
    }
    None
}

fn is_sse_events_endpoint(req: &Request) -> bool {
    // Installed on the nested `/api` router, so `/events` here is `/api/events`.
    req.uri().path().starts_with("/events")
}

fn extract_request_token(req: &Request) -> Option<String> {
    if let Some(value) = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(parse_authorization_bearer)
    {
        return Some(value.to_string());
    }

    // EventSource cannot set headers.
    if is_sse_events_endpoint(req) {
        return extract_query_token(req);
    }

    None
}

fn extract_dev_email(req: &Request) -> Option<String> {
    req.headers()
        .get(DEV_EMAIL_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn peer(req: &Request) -> String {
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|connect_info| connect_info.0.to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// What the request offers as proof of identity, copied out so no borrow
/// of the request lives across an await.
#[derive(Debug, Default, PartialEq, Eq)]
struct Credentials {
    token: Option<String>,
    dev_email: Option<String>,
}

impl Credentials {
    fn from_request(req: &Request) -> Self {
        Self {
            token: extract_request_token(req),
            dev_email: extract_dev_email(req),
        }
    }
}

/// Finds the session subject: a verified token first, then the development
/// header when enabled.
async fn session_email(deployment: &DeploymentImpl, credentials: Credentials) -> Result<String, &'static str> {
    let auth = deployment.config().read().await.auth.clone();

    if let Some(token) = credentials.token {
        let secret = auth.jwt_secret.as_deref().unwrap_or_default();
        return verify_token(secret, &token)
            .map(|claims| claims.sub)
            .map_err(|err| {
                tracing::debug!(error = %err, "token rejected");
                "invalid_token"
            });
    }

    if auth.allow_dev_header
        && let Some(email) = credentials.dev_email
    {
        return Ok(email);
    }

    Err("missing_token")
}

pub async fn require_session(
    State(deployment): State<DeploymentImpl>,
    mut req: Request,
    next: Next,
) -> Response {
    let credentials = Credentials::from_request(&req);
    let resolved = match session_email(&deployment, credentials).await {
        Ok(email) => deployment.resolve_actor(&email).await,
        Err(reason) => Err(ServiceError::Unauthorized(reason.to_string())),
    };

    match resolved {
        Ok((actor, workspace)) => {
            req.extensions_mut().insert(RequestContext { actor, workspace });
            next.run(req).await
        }
        Err(err) => {
            let err = match err {
                ServiceError::Unauthorized(reason) => {
                    tracing::warn!(
                        path = %req.uri().path(),
                        method = %req.method(),
                        peer = %peer(&req),
                        reason = %reason,
                        "Unauthorized API request"
                    );
                    ApiError::Unauthorized("Unauthorized. Please sign in again.".to_string())
                }
                ServiceError::Forbidden(reason) => {
                    tracing::warn!(
                        path = %req.uri().path(),
                        method = %req.method(),
                        peer = %peer(&req),
                        reason = %reason,
                        "Rejected API request"
                    );
                    ApiError::Forbidden(reason)
                }
                other => ApiError::from(other),
            };
            err.into_response()
        }
    }
}
