use axum::{Router, middleware::from_fn_with_state, routing::get};
use tower_http::trace::TraceLayer;

use crate::{DeploymentImpl, routes};

mod auth;

pub use auth::RequestContext;

pub fn router(deployment: DeploymentImpl) -> Router {
    let api_routes = Router::new()
        .merge(routes::me::router())
        .merge(routes::notifications::router())
        .merge(routes::changelog::router())
        .merge(routes::users::router())
        .merge(routes::teams::router())
        .merge(routes::tasks::router())
        .merge(routes::workspaces::router())
        .merge(routes::events::router())
        .layer(from_fn_with_state(deployment.clone(), auth::require_session));

    Router::new()
        .route("/health", get(routes::health::health_check))
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(deployment)
}

#[cfg(test)]
mod tests {
    use axum::{
        Router,
        body::{Body, to_bytes},
        http::{Request, StatusCode, header},
    };
    use db::{
        WorkspaceScope,
        models::{
            user::{CreateUser, User},
            workspace::{CreateWorkspace, Workspace},
        },
    };
    use deployment::Deployment;
    use protocol::{Role, WorkspaceType};
    use serde_json::{Value, json};
    use tower::ServiceExt;
    use uuid::Uuid;

    use crate::{DeploymentImpl, test_support::TestEnvGuard};

    const SECRET: &str = "test-secret";

    async fn setup_deployment() -> (TestEnvGuard, DeploymentImpl) {
        let temp_root = std::env::temp_dir().join(format!("taskflow-test-{}", Uuid::new_v4()));
        std::fs::create_dir_all(&temp_root).unwrap();

        let db_path = temp_root.join("db.sqlite");
        let db_url = format!("sqlite://{}?mode=rwc", db_path.to_string_lossy());
        let env_guard = TestEnvGuard::new(&temp_root, db_url);

        let deployment = DeploymentImpl::new().await.unwrap();
        {
            let mut config = deployment.config().write().await;
            config.auth.jwt_secret = Some(SECRET.to_string());
            config.auth.allow_dev_header = true;
        }

        (env_guard, deployment)
    }

    async fn seed_workspace(
        deployment: &DeploymentImpl,
        name: &str,
        workspace_type: WorkspaceType,
    ) -> WorkspaceScope {
        let pool = &deployment.db().pool;
        let workspace = Workspace::create(
            pool,
            &CreateWorkspace {
                name: name.to_string(),
                workspace_type: Some(workspace_type),
                owner_id: None,
                limits: None,
            },
        )
        .await
        .unwrap();
        WorkspaceScope::resolve(pool, workspace.id).await.unwrap().unwrap()
    }

    async fn seed_user(deployment: &DeploymentImpl, scope: &WorkspaceScope, email: &str, role: Role) {
        User::create(
            &deployment.db().pool,
            scope,
            &CreateUser {
                name: email.to_string(),
                email: email.to_string(),
                role: Some(role),
                team_id: None,
                profile_picture: None,
            },
        )
        .await
        .unwrap();
    }

    fn as_user(method: &str, uri: &str, email: &str, body: Option<Value>) -> Request<Body> {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("x-user-email", email);
        match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
        (status, json)
    }

    #[tokio::test]
    async fn health_is_public() {
        let (_env_guard, deployment) = setup_deployment().await;
        let app = super::router(deployment);

        let (status, json) = send(
            &app,
            Request::builder().uri("/health").body(Body::empty()).unwrap(),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["success"], true);
    }

    #[tokio::test]
    async fn api_requires_a_session() {
        let (_env_guard, deployment) = setup_deployment().await;
        let app = super::router(deployment);

        let (status, json) = send(
            &app,
            Request::builder().uri("/api/me").body(Body::empty()).unwrap(),
        )
        .await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(json["success"], false);
        assert!(json["message"].as_str().unwrap().starts_with("Unauthorized"));
    }

    #[tokio::test]
    async fn bearer_token_resolves_the_current_user() {
        let (_env_guard, deployment) = setup_deployment().await;
        let scope = seed_workspace(&deployment, "Acme", WorkspaceType::Core).await;
        seed_user(&deployment, &scope, "root@acme.io", Role::Admin).await;
        let app = super::router(deployment);

        let token =
            utils::jwt::issue_token(SECRET, "root@acme.io", chrono::Duration::hours(1)).unwrap();
        let (status, json) = send(
            &app,
            Request::builder()
                .uri("/api/me")
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["user"]["email"], "root@acme.io");
        assert_eq!(json["data"]["workspace"]["name"], "Acme");

        let (status, _) = send(
            &app,
            Request::builder()
                .uri("/api/me")
                .header(header::AUTHORIZATION, "Bearer not-a-token")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn tasks_never_cross_workspaces() {
        let (_env_guard, deployment) = setup_deployment().await;
        let one = seed_workspace(&deployment, "One", WorkspaceType::Core).await;
        let two = seed_workspace(&deployment, "Two", WorkspaceType::Community).await;
        seed_user(&deployment, &one, "a@one.io", Role::Admin).await;
        seed_user(&deployment, &two, "b@two.io", Role::CommunityAdmin).await;
        let app = super::router(deployment);

        let (status, json) = send(
            &app,
            as_user("POST", "/api/tasks", "a@one.io", Some(json!({ "title": "Secret" }))),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let task_id = json["data"]["id"].as_str().unwrap().to_string();

        let (status, json) = send(&app, as_user("GET", "/api/tasks", "b@two.io", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"].as_array().unwrap().len(), 0);

        let (status, json) = send(
            &app,
            as_user("GET", &format!("/api/tasks/{task_id}"), "b@two.io", None),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["success"], false);

        let (status, _) = send(
            &app,
            as_user("GET", &format!("/api/tasks/{task_id}"), "a@one.io", None),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn members_are_forbidden_from_managing_users() {
        let (_env_guard, deployment) = setup_deployment().await;
        let scope = seed_workspace(&deployment, "Acme", WorkspaceType::Core).await;
        seed_user(&deployment, &scope, "ana@acme.io", Role::Member).await;
        let app = super::router(deployment);

        let (status, json) = send(
            &app,
            as_user(
                "POST",
                "/api/users",
                "ana@acme.io",
                Some(json!({ "name": "Bob", "email": "bob@acme.io" })),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(json["success"], false);
    }

    #[tokio::test]
    async fn users_of_a_deactivated_workspace_are_rejected() {
        let (_env_guard, deployment) = setup_deployment().await;
        let core = seed_workspace(&deployment, "Core", WorkspaceType::Core).await;
        let community = seed_workspace(&deployment, "Club", WorkspaceType::Community).await;
        seed_user(&deployment, &core, "root@core.io", Role::Admin).await;
        seed_user(&deployment, &community, "lead@club.io", Role::CommunityAdmin).await;
        let app = super::router(deployment);

        let (status, json) = send(
            &app,
            as_user(
                "PATCH",
                &format!("/api/workspaces/{}/toggle-status", community.uuid),
                "root@core.io",
                None,
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["is_active"], false);

        let (status, _) = send(&app, as_user("GET", "/api/me", "lead@club.io", None)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn changelog_export_is_csv() {
        let (_env_guard, deployment) = setup_deployment().await;
        let scope = seed_workspace(&deployment, "Acme", WorkspaceType::Core).await;
        seed_user(&deployment, &scope, "root@acme.io", Role::Admin).await;
        let app = super::router(deployment);

        let response = app
            .oneshot(as_user("GET", "/api/changelog/export", "root@acme.io", None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();
        assert!(content_type.starts_with("text/csv"));
        assert_eq!(
            response.headers().get("x-export-truncated").and_then(|v| v.to_str().ok()),
            Some("false")
        );
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(String::from_utf8_lossy(&body).starts_with("Date,Event,User"));
    }

    #[tokio::test]
    async fn events_accept_the_token_query_param() {
        let (_env_guard, deployment) = setup_deployment().await;
        let scope = seed_workspace(&deployment, "Acme", WorkspaceType::Core).await;
        seed_user(&deployment, &scope, "root@acme.io", Role::Admin).await;
        {
            deployment.config().write().await.auth.allow_dev_header = false;
        }
        let app = super::router(deployment);

        let response = app
            .clone()
            .oneshot(Request::builder().uri("/api/events").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let token =
            utils::jwt::issue_token(SECRET, "root@acme.io", chrono::Duration::hours(1)).unwrap();
        let response = app
            .oneshot(
                Request::builder()
                    .uri(format!("/api/events?token={token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();
        assert!(content_type.contains("text/event-stream"));
    }
}
