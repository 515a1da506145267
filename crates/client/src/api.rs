use db::models::{
    notification::Notification,
    task::{CreateTask, Task, TaskQuery, UpdateTask},
    task_comment::{CreateTaskComment, TaskComment},
    team::{CreateTeam, Team, UpdateTeam},
    user::{CreateUser, UpdateUser, User},
    workspace::Workspace,
};
use futures::{Stream, StreamExt};
use protocol::{RealtimeEvent, Role};
use reqwest::{Method, RequestBuilder, header};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use url::Url;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{error::ClientError, sse::decode_events};

/// The signed-in user as `/api/me` reports them.
#[derive(Debug, Clone, Deserialize)]
pub struct Me {
    pub user: User,
    pub workspace: Workspace,
    pub assignable_roles: Vec<Role>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotificationList {
    pub notifications: Vec<Notification>,
    pub unread_count: u64,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct MarkReadResult {
    pub updated: u64,
}

#[derive(Debug, Serialize)]
struct NotificationQuery {
    unread_only: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    limit: Option<u64>,
}

#[derive(Debug, Serialize)]
struct MarkReadRequest<'a> {
    notification_ids: &'a [Uuid],
}

#[derive(Debug, Serialize)]
struct AddMemberRequest {
    user_id: Uuid,
}

#[derive(Clone)]
pub struct TaskflowClient {
    http: reqwest::Client,
    base_url: Url,
    token: Option<String>,
}

impl TaskflowClient {
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        Ok(Self {
            http: reqwest::Client::new(),
            base_url: Url::parse(base_url)?,
            token: None,
        })
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    fn url(&self, path: &str) -> Result<Url, ClientError> {
        Ok(self.base_url.join(path)?)
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, ClientError> {
        let builder = self.http.request(method, self.url(path)?);
        Ok(match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        })
    }

    async fn envelope<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
    ) -> Result<(String, ApiResponse<T>), ClientError> {
        let response = builder.send().await?;
        let status = response.status();
        let url = response.url().to_string();
        let body = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<ApiResponse<serde_json::Value>>(&body)
                .ok()
                .and_then(|envelope| envelope.message)
                .unwrap_or_else(|| {
                    status
                        .canonical_reason()
                        .unwrap_or("request failed")
                        .to_string()
                });
            return Err(ClientError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let envelope: ApiResponse<T> = serde_json::from_str(&body)?;
        if !envelope.success {
            return Err(ClientError::Api {
                status: status.as_u16(),
                message: envelope
                    .message
                    .unwrap_or_else(|| "Unknown error".to_string()),
            });
        }
        Ok((url, envelope))
    }

    async fn send_json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, ClientError> {
        let (url, envelope) = self.envelope::<T>(builder).await?;
        envelope.into_data().ok_or(ClientError::MissingData(url))
    }

    async fn send_ok(&self, builder: RequestBuilder) -> Result<(), ClientError> {
        self.envelope::<serde_json::Value>(builder).await.map(|_| ())
    }

    pub async fn me(&self) -> Result<Me, ClientError> {
        self.send_json(self.request(Method::GET, "/api/me")?).await
    }

    pub async fn list_tasks(&self, query: &TaskQuery) -> Result<Vec<Task>, ClientError> {
        self.send_json(self.request(Method::GET, "/api/tasks")?.query(query))
            .await
    }

    pub async fn get_task(&self, id: Uuid) -> Result<Task, ClientError> {
        self.send_json(self.request(Method::GET, &format!("/api/tasks/{id}"))?)
            .await
    }

    pub async fn create_task(&self, payload: &CreateTask) -> Result<Task, ClientError> {
        self.send_json(self.request(Method::POST, "/api/tasks")?.json(payload))
            .await
    }

    pub async fn update_task(&self, id: Uuid, payload: &UpdateTask) -> Result<Task, ClientError> {
        self.send_json(
            self.request(Method::PATCH, &format!("/api/tasks/{id}"))?
                .json(payload),
        )
        .await
    }

    pub async fn delete_task(&self, id: Uuid) -> Result<(), ClientError> {
        self.send_ok(self.request(Method::DELETE, &format!("/api/tasks/{id}"))?)
            .await
    }

    pub async fn task_comments(&self, id: Uuid) -> Result<Vec<TaskComment>, ClientError> {
        self.send_json(self.request(Method::GET, &format!("/api/tasks/{id}/comments"))?)
            .await
    }

    pub async fn add_comment(
        &self,
        id: Uuid,
        payload: &CreateTaskComment,
    ) -> Result<TaskComment, ClientError> {
        self.send_json(
            self.request(Method::POST, &format!("/api/tasks/{id}/comments"))?
                .json(payload),
        )
        .await
    }

    pub async fn list_teams(&self) -> Result<Vec<Team>, ClientError> {
        self.send_json(self.request(Method::GET, "/api/teams")?).await
    }

    pub async fn create_team(&self, payload: &CreateTeam) -> Result<Team, ClientError> {
        self.send_json(self.request(Method::POST, "/api/teams")?.json(payload))
            .await
    }

    pub async fn update_team(&self, id: Uuid, payload: &UpdateTeam) -> Result<Team, ClientError> {
        self.send_json(
            self.request(Method::PATCH, &format!("/api/teams/{id}"))?
                .json(payload),
        )
        .await
    }

    pub async fn delete_team(&self, id: Uuid) -> Result<(), ClientError> {
        self.send_ok(self.request(Method::DELETE, &format!("/api/teams/{id}"))?)
            .await
    }

    pub async fn add_team_member(&self, team_id: Uuid, user_id: Uuid) -> Result<Team, ClientError> {
        self.send_json(
            self.request(Method::POST, &format!("/api/teams/{team_id}/members"))?
                .json(&AddMemberRequest { user_id }),
        )
        .await
    }

    pub async fn remove_team_member(
        &self,
        team_id: Uuid,
        user_id: Uuid,
    ) -> Result<Team, ClientError> {
        self.send_json(self.request(
            Method::DELETE,
            &format!("/api/teams/{team_id}/members/{user_id}"),
        )?)
        .await
    }

    pub async fn list_users(&self) -> Result<Vec<User>, ClientError> {
        self.send_json(self.request(Method::GET, "/api/users")?).await
    }

    pub async fn create_user(&self, payload: &CreateUser) -> Result<User, ClientError> {
        self.send_json(self.request(Method::POST, "/api/users")?.json(payload))
            .await
    }

    pub async fn update_user(&self, id: Uuid, payload: &UpdateUser) -> Result<User, ClientError> {
        self.send_json(
            self.request(Method::PUT, &format!("/api/users/{id}"))?
                .json(payload),
        )
        .await
    }

    pub async fn delete_user(&self, id: Uuid) -> Result<(), ClientError> {
        self.send_ok(self.request(Method::DELETE, &format!("/api/users/{id}"))?)
            .await
    }

    pub async fn notifications(
        &self,
        unread_only: bool,
        limit: Option<u64>,
    ) -> Result<NotificationList, ClientError> {
        self.send_json(
            self.request(Method::GET, "/api/notifications")?
                .query(&NotificationQuery { unread_only, limit }),
        )
        .await
    }

    /// An empty slice marks every unread notification as read.
    pub async fn mark_notifications_read(
        &self,
        notification_ids: &[Uuid],
    ) -> Result<MarkReadResult, ClientError> {
        self.send_json(
            self.request(Method::PATCH, "/api/notifications")?
                .json(&MarkReadRequest { notification_ids }),
        )
        .await
    }

    /// Opens the realtime stream. The first event is always `connected`,
    /// after which the caller should reload its lists.
    pub async fn subscribe(
        &self,
    ) -> Result<impl Stream<Item = Result<RealtimeEvent, ClientError>> + use<>, ClientError> {
        let response = self
            .request(Method::GET, "/api/events")?
            .header(header::ACCEPT, "text/event-stream")
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Api {
                status: status.as_u16(),
                message: status
                    .canonical_reason()
                    .unwrap_or("subscription rejected")
                    .to_string(),
            });
        }
        Ok(decode_events(response.bytes_stream().boxed()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_resolve_against_the_base_url() {
        let client = TaskflowClient::new("http://localhost:3001").unwrap();
        let id = Uuid::nil();
        assert_eq!(
            client.url(&format!("/api/tasks/{id}")).unwrap().as_str(),
            format!("http://localhost:3001/api/tasks/{id}")
        );
    }

    #[test]
    fn me_decodes_the_server_envelope() {
        let body = serde_json::json!({
            "success": true,
            "message": null,
            "data": {
                "user": {
                    "id": Uuid::new_v4(),
                    "workspace_id": Uuid::new_v4(),
                    "team_id": null,
                    "name": "Ana",
                    "email": "ana@acme.io",
                    "role": "team_lead",
                    "profile_picture": null,
                    "is_active": true,
                    "created_at": "2024-01-01T00:00:00Z",
                    "updated_at": "2024-01-01T00:00:00Z"
                },
                "workspace": serde_json::Value::Null,
                "assignable_roles": ["member"]
            }
        });
        let envelope: ApiResponse<serde_json::Value> = serde_json::from_value(body).unwrap();
        let data = envelope.into_data().unwrap();
        let user: User = serde_json::from_value(data["user"].clone()).unwrap();
        let roles: Vec<Role> = serde_json::from_value(data["assignable_roles"].clone()).unwrap();
        assert_eq!(user.role, Role::TeamLead);
        assert_eq!(roles, vec![Role::Member]);
    }
}
