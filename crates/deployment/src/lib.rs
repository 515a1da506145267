use std::{convert::Infallible, sync::Arc};

use async_trait::async_trait;
use axum::response::sse::Event;
use db::{DBService, DbErr};
use futures::stream::BoxStream;
use protocol::Subscriber;
use services::services::{
    bulk_import::BulkImportService,
    changelog::ChangeLogService,
    config::{Config, ConfigError},
    context::Actor,
    error::ServiceError,
    events::EventService,
    notifications::NotificationService,
    tasks::TaskService,
    teams::TeamService,
    users::UserService,
    workspaces::WorkspaceService,
};
use thiserror::Error;
use tokio::sync::RwLock;
use utils::event_hub::EventHub;

#[derive(Debug, Error)]
pub enum DeploymentError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Everything a request handler needs, passed around as axum state.
#[async_trait]
pub trait Deployment: Clone + Send + Sync + 'static {
    async fn new() -> Result<Self, DeploymentError>;

    fn config(&self) -> &Arc<RwLock<Config>>;

    fn db(&self) -> &DBService;

    fn events(&self) -> &EventService;

    fn workspaces(&self) -> &WorkspaceService;

    fn users(&self) -> &UserService;

    fn teams(&self) -> &TeamService;

    fn tasks(&self) -> &TaskService;

    fn notifications(&self) -> &NotificationService;

    fn changelog(&self) -> &ChangeLogService;

    fn bulk_import(&self) -> &BulkImportService;

    fn hub(&self) -> &Arc<EventHub> {
        self.events().hub()
    }

    /// Maps a verified session subject onto the acting user.
    async fn resolve_actor(&self, email: &str) -> Result<(Actor, db::models::workspace::Workspace), ServiceError> {
        Actor::resolve(&self.db().pool, email).await
    }

    fn stream_events_for(&self, subscriber: Subscriber) -> BoxStream<'static, Result<Event, Infallible>> {
        self.hub().sse_stream_for(subscriber)
    }
}
