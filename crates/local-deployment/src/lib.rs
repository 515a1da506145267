use std::sync::Arc;

use async_trait::async_trait;
use db::DBService;
use deployment::{Deployment, DeploymentError};
use services::services::{
    bulk_import::BulkImportService,
    changelog::ChangeLogService,
    config::{Config, load_config_from_file, save_config_to_file},
    events::EventService,
    notifications::NotificationService,
    tasks::TaskService,
    teams::TeamService,
    users::UserService,
    workspaces::WorkspaceService,
};
use tokio::sync::RwLock;
use utils::{
    assets::{config_path, default_database_url},
    event_hub::EventHub,
};

const DATABASE_URL_ENV: &str = "DATABASE_URL";

#[derive(Clone)]
pub struct LocalDeployment {
    config: Arc<RwLock<Config>>,
    db: DBService,
    events: EventService,
    domain: DomainServices,
}

#[derive(Clone, Default)]
struct DomainServices {
    workspaces: WorkspaceService,
    users: UserService,
    teams: TeamService,
    tasks: TaskService,
    notifications: NotificationService,
    changelog: ChangeLogService,
    bulk_import: BulkImportService,
}

#[async_trait]
impl Deployment for LocalDeployment {
    async fn new() -> Result<Self, DeploymentError> {
        let config = Self::load_runtime_config().await?;
        let outbox = config.read().await.outbox;

        let db = DBService::new(&database_url()).await?;
        let hub = Arc::new(EventHub::new());
        let events = EventService::new(db.clone(), hub, outbox);

        Ok(Self {
            config,
            db,
            events,
            domain: DomainServices::default(),
        })
    }

    fn config(&self) -> &Arc<RwLock<Config>> {
        &self.config
    }

    fn db(&self) -> &DBService {
        &self.db
    }

    fn events(&self) -> &EventService {
        &self.events
    }

    fn workspaces(&self) -> &WorkspaceService {
        &self.domain.workspaces
    }

    fn users(&self) -> &UserService {
        &self.domain.users
    }

    fn teams(&self) -> &TeamService {
        &self.domain.teams
    }

    fn tasks(&self) -> &TaskService {
        &self.domain.tasks
    }

    fn notifications(&self) -> &NotificationService {
        &self.domain.notifications
    }

    fn changelog(&self) -> &ChangeLogService {
        &self.domain.changelog
    }

    fn bulk_import(&self) -> &BulkImportService {
        &self.domain.bulk_import
    }
}

impl LocalDeployment {
    async fn load_runtime_config() -> Result<Arc<RwLock<Config>>, DeploymentError> {
        let path = config_path();
        let raw_config = load_config_from_file(&path).await;
        // Persist the file values only; env overrides stay out of config.json.
        save_config_to_file(&raw_config, &path).await?;

        let config = raw_config.with_env_overrides();
        if config.auth.jwt_secret.is_none() && !config.auth.allow_dev_header {
            tracing::warn!("No JWT secret configured; every API request will be rejected");
        }
        Ok(Arc::new(RwLock::new(config)))
    }

    /// Outbox rows that exhausted their retries.
    pub async fn log_outbox_health(&self) {
        match self.events.dead_letter_count().await {
            Ok(0) => {}
            Ok(count) => tracing::warn!(count, "event outbox holds dead-lettered events"),
            Err(err) => tracing::warn!(error = %err, "failed to inspect event outbox"),
        }
    }
}

pub fn database_url() -> String {
    resolve_database_url(std::env::var(DATABASE_URL_ENV).ok())
}

fn resolve_database_url(from_env: Option<String>) -> String {
    match from_env {
        Some(url) if !url.trim().is_empty() => url.trim().to_string(),
        _ => default_database_url(),
    }
}
