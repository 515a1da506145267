use db::models::workspace::WorkspaceLimits;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

pub const CURRENT_CONFIG_VERSION: &str = "v1";

fn default_company_name() -> String {
    "TaskFlow".to_string()
}

/// Quotas stamped on newly created COMMUNITY workspaces.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, TS)]
#[serde(default)]
pub struct CommunityLimits {
    #[serde(alias = "maxUsers")]
    pub max_users: i32,
    #[serde(alias = "maxTasks")]
    pub max_tasks: i32,
    #[serde(alias = "maxTeams")]
    pub max_teams: i32,
}

impl Default for CommunityLimits {
    fn default() -> Self {
        Self {
            max_users: 10,
            max_tasks: 100,
            max_teams: 3,
        }
    }
}

impl CommunityLimits {
    pub fn as_workspace_limits(&self) -> WorkspaceLimits {
        WorkspaceLimits {
            max_users: Some(self.max_users),
            max_tasks: Some(self.max_tasks),
            max_teams: Some(self.max_teams),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[serde(default)]
pub struct AuthConfig {
    /// HS256 secret; `TASKFLOW_JWT_SECRET` takes precedence.
    #[serde(alias = "jwtSecret")]
    pub jwt_secret: Option<String>,
    /// Accept `X-User-Email` instead of a token. Development only.
    #[serde(alias = "allowDevHeader")]
    pub allow_dev_header: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, TS)]
#[serde(default)]
pub struct OutboxConfig {
    #[serde(alias = "pollIntervalMs")]
    pub poll_interval_ms: u64,
    #[serde(alias = "batchLimit")]
    pub batch_limit: u64,
    #[serde(alias = "maxAttempts")]
    pub max_attempts: i32,
}

impl Default for OutboxConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 250,
            batch_limit: 100,
            max_attempts: 10,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, TS)]
#[serde(default)]
pub struct Config {
    #[serde(alias = "configVersion")]
    pub config_version: String,
    #[serde(alias = "companyName")]
    pub company_name: String,
    #[serde(alias = "communityLimits")]
    pub community_limits: CommunityLimits,
    pub auth: AuthConfig,
    pub outbox: OutboxConfig,
}

impl Config {
    pub fn from_raw(raw_config: &str) -> Self {
        match serde_json::from_str::<Config>(raw_config) {
            Ok(config) => config.normalized(),
            Err(e) => {
                tracing::warn!(
                    "Failed to parse config (line {}, column {}): {}, using default",
                    e.line(),
                    e.column(),
                    e
                );
                Self::default()
            }
        }
    }

    pub fn normalized(mut self) -> Self {
        self.config_version = CURRENT_CONFIG_VERSION.to_string();

        if self.company_name.trim().is_empty() {
            self.company_name = default_company_name();
        } else {
            self.company_name = self.company_name.trim().to_string();
        }

        if matches!(
            self.auth.jwt_secret.as_deref(),
            Some(secret) if secret.trim().is_empty()
        ) {
            self.auth.jwt_secret = None;
        }

        let defaults = OutboxConfig::default();
        if self.outbox.poll_interval_ms == 0 {
            self.outbox.poll_interval_ms = defaults.poll_interval_ms;
        }
        if self.outbox.batch_limit == 0 {
            self.outbox.batch_limit = defaults.batch_limit;
        }
        if self.outbox.max_attempts <= 0 {
            self.outbox.max_attempts = defaults.max_attempts;
        }

        let limits = &mut self.community_limits;
        limits.max_users = limits.max_users.max(1);
        limits.max_tasks = limits.max_tasks.max(0);
        limits.max_teams = limits.max_teams.max(0);

        self
    }

    /// Applies `COMPANY_NAME` and `TASKFLOW_JWT_SECRET` over file values.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(name) = std::env::var("COMPANY_NAME")
            && !name.trim().is_empty()
        {
            self.company_name = name.trim().to_string();
        }
        if let Ok(secret) = std::env::var("TASKFLOW_JWT_SECRET")
            && !secret.trim().is_empty()
        {
            self.auth.jwt_secret = Some(secret);
        }
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            config_version: CURRENT_CONFIG_VERSION.to_string(),
            company_name: default_company_name(),
            community_limits: CommunityLimits::default(),
            auth: AuthConfig::default(),
            outbox: OutboxConfig::default(),
        }
    }
}
