use db::{
    DbErr,
    models::{
        task::TaskError,
        team::TeamError,
        user::UserError,
        workspace::{UsageCounter, WorkspaceError},
    },
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Validation(String),
    #[error("Workspace {} limit of {limit} reached", .counter.label())]
    LimitReached { counter: UsageCounter, limit: i32 },
    #[error("Invalid spreadsheet: {0}")]
    Spreadsheet(String),
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ServiceError>;

impl ServiceError {
    pub fn forbidden() -> Self {
        Self::Forbidden("You do not have permission to perform this action".to_string())
    }
}

impl From<UserError> for ServiceError {
    fn from(err: UserError) -> Self {
        match err {
            UserError::Database(err) => Self::Database(err),
            UserError::UserNotFound => Self::NotFound("User"),
            UserError::EmailTaken(email) => Self::Conflict(format!("Email {email} is already registered")),
            UserError::TeamNotFound => Self::Validation("Team not found in this workspace".to_string()),
        }
    }
}

impl From<TeamError> for ServiceError {
    fn from(err: TeamError) -> Self {
        match err {
            TeamError::Database(err) => Self::Database(err),
            TeamError::TeamNotFound => Self::NotFound("Team"),
            TeamError::UserNotFound(id) => {
                Self::Validation(format!("User {id} not found in this workspace"))
            }
        }
    }
}

impl From<TaskError> for ServiceError {
    fn from(err: TaskError) -> Self {
        match err {
            TaskError::Database(err) => Self::Database(err),
            TaskError::TaskNotFound => Self::NotFound("Task"),
            TaskError::AssigneeNotFound(id) => {
                Self::Validation(format!("Assignee {id} not found in this workspace"))
            }
            TaskError::TeamNotFound => Self::Validation("Team not found in this workspace".to_string()),
        }
    }
}

impl From<WorkspaceError> for ServiceError {
    fn from(err: WorkspaceError) -> Self {
        match err {
            WorkspaceError::Database(err) => Self::Database(err),
            WorkspaceError::WorkspaceNotFound => Self::NotFound("Workspace"),
            WorkspaceError::OwnerNotFound => Self::Validation("Owner not found".to_string()),
        }
    }
}
