use db::DbErr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EventError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error(transparent)]
    Parse(#[from] serde_json::Error),
}

/// Outcome of one outbox poll.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    pub published: usize,
    pub failed: usize,
}
