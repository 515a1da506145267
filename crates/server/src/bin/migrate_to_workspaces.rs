//! Moves a single-tenant database into the CORE workspace.
//!
//! Reads `DATABASE_URL` and `COMPANY_NAME`; safe to run more than once.

use std::process::ExitCode;

use db::DBService;
use local_deployment::database_url;
use services::services::backfill::migrate_to_workspaces;
use tracing_subscriber::{EnvFilter, prelude::*};

const DEFAULT_COMPANY_NAME: &str = "TaskFlow";

fn company_name() -> String {
    std::env::var("COMPANY_NAME")
        .ok()
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| DEFAULT_COMPANY_NAME.to_string())
}

async fn run() -> anyhow::Result<()> {
    let db = DBService::new(&database_url()).await?;
    let report = migrate_to_workspaces(&db, &company_name()).await?;

    tracing::info!(
        workspace_id = %report.workspace.id,
        workspace = %report.workspace.name,
        created = report.created_workspace,
        rows_assigned = report.assigned.total(),
        users_without_workspace = report.users_without_workspace,
        "Migration finished"
    );
    if report.users_without_workspace > 0 {
        anyhow::bail!(
            "{} users are still without a workspace",
            report.users_without_workspace
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let filter = EnvFilter::try_new(format!(
        "warn,migrate_to_workspaces={level},services={level},db={level}",
        level = log_level
    ))
    .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_filter(filter))
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "Migration failed");
            ExitCode::FAILURE
        }
    }
}
